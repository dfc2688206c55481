//! Data models for the deeplinks tooling.
//!
//! - [`DeeplinkSettings`]: the project's URL scheme, from `ProjectSettings/DeeplinkSettings.yaml`
//! - [`PlayerSettings`]: package name, SDK versions and build target, from `ProjectSettings/PlayerSettings.yaml`
//! - [`EditorPrefs`]: per-machine paths and the manifest restore flag, from `Library/EditorPrefs.yaml`
//! - [`BuildConfig`]: the JSON document handed to the Android plugin build script
//! - [`UrlScheme`] / [`UrlSchemeList`]: sanitized scheme values and the iOS scheme list
//!
//! All config structs derive `Serialize`/`Deserialize` and are loaded and
//! saved through [`ConfigManager`](crate::config::ConfigManager).

pub mod config;
pub mod scheme;

pub use config::{
    AndroidBuildSystem, BuildConfig, BuildTarget, DeeplinkSettings, EditorPrefs, PlayerSettings,
};
pub use scheme::{UrlScheme, UrlSchemeList, is_valid_scheme, sanitize};
