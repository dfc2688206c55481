//! Services module - editor-time build tooling for the Android side of the plugin.
//!
//! The services have no dependency on the CLI layer; every input is an
//! explicit parameter, which keeps them testable against temp directories.
//!
//! # Components
//!
//! - [`ManifestPatcher`]: pre-build / post-build / reload hooks that substitute
//!   the URL scheme into the `AndroidManifest.xml` template and guarantee the
//!   template is put back afterwards.
//! - [`sdk_detection`]: Android SDK platform lookup and the build prerequisite
//!   checks ([`check_prerequisites`]).
//! - [`PluginBuildService`]: writes the JSON build config and runs the external
//!   jar build script with a timeout.
//!
//! # Build flow
//!
//! ```ignore
//! use deeplinks::services::PluginBuildService;
//!
//! let service = PluginBuildService::default();
//! let outcome = runtime.block_on(service.build_plugin(&config, None))?;
//! ```
//!
//! 1. Check JDK, SDK root, SDK platforms and package name
//! 2. Write `Temp/Deeplinks/deeplink-build-conf.json`
//! 3. Run the build script with the config path as its argument
//! 4. Wait for exit and drained output, bounded by the configured timeout
//! 5. On exit code 0, request an asset refresh

pub mod manifest;
pub mod plugin_build;
pub mod sdk_detection;

pub use manifest::{ManifestError, ManifestPatcher, PatchOutcome, PatchRequest, RestoreFlag};
pub use plugin_build::{
    AssetRefresher, BuildOutcome, LogOnlyRefresher, PluginBuildError, PluginBuildService,
    ScriptInvocation,
};
pub use sdk_detection::{
    PrerequisiteError, PrerequisiteReport, check_prerequisites, has_android_sdk_version,
    installed_platforms,
};
