use crate::models::scheme::{UrlScheme, UrlSchemeList};
use serde::{Deserialize, Serialize};
use camino::Utf8PathBuf;
use std::time::Duration;

/// Project-level deeplink settings from `ProjectSettings/DeeplinkSettings.yaml`.
///
/// Only holds the URL scheme. Shared through version control with the rest
/// of the project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeeplinkSettings {
    #[serde(rename = "urlScheme", default)]
    pub url_scheme: UrlScheme,
}

/// Platform the editor is currently building for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildTarget {
    #[default]
    Android,
    #[serde(rename = "iOS")]
    Ios,
    Standalone,
}

/// Build system used for Android player builds.
///
/// Gradle resolves `${applicationId}` itself; the internal build system
/// needs the package name substituted into the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AndroidBuildSystem {
    #[default]
    Gradle,
    Internal,
}

/// Player settings from `ProjectSettings/PlayerSettings.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(rename = "applicationIdentifier", default = "default_application_identifier")]
    pub application_identifier: String,

    #[serde(rename = "androidMinSdkVersion", default = "default_min_sdk_version")]
    pub android_min_sdk_version: u32,

    /// `0` means "highest installed".
    #[serde(rename = "androidTargetSdkVersion", default)]
    pub android_target_sdk_version: u32,

    #[serde(rename = "androidBuildSystem", default)]
    pub android_build_system: AndroidBuildSystem,

    #[serde(rename = "activeBuildTarget", default)]
    pub active_build_target: BuildTarget,

    #[serde(rename = "iOSURLSchemes", default)]
    pub ios_url_schemes: UrlSchemeList,
}

/// Placeholder identifier every new project starts with.
pub const DEFAULT_APPLICATION_IDENTIFIER: &str = "com.Company.ProductName";

/// Prefix that marks an application identifier as never customized.
pub const DEFAULT_PACKAGE_PREFIX: &str = "com.company";

impl PlayerSettings {
    /// True when the identifier still carries the template prefix.
    pub fn has_default_package_name(&self) -> bool {
        self.application_identifier
            .get(..DEFAULT_PACKAGE_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DEFAULT_PACKAGE_PREFIX))
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            application_identifier: default_application_identifier(),
            android_min_sdk_version: default_min_sdk_version(),
            android_target_sdk_version: 0,
            android_build_system: AndroidBuildSystem::default(),
            active_build_target: BuildTarget::default(),
            ios_url_schemes: UrlSchemeList::default(),
        }
    }
}

fn default_application_identifier() -> String {
    DEFAULT_APPLICATION_IDENTIFIER.to_string()
}

fn default_min_sdk_version() -> u32 {
    22
}

/// Per-machine editor preferences from `Library/EditorPrefs.yaml`.
///
/// Every field can be overridden with a `DEEPLINKS_` environment variable,
/// e.g. `DEEPLINKS_JDK_PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorPrefs {
    #[serde(default)]
    pub jdk_path: String,

    #[serde(default)]
    pub android_sdk_root: String,

    #[serde(default)]
    pub editor_data_path: String,

    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,

    #[serde(default)]
    pub should_restore_android_manifest: bool,
}

impl EditorPrefs {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// The SDK root with surrounding whitespace trimmed and separators made
    /// native, or `None` if it is blank.
    pub fn android_sdk_root_path(&self) -> Option<Utf8PathBuf> {
        let root = self.android_sdk_root.trim();
        (!root.is_empty()).then(|| Utf8PathBuf::from(crate::paths::as_native_path(root)))
    }
}

impl Default for EditorPrefs {
    fn default() -> Self {
        Self {
            jdk_path: String::new(),
            android_sdk_root: String::new(),
            editor_data_path: String::new(),
            build_timeout_secs: default_build_timeout_secs(),
            should_restore_android_manifest: false,
        }
    }
}

fn default_build_timeout_secs() -> u64 {
    120
}

/// Input for the Android plugin build script.
///
/// Field names are part of the script's contract and serialize in
/// PascalCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildConfig {
    pub unity_project_root_path: String,
    pub android_package_name: String,
    pub unity_editor_data_path: String,
    pub android_sdk_root: String,
    pub jdk_path: String,
    pub android_min_sdk_version: u32,
    pub android_target_sdk_version: u32,
}
