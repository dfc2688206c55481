//! Android SDK detection and build prerequisite checks.
//!
//! Before the plugin jar can be built the editor needs a JDK, an Android SDK
//! with the configured platform versions installed, and a package name that
//! was actually customized. These checks mirror what the build script would
//! otherwise fail on much later and with far less helpful output.
//!
//! # Examples
//!
//! ```ignore
//! use deeplinks::services::sdk_detection::{check_prerequisites, has_android_sdk_version};
//! use camino::Utf8Path;
//!
//! let installed = has_android_sdk_version(Utf8Path::new("/opt/android-sdk"), 33);
//! let report = check_prerequisites(&prefs, &player);
//! if !report.is_ok() {
//!     return;
//! }
//! ```

use crate::models::{EditorPrefs, PlayerSettings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;
use thiserror::Error;

static PLATFORM_DIR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^android-(\d+)$").expect("Invalid platform regex"));

/// A single failed build prerequisite.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrerequisiteError {
    #[error("JDK path is not set")]
    JdkPathNotSet,

    #[error("Android SDK root is not set")]
    SdkRootNotSet,

    #[error("Android SDK platform {version} not found @ {path}")]
    SdkPlatformMissing { version: u32, path: Utf8PathBuf },

    #[error("Application identifier '{0}' is still the default value")]
    DefaultPackageName(String),
}

/// Result of [`check_prerequisites`]: every failure found, in check order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrerequisiteReport {
    pub failures: Vec<PrerequisiteError>,
}

impl PrerequisiteReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Get a summary string of what failed
    pub fn summary(&self) -> String {
        if self.failures.is_empty() {
            "All prerequisites met".to_string()
        } else {
            self.failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        }
    }
}

/// Path checked for a version: the platform directory, or the whole
/// `platforms` directory for version `0`.
pub fn platform_path(sdk_root: &Utf8Path, version: u32) -> Utf8PathBuf {
    let platforms_dir = sdk_root.join("platforms");
    if version == 0 {
        platforms_dir
    } else {
        platforms_dir.join(format!("android-{}", version))
    }
}

/// List the API levels installed under `<sdk_root>/platforms`, ascending.
///
/// A missing `platforms` directory means nothing is installed.
///
/// Directories that don't follow the `android-<level>` naming (preview
/// platforms such as `android-UpsideDownCake`) are ignored.
pub fn installed_platforms(sdk_root: &Utf8Path) -> Result<Vec<u32>> {
    let platforms_dir = sdk_root.join("platforms");
    let entries = match fs::read_dir(&platforms_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No SDK platforms directory at {}", platforms_dir);
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to read SDK platforms directory: {}", platforms_dir)
            });
        }
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read SDK platforms entry")?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(level) = PLATFORM_DIR_PATTERN
            .captures(name)
            .and_then(|caps| caps[1].parse::<u32>().ok())
        {
            versions.push(level);
        }
    }

    versions.sort_unstable();
    Ok(versions)
}

/// Check whether the SDK has the platform for `version` installed.
///
/// Version `0` stands for "highest installed" and matches as soon as any
/// `android-*` platform directory exists.
pub fn has_android_sdk_version(sdk_root: &Utf8Path, version: u32) -> bool {
    let location = platform_path(sdk_root, version);
    let exists = if version == 0 {
        fs::read_dir(&location)
            .map(|entries| {
                entries.filter_map(|e| e.ok()).any(|e| {
                    e.path().is_dir()
                        && e.file_name().to_str().is_some_and(|n| n.starts_with("android-"))
                })
            })
            .unwrap_or(false)
    } else {
        location.is_dir()
    };

    tracing::info!(
        "Android SDK ( {} ) {} @ {}",
        version,
        if exists { "FOUND" } else { "NOT FOUND" },
        location
    );
    exists
}

/// Verify everything the plugin build script needs.
///
/// All checks run and each failure is logged, so one pass reports every
/// problem at once. The build must not proceed unless the report is ok.
pub fn check_prerequisites(prefs: &EditorPrefs, player: &PlayerSettings) -> PrerequisiteReport {
    let mut report = PrerequisiteReport::default();

    if prefs.jdk_path.trim().is_empty() {
        report.failures.push(PrerequisiteError::JdkPathNotSet);
    }

    if let Some(sdk_root) = prefs.android_sdk_root_path() {
        let mut versions = vec![player.android_target_sdk_version];
        if player.android_min_sdk_version != player.android_target_sdk_version {
            versions.push(player.android_min_sdk_version);
        }

        for version in versions {
            if !has_android_sdk_version(&sdk_root, version) {
                report.failures.push(PrerequisiteError::SdkPlatformMissing {
                    version,
                    path: platform_path(&sdk_root, version),
                });
            }
        }
    } else {
        report.failures.push(PrerequisiteError::SdkRootNotSet);
    }

    if player.has_default_package_name() {
        report.failures.push(PrerequisiteError::DefaultPackageName(
            player.application_identifier.clone(),
        ));
    }

    for failure in &report.failures {
        tracing::error!("Prerequisite failed: {}", failure);
    }

    report
}
