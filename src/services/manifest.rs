//! Build-phase patching of the Android manifest template.
//!
//! The template in `Assets/Plugins/Android/AndroidManifest.xml` carries the
//! literal token `${deeplinkScheme}` (and optionally `${applicationId}`).
//! Before a player build the tokens are substituted in place; after the
//! build the original file is put back. A persisted restore flag covers the
//! case where the post-build step never runs: [`ManifestPatcher::on_reload`]
//! sees the flag on the next start and restores the template then.

use crate::models::{AndroidBuildSystem, BuildTarget, UrlScheme};
use crate::paths::ensure_file_is_writable;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

pub const DEEPLINK_SCHEME_PLACEHOLDER: &str = "${deeplinkScheme}";
pub const APPLICATION_ID_PLACEHOLDER: &str = "${applicationId}";

/// Persisted "restore pending" flag.
#[cfg_attr(test, mockall::automock)]
pub trait RestoreFlag {
    fn is_set(&self) -> Result<bool>;
    fn set(&self, value: bool) -> Result<()>;
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("AndroidManifest not found: {0}")]
    ManifestNotFound(Utf8PathBuf),

    #[error("Cannot write to file: {0}")]
    NotWritable(Utf8PathBuf),
}

/// What the pre-build step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Placeholders substituted; a backup exists and the restore flag is set.
    Patched,
    /// Active build target isn't Android.
    Skipped,
    /// The template lacks `${deeplinkScheme}`. Nothing was touched.
    PlaceholderMissing,
    /// No URL scheme configured. Nothing was touched.
    SchemeNotSet,
}

/// Inputs of a single pre-build pass.
#[derive(Debug, Clone)]
pub struct PatchRequest<'a> {
    pub target: BuildTarget,
    pub scheme: &'a UrlScheme,
    pub application_identifier: &'a str,
    pub build_system: AndroidBuildSystem,
}

/// Substitute the placeholders in a manifest template.
pub fn apply_placeholders(template: &str, request: &PatchRequest<'_>) -> String {
    let patched = template.replace(DEEPLINK_SCHEME_PLACEHOLDER, request.scheme.as_str());
    if request.build_system != AndroidBuildSystem::Gradle {
        patched.replace(APPLICATION_ID_PLACEHOLDER, request.application_identifier)
    } else {
        patched
    }
}

pub struct ManifestPatcher<F: RestoreFlag> {
    manifest_path: Utf8PathBuf,
    backup_path: Utf8PathBuf,
    flag: F,
}

impl<F: RestoreFlag> ManifestPatcher<F> {
    pub fn new(manifest_path: Utf8PathBuf, backup_path: Utf8PathBuf, flag: F) -> Self {
        Self {
            manifest_path,
            backup_path,
            flag,
        }
    }

    pub fn manifest_path(&self) -> &Utf8Path {
        &self.manifest_path
    }

    pub fn backup_path(&self) -> &Utf8Path {
        &self.backup_path
    }

    /// Pre-build hook: back up the template and substitute placeholders.
    pub fn on_pre_build(&self, request: &PatchRequest<'_>) -> Result<PatchOutcome> {
        if request.target != BuildTarget::Android {
            tracing::debug!("Build target is {:?}, leaving AndroidManifest alone", request.target);
            return Ok(PatchOutcome::Skipped);
        }

        if !self.manifest_path.exists() {
            return Err(ManifestError::ManifestNotFound(self.manifest_path.clone()).into());
        }

        if request.scheme.is_empty() {
            tracing::error!("No deeplink url scheme configured, AndroidManifest not patched");
            return Ok(PatchOutcome::SchemeNotSet);
        }

        tracing::info!("Applying deeplink scheme to AndroidManifest: {}", request.scheme);

        let manifest_text = fs::read_to_string(&self.manifest_path)
            .with_context(|| format!("Failed to read AndroidManifest: {}", self.manifest_path))?;

        if !manifest_text.contains(DEEPLINK_SCHEME_PLACEHOLDER) {
            tracing::error!(
                "Required placeholder variable not found in AndroidManifest: {}",
                DEEPLINK_SCHEME_PLACEHOLDER
            );
            return Ok(PatchOutcome::PlaceholderMissing);
        }

        self.backup()?;
        self.flag.set(true)?;

        let modified_text = apply_placeholders(&manifest_text, request);

        if !ensure_file_is_writable(&self.manifest_path)? {
            return Err(ManifestError::NotWritable(self.manifest_path.clone()).into());
        }
        fs::write(&self.manifest_path, modified_text)
            .with_context(|| format!("Failed to write AndroidManifest: {}", self.manifest_path))?;

        Ok(PatchOutcome::Patched)
    }

    /// Post-build hook: put the original template back.
    ///
    /// Returns whether a backup was restored.
    pub fn on_post_build(&self, target: BuildTarget) -> Result<bool> {
        if target != BuildTarget::Android {
            return Ok(false);
        }

        let restored = self.restore()?;
        self.flag.set(false)?;
        Ok(restored)
    }

    /// Editor-load hook: restore the template if a build never finished.
    ///
    /// Returns whether a backup was restored. The flag is cleared either way.
    pub fn on_reload(&self) -> Result<bool> {
        if !self.flag.is_set()? {
            return Ok(false);
        }

        tracing::warn!("Something probably went wrong, so we are restoring the android manifest...");
        let restored = self.restore()?;
        self.flag.set(false)?;
        Ok(restored)
    }

    fn backup(&self) -> Result<()> {
        if let Some(parent) = self.backup_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create backup directory: {}", parent))?;
        }

        fs::copy(&self.manifest_path, &self.backup_path).with_context(|| {
            format!("Failed to back up {} to {}", self.manifest_path, self.backup_path)
        })?;

        tracing::debug!("Backed up AndroidManifest to {}", self.backup_path);
        Ok(())
    }

    fn restore(&self) -> Result<bool> {
        if !self.backup_path.exists() {
            tracing::warn!("No AndroidManifest backup to restore at {}", self.backup_path);
            return Ok(false);
        }

        ensure_file_is_writable(&self.manifest_path)?;
        fs::copy(&self.backup_path, &self.manifest_path).with_context(|| {
            format!("Failed to restore {} from {}", self.manifest_path, self.backup_path)
        })?;
        fs::remove_file(&self.backup_path)
            .with_context(|| format!("Failed to remove backup: {}", self.backup_path))?;

        tracing::info!("Restored AndroidManifest from backup");
        Ok(true)
    }
}
