//! Integration tests for the AndroidManifest build hooks
//!
//! These tests drive ManifestPatcher with a real ConfigManager as the
//! restore flag, the way the CLI wires them.

use camino::Utf8PathBuf;
use deeplinks::ConfigManager;
use deeplinks::models::{AndroidBuildSystem, BuildTarget, UrlScheme};
use deeplinks::services::{ManifestPatcher, PatchOutcome, PatchRequest, RestoreFlag};
use std::fs;
use tempfile::TempDir;

const TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="${applicationId}">
  <application>
    <activity android:name="com.example.DeeplinkActivity">
      <intent-filter>
        <action android:name="android.intent.action.VIEW" />
        <data android:scheme="${deeplinkScheme}" />
      </intent-filter>
    </activity>
  </application>
</manifest>
"#;

fn setup_project(template: &str) -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().unwrap();
    let project_root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let config = ConfigManager::new(&project_root).unwrap();

    let manifest = config.manifest_path();
    fs::create_dir_all(manifest.parent().unwrap()).unwrap();
    fs::write(&manifest, template).unwrap();

    (temp_dir, config)
}

fn patcher(config: &ConfigManager) -> ManifestPatcher<ConfigManager> {
    ManifestPatcher::new(
        config.manifest_path(),
        config.manifest_backup_path(),
        config.clone(),
    )
}

fn request(scheme: &UrlScheme, build_system: AndroidBuildSystem) -> PatchRequest<'_> {
    PatchRequest {
        target: BuildTarget::Android,
        scheme,
        application_identifier: "com.acme.game",
        build_system,
    }
}

#[test]
fn test_build_cycle_restores_template_byte_for_byte() {
    let (_temp_dir, config) = setup_project(TEMPLATE);
    let patcher = patcher(&config);
    let scheme = UrlScheme::sanitized("acme");

    let outcome = patcher
        .on_pre_build(&request(&scheme, AndroidBuildSystem::Internal))
        .unwrap();
    assert_eq!(outcome, PatchOutcome::Patched);

    let patched = fs::read_to_string(config.manifest_path()).unwrap();
    assert!(patched.contains(r#"android:scheme="acme""#));
    assert!(patched.contains(r#"package="com.acme.game""#));
    assert!(config.is_set().unwrap());

    assert!(patcher.on_post_build(BuildTarget::Android).unwrap());

    assert_eq!(fs::read_to_string(config.manifest_path()).unwrap(), TEMPLATE);
    assert!(!config.manifest_backup_path().exists());
    assert!(!config.is_set().unwrap());
}

#[test]
fn test_gradle_build_keeps_application_id_placeholder() {
    let (_temp_dir, config) = setup_project(TEMPLATE);
    let patcher = patcher(&config);
    let scheme = UrlScheme::sanitized("acme");

    patcher
        .on_pre_build(&request(&scheme, AndroidBuildSystem::Gradle))
        .unwrap();

    let patched = fs::read_to_string(config.manifest_path()).unwrap();
    assert!(patched.contains("${applicationId}"));
    assert!(!patched.contains("${deeplinkScheme}"));
}

#[test]
fn test_reload_after_interrupted_build_restores_template() {
    let (_temp_dir, config) = setup_project(TEMPLATE);
    let scheme = UrlScheme::sanitized("acme");

    patcher(&config)
        .on_pre_build(&request(&scheme, AndroidBuildSystem::Internal))
        .unwrap();

    // Editor restarts without the post-build hook having run
    let reopened = ConfigManager::new(config.project_root()).unwrap();
    let restored = patcher(&reopened).on_reload().unwrap();

    assert!(restored);
    assert_eq!(fs::read_to_string(reopened.manifest_path()).unwrap(), TEMPLATE);
    assert!(!reopened.is_set().unwrap());

    // A second reload has nothing to do
    assert!(!patcher(&reopened).on_reload().unwrap());
}

#[test]
fn test_missing_placeholder_leaves_file_untouched() {
    let template = "<manifest><application /></manifest>\n";
    let (_temp_dir, config) = setup_project(template);
    let scheme = UrlScheme::sanitized("acme");

    let outcome = patcher(&config)
        .on_pre_build(&request(&scheme, AndroidBuildSystem::Internal))
        .unwrap();

    assert_eq!(outcome, PatchOutcome::PlaceholderMissing);
    assert_eq!(fs::read_to_string(config.manifest_path()).unwrap(), template);
    assert!(!config.manifest_backup_path().exists());
    assert!(!config.is_set().unwrap());
}

#[test]
fn test_empty_scheme_is_not_applied() {
    let (_temp_dir, config) = setup_project(TEMPLATE);
    let scheme = UrlScheme::default();

    let outcome = patcher(&config)
        .on_pre_build(&request(&scheme, AndroidBuildSystem::Internal))
        .unwrap();

    assert_eq!(outcome, PatchOutcome::SchemeNotSet);
    assert_eq!(fs::read_to_string(config.manifest_path()).unwrap(), TEMPLATE);
}

#[test]
fn test_non_android_target_is_skipped() {
    let (_temp_dir, config) = setup_project(TEMPLATE);
    let scheme = UrlScheme::sanitized("acme");
    let mut req = request(&scheme, AndroidBuildSystem::Internal);
    req.target = BuildTarget::Ios;

    let patcher = patcher(&config);
    assert_eq!(patcher.on_pre_build(&req).unwrap(), PatchOutcome::Skipped);
    assert!(!patcher.on_post_build(BuildTarget::Ios).unwrap());
    assert_eq!(fs::read_to_string(config.manifest_path()).unwrap(), TEMPLATE);
}

#[test]
fn test_read_only_manifest_is_patched() {
    let (_temp_dir, config) = setup_project(TEMPLATE);
    let manifest = config.manifest_path();
    let mut permissions = fs::metadata(&manifest).unwrap().permissions();
    permissions.set_readonly(true);
    fs::set_permissions(&manifest, permissions).unwrap();

    let scheme = UrlScheme::sanitized("acme");
    let outcome = patcher(&config)
        .on_pre_build(&request(&scheme, AndroidBuildSystem::Internal))
        .unwrap();

    assert_eq!(outcome, PatchOutcome::Patched);
    assert!(!fs::metadata(&manifest).unwrap().permissions().readonly());
}

#[test]
fn test_missing_manifest_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let project_root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let config = ConfigManager::new(&project_root).unwrap();
    let scheme = UrlScheme::sanitized("acme");

    let result = patcher(&config).on_pre_build(&request(&scheme, AndroidBuildSystem::Internal));

    assert!(result.is_err());
}
