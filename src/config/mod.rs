use crate::models::{DeeplinkSettings, EditorPrefs, PlayerSettings, UrlScheme};
use crate::services::manifest::RestoreFlag;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;

/// Environment variable prefix for editor preference overrides.
pub const ENV_PREFIX: &str = "DEEPLINKS";

/// Name of the JSON file consumed by the plugin build script.
pub const BUILD_CONFIG_FILE_NAME: &str = "deeplink-build-conf.json";

/// Configuration manager for the settings files of one project.
///
/// Manages three files below the project root:
/// - `ProjectSettings/DeeplinkSettings.yaml`: the URL scheme
/// - `ProjectSettings/PlayerSettings.yaml`: package name, SDK versions, build target
/// - `Library/EditorPrefs.yaml`: per-machine paths and the manifest restore flag
#[derive(Debug, Clone)]
pub struct ConfigManager {
    project_root: Utf8PathBuf,
    deeplink_settings_path: Utf8PathBuf,
    player_settings_path: Utf8PathBuf,
    editor_prefs_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager for the project at `project_root`.
    ///
    /// The root is resolved to an absolute path, since it ends up in the
    /// build config and in arguments of scripts run from other directories.
    /// Creates `ProjectSettings/` and `Library/` if they don't exist.
    pub fn new<P: AsRef<Utf8Path>>(project_root: P) -> Result<Self> {
        let project_root = crate::paths::absolute(project_root.as_ref())?;

        for dir in ["ProjectSettings", "Library"] {
            let path = project_root.join(dir);
            if !path.exists() {
                fs::create_dir_all(&path)
                    .with_context(|| format!("Failed to create settings directory: {}", path))?;
            }
        }

        Ok(Self {
            deeplink_settings_path: project_root.join("ProjectSettings").join("DeeplinkSettings.yaml"),
            player_settings_path: project_root.join("ProjectSettings").join("PlayerSettings.yaml"),
            editor_prefs_path: project_root.join("Library").join("EditorPrefs.yaml"),
            project_root,
        })
    }

    /// Load the deeplink settings.
    ///
    /// A missing file is created with default values, so the settings asset
    /// always exists after the first load.
    pub fn load_deeplink_settings(&self) -> Result<DeeplinkSettings> {
        if !self.deeplink_settings_path.exists() {
            tracing::warn!(
                "Deeplink settings not found at {}, creating defaults",
                self.deeplink_settings_path
            );
            let settings = DeeplinkSettings::default();
            self.save_deeplink_settings(&settings)?;
            return Ok(settings);
        }

        read_yaml(&self.deeplink_settings_path, "deeplink settings")
    }

    pub fn save_deeplink_settings(&self, settings: &DeeplinkSettings) -> Result<()> {
        write_yaml(&self.deeplink_settings_path, settings, "deeplink settings")
    }

    /// Load the player settings, or defaults if the file doesn't exist.
    pub fn load_player_settings(&self) -> Result<PlayerSettings> {
        if !self.player_settings_path.exists() {
            tracing::warn!(
                "Player settings not found at {}, using defaults",
                self.player_settings_path
            );
            return Ok(PlayerSettings::default());
        }

        read_yaml(&self.player_settings_path, "player settings")
    }

    pub fn save_player_settings(&self, settings: &PlayerSettings) -> Result<()> {
        write_yaml(&self.player_settings_path, settings, "player settings")
    }

    /// Load the editor preferences.
    ///
    /// The YAML file is optional; `DEEPLINKS_*` environment variables are
    /// layered on top of it.
    pub fn load_editor_prefs(&self) -> Result<EditorPrefs> {
        let prefs = ::config::Config::builder()
            .add_source(
                ::config::File::new(self.editor_prefs_path.as_str(), ::config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read editor prefs: {}", self.editor_prefs_path))?
            .try_deserialize::<EditorPrefs>()
            .with_context(|| format!("Failed to parse editor prefs: {}", self.editor_prefs_path))?;

        tracing::debug!("Loaded editor prefs from {}", self.editor_prefs_path);
        Ok(prefs)
    }

    pub fn save_editor_prefs(&self, prefs: &EditorPrefs) -> Result<()> {
        write_yaml(&self.editor_prefs_path, prefs, "editor prefs")
    }

    /// Modify the editor prefs file in place.
    ///
    /// Works on the file contents only, so environment overrides are never
    /// written back to disk.
    pub fn update_editor_prefs<F>(&self, update_fn: F) -> Result<EditorPrefs>
    where
        F: FnOnce(&mut EditorPrefs),
    {
        let mut prefs = if self.editor_prefs_path.exists() {
            read_yaml(&self.editor_prefs_path, "editor prefs")?
        } else {
            EditorPrefs::default()
        };

        update_fn(&mut prefs);
        self.save_editor_prefs(&prefs)?;
        Ok(prefs)
    }

    /// Change the project's URL scheme.
    ///
    /// The input is sanitized and trimmed first. Returns `None` when that
    /// leaves the scheme unchanged. Otherwise the new scheme is saved and
    /// swapped into the iOS URL scheme list in place of the old one.
    pub fn set_url_scheme(&self, input: &str) -> Result<Option<UrlScheme>> {
        let mut settings = self.load_deeplink_settings()?;
        let scheme = UrlScheme::sanitized(input);

        if scheme == settings.url_scheme {
            tracing::debug!("Url scheme unchanged: {}", scheme);
            return Ok(None);
        }

        let old = std::mem::replace(&mut settings.url_scheme, scheme.clone());
        self.save_deeplink_settings(&settings)?;

        let mut player = self.load_player_settings()?;
        if !scheme.is_empty() && player.ios_url_schemes.replace(old.as_str(), scheme.as_str()) {
            self.save_player_settings(&player)?;
        }

        tracing::info!("Deeplinks.UrlScheme set: {} (was {})", scheme, old);
        Ok(Some(scheme))
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Root of the plugin inside the project's assets.
    pub fn plugin_root(&self) -> Utf8PathBuf {
        crate::paths::combine(&self.project_root, ["Assets", "Plugins", "UnityDeeplinks"])
    }

    /// Default location of the jar build script.
    pub fn build_script_path(&self) -> Utf8PathBuf {
        self.plugin_root().join("Android").join("build_jar.ps1")
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        crate::paths::combine(&self.project_root, ["Assets", "Plugins", "Android", "AndroidManifest.xml"])
    }

    pub fn manifest_backup_path(&self) -> Utf8PathBuf {
        self.project_root.join("Temp").join("AndroidManifest.xml.backup")
    }

    pub fn build_config_path(&self) -> Utf8PathBuf {
        crate::paths::combine(&self.project_root, ["Temp", "Deeplinks", BUILD_CONFIG_FILE_NAME])
    }

    pub fn editor_prefs_path(&self) -> &Utf8Path {
        &self.editor_prefs_path
    }
}

impl RestoreFlag for ConfigManager {
    fn is_set(&self) -> Result<bool> {
        if !self.editor_prefs_path.exists() {
            return Ok(false);
        }
        let prefs: EditorPrefs = read_yaml(&self.editor_prefs_path, "editor prefs")?;
        Ok(prefs.should_restore_android_manifest)
    }

    fn set(&self, value: bool) -> Result<()> {
        self.update_editor_prefs(|prefs| prefs.should_restore_android_manifest = value)?;
        Ok(())
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Utf8Path, what: &str) -> Result<T> {
    let file_contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}: {}", what, path))?;

    let value = serde_yaml_ng::from_str(&file_contents)
        .with_context(|| format!("Failed to parse {}: {}", what, path))?;

    tracing::debug!("Loaded {} from {}", what, path);
    Ok(value)
}

fn write_yaml<T: Serialize>(path: &Utf8Path, value: &T, what: &str) -> Result<()> {
    let yaml_string = serde_yaml_ng::to_string(value)
        .with_context(|| format!("Failed to serialize {} to YAML", what))?;

    fs::write(path, yaml_string).with_context(|| format!("Failed to write {}: {}", what, path))?;

    tracing::debug!("Saved {} to {}", what, path);
    Ok(())
}
