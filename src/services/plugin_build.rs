use crate::config::ConfigManager;
use crate::models::{BuildConfig, EditorPrefs, PlayerSettings};
use crate::paths::{absolute, as_native_path};
use crate::services::sdk_detection::check_prerequisites;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

/// Result of running the plugin build script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The script exited and both output streams were drained.
    Completed {
        exit_code: i32,
        duration: Duration,
        output_lines: usize,
    },
    /// The wait gave up. The script may still be running.
    TimedOut(Duration),
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Completed { exit_code: 0, .. })
    }
}

/// Errors that can occur while building the Android plugin
#[derive(Error, Debug)]
pub enum PluginBuildError {
    #[error("Build prerequisites not met: {0}")]
    PrerequisitesFailed(String),

    #[error("Application identifier '{0}' is the default value, refusing to write build config")]
    DefaultPackageName(String),

    #[error("Build script not found: {0}")]
    ScriptNotFound(Utf8PathBuf),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),
}

/// Downstream step run after a successful build, e.g. re-importing the
/// freshly built jar into the asset database.
#[cfg_attr(test, mockall::automock)]
pub trait AssetRefresher {
    fn refresh(&self);
}

/// Refresher for headless use: there is no asset database to update, so it
/// only records that a refresh was due.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyRefresher;

impl AssetRefresher for LogOnlyRefresher {
    fn refresh(&self) {
        tracing::info!("Asset refresh requested after plugin build");
    }
}

/// Program and arguments used to launch a build script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ScriptInvocation {
    /// Choose how to launch `script` with `config_path` as its one argument.
    ///
    /// PowerShell scripts go through `powershell.exe` on Windows and `pwsh`
    /// elsewhere, shell scripts through `sh`; anything else is executed
    /// directly.
    pub fn for_script(script: &Utf8Path, config_path: &Utf8Path) -> Self {
        let extension = script.extension().map(str::to_ascii_lowercase);

        let (program, mut args) = match extension.as_deref() {
            Some("ps1") => {
                let shell = if cfg!(target_os = "windows") { "powershell.exe" } else { "pwsh" };
                (
                    shell.to_string(),
                    vec![
                        "-NoProfile".to_string(),
                        "-ExecutionPolicy".to_string(),
                        "Bypass".to_string(),
                        "-File".to_string(),
                        script.to_string(),
                    ],
                )
            }
            Some("sh") => ("sh".to_string(), vec![script.to_string()]),
            _ => (script.to_string(), Vec::new()),
        };

        args.push(config_path.to_string());
        Self { program, args }
    }

    fn to_command(&self, working_dir: &Utf8Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Forward every line of a child stream to the log. Returns the line count
/// once the stream closes.
async fn forward_lines<R: AsyncRead + Unpin>(reader: Option<R>, stream: OutputStream) -> usize {
    let Some(reader) = reader else {
        return 0;
    };

    let mut lines = BufReader::new(reader).lines();
    let mut count = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                match stream {
                    OutputStream::Stdout => tracing::info!(target: "build_script", "{}", line),
                    OutputStream::Stderr => tracing::warn!(target: "build_script", "{}", line),
                }
                count += 1;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read build script {:?}: {}", stream, e);
                break;
            }
        }
    }
    count
}

/// Service for building the native Android plugin
///
/// Writes the JSON build config, launches the external build script,
/// mirrors its output into the log and waits for it with a timeout.
pub struct PluginBuildService {
    refresher: Box<dyn AssetRefresher>,
}

impl PluginBuildService {
    pub fn new(refresher: Box<dyn AssetRefresher>) -> Self {
        Self { refresher }
    }

    /// Read the current environment into a [`BuildConfig`].
    pub fn construct_config(
        &self,
        project_root: &Utf8Path,
        prefs: &EditorPrefs,
        player: &PlayerSettings,
    ) -> BuildConfig {
        BuildConfig {
            unity_project_root_path: as_native_path(project_root.as_str()),
            android_package_name: player.application_identifier.clone(),
            unity_editor_data_path: as_native_path(&prefs.editor_data_path),
            android_sdk_root: as_native_path(&prefs.android_sdk_root),
            jdk_path: as_native_path(&prefs.jdk_path),
            android_min_sdk_version: player.android_min_sdk_version,
            android_target_sdk_version: player.android_target_sdk_version,
        }
    }

    /// Write the build config as pretty JSON.
    ///
    /// A missing parent directory is created together with a `.gitignore`
    /// so the generated file stays out of version control.
    pub fn write_config(&self, path: &Utf8Path, config: &BuildConfig) -> Result<()> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {}", parent))?;
                fs::write(parent.join(".gitignore"), "*\n")
                    .with_context(|| format!("Failed to mark {} as ignored", parent))?;
            }
        }

        let json =
            serde_json::to_string_pretty(config).context("Failed to serialize build config")?;
        tracing::debug!("{} : {}", path.file_name().unwrap_or_default(), json);

        fs::write(path, json).with_context(|| format!("Failed to write build config: {}", path))?;
        tracing::info!("Wrote build config to {}", path);
        Ok(())
    }

    /// Rebuild the config file from current settings.
    ///
    /// Returns `None` without writing when the application identifier is
    /// still the template default; the script would produce a jar for the
    /// wrong package.
    pub fn refresh_config(
        &self,
        path: &Utf8Path,
        project_root: &Utf8Path,
        prefs: &EditorPrefs,
        player: &PlayerSettings,
    ) -> Result<Option<BuildConfig>> {
        if player.has_default_package_name() {
            tracing::warn!(
                "Didn't create JSON helper file for build script because the application identifier is the default value"
            );
            return Ok(None);
        }

        let config = self.construct_config(project_root, prefs, player);
        self.write_config(path, &config)?;
        Ok(Some(config))
    }

    /// Run the build script and wait for it.
    ///
    /// # Arguments
    /// * `script` - Path to the build script
    /// * `config_path` - Build config passed as the script's only argument
    /// * `working_dir` - Directory the script runs in
    /// * `timeout_duration` - Maximum time to wait for exit and drained output
    ///
    /// On timeout the script is left running. A zero exit code triggers the
    /// asset refresh.
    pub async fn run_build_script(
        &self,
        script: &Utf8Path,
        config_path: &Utf8Path,
        working_dir: &Utf8Path,
        timeout_duration: Duration,
    ) -> Result<BuildOutcome> {
        if !script.exists() {
            return Err(PluginBuildError::ScriptNotFound(script.to_path_buf()).into());
        }

        let invocation = ScriptInvocation::for_script(script, config_path);
        tracing::info!("Executing: {} {}", invocation.program, invocation.args.join(" "));

        let start = Instant::now();
        let mut child = invocation
            .to_command(working_dir)
            .spawn()
            .map_err(PluginBuildError::ProcessError)
            .context("Failed to spawn build script")?;

        let stdout_task = tokio::spawn(forward_lines(child.stdout.take(), OutputStream::Stdout));
        let stderr_task = tokio::spawn(forward_lines(child.stderr.take(), OutputStream::Stderr));

        let waited = timeout(timeout_duration, async move {
            let status = child.wait().await;
            let stdout_lines = stdout_task.await.unwrap_or(0);
            let stderr_lines = stderr_task.await.unwrap_or(0);
            status.map(|status| (status, stdout_lines + stderr_lines))
        })
        .await;

        let (status, output_lines) = match waited {
            Ok(result) => result.context("Failed to wait for build script")?,
            Err(_) => {
                tracing::warn!(
                    "Build script timed out after {:?}; it may still be running",
                    timeout_duration
                );
                return Ok(BuildOutcome::TimedOut(timeout_duration));
            }
        };

        let duration = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        tracing::info!(
            "Build script completed in {:.2}s with exit code {}",
            duration.as_secs_f32(),
            exit_code
        );

        if exit_code == 0 {
            self.refresher.refresh();
        } else {
            tracing::error!("Build script failed with exit code {}", exit_code);
        }

        Ok(BuildOutcome::Completed {
            exit_code,
            duration,
            output_lines,
        })
    }

    /// Full build: prerequisites, config refresh, script run.
    ///
    /// `script` defaults to the project's `build_jar.ps1`. The script runs in
    /// its own directory.
    pub async fn build_plugin(
        &self,
        config: &ConfigManager,
        script: Option<&Utf8Path>,
    ) -> Result<BuildOutcome> {
        let prefs = config.load_editor_prefs()?;
        let player = config.load_player_settings()?;

        let report = check_prerequisites(&prefs, &player);
        if !report.is_ok() {
            return Err(PluginBuildError::PrerequisitesFailed(report.summary()).into());
        }

        let config_path = config.build_config_path();
        if self
            .refresh_config(&config_path, config.project_root(), &prefs, &player)?
            .is_none()
        {
            return Err(
                PluginBuildError::DefaultPackageName(player.application_identifier.clone()).into(),
            );
        }

        // The script runs in its own directory, so every path it gets must be absolute
        let script = match script {
            Some(script) => absolute(script)?,
            None => config.build_script_path(),
        };
        let config_path = absolute(&config_path)?;
        let working_dir = script
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .map_or_else(|| config.project_root().to_path_buf(), Utf8Path::to_path_buf);

        self.run_build_script(&script, &config_path, &working_dir, prefs.build_timeout())
            .await
    }
}

impl Default for PluginBuildService {
    fn default() -> Self {
        Self::new(Box::new(LogOnlyRefresher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, root)
    }

    fn configured_player() -> PlayerSettings {
        PlayerSettings {
            application_identifier: "com.acme.game".to_string(),
            ..PlayerSettings::default()
        }
    }

    #[test]
    fn test_invocation_powershell() {
        let inv = ScriptInvocation::for_script(
            Utf8Path::new("/plugin/build_jar.ps1"),
            Utf8Path::new("/tmp/conf.json"),
        );
        assert!(inv.program == "pwsh" || inv.program == "powershell.exe");
        assert_eq!(inv.args.first().map(String::as_str), Some("-NoProfile"));
        assert!(inv.args.contains(&"/plugin/build_jar.ps1".to_string()));
        assert_eq!(inv.args.last().map(String::as_str), Some("/tmp/conf.json"));
    }

    #[test]
    fn test_invocation_shell_and_direct() {
        let conf = Utf8Path::new("conf.json");

        let sh = ScriptInvocation::for_script(Utf8Path::new("build.sh"), conf);
        assert_eq!(sh.program, "sh");
        assert_eq!(sh.args, vec!["build.sh".to_string(), "conf.json".to_string()]);

        let direct = ScriptInvocation::for_script(Utf8Path::new("./gradlew"), conf);
        assert_eq!(direct.program, "./gradlew");
        assert_eq!(direct.args, vec!["conf.json".to_string()]);
    }

    #[test]
    fn test_construct_config() {
        let service = PluginBuildService::default();
        let prefs = EditorPrefs {
            jdk_path: "/opt/jdk".to_string(),
            android_sdk_root: "/opt/sdk".to_string(),
            editor_data_path: "/opt/editor/Data".to_string(),
            ..EditorPrefs::default()
        };
        let mut player = configured_player();
        player.android_target_sdk_version = 33;

        let config = service.construct_config(Utf8Path::new("/work/game"), &prefs, &player);
        assert_eq!(config.unity_project_root_path, "/work/game");
        assert_eq!(config.android_package_name, "com.acme.game");
        assert_eq!(config.jdk_path, "/opt/jdk");
        assert_eq!(config.android_min_sdk_version, 22);
        assert_eq!(config.android_target_sdk_version, 33);
    }

    #[test]
    fn test_write_config_creates_ignored_directory() {
        let (_temp_dir, root) = temp_root();
        let service = PluginBuildService::default();
        let path = root.join("Temp").join("Deeplinks").join("deeplink-build-conf.json");

        let config =
            service.construct_config(&root, &EditorPrefs::default(), &configured_player());
        service.write_config(&path, &config).unwrap();

        let written: BuildConfig =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, config);
        assert_eq!(
            fs::read_to_string(root.join("Temp").join("Deeplinks").join(".gitignore")).unwrap(),
            "*\n"
        );
    }

    #[test]
    fn test_refresh_config_refuses_default_package() {
        let (_temp_dir, root) = temp_root();
        let service = PluginBuildService::default();
        let path = root.join("conf.json");

        let result = service
            .refresh_config(&path, &root, &EditorPrefs::default(), &PlayerSettings::default())
            .unwrap();
        assert!(result.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_script_is_error() {
        let (_temp_dir, root) = temp_root();
        let service = PluginBuildService::default();

        let err = service
            .run_build_script(
                &root.join("missing.sh"),
                &root.join("conf.json"),
                &root,
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PluginBuildError>(),
            Some(PluginBuildError::ScriptNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_script_triggers_refresh() {
        let (_temp_dir, root) = temp_root();
        let script = root.join("build_jar.sh");
        fs::write(&script, "echo \"building with $1\"\necho warning >&2\nexit 0\n").unwrap();

        let mut refresher = MockAssetRefresher::new();
        refresher.expect_refresh().times(1).return_const(());
        let service = PluginBuildService::new(Box::new(refresher));

        let outcome = service
            .run_build_script(&script, &root.join("conf.json"), &root, Duration::from_secs(10))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(matches!(outcome, BuildOutcome::Completed { output_lines: 2, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_script_skips_refresh() {
        let (_temp_dir, root) = temp_root();
        let script = root.join("build_jar.sh");
        fs::write(&script, "exit 3\n").unwrap();

        let mut refresher = MockAssetRefresher::new();
        refresher.expect_refresh().never();
        let service = PluginBuildService::new(Box::new(refresher));

        let outcome = service
            .run_build_script(&script, &root.join("conf.json"), &root, Duration::from_secs(10))
            .await
            .unwrap();

        assert!(matches!(outcome, BuildOutcome::Completed { exit_code: 3, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_script_times_out() {
        let (_temp_dir, root) = temp_root();
        let script = root.join("build_jar.sh");
        fs::write(&script, "sleep 5\n").unwrap();

        let mut refresher = MockAssetRefresher::new();
        refresher.expect_refresh().never();
        let service = PluginBuildService::new(Box::new(refresher));

        let outcome = service
            .run_build_script(&script, &root.join("conf.json"), &root, Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(outcome, BuildOutcome::TimedOut(Duration::from_millis(200)));
        assert!(!outcome.is_success());
    }
}
