//! Deeplinks - command line entry point.
//!
//! # Overview
//!
//! The binary exposes the editor-time operations of the plugin so build
//! pipelines and editor integrations can call them:
//! - `scheme`: show or change the project's URL scheme
//! - `manifest`: pre-build / post-build / recover hooks for the AndroidManifest template
//! - `check` and `sdk`: build prerequisite and SDK platform checks
//! - `config refresh`: rewrite the JSON build config for the jar build script
//! - `plugin build`: full Android plugin build
//! - `simulate`: feed links through the runtime forwarder and print what listeners see
//!
//! # Execution Flow
//!
//! 1. Parse arguments
//! 2. Initialize logging → `<project>/Logs/deeplinks.<date>`
//! 3. Open the project's settings through [`ConfigManager`]
//! 4. Run the subcommand; `plugin build` runs on a tokio runtime
//!
//! The host editor is expected to call `manifest recover` once when it
//! loads the project, so a template left patched by an aborted build is put
//! back.

use anyhow::{Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use deeplinks::services::{
    BuildOutcome, ManifestPatcher, PatchOutcome, PatchRequest, PluginBuildService,
    check_prerequisites, has_android_sdk_version, installed_platforms,
};
use deeplinks::{
    APP_NAME, ConfigManager, DeeplinkReceiver, Deeplinks, ForwarderOptions, HostReceiver, VERSION,
};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "deeplinks")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root directory
    #[arg(short, long, global = true, env = "DEEPLINKS_PROJECT", default_value = ".")]
    project: Utf8PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log to the log file
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the URL scheme
    Scheme {
        #[command(subcommand)]
        action: SchemeAction,
    },

    /// Build hooks for the AndroidManifest template
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Check the Android plugin build prerequisites
    Check,

    /// Check installed Android SDK platforms
    Sdk {
        /// API level to look for (0 = any installed)
        #[arg(long)]
        version: Option<u32>,
    },

    /// Manage the build config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Build the native Android plugin
    Plugin {
        #[command(subcommand)]
        action: PluginAction,
    },

    /// Deliver links through the forwarder and print what a listener receives
    Simulate {
        /// Links delivered before the listener subscribes
        links: Vec<String>,

        /// Links delivered after the listener subscribed
        #[arg(long)]
        late: Vec<String>,

        /// Percent-decode links
        #[arg(long)]
        decode: bool,
    },
}

#[derive(Subcommand)]
enum SchemeAction {
    /// Print the configured scheme
    Show,
    /// Set the scheme (input is sanitized)
    Set { value: String },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Substitute placeholders before a player build
    PreBuild,
    /// Restore the template after a player build
    PostBuild,
    /// Restore the template if a previous build never finished
    Recover,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Rewrite the build config from current settings
    Refresh,
}

#[derive(Subcommand)]
enum PluginAction {
    /// Check prerequisites, refresh the config and run the build script
    Build {
        /// Build script (defaults to Assets/Plugins/UnityDeeplinks/Android/build_jar.ps1)
        #[arg(long)]
        script: Option<Utf8PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = deeplinks::logging::setup_logging(
        &cli.project.join("Logs"),
        "deeplinks",
        cli.debug,
        !cli.quiet,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config = ConfigManager::new(&cli.project)?;

    match cli.command {
        Commands::Scheme { action } => run_scheme(&config, action),
        Commands::Manifest { action } => run_manifest(&config, action),
        Commands::Check => run_check(&config),
        Commands::Sdk { version } => run_sdk(&config, version),
        Commands::Config {
            action: ConfigAction::Refresh,
        } => run_config_refresh(&config),
        Commands::Plugin {
            action: PluginAction::Build { script },
        } => run_plugin_build(&config, script.as_deref()),
        Commands::Simulate {
            links,
            late,
            decode,
        } => {
            run_simulate(&links, &late, decode);
            Ok(())
        }
    }
}

fn run_scheme(config: &ConfigManager, action: SchemeAction) -> Result<()> {
    match action {
        SchemeAction::Show => {
            let settings = config.load_deeplink_settings()?;
            println!("{}", settings.url_scheme);
        }
        SchemeAction::Set { value } => match config.set_url_scheme(&value)? {
            Some(scheme) => println!("Url scheme set to '{}'", scheme),
            None => println!("Url scheme unchanged"),
        },
    }
    Ok(())
}

fn run_manifest(config: &ConfigManager, action: ManifestAction) -> Result<()> {
    let patcher = ManifestPatcher::new(
        config.manifest_path(),
        config.manifest_backup_path(),
        config.clone(),
    );
    let player = config.load_player_settings()?;

    match action {
        ManifestAction::PreBuild => {
            let settings = config.load_deeplink_settings()?;
            let request = PatchRequest {
                target: player.active_build_target,
                scheme: &settings.url_scheme,
                application_identifier: &player.application_identifier,
                build_system: player.android_build_system,
            };

            match patcher.on_pre_build(&request)? {
                PatchOutcome::Patched => println!("Patched {}", patcher.manifest_path()),
                PatchOutcome::Skipped => println!("Build target is not Android, nothing to do"),
                PatchOutcome::PlaceholderMissing => {
                    bail!("AndroidManifest has no deeplink scheme placeholder")
                }
                PatchOutcome::SchemeNotSet => bail!("No url scheme configured"),
            }
        }
        ManifestAction::PostBuild => {
            if patcher.on_post_build(player.active_build_target)? {
                println!("Restored {}", patcher.manifest_path());
            }
        }
        ManifestAction::Recover => {
            if patcher.on_reload()? {
                println!("Restored {} after an unfinished build", patcher.manifest_path());
            }
        }
    }
    Ok(())
}

fn run_check(config: &ConfigManager) -> Result<()> {
    let prefs = config.load_editor_prefs()?;
    let player = config.load_player_settings()?;

    let report = check_prerequisites(&prefs, &player);
    println!("{}", report.summary());
    if !report.is_ok() {
        bail!("{} prerequisite(s) failed", report.failures.len());
    }
    Ok(())
}

fn run_sdk(config: &ConfigManager, version: Option<u32>) -> Result<()> {
    let prefs = config.load_editor_prefs()?;
    let Some(sdk_root) = prefs.android_sdk_root_path() else {
        bail!("Android SDK root is not set");
    };

    let versions = match version {
        Some(version) => vec![version],
        None => {
            let player = config.load_player_settings()?;
            let installed = installed_platforms(&sdk_root)?;
            println!("Installed platforms: {:?}", installed);
            vec![player.android_min_sdk_version, player.android_target_sdk_version]
        }
    };

    let mut missing = false;
    for version in versions {
        let found = has_android_sdk_version(&sdk_root, version);
        println!("android-{}: {}", version, if found { "FOUND" } else { "NOT FOUND" });
        missing |= !found;
    }

    if missing {
        bail!("Required Android SDK platform missing");
    }
    Ok(())
}

fn run_config_refresh(config: &ConfigManager) -> Result<()> {
    let prefs = config.load_editor_prefs()?;
    let player = config.load_player_settings()?;
    let path = config.build_config_path();

    let service = PluginBuildService::default();
    match service.refresh_config(&path, config.project_root(), &prefs, &player)? {
        Some(_) => println!("Wrote {}", path),
        None => bail!("Application identifier is the default value, set a real package name first"),
    }
    Ok(())
}

fn run_plugin_build(config: &ConfigManager, script: Option<&Utf8Path>) -> Result<()> {
    // Runtime for the build script subprocess and its output readers
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("deeplinks-worker")
        .build()?;

    let service = PluginBuildService::default();
    let outcome = runtime.block_on(service.build_plugin(config, script));

    // Don't wait on a timed-out script; its readers are simply dropped
    runtime.shutdown_timeout(Duration::from_secs(1));

    match outcome? {
        BuildOutcome::Completed { exit_code: 0, duration, .. } => {
            println!("Plugin built in {:.2}s", duration.as_secs_f32());
            Ok(())
        }
        BuildOutcome::Completed { exit_code, .. } => {
            bail!("Build script failed with exit code {}", exit_code)
        }
        BuildOutcome::TimedOut(limit) => bail!("Build script timed out after {:?}", limit),
    }
}

fn run_simulate(links: &[String], late: &[String], decode: bool) {
    let mut receiver = HostReceiver::new();
    receiver.start();
    let mut deeplinks = Deeplinks::init(receiver, ForwarderOptions { decode_links: decode });

    for link in links {
        deeplinks.receiver_mut().on_deeplink(link);
    }

    deeplinks.on_received(|link| println!("Received Deeplink: {}", link));

    for link in late {
        deeplinks.receiver_mut().on_deeplink(link);
    }
}
