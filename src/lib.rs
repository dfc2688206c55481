// Deeplinks - deep-link forwarding and Android build tooling for game projects
//
// This is the library crate containing the runtime forwarder and the
// editor-time services. The binary crate (main.rs) exposes the services as
// CLI subcommands.

pub mod config;
pub mod deeplink;
pub mod logging;
pub mod models;
pub mod paths;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use deeplink::{DeeplinkForwarder, DeeplinkReceiver, Deeplinks, ForwarderOptions, HostReceiver};
pub use models::{BuildConfig, DeeplinkSettings, EditorPrefs, PlayerSettings, UrlScheme};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
