//! The `builtin` plugin, compiled into the daemon
//!
//! - `http` controller: REST surface over the orchestrator
//! - `filesystem` provider: songs found on local disk
//! - `console` listener: logs what a channel plays

pub mod console;
pub mod filesystem;
pub mod http;

use crate::node::PluginManifest;
use crate::plugin::StaticRegistry;

pub const PLUGIN_NAME: &str = "builtin";

pub fn plugin_manifest() -> PluginManifest {
    PluginManifest::new()
        .with_controller(http::HttpControllerType)
        .with_provider(filesystem::FilesystemProviderType)
        .with_listener(console::ConsoleListenerType)
}

/// Registry holding every plugin shipped with the daemon
pub fn registry() -> StaticRegistry {
    StaticRegistry::new().with_plugin(PLUGIN_NAME, plugin_manifest)
}
