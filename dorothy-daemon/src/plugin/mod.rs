//! Plugin discovery and node construction
//!
//! Discovery is abstracted behind [`PluginRegistry`]. The daemon ships with
//! [`StaticRegistry`], a list of plugins compiled into the binary. The node
//! factory in [`factory`] consumes whatever a registry discovers.

pub mod config;
pub mod factory;

pub use config::NodeConfigStore;
pub use factory::{load_nodes, LoadedController, LoadedNodes};

use std::fmt;
use std::sync::Arc;

use crate::node::PluginManifest;

/// Entry point a plugin exposes
pub type ManifestEntry = Arc<dyn Fn() -> PluginManifest + Send + Sync>;

/// A discovered plugin: its name plus the entry point returning its manifest
#[derive(Clone)]
pub struct PluginHandle {
    pub name: String,
    entry: ManifestEntry,
}

impl PluginHandle {
    pub fn new<F>(name: impl Into<String>, entry: F) -> Self
    where
        F: Fn() -> PluginManifest + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            entry: Arc::new(entry),
        }
    }

    pub fn manifest(&self) -> PluginManifest {
        (self.entry)()
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle").field("name", &self.name).finish()
    }
}

/// Source of plugins
pub trait PluginRegistry: Send + Sync {
    fn discover(&self) -> Vec<PluginHandle>;
}

/// Registry of plugins linked into the binary
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    plugins: Vec<PluginHandle>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin<F>(mut self, name: impl Into<String>, entry: F) -> Self
    where
        F: Fn() -> PluginManifest + Send + Sync + 'static,
    {
        self.plugins.push(PluginHandle::new(name, entry));
        self
    }
}

impl PluginRegistry for StaticRegistry {
    fn discover(&self) -> Vec<PluginHandle> {
        self.plugins.clone()
    }
}
