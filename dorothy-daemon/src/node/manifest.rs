//! Plugin manifest: the node types one plugin contributes

use std::collections::HashSet;
use std::sync::Arc;
use tracing::error;

use super::{ControllerType, ListenerType, ProviderType};
use crate::error::{Error, Result};

/// Node types of one plugin, grouped by capability
#[derive(Clone, Default)]
pub struct PluginManifest {
    pub controllers: Vec<Arc<dyn ControllerType>>,
    pub providers: Vec<Arc<dyn ProviderType>>,
    pub listeners: Vec<Arc<dyn ListenerType>>,
}

impl PluginManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controller(mut self, node_type: impl ControllerType + 'static) -> Self {
        self.controllers.push(Arc::new(node_type));
        self
    }

    pub fn with_provider(mut self, node_type: impl ProviderType + 'static) -> Self {
        self.providers.push(Arc::new(node_type));
        self
    }

    pub fn with_listener(mut self, node_type: impl ListenerType + 'static) -> Self {
        self.listeners.push(Arc::new(node_type));
        self
    }

    /// Manifest names of every node type, controllers first
    pub fn node_names(&self) -> Vec<String> {
        self.controllers
            .iter()
            .map(|t| t.node_manifest().name)
            .chain(self.providers.iter().map(|t| t.node_manifest().name))
            .chain(self.listeners.iter().map(|t| t.node_manifest().name))
            .collect()
    }

    /// Reject manifests where two node types claim the same name
    ///
    /// Names are unique across all capabilities of a plugin since they name
    /// the node config files.
    pub fn sanity_check(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for name in self.node_names() {
            if !seen.insert(name.clone()) {
                error!(
                    "Node name \"{}\" is registered more than once in the plugin manifest",
                    name
                );
                return Err(Error::Manifest(format!("duplicate node name \"{}\"", name)));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PluginManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManifest")
            .field("nodes", &self.node_names())
            .finish()
    }
}
