//! Node factory
//!
//! Turns discovered plugins into live nodes: for every node type of every
//! plugin, load (or generate) its config document, build each enabled
//! instance and route it to where it lives. Providers go into the
//! orchestrator, listeners into each channel they name, controllers into the
//! list returned to the mainloop.
//!
//! Failures are contained to the smallest unit they affect. A bad manifest
//! skips its plugin, a bad config file skips its node type, and a node that
//! fails to build skips that instance.

use dorothy_common::{NodeCapability, NodeInstancePath};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::config::{InstanceConfig, NodeConfigDocument, NodeConfigStore};
use super::{PluginHandle, PluginRegistry};
use crate::node::{Controller, NodeType, PluginManifest};
use crate::orchestrator::Orchestrator;

/// A built controller, waiting for the mainloop to start it
pub struct LoadedController {
    pub path: NodeInstancePath,
    pub node: Box<dyn Controller>,
}

/// Everything the factory produced
pub struct LoadedNodes {
    pub orchestrator: Arc<Orchestrator>,
    pub controllers: Vec<LoadedController>,
}

/// Discover every plugin of `registry` and instantiate its enabled nodes
pub async fn load_nodes(registry: &dyn PluginRegistry, store: &NodeConfigStore) -> LoadedNodes {
    let orchestrator = Arc::new(Orchestrator::new());
    let mut controllers = Vec::new();

    for plugin in registry.discover() {
        load_plugin(&plugin, store, &orchestrator, &mut controllers).await;
    }

    info!(
        "Loaded {} controllers, {} providers and {} channels",
        controllers.len(),
        orchestrator.provider_paths().await.len(),
        orchestrator.get_channel_names().await.len()
    );

    LoadedNodes {
        orchestrator,
        controllers,
    }
}

async fn load_plugin(
    plugin: &PluginHandle,
    store: &NodeConfigStore,
    orchestrator: &Arc<Orchestrator>,
    controllers: &mut Vec<LoadedController>,
) {
    let manifest: PluginManifest = plugin.manifest();
    if let Err(e) = manifest.sanity_check() {
        error!("Skipping plugin \"{}\": {}", plugin.name, e);
        return;
    }
    info!("Loading plugin \"{}\"", plugin.name);

    for node_type in &manifest.controllers {
        for (path, instance) in enabled_instances(&plugin.name, NodeCapability::Controller, node_type.as_ref(), store) {
            match node_type.build(instance.config, path.clone(), orchestrator.clone()) {
                Ok(node) => {
                    info!("Built controller \"{}\"", path);
                    controllers.push(LoadedController { path, node });
                }
                Err(failure) => error!("Failed to build controller \"{}\": {}", path, failure),
            }
        }
    }

    for node_type in &manifest.providers {
        for (path, instance) in enabled_instances(&plugin.name, NodeCapability::Provider, node_type.as_ref(), store) {
            match node_type.build(instance.config, path.clone()) {
                Ok(node) => orchestrator.register_provider(path, node).await,
                Err(failure) => error!("Failed to build provider \"{}\": {}", path, failure),
            }
        }
    }

    for node_type in &manifest.listeners {
        for (path, instance) in enabled_instances(&plugin.name, NodeCapability::Listener, node_type.as_ref(), store) {
            // Each channel gets its own listener instance
            for channel in &instance.channels {
                match node_type.build(instance.config.clone(), path.clone()) {
                    Ok(node) => orchestrator.attach_listener(channel, path.clone(), node).await,
                    Err(failure) => error!(
                        "Failed to build listener \"{}\" for channel \"{}\": {}",
                        path, channel, failure
                    ),
                }
            }
        }
    }
}

/// Enabled instances of one node type, paired with their addresses
///
/// Generated or malformed config documents yield no instances.
fn enabled_instances<N: NodeType + ?Sized>(
    plugin_name: &str,
    capability: NodeCapability,
    node_type: &N,
    store: &NodeConfigStore,
) -> Vec<(NodeInstancePath, InstanceConfig)> {
    let node_name = node_type.node_manifest().name;

    let instances = match store.load_or_generate(plugin_name, capability, node_type) {
        Ok(NodeConfigDocument::Loaded(instances)) => instances,
        Ok(NodeConfigDocument::Generated(path)) => {
            warn!(
                "Node \"{}\" of plugin \"{}\" has no config yet; edit {} to enable it",
                node_name,
                plugin_name,
                path.display()
            );
            return Vec::new();
        }
        Err(e) => {
            error!(
                "Skipping node \"{}\" of plugin \"{}\": {}",
                node_name, plugin_name, e
            );
            return Vec::new();
        }
    };

    instances
        .into_iter()
        .filter_map(|instance| {
            let path = NodeInstancePath::new(plugin_name, capability, node_name.as_str(), instance.name.as_str());
            if instance.disabled {
                info!("Instance \"{}\" is disabled", path);
                return None;
            }
            Some((path, instance))
        })
        .collect()
}
