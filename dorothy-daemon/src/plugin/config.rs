//! Node config documents
//!
//! One TOML file per node type, at `<config_dir>/<plugin>/<node>.toml`. The
//! document is a table of instance tables:
//!
//! ```toml
//! [default]
//! disabled = false
//! channels = ["main", "kitchen"]   # listeners only
//! port = 7171
//! ```
//!
//! `disabled` and `channels` are reserved and stripped before the remaining
//! keys reach the node. A missing file is generated with a single disabled
//! `default` instance; a present but malformed file is an error.

use dorothy_common::config::{read_toml_table, write_toml_atomic};
use dorothy_common::NodeCapability;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::node::{NodeConfig, NodeType};

pub const DISABLED_KEY: &str = "disabled";
pub const CHANNELS_KEY: &str = "channels";
pub const DEFAULT_CHANNEL: &str = "main";
pub const DEFAULT_INSTANCE: &str = "default";

/// One instance entry of a node config document
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceConfig {
    pub name: String,
    pub disabled: bool,
    /// Channels a listener instance binds to; empty for other capabilities
    pub channels: Vec<String>,
    /// Node-specific keys, reserved keys removed
    pub config: NodeConfig,
}

/// Outcome of loading a node config document
#[derive(Debug)]
pub enum NodeConfigDocument {
    /// No file existed; a disabled template was written at this path
    Generated(PathBuf),
    Loaded(Vec<InstanceConfig>),
}

/// Reads and generates node config files under one config directory
#[derive(Debug, Clone)]
pub struct NodeConfigStore {
    root: PathBuf,
}

impl NodeConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node_config_path(&self, plugin_name: &str, node_name: &str) -> PathBuf {
        self.root.join(plugin_name).join(format!("{}.toml", node_name))
    }

    /// Load the instances of one node type, generating the file on first run
    pub fn load_or_generate<N: NodeType + ?Sized>(
        &self,
        plugin_name: &str,
        capability: NodeCapability,
        node_type: &N,
    ) -> Result<NodeConfigDocument> {
        let node_name = node_type.node_manifest().name;
        let path = self.node_config_path(plugin_name, &node_name);

        match read_toml_table(&path)? {
            Some(document) => {
                let instances = parse_instances(document, capability)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                Ok(NodeConfigDocument::Loaded(instances))
            }
            None => {
                let document = default_document(capability, node_type);
                write_toml_atomic(&document, &path)?;
                info!(
                    "Generated disabled config for node \"{}\" of plugin \"{}\" at {}",
                    node_name,
                    plugin_name,
                    path.display()
                );
                Ok(NodeConfigDocument::Generated(path))
            }
        }
    }
}

/// First-run document: a single disabled `default` instance
pub fn default_document<N: NodeType + ?Sized>(capability: NodeCapability, node_type: &N) -> toml::Table {
    let mut instance = NodeConfig::new();
    if capability == NodeCapability::Listener {
        instance.insert(
            CHANNELS_KEY.to_string(),
            toml::Value::Array(vec![toml::Value::String(DEFAULT_CHANNEL.to_string())]),
        );
    }
    instance.extend(node_type.extra_node_default_configs());
    instance.extend(node_type.node_manifest().default_config);
    instance.insert(DISABLED_KEY.to_string(), toml::Value::Boolean(true));

    let mut document = toml::Table::new();
    document.insert(DEFAULT_INSTANCE.to_string(), toml::Value::Table(instance));
    document
}

/// Split a document into instances, validating the reserved keys
pub fn parse_instances(document: toml::Table, capability: NodeCapability) -> Result<Vec<InstanceConfig>> {
    document
        .into_iter()
        .map(|(name, value)| {
            let toml::Value::Table(mut config) = value else {
                return Err(Error::Config(format!("instance \"{}\" is not a table", name)));
            };

            let disabled = match config.remove(DISABLED_KEY) {
                None => false,
                Some(toml::Value::Boolean(disabled)) => disabled,
                Some(other) => {
                    return Err(Error::Config(format!(
                        "instance \"{}\": \"{}\" must be a boolean, found {}",
                        name,
                        DISABLED_KEY,
                        other.type_str()
                    )))
                }
            };

            let channels = if capability == NodeCapability::Listener {
                parse_channels(&name, config.remove(CHANNELS_KEY))?
            } else {
                Vec::new()
            };

            Ok(InstanceConfig {
                name,
                disabled,
                channels,
                config,
            })
        })
        .collect()
}

fn parse_channels(instance: &str, value: Option<toml::Value>) -> Result<Vec<String>> {
    let invalid = || {
        Error::Config(format!(
            "instance \"{}\": \"{}\" must be a list of channel names",
            instance, CHANNELS_KEY
        ))
    };

    match value {
        None => Ok(vec![DEFAULT_CHANNEL.to_string()]),
        Some(toml::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                toml::Value::String(channel) => Ok(channel),
                _ => Err(invalid()),
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}
