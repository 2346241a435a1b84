//! Node capability model
//!
//! A plugin contributes node *types*; the node factory turns each enabled
//! config instance of a type into a live node. Three capability sets exist:
//!
//! - [`Provider`]: exposes songs, albums and artists
//! - [`Listener`]: renders the songs of the channels it is bound to
//! - [`Controller`]: exposes the orchestrator to the outside world
//!
//! Each capability has a matching *type* trait ([`ProviderType`],
//! [`ListenerType`], [`ControllerType`]) that carries the manifest and builds
//! instances. A plugin manifest lists node types per capability, so the
//! capability of every node is known from the list it sits in.
//!
//! Nodes report that they became unusable by returning [`NodeFailure`]. The
//! orchestrator and channels catch it and evict the node; it never reaches a
//! controller.

pub mod manifest;

pub use manifest::PluginManifest;

use async_trait::async_trait;
use dorothy_common::{Album, Artist, NodeInstancePath, Song};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::Orchestrator;

/// Per-instance configuration table, as read from the node config file
pub type NodeConfig = toml::Table;

/// Signal a node raises to declare itself permanently unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NodeFailure {
    message: String,
}

impl NodeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type of every node call
pub type NodeResult<T> = std::result::Result<T, NodeFailure>;

/// Data a node type exposes before any instance exists
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeManifest {
    /// Unique within the plugin; names the node config file
    pub name: String,
    pub default_config: NodeConfig,
}

impl NodeManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_config: NodeConfig::new(),
        }
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.default_config.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Node instances
// ============================================================================

/// Node exposing resources
///
/// `unique_id` arguments are the opaque third field of a resource id; only the
/// provider that minted them interprets them.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn get_song(&self, unique_id: &str) -> NodeResult<Option<Song>>;

    async fn get_all_songs(&self) -> NodeResult<Vec<Song>>;

    async fn get_album(&self, unique_id: &str) -> NodeResult<Option<Album>>;

    async fn get_all_albums(&self) -> NodeResult<Vec<Album>>;

    async fn get_artist(&self, unique_id: &str) -> NodeResult<Option<Artist>>;

    async fn get_all_artists(&self) -> NodeResult<Vec<Artist>>;

    /// Called once at process shutdown
    async fn cleanup(&self) -> NodeResult<()> {
        Ok(())
    }
}

/// Node rendering the songs of one channel
///
/// `play` is used both to start a new song and to resume the paused one.
#[async_trait]
pub trait Listener: Send {
    async fn play(&mut self, song: &Song) -> NodeResult<()>;

    async fn pause(&mut self) -> NodeResult<()>;

    async fn stop(&mut self) -> NodeResult<()>;

    /// Called once at process shutdown
    async fn cleanup(&mut self) -> NodeResult<()> {
        Ok(())
    }
}

/// Node exposing the system to external callers
#[async_trait]
pub trait Controller: Send {
    /// Must return promptly; long-running work is spawned and tied to
    /// `shutdown`, which is cancelled when the daemon stops.
    async fn start(&mut self, shutdown: CancellationToken) -> NodeResult<()>;

    /// Called once at process shutdown, before providers and listeners
    async fn cleanup(&mut self) -> NodeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Node types
// ============================================================================

/// Behaviour shared by every node type
pub trait NodeType: Send + Sync {
    fn node_manifest(&self) -> NodeManifest;

    /// Extra keys seeded into a freshly generated config, beneath the
    /// manifest defaults
    fn extra_node_default_configs(&self) -> NodeConfig {
        NodeConfig::new()
    }
}

pub trait ProviderType: NodeType {
    fn build(&self, config: NodeConfig, path: NodeInstancePath) -> NodeResult<Arc<dyn Provider>>;
}

pub trait ListenerType: NodeType {
    fn build(&self, config: NodeConfig, path: NodeInstancePath) -> NodeResult<Box<dyn Listener>>;
}

pub trait ControllerType: NodeType {
    fn build(
        &self,
        config: NodeConfig,
        path: NodeInstancePath,
        orchestrator: Arc<Orchestrator>,
    ) -> NodeResult<Box<dyn Controller>>;
}
