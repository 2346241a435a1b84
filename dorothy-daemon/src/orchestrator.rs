//! Orchestrator: resource queries and channel commands
//!
//! The orchestrator owns every provider instance and every channel. It is
//! built once at start-up, shared as `Arc<Orchestrator>` and handed to each
//! controller; controllers never see providers or listeners directly.
//!
//! Provider failures are contained here: a provider returning
//! [`NodeFailure`](crate::node::NodeFailure) is evicted for the rest of the
//! process lifetime and the caller sees an empty or absent result.

use dorothy_common::{Album, Artist, NodeCapability, NodeInstancePath, ResourceId, ResourceKind, Song};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, ChannelSnapshot, ChannelState, PlayPauseOutcome};
use crate::error::{Error, Result};
use crate::node::{Listener, NodeResult, Provider};

/// plugin name -> node name -> instance name -> provider
type ProviderMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, Arc<dyn Provider>>>>;

pub struct Orchestrator {
    providers: RwLock<ProviderMap>,
    channels: RwLock<BTreeMap<String, Arc<Mutex<Channel>>>>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(BTreeMap::new()),
            channels: RwLock::new(BTreeMap::new()),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Add a provider instance, replacing any instance at the same path
    pub async fn register_provider(&self, path: NodeInstancePath, provider: Arc<dyn Provider>) {
        info!("Registered provider \"{}\"", path);
        self.providers
            .write()
            .await
            .entry(path.plugin_name)
            .or_default()
            .entry(path.node_name)
            .or_default()
            .insert(path.instance_name, provider);
    }

    /// Bind a listener to `channel`, creating the channel on first use
    pub async fn attach_listener(
        &self,
        channel: &str,
        path: NodeInstancePath,
        listener: Box<dyn Listener>,
    ) {
        let handle = {
            let mut channels = self.channels.write().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Channel::new(channel))))
                .clone()
        };
        handle.lock().await.attach_listener(path, listener);
    }

    /// Paths of every provider still registered
    pub async fn provider_paths(&self) -> Vec<NodeInstancePath> {
        self.provider_snapshot()
            .await
            .into_iter()
            .map(|(path, _)| path)
            .collect()
    }

    pub async fn get_channel_names(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }

    // ========================================================================
    // Provider access
    // ========================================================================

    async fn provider_snapshot(&self) -> Vec<(NodeInstancePath, Arc<dyn Provider>)> {
        let providers = self.providers.read().await;
        let mut snapshot = Vec::new();
        for (plugin_name, nodes) in providers.iter() {
            for (node_name, instances) in nodes.iter() {
                for (instance_name, provider) in instances.iter() {
                    let path = NodeInstancePath::new(
                        plugin_name.as_str(),
                        NodeCapability::Provider,
                        node_name.as_str(),
                        instance_name.as_str(),
                    );
                    snapshot.push((path, provider.clone()));
                }
            }
        }
        snapshot
    }

    async fn lookup_provider(&self, path: &NodeInstancePath) -> Option<Arc<dyn Provider>> {
        if path.node_type != NodeCapability::Provider {
            return None;
        }
        self.providers
            .read()
            .await
            .get(&path.plugin_name)?
            .get(&path.node_name)?
            .get(&path.instance_name)
            .cloned()
    }

    async fn evict_provider(&self, path: &NodeInstancePath) {
        let mut providers = self.providers.write().await;
        let Some(nodes) = providers.get_mut(&path.plugin_name) else {
            return;
        };
        if let Some(instances) = nodes.get_mut(&path.node_name) {
            instances.remove(&path.instance_name);
            if instances.is_empty() {
                nodes.remove(&path.node_name);
            }
        }
        if nodes.is_empty() {
            providers.remove(&path.plugin_name);
        }
        warn!("Evicted provider \"{}\"", path);
    }

    /// Ask the provider that minted `id` for the resource it names
    async fn query<T, F, Fut>(&self, id: &ResourceId, kind: ResourceKind, call: F) -> Option<T>
    where
        F: FnOnce(Arc<dyn Provider>, String) -> Fut,
        Fut: Future<Output = NodeResult<Option<T>>>,
    {
        if id.kind != kind {
            debug!("Resource \"{}\" is not a {}", id, kind);
            return None;
        }

        let path = &id.node_instance_path;
        let Some(provider) = self.lookup_provider(path).await else {
            debug!("No provider registered at \"{}\"", path);
            return None;
        };

        match call(provider, id.unique_id.clone()).await {
            Ok(resource) => resource,
            Err(failure) => {
                error!("Provider \"{}\" failed: {}", path, failure);
                self.evict_provider(path).await;
                None
            }
        }
    }

    /// Collect results from every provider; failed providers are evicted
    /// once all of them have been asked
    async fn fan_out<T, F, Fut>(&self, call: F) -> Vec<T>
    where
        F: Fn(Arc<dyn Provider>) -> Fut,
        Fut: Future<Output = NodeResult<Vec<T>>>,
    {
        let mut results = Vec::new();
        let mut failed = Vec::new();

        for (path, provider) in self.provider_snapshot().await {
            match call(provider).await {
                Ok(mut resources) => results.append(&mut resources),
                Err(failure) => {
                    error!("Provider \"{}\" failed: {}", path, failure);
                    failed.push(path);
                }
            }
        }

        for path in failed {
            self.evict_provider(&path).await;
        }
        results
    }

    // ========================================================================
    // Resource queries
    // ========================================================================

    pub async fn get_song(&self, id: &ResourceId) -> Option<Song> {
        self.query(id, ResourceKind::Song, |provider, unique_id| async move {
            provider.get_song(&unique_id).await
        })
        .await
    }

    pub async fn get_album(&self, id: &ResourceId) -> Option<Album> {
        self.query(id, ResourceKind::Album, |provider, unique_id| async move {
            provider.get_album(&unique_id).await
        })
        .await
    }

    pub async fn get_artist(&self, id: &ResourceId) -> Option<Artist> {
        self.query(id, ResourceKind::Artist, |provider, unique_id| async move {
            provider.get_artist(&unique_id).await
        })
        .await
    }

    pub async fn get_all_songs(&self) -> Vec<Song> {
        self.fan_out(|provider| async move { provider.get_all_songs().await })
            .await
    }

    pub async fn get_all_albums(&self) -> Vec<Album> {
        self.fan_out(|provider| async move { provider.get_all_albums().await })
            .await
    }

    pub async fn get_all_artists(&self) -> Vec<Artist> {
        self.fan_out(|provider| async move { provider.get_all_artists().await })
            .await
    }

    /// Expand a resource id into the songs it stands for
    async fn resolve_songs(&self, id: &ResourceId) -> Vec<Song> {
        match id.kind {
            ResourceKind::Song => self.get_song(id).await.into_iter().collect(),
            ResourceKind::Album => self
                .get_album(id)
                .await
                .map(|album| album.song_list().to_vec())
                .unwrap_or_default(),
            ResourceKind::Artist => self
                .get_artist(id)
                .await
                .map(|artist| artist.all_songs())
                .unwrap_or_default(),
        }
    }

    // ========================================================================
    // Channel commands
    // ========================================================================

    async fn channel(&self, name: &str) -> Result<Arc<Mutex<Channel>>> {
        self.channels
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ChannelNotFound(name.to_string()))
    }

    /// Queue the songs behind `id` at `position`, keeping their order
    ///
    /// Returns the number of songs inserted; unknown or empty resources
    /// insert nothing.
    pub async fn insert_to_queue(&self, channel: &str, id: &ResourceId, position: usize) -> Result<usize> {
        let handle = self.channel(channel).await?;
        let songs = self.resolve_songs(id).await;
        let count = songs.len();
        if count == 0 {
            debug!("Resource \"{}\" resolved to no songs", id);
        }
        handle.lock().await.insert_all(songs, position);
        Ok(count)
    }

    pub async fn add_to_queue(&self, channel: &str, id: &ResourceId) -> Result<usize> {
        self.insert_to_queue(channel, id, 0).await
    }

    pub async fn remove_from_queue(&self, channel: &str, position: usize) -> Result<()> {
        self.channel(channel).await?.lock().await.remove_from_queue(position);
        Ok(())
    }

    /// Returns whether a song was taken from the queue
    pub async fn play(&self, channel: &str) -> Result<bool> {
        Ok(self.channel(channel).await?.lock().await.play().await)
    }

    pub async fn pause(&self, channel: &str) -> Result<()> {
        self.channel(channel).await?.lock().await.pause().await;
        Ok(())
    }

    pub async fn play_pause(&self, channel: &str) -> Result<PlayPauseOutcome> {
        Ok(self.channel(channel).await?.lock().await.play_pause().await)
    }

    pub async fn stop(&self, channel: &str) -> Result<()> {
        self.channel(channel).await?.lock().await.stop().await;
        Ok(())
    }

    pub async fn skip(&self, channel: &str) -> Result<()> {
        self.channel(channel).await?.lock().await.skip().await;
        Ok(())
    }

    pub async fn play_from_queue_given_index(&self, channel: &str, position: usize) -> Result<()> {
        self.channel(channel)
            .await?
            .lock()
            .await
            .play_from_queue_given_index(position)
            .await;
        Ok(())
    }

    pub async fn get_queue(&self, channel: &str) -> Result<Vec<Song>> {
        Ok(self.channel(channel).await?.lock().await.queue().to_vec())
    }

    pub async fn get_current_song(&self, channel: &str) -> Result<Option<Song>> {
        Ok(self.channel(channel).await?.lock().await.current_song().cloned())
    }

    pub async fn get_channel_state(&self, channel: &str) -> Result<ChannelState> {
        Ok(self.channel(channel).await?.lock().await.state())
    }

    /// Play time of the current song, paused time excluded
    pub async fn get_elapsed(&self, channel: &str) -> Result<Option<Duration>> {
        Ok(self.channel(channel).await?.lock().await.elapsed())
    }

    /// State, current song, elapsed time and queue taken together
    pub async fn get_channel_snapshot(&self, channel: &str) -> Result<ChannelSnapshot> {
        Ok(self.channel(channel).await?.lock().await.snapshot())
    }

    /// Advance every channel whose current song has run out
    pub async fn check_if_song_finished(&self) {
        let handles: Vec<_> = self.channels.read().await.values().cloned().collect();
        for handle in handles {
            handle.lock().await.check_if_song_finished().await;
        }
    }

    /// Release providers, then channel listeners
    ///
    /// Only valid at process shutdown, after every controller is cleaned up.
    pub async fn cleanup(&self) {
        for (path, provider) in self.provider_snapshot().await {
            if let Err(failure) = provider.cleanup().await {
                warn!(
                    "Provider \"{}\" has failed cleanup with error \"{}\"",
                    path, failure
                );
            }
        }

        let handles: Vec<_> = self.channels.read().await.values().cloned().collect();
        for handle in handles {
            handle.lock().await.cleanup_listeners().await;
        }
        info!("Orchestrator cleanup complete");
    }
}
