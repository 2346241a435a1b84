//! Shared test fixtures: in-memory node types with recorded calls and
//! injectable failures

#![allow(dead_code)]

use async_trait::async_trait;
use dorothy_common::{Album, Artist, NodeInstancePath, ResourceId, Song};
use dorothy_daemon::node::{
    Controller, ControllerType, Listener, ListenerType, NodeConfig, NodeFailure, NodeManifest,
    NodeResult, NodeType, Provider, ProviderType,
};
use dorothy_daemon::Orchestrator;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Ordered record of lifecycle events across every fixture node
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ============================================================================
// Provider
// ============================================================================

pub const FULL_ALBUM: &str = "full";
pub const EMPTY_ALBUM: &str = "empty";
pub const ARTIST: &str = "band";

/// Shared handle to observe and steer a memory provider
#[derive(Clone, Default)]
pub struct ProviderProbe {
    pub fail: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
}

impl ProviderProbe {
    pub fn failing() -> Self {
        let probe = Self::default();
        probe.fail.store(true, Ordering::SeqCst);
        probe
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Provider type serving a fixed song list
///
/// Every instance exposes album [`FULL_ALBUM`] holding all songs, album
/// [`EMPTY_ALBUM`] with an empty song list and artist [`ARTIST`] owning both.
pub struct MemoryProviderType {
    pub name: String,
    pub songs: Vec<(String, u64)>,
    pub probe: ProviderProbe,
    pub events: EventLog,
}

impl MemoryProviderType {
    pub fn new(name: &str, songs: &[(&str, u64)]) -> Self {
        Self {
            name: name.to_string(),
            songs: songs.iter().map(|(id, d)| (id.to_string(), *d)).collect(),
            probe: ProviderProbe::default(),
            events: EventLog::default(),
        }
    }

    pub fn with_probe(mut self, probe: ProviderProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }
}

impl NodeType for MemoryProviderType {
    fn node_manifest(&self) -> NodeManifest {
        NodeManifest::new(self.name.as_str()).with_default("library", "memory")
    }
}

impl ProviderType for MemoryProviderType {
    fn build(&self, _config: NodeConfig, path: NodeInstancePath) -> NodeResult<Arc<dyn Provider>> {
        Ok(Arc::new(MemoryProvider::new(
            path,
            &self.songs,
            self.probe.clone(),
            self.events.clone(),
        )))
    }
}

pub struct MemoryProvider {
    path: NodeInstancePath,
    songs: Vec<Song>,
    probe: ProviderProbe,
    events: EventLog,
}

impl MemoryProvider {
    pub fn new(path: NodeInstancePath, songs: &[(String, u64)], probe: ProviderProbe, events: EventLog) -> Self {
        let songs = songs
            .iter()
            .map(|(id, duration)| {
                Song::new(ResourceId::song(path.clone(), id.as_str()), format!("mem://{}", id), *duration)
                    .with_title(id.as_str())
                    .with_album_name(FULL_ALBUM)
                    .with_artist_name(ARTIST)
            })
            .collect();
        Self {
            path,
            songs,
            probe,
            events,
        }
    }

    pub fn song_id(&self, id: &str) -> ResourceId {
        ResourceId::song(self.path.clone(), id)
    }

    fn enter(&self) -> NodeResult<()> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        if self.probe.fail.load(Ordering::SeqCst) {
            return Err(NodeFailure::new(format!("{} is broken", self.path)));
        }
        Ok(())
    }

    fn album(&self, title: &str) -> Option<Album> {
        let songs = match title {
            FULL_ALBUM => self.songs.clone(),
            EMPTY_ALBUM => Vec::new(),
            _ => return None,
        };
        Some(Album {
            resource_id: ResourceId::album(self.path.clone(), title),
            title: Some(title.to_string()),
            songs: Some(songs),
        })
    }

    fn artist(&self) -> Artist {
        Artist {
            resource_id: ResourceId::artist(self.path.clone(), ARTIST),
            name: Some(ARTIST.to_string()),
            albums: Some(vec![
                self.album(EMPTY_ALBUM).unwrap(),
                self.album(FULL_ALBUM).unwrap(),
            ]),
        }
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn get_song(&self, unique_id: &str) -> NodeResult<Option<Song>> {
        self.enter()?;
        Ok(self
            .songs
            .iter()
            .find(|song| song.resource_id.unique_id == unique_id)
            .cloned())
    }

    async fn get_all_songs(&self) -> NodeResult<Vec<Song>> {
        self.enter()?;
        Ok(self.songs.clone())
    }

    async fn get_album(&self, unique_id: &str) -> NodeResult<Option<Album>> {
        self.enter()?;
        Ok(self.album(unique_id))
    }

    async fn get_all_albums(&self) -> NodeResult<Vec<Album>> {
        self.enter()?;
        Ok([FULL_ALBUM, EMPTY_ALBUM]
            .iter()
            .filter_map(|title| self.album(title))
            .collect())
    }

    async fn get_artist(&self, unique_id: &str) -> NodeResult<Option<Artist>> {
        self.enter()?;
        Ok((unique_id == ARTIST).then(|| self.artist()))
    }

    async fn get_all_artists(&self) -> NodeResult<Vec<Artist>> {
        self.enter()?;
        Ok(vec![self.artist()])
    }

    async fn cleanup(&self) -> NodeResult<()> {
        self.events.push(format!("provider cleanup {}", self.path.instance_name));
        Ok(())
    }
}

// ============================================================================
// Listener
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerCall {
    Play(String),
    Pause,
    Stop,
}

/// Calls received by every instance of a recording listener type, tagged
/// with the instance name
#[derive(Clone, Default)]
pub struct ListenerProbe(Arc<Mutex<Vec<(String, ListenerCall)>>>);

impl ListenerProbe {
    pub fn calls(&self) -> Vec<(String, ListenerCall)> {
        self.0.lock().unwrap().clone()
    }

    pub fn plays_of(&self, song_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(_, call)| *call == ListenerCall::Play(song_id.to_string()))
            .count()
    }
}

pub struct RecordingListenerType {
    pub name: String,
    pub probe: ListenerProbe,
    pub events: EventLog,
    pub builds: Arc<AtomicUsize>,
    pub fail_build: bool,
}

impl RecordingListenerType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            probe: ListenerProbe::default(),
            events: EventLog::default(),
            builds: Arc::new(AtomicUsize::new(0)),
            fail_build: false,
        }
    }

    pub fn with_probe(mut self, probe: ListenerProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn with_build_counter(mut self, builds: Arc<AtomicUsize>) -> Self {
        self.builds = builds;
        self
    }

    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }
}

impl NodeType for RecordingListenerType {
    fn node_manifest(&self) -> NodeManifest {
        NodeManifest::new(self.name.as_str())
    }
}

impl ListenerType for RecordingListenerType {
    fn build(&self, _config: NodeConfig, path: NodeInstancePath) -> NodeResult<Box<dyn Listener>> {
        if self.fail_build {
            return Err(NodeFailure::new("no audio device"));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingListener {
            instance: path.instance_name,
            probe: self.probe.clone(),
            events: self.events.clone(),
        }))
    }
}

pub struct RecordingListener {
    instance: String,
    probe: ListenerProbe,
    events: EventLog,
}

impl RecordingListener {
    pub fn new(instance: &str, probe: ListenerProbe) -> Self {
        Self {
            instance: instance.to_string(),
            probe,
            events: EventLog::default(),
        }
    }

    fn record(&self, call: ListenerCall) {
        self.probe.0.lock().unwrap().push((self.instance.clone(), call));
    }
}

#[async_trait]
impl Listener for RecordingListener {
    async fn play(&mut self, song: &Song) -> NodeResult<()> {
        self.record(ListenerCall::Play(song.resource_id.unique_id.clone()));
        Ok(())
    }

    async fn pause(&mut self) -> NodeResult<()> {
        self.record(ListenerCall::Pause);
        Ok(())
    }

    async fn stop(&mut self) -> NodeResult<()> {
        self.record(ListenerCall::Stop);
        Ok(())
    }

    async fn cleanup(&mut self) -> NodeResult<()> {
        self.events.push(format!("listener cleanup {}", self.instance));
        Ok(())
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct ProbeControllerType {
    pub name: String,
    pub events: EventLog,
    pub fail_start: bool,
}

impl ProbeControllerType {
    pub fn new(name: &str, events: EventLog) -> Self {
        Self {
            name: name.to_string(),
            events,
            fail_start: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

impl NodeType for ProbeControllerType {
    fn node_manifest(&self) -> NodeManifest {
        NodeManifest::new(self.name.as_str())
    }
}

impl ControllerType for ProbeControllerType {
    fn build(
        &self,
        _config: NodeConfig,
        path: NodeInstancePath,
        orchestrator: Arc<Orchestrator>,
    ) -> NodeResult<Box<dyn Controller>> {
        Ok(Box::new(ProbeController {
            instance: path.instance_name,
            events: self.events.clone(),
            fail_start: self.fail_start,
            orchestrator,
            token: None,
        }))
    }
}

pub struct ProbeController {
    instance: String,
    events: EventLog,
    fail_start: bool,
    orchestrator: Arc<Orchestrator>,
    token: Option<CancellationToken>,
}

#[async_trait]
impl Controller for ProbeController {
    async fn start(&mut self, shutdown: CancellationToken) -> NodeResult<()> {
        self.events.push(format!("controller start {}", self.instance));
        if self.fail_start {
            return Err(NodeFailure::new("port in use"));
        }
        let channels = self.orchestrator.get_channel_names().await;
        self.events.push(format!("controller sees {} channels", channels.len()));
        self.token = Some(shutdown);
        Ok(())
    }

    async fn cleanup(&mut self) -> NodeResult<()> {
        let cancelled = self.token.as_ref().map(|t| t.is_cancelled()).unwrap_or(false);
        self.events.push(format!(
            "controller cleanup {} cancelled={}",
            self.instance, cancelled
        ));
        if self.fail_start {
            return Err(NodeFailure::new("nothing to clean"));
        }
        Ok(())
    }
}

// ============================================================================
// Config files
// ============================================================================

/// Write a node config document for `plugin`/`node`
pub fn write_node_config(root: &std::path::Path, plugin: &str, node: &str, content: &str) {
    let dir = root.join(plugin);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{}.toml", node)), content).unwrap();
}
