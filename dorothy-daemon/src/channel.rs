//! Channel playback state machine
//!
//! A channel owns a queue of songs, the song currently playing and the
//! listeners bound to it. Commands are applied in call order; the orchestrator
//! serialises access through one mutex per channel.
//!
//! ```text
//! STOPPED --play--> PLAYING --pause--> PAUSED --play--> PLAYING
//!    ^                 |                  |
//!    +------stop-------+-------stop-------+
//! ```
//!
//! Song completion is polled: [`Channel::check_if_song_finished`] compares the
//! elapsed play time (paused time excluded) against the song duration.

use dorothy_common::{NodeInstancePath, Song};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::node::Listener;

/// Playback state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Playing,
    Paused,
    Stopped,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Playing => write!(f, "playing"),
            ChannelState::Paused => write!(f, "paused"),
            ChannelState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Result of [`Channel::play_pause`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayPauseOutcome {
    /// State after the toggle
    pub state: ChannelState,
    /// Whether a song was taken from the head of the queue
    pub dequeued: bool,
}

/// Channel view read under a single lock
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub name: String,
    pub state: ChannelState,
    pub current_song: Option<Song>,
    pub elapsed: Option<Duration>,
    pub queue: Vec<Song>,
}

/// A listener instance bound to this channel
struct AttachedListener {
    path: NodeInstancePath,
    node: Box<dyn Listener>,
}

#[derive(Clone, Copy)]
enum ListenerCommand<'a> {
    Play(&'a Song),
    Pause,
    Stop,
}

/// Send `command` to every listener, dropping the ones that fail
async fn dispatch(channel: &str, listeners: &mut Vec<AttachedListener>, command: ListenerCommand<'_>) {
    let mut failed = Vec::new();

    for (index, attached) in listeners.iter_mut().enumerate() {
        let result = match command {
            ListenerCommand::Play(song) => attached.node.play(song).await,
            ListenerCommand::Pause => attached.node.pause().await,
            ListenerCommand::Stop => attached.node.stop().await,
        };

        if let Err(failure) = result {
            error!(
                "Listener \"{}\" failed on channel \"{}\": {}",
                attached.path, channel, failure
            );
            failed.push(index);
        }
    }

    for index in failed.into_iter().rev() {
        let removed = listeners.remove(index);
        warn!(
            "Removed listener \"{}\" from channel \"{}\"",
            removed.path, channel
        );
    }
}

/// Named playback unit with its own queue and listeners
pub struct Channel {
    name: String,
    queue: Vec<Song>,
    current_song: Option<Song>,
    state: ChannelState,
    /// Start of the current song, shifted forward by time spent paused
    song_start_time: Option<Instant>,
    paused_at: Option<Instant>,
    listeners: Vec<AttachedListener>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        info!("Instantiated channel \"{}\"", name);
        Self {
            name,
            queue: Vec::new(),
            current_song: None,
            state: ChannelState::Stopped,
            song_start_time: None,
            paused_at: None,
            listeners: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.current_song.as_ref()
    }

    pub fn queue(&self) -> &[Song] {
        &self.queue
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            name: self.name.clone(),
            state: self.state,
            current_song: self.current_song.clone(),
            elapsed: self.elapsed(),
            queue: self.queue.clone(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn attach_listener(&mut self, path: NodeInstancePath, node: Box<dyn Listener>) {
        debug!("Attaching listener \"{}\" to channel \"{}\"", path, self.name);
        self.listeners.push(AttachedListener { path, node });
    }

    /// Play time of the current song, excluding time spent paused
    pub fn elapsed(&self) -> Option<Duration> {
        let start = self.song_start_time?;
        let now = self.paused_at.unwrap_or_else(Instant::now);
        Some(now.saturating_duration_since(start))
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Start or resume playback
    ///
    /// Returns `true` when a song was taken from the head of the queue.
    pub async fn play(&mut self) -> bool {
        match self.state {
            ChannelState::Playing => false,
            ChannelState::Paused => {
                if let Some(song) = self.current_song.as_ref() {
                    dispatch(&self.name, &mut self.listeners, ListenerCommand::Play(song)).await;
                }
                if let (Some(start), Some(paused_at)) = (self.song_start_time, self.paused_at.take()) {
                    self.song_start_time = Some(start + paused_at.elapsed());
                }
                self.state = ChannelState::Playing;
                info!("Channel \"{}\" resumed", self.name);
                false
            }
            ChannelState::Stopped => {
                if self.queue.is_empty() {
                    debug!("Channel \"{}\" has an empty queue, nothing to play", self.name);
                    return false;
                }

                let song = self.queue.remove(0);
                info!("Channel \"{}\" playing \"{}\"", self.name, song.display_name());
                let song = self.current_song.insert(song);
                dispatch(&self.name, &mut self.listeners, ListenerCommand::Play(song)).await;

                self.song_start_time = Some(Instant::now());
                self.paused_at = None;
                self.state = ChannelState::Playing;
                true
            }
        }
    }

    /// Pause playback; only meaningful while playing
    pub async fn pause(&mut self) {
        if self.state != ChannelState::Playing {
            return;
        }

        dispatch(&self.name, &mut self.listeners, ListenerCommand::Pause).await;
        self.paused_at = Some(Instant::now());
        self.state = ChannelState::Paused;
        info!("Channel \"{}\" paused", self.name);
    }

    /// Pause when playing, play otherwise
    pub async fn play_pause(&mut self) -> PlayPauseOutcome {
        let dequeued = if self.state == ChannelState::Playing {
            self.pause().await;
            false
        } else {
            self.play().await
        };

        PlayPauseOutcome {
            state: self.state,
            dequeued,
        }
    }

    pub async fn stop(&mut self) {
        if self.state == ChannelState::Stopped {
            return;
        }

        dispatch(&self.name, &mut self.listeners, ListenerCommand::Stop).await;
        self.current_song = None;
        self.song_start_time = None;
        self.paused_at = None;
        self.state = ChannelState::Stopped;
        info!("Channel \"{}\" stopped", self.name);
    }

    /// Advance to the next queued song, or stop when the queue is empty
    pub async fn skip(&mut self) {
        self.stop().await;
        self.play().await;
    }

    /// Skip when the current song has played past its duration
    pub async fn check_if_song_finished(&mut self) {
        if self.state != ChannelState::Playing {
            return;
        }

        let (Some(song), Some(elapsed)) = (self.current_song.as_ref(), self.elapsed()) else {
            return;
        };

        if elapsed > Duration::from_secs(song.duration) {
            debug!(
                "Song \"{}\" finished on channel \"{}\" after {:?}",
                song.display_name(),
                self.name,
                elapsed
            );
            self.skip().await;
        }
    }

    // ------------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------------

    /// Insert at `position`, clamped to the end of the queue
    pub fn insert(&mut self, song: Song, position: usize) {
        let position = position.min(self.queue.len());
        debug!(
            "Inserting \"{}\" at position {} of channel \"{}\"",
            song.display_name(),
            position,
            self.name
        );
        self.queue.insert(position, song);
    }

    /// Insert `songs` starting at `position`, keeping their relative order
    pub fn insert_all(&mut self, songs: Vec<Song>, position: usize) {
        for (offset, song) in songs.into_iter().enumerate() {
            self.insert(song, position.saturating_add(offset));
        }
    }

    /// Remove the song at `position`; out of range positions are ignored
    pub fn remove_from_queue(&mut self, position: usize) -> Option<Song> {
        if position >= self.queue.len() {
            return None;
        }
        Some(self.queue.remove(position))
    }

    /// Drop every song before `position`, then skip to the song at it
    ///
    /// Positions past the end of the queue are ignored.
    pub async fn play_from_queue_given_index(&mut self, position: usize) {
        if position > self.queue.len() {
            return;
        }

        let discarded = self.queue.drain(..position).count();
        debug!(
            "Discarded {} queued songs on channel \"{}\"",
            discarded, self.name
        );
        self.skip().await;
    }

    /// Give every listener a chance to release its resources
    pub async fn cleanup_listeners(&mut self) {
        for attached in self.listeners.iter_mut() {
            if let Err(failure) = attached.node.cleanup().await {
                warn!(
                    "Listener \"{}\" has failed cleanup with error \"{}\"",
                    attached.path, failure
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeFailure, NodeResult};
    use async_trait::async_trait;
    use dorothy_common::{NodeCapability, ResourceId};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Play(String),
        Pause,
        Stop,
    }

    struct RecordingListener {
        calls: Arc<Mutex<Vec<Call>>>,
        fail: bool,
    }

    #[async_trait]
    impl Listener for RecordingListener {
        async fn play(&mut self, song: &Song) -> NodeResult<()> {
            self.calls.lock().unwrap().push(Call::Play(song.resource_id.unique_id.clone()));
            if self.fail {
                return Err(NodeFailure::new("broken"));
            }
            Ok(())
        }

        async fn pause(&mut self) -> NodeResult<()> {
            self.calls.lock().unwrap().push(Call::Pause);
            Ok(())
        }

        async fn stop(&mut self) -> NodeResult<()> {
            self.calls.lock().unwrap().push(Call::Stop);
            Ok(())
        }
    }

    fn song(id: &str, duration: u64) -> Song {
        let path = NodeInstancePath::new("test", NodeCapability::Provider, "mem", "default");
        Song::new(ResourceId::song(path, id), format!("mem://{}", id), duration)
    }

    fn channel_with_listener(fail: bool) -> (Channel, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut channel = Channel::new("main");
        channel.attach_listener(
            NodeInstancePath::new("test", NodeCapability::Listener, "rec", "default"),
            Box::new(RecordingListener {
                calls: calls.clone(),
                fail,
            }),
        );
        (channel, calls)
    }

    fn queue_ids(channel: &Channel) -> Vec<String> {
        channel.queue().iter().map(|s| s.resource_id.unique_id.clone()).collect()
    }

    #[tokio::test]
    async fn test_play_from_stopped_takes_queue_head() {
        let (mut channel, calls) = channel_with_listener(false);
        channel.insert(song("a", 10), 0);
        channel.insert(song("b", 10), 1);

        assert!(channel.play().await);

        assert_eq!(channel.state(), ChannelState::Playing);
        assert_eq!(channel.current_song().map(|s| s.resource_id.unique_id.as_str()), Some("a"));
        assert_eq!(queue_ids(&channel), vec!["b"]);
        assert_eq!(*calls.lock().unwrap(), vec![Call::Play("a".into())]);
    }

    #[tokio::test]
    async fn test_play_with_empty_queue_stays_stopped() {
        let (mut channel, calls) = channel_with_listener(false);
        assert!(!channel.play().await);
        assert_eq!(channel.state(), ChannelState::Stopped);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_play_while_playing_is_noop() {
        let (mut channel, calls) = channel_with_listener(false);
        channel.insert(song("a", 10), 0);
        channel.insert(song("b", 10), 1);
        channel.play().await;

        assert!(!channel.play().await);
        assert_eq!(queue_ids(&channel), vec!["b"]);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pause_then_play_resumes_same_song() {
        let (mut channel, calls) = channel_with_listener(false);
        channel.insert(song("a", 10), 0);
        channel.insert(song("b", 10), 1);
        channel.play().await;

        channel.pause().await;
        assert_eq!(channel.state(), ChannelState::Paused);
        channel.pause().await;

        assert!(!channel.play().await);
        assert_eq!(channel.state(), ChannelState::Playing);
        assert_eq!(channel.current_song().map(|s| s.resource_id.unique_id.as_str()), Some("a"));
        assert_eq!(queue_ids(&channel), vec!["b"]);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::Play("a".into()), Call::Pause, Call::Play("a".into())]
        );
    }

    #[tokio::test]
    async fn test_pause_while_stopped_is_noop() {
        let (mut channel, calls) = channel_with_listener(false);
        channel.pause().await;
        assert_eq!(channel.state(), ChannelState::Stopped);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_play_pause_reports_dequeue() {
        let (mut channel, _calls) = channel_with_listener(false);
        channel.insert(song("a", 10), 0);

        let first = channel.play_pause().await;
        assert_eq!(first, PlayPauseOutcome { state: ChannelState::Playing, dequeued: true });

        let second = channel.play_pause().await;
        assert_eq!(second, PlayPauseOutcome { state: ChannelState::Paused, dequeued: false });

        let third = channel.play_pause().await;
        assert_eq!(third, PlayPauseOutcome { state: ChannelState::Playing, dequeued: false });
    }

    #[tokio::test]
    async fn test_skip_stops_before_next_song() {
        let (mut channel, calls) = channel_with_listener(false);
        channel.insert_all(vec![song("a", 10), song("b", 10)], 0);
        channel.play().await;

        channel.skip().await;

        assert_eq!(channel.current_song().map(|s| s.resource_id.unique_id.as_str()), Some("b"));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::Play("a".into()), Call::Stop, Call::Play("b".into())]
        );
    }

    #[tokio::test]
    async fn test_skip_on_last_song_stops() {
        let (mut channel, _calls) = channel_with_listener(false);
        channel.insert(song("a", 10), 0);
        channel.play().await;

        channel.skip().await;

        assert_eq!(channel.state(), ChannelState::Stopped);
        assert!(channel.current_song().is_none());
    }

    #[tokio::test]
    async fn test_stop_clears_current_song() {
        let (mut channel, calls) = channel_with_listener(false);
        channel.insert(song("a", 10), 0);
        channel.play().await;
        channel.stop().await;
        channel.stop().await;

        assert_eq!(channel.state(), ChannelState::Stopped);
        assert!(channel.current_song().is_none());
        assert!(channel.elapsed().is_none());
        assert_eq!(*calls.lock().unwrap(), vec![Call::Play("a".into()), Call::Stop]);
    }

    #[test]
    fn test_insert_clamps_position() {
        let mut channel = Channel::new("main");
        channel.insert(song("a", 1), 0);
        channel.insert(song("b", 1), 99);
        channel.insert(song("c", 1), 1);
        assert_eq!(queue_ids(&channel), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_insert_all_keeps_order() {
        let mut channel = Channel::new("main");
        channel.insert_all(vec![song("x", 1), song("y", 1)], 0);
        channel.insert_all(vec![song("a", 1), song("b", 1), song("c", 1)], 1);
        assert_eq!(queue_ids(&channel), vec!["x", "a", "b", "c", "y"]);
    }

    #[test]
    fn test_remove_from_queue_out_of_range() {
        let mut channel = Channel::new("main");
        channel.insert(song("a", 1), 0);
        assert!(channel.remove_from_queue(1).is_none());
        assert_eq!(channel.remove_from_queue(0).map(|s| s.resource_id.unique_id), Some("a".to_string()));
        assert!(channel.queue().is_empty());
    }

    #[tokio::test]
    async fn test_play_from_queue_given_index_discards_earlier_songs() {
        let (mut channel, calls) = channel_with_listener(false);
        channel.insert_all(vec![song("a", 1), song("b", 1), song("c", 1), song("d", 1)], 0);

        channel.play_from_queue_given_index(2).await;

        assert_eq!(channel.state(), ChannelState::Playing);
        assert_eq!(channel.current_song().map(|s| s.resource_id.unique_id.as_str()), Some("c"));
        assert_eq!(queue_ids(&channel), vec!["d"]);
        assert_eq!(*calls.lock().unwrap(), vec![Call::Play("c".into())]);
    }

    #[tokio::test]
    async fn test_play_from_queue_given_index_past_end_is_noop() {
        let (mut channel, calls) = channel_with_listener(false);
        channel.insert(song("a", 1), 0);

        channel.play_from_queue_given_index(2).await;

        assert_eq!(channel.state(), ChannelState::Stopped);
        assert_eq!(queue_ids(&channel), vec!["a"]);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_play_from_queue_given_index_at_end_drains_and_stops() {
        let (mut channel, _calls) = channel_with_listener(false);
        channel.insert_all(vec![song("a", 1), song("b", 1)], 0);

        channel.play_from_queue_given_index(2).await;

        assert_eq!(channel.state(), ChannelState::Stopped);
        assert!(channel.queue().is_empty());
    }

    #[tokio::test]
    async fn test_failing_listener_is_removed() {
        let (mut channel, failing_calls) = channel_with_listener(true);
        let healthy_calls = Arc::new(Mutex::new(Vec::new()));
        channel.attach_listener(
            NodeInstancePath::new("test", NodeCapability::Listener, "rec", "healthy"),
            Box::new(RecordingListener {
                calls: healthy_calls.clone(),
                fail: false,
            }),
        );
        channel.insert_all(vec![song("a", 1), song("b", 1)], 0);

        channel.play().await;
        assert_eq!(channel.listener_count(), 1);
        assert_eq!(channel.state(), ChannelState::Playing);

        channel.skip().await;
        assert_eq!(failing_calls.lock().unwrap().len(), 1);
        assert_eq!(
            *healthy_calls.lock().unwrap(),
            vec![Call::Play("a".into()), Call::Stop, Call::Play("b".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_if_song_finished_advances_after_duration() {
        let (mut channel, _calls) = channel_with_listener(false);
        channel.insert_all(vec![song("a", 3), song("b", 3)], 0);
        channel.play().await;

        tokio::time::advance(Duration::from_secs(2)).await;
        channel.check_if_song_finished().await;
        assert_eq!(channel.current_song().map(|s| s.resource_id.unique_id.as_str()), Some("a"));

        tokio::time::advance(Duration::from_millis(1500)).await;
        channel.check_if_song_finished().await;
        assert_eq!(channel.current_song().map(|s| s.resource_id.unique_id.as_str()), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_time_does_not_count() {
        let (mut channel, _calls) = channel_with_listener(false);
        channel.insert(song("a", 3), 0);
        channel.play().await;

        tokio::time::advance(Duration::from_secs(2)).await;
        channel.pause().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        channel.check_if_song_finished().await;
        assert_eq!(channel.state(), ChannelState::Paused);

        channel.play().await;
        assert_eq!(channel.elapsed(), Some(Duration::from_secs(2)));
        channel.check_if_song_finished().await;
        assert_eq!(channel.state(), ChannelState::Playing);

        tokio::time::advance(Duration::from_millis(1100)).await;
        channel.check_if_song_finished().await;
        assert_eq!(channel.state(), ChannelState::Stopped);
    }
}
