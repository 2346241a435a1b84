//! Console listener: reports playback through the log
//!
//! Useful on headless machines and for checking a setup end to end without
//! an audio device.

use async_trait::async_trait;
use dorothy_common::{NodeInstancePath, Song};
use tracing::info;

use crate::node::{Listener, ListenerType, NodeConfig, NodeManifest, NodeResult, NodeType};

pub const NODE_NAME: &str = "console";

pub struct ConsoleListenerType;

impl NodeType for ConsoleListenerType {
    fn node_manifest(&self) -> NodeManifest {
        NodeManifest::new(NODE_NAME)
    }
}

impl ListenerType for ConsoleListenerType {
    fn build(&self, _config: NodeConfig, path: NodeInstancePath) -> NodeResult<Box<dyn Listener>> {
        Ok(Box::new(ConsoleListener {
            path,
            current_uri: None,
        }))
    }
}

pub struct ConsoleListener {
    path: NodeInstancePath,
    current_uri: Option<String>,
}

#[async_trait]
impl Listener for ConsoleListener {
    async fn play(&mut self, song: &Song) -> NodeResult<()> {
        if self.current_uri.as_deref() == Some(song.uri.as_str()) {
            info!("[{}] Resuming \"{}\"", self.path, song.display_name());
        } else {
            info!(
                "[{}] Playing \"{}\" ({}s) from {}",
                self.path,
                song.display_name(),
                song.duration,
                song.uri
            );
            self.current_uri = Some(song.uri.clone());
        }
        Ok(())
    }

    async fn pause(&mut self) -> NodeResult<()> {
        info!("[{}] Paused", self.path);
        Ok(())
    }

    async fn stop(&mut self) -> NodeResult<()> {
        info!("[{}] Stopped", self.path);
        self.current_uri = None;
        Ok(())
    }
}
