//! Mainloop: controller start-up, song-completion polling, ordered shutdown

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::orchestrator::Orchestrator;
use crate::plugin::LoadedController;

/// Default interval between two song-completion checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest accepted poll interval; shorter requests are raised to it
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct Mainloop {
    orchestrator: Arc<Orchestrator>,
    controllers: Vec<LoadedController>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
}

impl Mainloop {
    pub fn new(orchestrator: Arc<Orchestrator>, controllers: Vec<LoadedController>) -> Self {
        Self {
            orchestrator,
            controllers,
            poll_interval: POLL_INTERVAL,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        if poll_interval < MIN_POLL_INTERVAL {
            warn!(
                "Poll interval {:?} too short, using {:?}",
                poll_interval, MIN_POLL_INTERVAL
            );
        }
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Token cancelled when shutdown begins; parent of every controller token
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start every controller concurrently
    ///
    /// A controller failing to start is logged and left out of the run; it
    /// still gets its cleanup call at shutdown.
    pub async fn start_controllers(&mut self) {
        let cancel_token = &self.cancel_token;
        let starts = self.controllers.iter_mut().map(|controller| async move {
            let result = controller.node.start(cancel_token.child_token()).await;
            (controller.path.clone(), result)
        });

        for (path, result) in join_all(starts).await {
            match result {
                Ok(()) => info!("Started controller \"{}\"", path),
                Err(failure) => error!("Controller \"{}\" failed to start: {}", path, failure),
            }
        }
    }

    /// Start controllers, poll until `shutdown_signal` resolves, then clean up
    pub async fn run<S>(mut self, shutdown_signal: S)
    where
        S: Future<Output = ()>,
    {
        self.start_controllers().await;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown_signal);

        info!(
            "Mainloop running, polling every {:?}",
            self.poll_interval
        );

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Shutdown requested");
                    break;
                }
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown token cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.orchestrator.check_if_song_finished().await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Cancel outstanding work, then clean up controllers before providers
    /// and listeners
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();

        for controller in self.controllers.iter_mut() {
            debug!("Cleaning up controller \"{}\"", controller.path);
            if let Err(failure) = controller.node.cleanup().await {
                warn!(
                    "Controller \"{}\" has failed cleanup with error \"{}\"",
                    controller.path, failure
                );
            }
        }

        self.orchestrator.cleanup().await;
        info!("Shutdown complete");
    }
}
