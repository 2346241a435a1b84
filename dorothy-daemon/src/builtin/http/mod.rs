//! HTTP controller
//!
//! Exposes the orchestrator as a REST API. Resource ids travel as their
//! string form and must be percent-encoded when used as a path segment.
//!
//! Config:
//!
//! ```toml
//! [default]
//! host = "127.0.0.1"
//! port = 7171
//! ```

pub mod handlers;

use async_trait::async_trait;
use axum::{
    routing::{delete, get, post},
    Router,
};
use dorothy_common::NodeInstancePath;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::node::{
    Controller, ControllerType, NodeConfig, NodeFailure, NodeManifest, NodeResult, NodeType,
};
use crate::orchestrator::Orchestrator;

pub const NODE_NAME: &str = "http";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7171;

#[derive(Debug, Clone, Deserialize)]
struct HttpSettings {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Build the API router over `orchestrator`
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Resources
        .route("/songs", get(handlers::get_all_songs))
        .route("/albums", get(handlers::get_all_albums))
        .route("/artists", get(handlers::get_all_artists))
        .route("/resources/:resource_id", get(handlers::get_resource))
        // Channels
        .route("/channels", get(handlers::list_channels))
        .route("/channels/:channel", get(handlers::get_channel))
        .route(
            "/channels/:channel/queue",
            get(handlers::get_queue).post(handlers::insert_to_queue),
        )
        .route(
            "/channels/:channel/queue/:position",
            delete(handlers::remove_from_queue),
        )
        .route(
            "/channels/:channel/queue/:position/play",
            post(handlers::play_from_queue),
        )
        .route("/channels/:channel/play", post(handlers::play))
        .route("/channels/:channel/pause", post(handlers::pause))
        .route("/channels/:channel/play_pause", post(handlers::play_pause))
        .route("/channels/:channel/stop", post(handlers::stop))
        .route("/channels/:channel/skip", post(handlers::skip))
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub struct HttpControllerType;

impl NodeType for HttpControllerType {
    fn node_manifest(&self) -> NodeManifest {
        NodeManifest::new(NODE_NAME)
            .with_default("host", DEFAULT_HOST)
            .with_default("port", i64::from(DEFAULT_PORT))
    }
}

impl ControllerType for HttpControllerType {
    fn build(
        &self,
        config: NodeConfig,
        path: NodeInstancePath,
        orchestrator: Arc<Orchestrator>,
    ) -> NodeResult<Box<dyn Controller>> {
        let settings: HttpSettings = toml::Value::Table(config)
            .try_into()
            .map_err(|e| NodeFailure::new(format!("invalid http config: {}", e)))?;

        Ok(Box::new(HttpController {
            path,
            settings,
            orchestrator,
            shutdown: None,
            server: None,
            local_addr: None,
        }))
    }
}

pub struct HttpController {
    path: NodeInstancePath,
    settings: HttpSettings,
    orchestrator: Arc<Orchestrator>,
    shutdown: Option<CancellationToken>,
    server: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl HttpController {
    /// Address the server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Controller for HttpController {
    async fn start(&mut self, shutdown: CancellationToken) -> NodeResult<()> {
        let bind_addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| NodeFailure::new(format!("failed to bind to {}: {}", bind_addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NodeFailure::new(e.to_string()))?;
        info!("[{}] Listening on http://{}", self.path, local_addr);

        let app = router(self.orchestrator.clone());
        let token = shutdown.clone();
        let path = self.path.clone();
        self.server = Some(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!("[{}] Server error: {}", path, e);
            }
        }));
        self.shutdown = Some(shutdown);
        self.local_addr = Some(local_addr);
        Ok(())
    }

    async fn cleanup(&mut self) -> NodeResult<()> {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }
        if let Some(server) = self.server.take() {
            server
                .await
                .map_err(|e| NodeFailure::new(format!("server task failed: {}", e)))?;
        }
        info!("[{}] HTTP server stopped", self.path);
        Ok(())
    }
}
