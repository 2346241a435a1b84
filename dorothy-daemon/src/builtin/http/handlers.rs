//! HTTP request handlers
//!
//! Thin adapters from REST calls to orchestrator operations.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use dorothy_common::{Album, Artist, ResourceId, ResourceKind, Song};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::channel::{ChannelState, PlayPauseOutcome};
use crate::error::Error;
use crate::orchestrator::Orchestrator;

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: usize,
    pub channels: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceResponse {
    Song(Song),
    Album(Album),
    Artist(Artist),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelListResponse {
    pub channels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub name: String,
    pub state: ChannelState,
    pub current_song: Option<Song>,
    /// Play time of the current song in seconds
    pub elapsed: Option<f64>,
    pub queue: Vec<Song>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelStateResponse {
    pub state: ChannelState,
}

#[derive(Debug, Deserialize)]
pub struct InsertRequest {
    pub resource_id: String,
    #[serde(default)]
    pub position: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InsertResponse {
    pub inserted: usize,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(StatusResponse {
            status: message.into(),
        }),
    )
}

/// Map daemon errors onto HTTP statuses
fn api_error(error: Error) -> ApiError {
    let status = match &error {
        Error::ChannelNotFound(_) => StatusCode::NOT_FOUND,
        Error::Common(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!("Request failed: {}", error);
    }
    error_response(status, format!("error: {}", error))
}

fn parse_resource_id(raw: &str) -> Result<ResourceId, ApiError> {
    ResourceId::deserialize(raw).map_err(|e| {
        debug!("Rejected resource id {:?}: {}", raw, e);
        api_error(Error::Common(e))
    })
}

async fn channel_state(orchestrator: &Orchestrator, channel: &str) -> ApiResult<ChannelStateResponse> {
    let state = orchestrator.get_channel_state(channel).await.map_err(api_error)?;
    Ok(Json(ChannelStateResponse { state }))
}

// ============================================================================
// Health
// ============================================================================

/// GET /health
pub async fn health(State(orchestrator): State<Arc<Orchestrator>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: orchestrator.provider_paths().await.len(),
        channels: orchestrator.get_channel_names().await.len(),
    })
}

// ============================================================================
// Resources
// ============================================================================

/// GET /songs
pub async fn get_all_songs(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Vec<Song>> {
    Json(orchestrator.get_all_songs().await)
}

/// GET /albums
pub async fn get_all_albums(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Vec<Album>> {
    Json(orchestrator.get_all_albums().await)
}

/// GET /artists
pub async fn get_all_artists(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Vec<Artist>> {
    Json(orchestrator.get_all_artists().await)
}

/// GET /resources/:resource_id
pub async fn get_resource(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(resource_id): Path<String>,
) -> ApiResult<ResourceResponse> {
    let id = parse_resource_id(&resource_id)?;

    let resource = match id.kind {
        ResourceKind::Song => orchestrator.get_song(&id).await.map(ResourceResponse::Song),
        ResourceKind::Album => orchestrator.get_album(&id).await.map(ResourceResponse::Album),
        ResourceKind::Artist => orchestrator.get_artist(&id).await.map(ResourceResponse::Artist),
    };

    resource
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("resource not found: {}", id)))
}

// ============================================================================
// Channels
// ============================================================================

/// GET /channels
pub async fn list_channels(State(orchestrator): State<Arc<Orchestrator>>) -> Json<ChannelListResponse> {
    Json(ChannelListResponse {
        channels: orchestrator.get_channel_names().await,
    })
}

/// GET /channels/:channel
pub async fn get_channel(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(channel): Path<String>,
) -> ApiResult<ChannelResponse> {
    let snapshot = orchestrator.get_channel_snapshot(&channel).await.map_err(api_error)?;

    Ok(Json(ChannelResponse {
        name: snapshot.name,
        state: snapshot.state,
        current_song: snapshot.current_song,
        elapsed: snapshot.elapsed.map(|d| d.as_secs_f64()),
        queue: snapshot.queue,
    }))
}

/// GET /channels/:channel/queue
pub async fn get_queue(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(channel): Path<String>,
) -> ApiResult<Vec<Song>> {
    orchestrator.get_queue(&channel).await.map(Json).map_err(api_error)
}

/// POST /channels/:channel/queue
pub async fn insert_to_queue(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(channel): Path<String>,
    Json(request): Json<InsertRequest>,
) -> ApiResult<InsertResponse> {
    let id = parse_resource_id(&request.resource_id)?;
    let inserted = orchestrator
        .insert_to_queue(&channel, &id, request.position)
        .await
        .map_err(api_error)?;
    Ok(Json(InsertResponse { inserted }))
}

/// DELETE /channels/:channel/queue/:position
pub async fn remove_from_queue(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path((channel, position)): Path<(String, usize)>,
) -> ApiResult<Vec<Song>> {
    orchestrator
        .remove_from_queue(&channel, position)
        .await
        .map_err(api_error)?;
    orchestrator.get_queue(&channel).await.map(Json).map_err(api_error)
}

/// POST /channels/:channel/queue/:position/play
pub async fn play_from_queue(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path((channel, position)): Path<(String, usize)>,
) -> ApiResult<ChannelStateResponse> {
    orchestrator
        .play_from_queue_given_index(&channel, position)
        .await
        .map_err(api_error)?;
    channel_state(&orchestrator, &channel).await
}

/// POST /channels/:channel/play
pub async fn play(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(channel): Path<String>,
) -> ApiResult<ChannelStateResponse> {
    orchestrator.play(&channel).await.map_err(api_error)?;
    channel_state(&orchestrator, &channel).await
}

/// POST /channels/:channel/pause
pub async fn pause(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(channel): Path<String>,
) -> ApiResult<ChannelStateResponse> {
    orchestrator.pause(&channel).await.map_err(api_error)?;
    channel_state(&orchestrator, &channel).await
}

/// POST /channels/:channel/play_pause
pub async fn play_pause(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(channel): Path<String>,
) -> ApiResult<PlayPauseOutcome> {
    orchestrator.play_pause(&channel).await.map(Json).map_err(api_error)
}

/// POST /channels/:channel/stop
pub async fn stop(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(channel): Path<String>,
) -> ApiResult<ChannelStateResponse> {
    orchestrator.stop(&channel).await.map_err(api_error)?;
    channel_state(&orchestrator, &channel).await
}

/// POST /channels/:channel/skip
pub async fn skip(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(channel): Path<String>,
) -> ApiResult<ChannelStateResponse> {
    orchestrator.skip(&channel).await.map_err(api_error)?;
    channel_state(&orchestrator, &channel).await
}
