//! HTTP API for the rescue server.

use std::convert::Infallible;
use std::path::{Component, Path};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use rescue_run::{RunStatus, StreamEvent};
use rescue_scenario::ScenarioRequest;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::{Error, Result};
use crate::server::AppState;

/// Build the API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/get-map", get(get_map))
        .route("/api/start-simulation", post(start_simulation))
        .route("/api/pause-simulation", post(pause_simulation))
        .route("/api/stop-simulation", post(stop_simulation))
        .route("/api/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- Health ---

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "robot-simulation-backend",
    })
}

// --- Maps ---

#[derive(Debug, Deserialize)]
struct MapQuery {
    map_name: Option<String>,
}

/// Reject anything but a bare file name.
fn validate_map_name(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None)
            if part == name && !name.contains(['/', '\\', '\0']) =>
        {
            Ok(name)
        }
        _ => Err(Error::InvalidInput(format!("Invalid map name: {name}"))),
    }
}

async fn get_map(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MapQuery>,
) -> Result<impl IntoResponse> {
    let name = match query.map_name.as_deref() {
        Some(name) if !name.is_empty() => validate_map_name(name)?,
        _ => return Err(Error::InvalidInput("Map name required".into())),
    };

    let path = state.maps_dir().join(name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!("Map not found: {name}")));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

// --- Simulation control ---

/// Parse a JSON body, treating an empty body as `T::default()`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::InvalidInput(format!("Invalid JSON body: {e}")))
}

/// One SSE `data:` payload.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
enum WireEvent {
    Frame { frame: String },
    Status { status: &'static str },
    Error { error: String },
}

impl From<StreamEvent> for WireEvent {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::Frame(frame) => WireEvent::Frame {
                frame: base64::engine::general_purpose::STANDARD.encode(&frame.data),
            },
            StreamEvent::Completed { .. } => WireEvent::Status {
                status: "completed",
            },
            StreamEvent::Error { message } => WireEvent::Error { error: message },
        }
    }
}

fn sse_event(event: StreamEvent) -> Event {
    let wire = WireEvent::from(event);
    match serde_json::to_string(&wire) {
        Ok(json) => Event::default().data(json),
        Err(e) => Event::default().data(format!(r#"{{"error":"{e}"}}"#)),
    }
}

async fn start_simulation(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let request: ScenarioRequest = parse_body(&body)?;
    if let Some(name) = request.map_name.as_deref() {
        validate_map_name(name)?;
    }
    let scenario = state.builder().build_request(&request)?;

    info!(
        map = scenario.map_name().unwrap_or_default(),
        robots = scenario.robot_count(),
        survivors = request.survivors.len(),
        "Starting simulation"
    );

    let store = state.store().clone();
    let (scenario, saved) = tokio::task::spawn_blocking(move || {
        let saved = store.save(&scenario);
        (scenario, saved)
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    saved?;

    let frames = state.registry().start(scenario).await?;

    let events = frames.map(|event| Ok(sse_event(event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct PauseRequest {
    #[serde(default = "default_paused")]
    paused: bool,
}

impl Default for PauseRequest {
    fn default() -> Self {
        Self { paused: true }
    }
}

fn default_paused() -> bool {
    true
}

async fn pause_simulation(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StatusBody>> {
    let request: PauseRequest = parse_body(&body)?;
    state.registry().set_paused(request.paused).await?;
    Ok(Json(StatusBody {
        status: if request.paused { "paused" } else { "resumed" },
    }))
}

async fn stop_simulation(State(state): State<Arc<AppState>>) -> Result<Json<StatusBody>> {
    state.registry().stop().await?;
    Ok(Json(StatusBody { status: "stopped" }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    active: bool,
    paused: bool,
    step: u64,
    max_steps: u64,
}

impl From<RunStatus> for StatusResponse {
    fn from(status: RunStatus) -> Self {
        Self {
            active: status.active,
            paused: status.paused,
            step: status.step,
            max_steps: status.max_steps,
        }
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(state.registry().status().await.into())
}
