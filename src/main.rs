use axum::http::Method;
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use log;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use stoneroom::config::ServerConfig;
use stoneroom::registry::RoomSummary;
use stoneroom::{GameError, GameState, RoomId, RoomRegistry, Variant, WebSocketService, VERSION};

#[derive(Debug, Default, Deserialize)]
struct CreateRoomRequest {
    #[serde(default)]
    variant: Variant,
}

#[derive(Debug, Serialize)]
struct CreateRoomResponse {
    room_id: RoomId,
    variant: Variant,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    version: &'static str,
    active_connections: usize,
    active_rooms: usize,
    rooms: Vec<RoomSummary>,
}

// Application state
struct AppState {
    registry: RoomRegistry,
    websocket: WebSocketService,
}

type SharedState = Arc<AppState>;

// API Routes

async fn hello_world() -> &'static str {
    "Hello from the stoneroom backend!"
}

// Create a room without opening a socket
async fn create_room(
    State(state): State<SharedState>,
    body: Option<Json<CreateRoomRequest>>,
) -> Json<CreateRoomResponse> {
    let Json(request) = body.unwrap_or_default();
    let room_id = state.registry.create_room(request.variant).await;
    Json(CreateRoomResponse {
        room_id,
        variant: request.variant,
    })
}

async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<GameState>, StatusCode> {
    log::info!("Getting room with ID: {}", room_id);

    match state.registry.snapshot(&room_id).await {
        Ok(game_state) => Ok(Json(game_state)),
        Err(GameError::RoomNotFound { .. }) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            log::error!("Failed to read room {}: {}", room_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let rooms = state.registry.summaries().await;
    Json(StatusResponse {
        status: "ok",
        version: VERSION,
        active_connections: state.websocket.active_connections(),
        active_rooms: rooms.len(),
        rooms,
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    let service = state.websocket.clone();
    ws.on_upgrade(move |socket| async move { service.handle_connection(socket).await })
}

fn spawn_stats_ticker(state: SharedState, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            log::info!(
                "{} active connections, {} active rooms",
                state.websocket.active_connections(),
                state.registry.room_count().await
            );
        }
    });
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    let registry = RoomRegistry::new(config.registry_config());
    let state = Arc::new(AppState {
        websocket: WebSocketService::new(registry.clone()),
        registry,
    });

    if let Some(every) = config.stats_interval() {
        spawn_stats_ticker(state.clone(), every);
    }

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    let app = Router::new()
        .route("/", get(hello_world))
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}", get(get_room))
        .route("/api/status", get(status))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    log::info!(
        "Starting stoneroom backend v{} on {} (grace period {}s, komi {})",
        VERSION,
        config.bind_addr(),
        config.grace_period_secs,
        config.komi
    );
    axum::serve(listener, app).await
}
