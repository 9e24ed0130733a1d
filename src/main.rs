//! Roomcast 채팅방 서버

mod config;
mod error;
mod handlers;
mod identity;
mod protocol;
mod registry;
mod state;
mod store;
#[cfg(test)]
mod test_support;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use config::Config;
use futures::{SinkExt, StreamExt};
use identity::{Identity, IdentityQuery};
use protocol::{ClientMessage, ServerMessage};
use state::AppState;
use std::sync::Arc;
use store::SqliteStore;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = SqliteStore::connect(&config.database).await?;
    let state = Arc::new(AppState::new(config.clone(), Arc::new(store)));

    let app = app(state).layer(cors_layer(&config));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Roomcast server started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Roomcast server stopped");
    Ok(())
}

/// 라우터 설정
fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route(
            "/rooms",
            get(handlers::http::list_rooms).post(handlers::http::create_room),
        )
        .route("/rooms/:room_id", delete(handlers::http::delete_room))
        .route(
            "/rooms/:room_id/messages",
            get(handlers::http::list_messages).post(handlers::http::post_message),
        )
        .route("/users/sync", post(handlers::http::sync_user))
        .route(
            "/users/:email",
            get(handlers::http::get_user).patch(handlers::http::update_user),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS 설정
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Roomcast Chat Server</h1><p>WebSocket endpoint: /ws</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "roomcast",
        "rooms": state.registry.len(),
        "connections": state.peers.len(),
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<IdentityQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let identity = Identity::from_headers(&headers).or_else(|| query.into_identity());
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: Option<Identity>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config.delivery.outbound_buffer);

    // 연결 처리
    let peer_id = handlers::connection::handle_connection(&state, tx, identity).await;

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode event"),
            }
        }
    });

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(&state, &peer_id, msg).await,
                Err(e) => {
                    tracing::debug!(peer_id = %peer_id, error = %e, "Malformed client message");
                    handlers::broadcast::send_to_peer(
                        &state,
                        &peer_id,
                        ServerMessage::Error {
                            code: "invalid_request".to_string(),
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // 연결 해제
    handlers::connection::handle_disconnect(&state, &peer_id).await;
    send_task.abort();
}

async fn handle_client_message(state: &Arc<AppState>, peer_id: &str, msg: ClientMessage) {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::connection::handle_heartbeat(state, peer_id).await;
        }
        ClientMessage::JoinRoom { room_id } => {
            handlers::connection::handle_join_room(state, peer_id, &room_id).await;
        }
        ClientMessage::LeaveRoom { room_id } => {
            handlers::membership::on_leave(state, peer_id, &room_id).await;
        }
        ClientMessage::SendMessage { room_id, content } => {
            handlers::connection::handle_send_message(state, peer_id, &room_id, &content).await;
        }
    }
}
