//! A stand-in for the donation server, used by the tests.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// What the server does with one connection: send `frames`, then either hang
/// up or keep the socket open until the client leaves.
#[derive(Clone)]
pub struct Script {
    frames: Vec<String>,
    hang_up: bool,
}

impl Script {
    pub fn hold(frames: Vec<String>) -> Self {
        Self {
            frames,
            hang_up: false,
        }
    }

    pub fn hang_up(frames: Vec<String>) -> Self {
        Self {
            frames,
            hang_up: true,
        }
    }
}

pub struct ServerState {
    scripts: Vec<Script>,
    pub connections: AtomicUsize,
    /// Hang-ups the client answered with its own close frame.
    pub close_replies: AtomicUsize,
    pub test_donations: AtomicUsize,
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
}

impl MockServer {
    pub fn page_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Serves `/ws`, `/feed/ws` and `/test-donation` on an ephemeral port. The
/// n-th socket connection plays `scripts[n]`; later ones replay the last.
pub async fn spawn(scripts: Vec<Script>) -> MockServer {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(ServerState {
        scripts,
        connections: AtomicUsize::new(0),
        close_replies: AtomicUsize::new(0),
        test_donations: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/ws", get(ws_route))
        .route("/feed/ws", get(ws_route))
        .route("/test-donation", post(test_donation))
        .with_state(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer { addr, state }
}

/// An http url nothing is listening on.
pub async fn unused_page_url() -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// An http url that accepts TCP connections but never answers the upgrade.
pub async fn silent_page_url() -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("http://{addr}")
}

async fn ws_route(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let index = state.connections.fetch_add(1, Ordering::SeqCst);
    let script = state
        .scripts
        .get(index)
        .or_else(|| state.scripts.last())
        .cloned()
        .unwrap_or_else(|| Script::hold(Vec::new()));
    ws.on_upgrade(move |socket| play(socket, script, state))
}

async fn play(mut socket: WebSocket, script: Script, state: Arc<ServerState>) {
    for frame in script.frames {
        if socket.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }
    if script.hang_up {
        let _ = socket.send(Message::Close(None)).await;
        if let Some(Ok(Message::Close(_))) = socket.recv().await {
            state.close_replies.fetch_add(1, Ordering::SeqCst);
        }
        return;
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if let Message::Close(_) = msg {
            break;
        }
    }
}

async fn test_donation(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    state.test_donations.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "status": "ok", "message": "Test donation sent" }))
}
