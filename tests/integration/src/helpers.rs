//! Test helpers for integration tests
//!
//! Provides a scriptable WebSocket server that records every frame the
//! clients send, can push frames and drop connections, and answers RPC
//! identify requests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use panel_common::EndpointConfig;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Channel name the RPC socket is served under
pub const RPC_CHANNEL: &str = "obs";

enum ServerCommand {
    Frame(String),
    Close(u16, String),
    Drop,
}

struct Connection {
    channel: String,
    tx: mpsc::UnboundedSender<ServerCommand>,
}

#[derive(Default)]
struct ServerState {
    received: Mutex<Vec<(String, Value)>>,
    connections: Mutex<Vec<Connection>>,
    accepted: Mutex<HashMap<String, usize>>,
    /// Close code sent in answer to an identify; acknowledged when `None`
    reject_identify: Mutex<Option<u16>>,
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server on an ephemeral port
    pub async fn start() -> Result<Self> {
        let state = Arc::new(ServerState::default());
        let app = Router::new()
            .route("/websockets/:channel", get(upgrade))
            .with_state(state.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Endpoint settings pointing the clients at this server
    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            secure: false,
        }
    }

    pub fn channel_url(&self, channel: &str) -> String {
        self.endpoint().channel_url(channel)
    }

    /// Frames received on `channel`, oldest first
    pub fn received(&self, channel: &str) -> Vec<Value> {
        self.state
            .received
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// Number of connections ever accepted on `channel`
    pub fn accepted(&self, channel: &str) -> usize {
        self.state.accepted.lock().get(channel).copied().unwrap_or(0)
    }

    /// Send a frame to every open connection on `channel`
    pub fn push<T: Serialize>(&self, channel: &str, frame: &T) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        self.for_each_connection(channel, || ServerCommand::Frame(text.clone()));
        Ok(())
    }

    /// Close every connection on `channel` with a close frame
    pub fn close(&self, channel: &str, code: u16, reason: &str) {
        self.for_each_connection(channel, || ServerCommand::Close(code, reason.to_string()));
    }

    /// Drop every connection on `channel` without a close handshake
    pub fn drop_connections(&self, channel: &str) {
        self.for_each_connection(channel, || ServerCommand::Drop);
    }

    /// Answer the next identify requests with a close code instead of an ack
    pub fn reject_identify(&self, code: Option<u16>) {
        *self.state.reject_identify.lock() = code;
    }

    fn for_each_connection(&self, channel: &str, command: impl Fn() -> ServerCommand) {
        self.state
            .connections
            .lock()
            .retain(|conn| conn.channel != channel || conn.tx.send(command()).is_ok());
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| serve(state, channel, socket))
}

async fn serve(state: Arc<ServerState>, channel: String, socket: WebSocket) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    *state.accepted.lock().entry(channel.clone()).or_default() += 1;
    state.connections.lock().push(Connection {
        channel: channel.clone(),
        tx: tx.clone(),
    });

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };

                if channel == RPC_CHANNEL && frame["op"] == 1 {
                    let answer = match *state.reject_identify.lock() {
                        Some(code) => ServerCommand::Close(code, "Authentication failed.".to_string()),
                        None => ServerCommand::Frame(
                            json!({"op": 2, "d": {"negotiatedRpcVersion": 1}}).to_string(),
                        ),
                    };
                    tx.send(answer).ok();
                }
                state.received.lock().push((channel.clone(), frame));
            }
            command = rx.recv() => match command {
                Some(ServerCommand::Frame(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(ServerCommand::Close(code, reason)) => {
                    let frame = CloseFrame { code, reason: reason.into() };
                    sink.send(Message::Close(Some(frame))).await.ok();
                    break;
                }
                Some(ServerCommand::Drop) | None => break,
            }
        }
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Address nothing is listening on
pub async fn unused_addr() -> Result<SocketAddr> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    Ok(listener.local_addr()?)
}

/// Fresh snapshot directory under the system temp dir
pub fn temp_snapshot_dir() -> PathBuf {
    std::env::temp_dir().join(format!("panel-link-it-{}", uuid::Uuid::new_v4()))
}
