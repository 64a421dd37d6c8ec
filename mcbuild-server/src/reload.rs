//! Reload channel
//!
//! WebSocket server the game client connects to with `/connect host:port`.
//! Exactly one peer is active at a time; a new connection replaces the old one.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Router,
};
use futures::{SinkExt, StreamExt};
use mcbuild_core::{tellraw_notice, CommandRequest, CommandSink, ServerOptions};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

/// The connected game client
struct Peer {
    id: u64,
    /// Outbound frames, drained by the peer's writer task
    tx: mpsc::UnboundedSender<String>,
}

/// Connection state: `Disconnected` (no peer) or `Connected` (one peer)
#[derive(Default)]
struct Session {
    peer: Mutex<Option<Peer>>,
    next_id: AtomicU64,
}

impl Session {
    fn peer(&self) -> MutexGuard<'_, Option<Peer>> {
        self.peer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a new peer the active one; the previous peer's queue is dropped
    fn connect(&self, tx: mpsc::UnboundedSender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let previous = self.peer().replace(Peer { id, tx });
        if let Some(previous) = previous {
            tracing::debug!("Peer {} replaced by peer {}", previous.id, id);
        }
        id
    }

    /// Forget a peer, unless it has already been replaced
    fn disconnect(&self, id: u64) {
        let mut peer = self.peer();
        if peer.as_ref().map(|p| p.id) == Some(id) {
            *peer = None;
        }
    }

    fn is_connected(&self) -> bool {
        self.peer().is_some()
    }

    fn send_command(&self, command: &str) {
        let peer = self.peer();
        let Some(peer) = peer.as_ref() else {
            tracing::trace!("No client connected, dropping command: {}", command);
            return;
        };

        match CommandRequest::new(command).to_frame() {
            Ok(frame) => {
                if peer.tx.send(frame).is_err() {
                    tracing::debug!("Peer {} is gone, dropping command", peer.id);
                }
            }
            Err(e) => tracing::warn!("Failed to encode command request: {}", e),
        }
    }
}

/// Fire-and-forget command channel to the game client
#[derive(Clone, Default)]
pub struct ReloadChannel {
    session: Arc<Session>,
}

impl ReloadChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the listener on every interface and start accepting peers
    ///
    /// `options.host` is only used in the connection hint. Call at most once.
    pub async fn start(&self, options: &ServerOptions) -> anyhow::Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", options.port)).await?;
        let addr = listener.local_addr()?;
        let router = create_router(self.session.clone());

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Reload server error: {}", e);
            }
        });

        tracing::info!("Reload server listening on {}", addr);
        println!(
            "WSServer running on ws://{host}:{port}.\nType \"/connect {host}:{port}\" to connect.",
            host = options.host,
            port = addr.port()
        );

        Ok(addr)
    }

    /// Whether a game client is currently attached
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }
}

impl CommandSink for ReloadChannel {
    fn send(&self, command: &str) {
        self.session.send_command(command);
    }
}

/// The game connects to the bare host:port, so every path upgrades
fn create_router(session: Arc<Session>) -> Router {
    Router::new()
        .fallback(handle_upgrade)
        .with_state(session)
        .layer(TraceLayer::new_for_http())
}

async fn handle_upgrade(
    ws: WebSocketUpgrade,
    State(session): State<Arc<Session>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_peer(socket, session))
}

async fn handle_peer(socket: WebSocket, session: Arc<Session>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let id = session.connect(tx);
    println!("[Websocket] connected");
    session.send_command(&tellraw_notice("connected"));

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                tracing::debug!("Send to peer failed: {}", e);
                return;
            }
        }
        // Replaced by a newer peer
        let _ = sink.send(Message::Close(None)).await;
    });

    // The game answers every command with a commandResponse; nothing to act on
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => tracing::trace!("Peer {}: {}", id, text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Peer {} read error: {}", id, e);
                break;
            }
        }
    }

    session.disconnect(id);
    writer.abort();
    tracing::info!("Peer {} disconnected", id);
}
