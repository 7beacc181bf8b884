//! WebSocket bridge
//!
//! Responsibilities:
//! - Accept TCP/WebSocket connections whose `Origin` is in the engine's
//!   origin registry; every accepted connection gets its own `FrameHandle`
//! - Decode inbound text frames as request envelopes and hand them to the
//!   request router
//! - Implement `PostMessageTransport` by queueing JSON text on the target
//!   connection's writer task
//! - Track which connection owns each connected client id, and disconnect
//!   the ids a connection still owns once it closes, so peers learn that
//!   those clients are gone

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, error, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::http::header::ORIGIN;
use tungstenite::protocol::Message as WsMessage;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::broker::router::{CONNECT, DISCONNECT};
use crate::broker::{Envelope, MessageBrokerEngine, PostMessage};
use crate::client::{ClientId, FrameHandle};
use crate::transport::PostMessageTransport;
use crate::utils::TransportError;

/// Origin accepted by `send_to_client` regardless of the frame's origin.
pub const ANY_ORIGIN: &str = "*";

#[derive(Debug)]
struct FrameSink {
    origin: String,
    sender: UnboundedSender<WsMessage>,
}

/// Outbound half of the bridge: one queue per open connection, plus the
/// connection each connected client id was last connected through.
#[derive(Debug, Default)]
pub struct WebSocketTransport {
    frames: Mutex<HashMap<FrameHandle, FrameSink>>,
    owners: Mutex<HashMap<ClientId, FrameHandle>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, frame: FrameHandle, origin: &str, sender: UnboundedSender<WsMessage>) {
        self.frames().insert(
            frame,
            FrameSink {
                origin: origin.to_string(),
                sender,
            },
        );
    }

    /// Dropping the queue sender ends the connection's writer task.
    pub fn unregister(&self, frame: &FrameHandle) {
        self.frames().remove(frame);
    }

    pub fn frame_count(&self) -> usize {
        self.frames().len()
    }

    pub fn claim_client(&self, client_id: &str, frame: &FrameHandle) {
        self.owners().insert(client_id.to_string(), frame.clone());
    }

    pub fn release_client(&self, client_id: &str) {
        self.owners().remove(client_id);
    }

    pub fn owner_of(&self, client_id: &str) -> Option<FrameHandle> {
        self.owners().get(client_id).cloned()
    }

    /// Forget every client id owned by `frame` and return them.
    pub fn release_frame(&self, frame: &FrameHandle) -> Vec<ClientId> {
        let mut owners = self.owners();
        let owned: Vec<ClientId> = owners
            .iter()
            .filter(|(_, owner)| *owner == frame)
            .map(|(client_id, _)| client_id.clone())
            .collect();
        for client_id in &owned {
            owners.remove(client_id);
        }
        owned
    }

    fn owners(&self) -> MutexGuard<'_, HashMap<ClientId, FrameHandle>> {
        self.owners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn frames(&self) -> MutexGuard<'_, HashMap<FrameHandle, FrameSink>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PostMessageTransport for WebSocketTransport {
    fn send_to_client(
        &self,
        envelope: &Envelope,
        frame: &FrameHandle,
        target_origin: &str,
        _wait_for_response: bool,
    ) -> Result<(), TransportError> {
        let text = serde_json::to_string(envelope)?;
        let frames = self.frames();
        let Some(sink) = frames.get(frame) else {
            return Err(TransportError::Closed {
                frame: frame.to_string(),
            });
        };
        if target_origin != ANY_ORIGIN && target_origin != sink.origin {
            return Err(TransportError::OriginMismatch {
                expected: target_origin.to_string(),
                actual: sink.origin.clone(),
            });
        }
        sink.sender
            .send(WsMessage::text(text))
            .map_err(|_| TransportError::Closed {
                frame: frame.to_string(),
            })
    }
}

fn lock_engine(engine: &Mutex<MessageBrokerEngine>) -> MutexGuard<'_, MessageBrokerEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

pub async fn start_websocket_server(
    addr: String,
    engine: Arc<Mutex<MessageBrokerEngine>>,
    transport: Arc<WebSocketTransport>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket bridge listening on ws://{addr}");
    serve(listener, engine, transport).await;
    Ok(())
}

/// Accept connections on an already bound listener until it fails.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<Mutex<MessageBrokerEngine>>,
    transport: Arc<WebSocketTransport>,
) {
    while let Ok((stream, peer)) = listener.accept().await {
        let engine = engine.clone();
        let transport = transport.clone();
        spawn(handle_connection(stream, peer, engine, transport));
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<Mutex<MessageBrokerEngine>>,
    transport: Arc<WebSocketTransport>,
) {
    let mut origin = format!("ws://{peer}");
    let check_origin = |request: &Request, response: Response| {
        if let Some(value) = request.headers().get(ORIGIN).and_then(|v| v.to_str().ok()) {
            origin = value.to_string();
        }
        if lock_engine(&engine).origins().is_accepted(&origin) {
            Ok(response)
        } else {
            warn!("Rejected connection from {peer}: origin {origin} is not accepted");
            let mut rejection = ErrorResponse::new(Some("origin not accepted".to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            Err(rejection)
        }
    };

    let ws_stream = match accept_hdr_async(stream, check_origin).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("WebSocket handshake with {peer} failed: {e}");
            return;
        }
    };

    let frame = FrameHandle::random();
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    transport.register(frame.clone(), &origin, tx);
    info!("Frame {frame} opened from {origin}");

    {
        let frame = frame.clone();
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    error!("Failed to write to frame {frame}: {e}");
                    break;
                }
            }
            debug!("Send loop closed for frame {frame}");
        });
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };
        let envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    "Invalid envelope on frame {frame}: {err} | {}",
                    text.chars().take(100).collect::<String>()
                );
                continue;
            }
        };

        let message_name = envelope.body.message_name.clone();
        let client_id = envelope.body.client_id.clone();
        // Ownership changes under the engine lock so they stay in step with
        // the connected set.
        let mut broker = lock_engine(&engine);
        let result = broker.process_post_message(PostMessage {
            envelope,
            origin: origin.clone(),
            source: Some(frame.clone()),
        });

        match result {
            Ok(()) if message_name == CONNECT => transport.claim_client(&client_id, &frame),
            Ok(()) if message_name == DISCONNECT => transport.release_client(&client_id),
            Ok(()) => {}
            Err(e) => warn!("{message_name} from {client_id} on frame {frame} failed: {e}"),
        }
    }

    {
        let mut broker = lock_engine(&engine);
        for client_id in transport.release_frame(&frame) {
            if let Err(e) = broker.disconnect(&client_id) {
                debug!("Cleanup of {client_id} skipped: {e}");
            }
        }
    }
    transport.unregister(&frame);
    info!("Frame {frame} closed");
}
