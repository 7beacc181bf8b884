use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tungstenite::client::IntoClientRequest;
use tungstenite::protocol::Message as WsMessage;

use super::PostMessageTransport;
use super::websocket::{ANY_ORIGIN, WebSocketTransport, serve};
use crate::broker::{
    CLIENT_SUBSCRIBED, CLIENT_UNSUBSCRIBED, Envelope, EnvelopeBuilder, EnvelopeKind,
    MessageBrokerEngine,
};
use crate::client::FrameHandle;
use crate::config::BrokerSettings;
use crate::utils::TransportError;

const FRAME_ORIGIN: &str = "https://app.example";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[test]
fn test_send_to_unknown_frame_fails() {
    let transport = WebSocketTransport::new();
    let envelope = EnvelopeBuilder::new("svc").request("c1", "A", "chat", None, None);

    let result =
        transport.send_to_client(&envelope, &FrameHandle::new("gone"), ANY_ORIGIN, false);
    assert!(matches!(result, Err(TransportError::Closed { frame }) if frame == "gone"));
}

#[test]
fn test_send_checks_target_origin() {
    let transport = WebSocketTransport::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let frame = FrameHandle::new("f1");
    transport.register(frame.clone(), FRAME_ORIGIN, tx);
    let envelope = EnvelopeBuilder::new("svc").request("c1", "A", "chat", Some(json!(1)), None);

    let mismatch = transport.send_to_client(&envelope, &frame, "https://evil.example", false);
    assert!(matches!(mismatch, Err(TransportError::OriginMismatch { .. })));
    assert!(rx.try_recv().is_err());

    transport
        .send_to_client(&envelope, &frame, FRAME_ORIGIN, false)
        .unwrap();
    transport
        .send_to_client(&envelope, &frame, ANY_ORIGIN, false)
        .unwrap();

    let WsMessage::Text(text) = rx.try_recv().unwrap() else {
        panic!("Expected a text message");
    };
    let received: Envelope = serde_json::from_str(&text).unwrap();
    assert_eq!(received, envelope);
    assert!(rx.try_recv().is_ok());
}

#[test]
fn test_unregister_closes_frame() {
    let transport = WebSocketTransport::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let frame = FrameHandle::new("f1");
    transport.register(frame.clone(), FRAME_ORIGIN, tx);
    assert_eq!(transport.frame_count(), 1);

    transport.unregister(&frame);
    assert_eq!(transport.frame_count(), 0);
    // The only sender was dropped, so the writer side sees the end.
    assert!(matches!(
        rx.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

#[test]
fn test_client_ownership_follows_last_connect() {
    let transport = WebSocketTransport::new();
    let f1 = FrameHandle::new("f1");
    let f2 = FrameHandle::new("f2");

    transport.claim_client("A", &f1);
    transport.claim_client("B", &f1);
    transport.claim_client("A", &f2);
    assert_eq!(transport.owner_of("A"), Some(f2.clone()));

    let mut released = transport.release_frame(&f1);
    released.sort();
    assert_eq!(released, vec!["B".to_string()]);
    assert_eq!(transport.owner_of("B"), None);

    transport.release_client("A");
    assert_eq!(transport.owner_of("A"), None);
    assert!(transport.release_frame(&f2).is_empty());
}

struct Bridge {
    addr: String,
    engine: Arc<Mutex<MessageBrokerEngine>>,
    transport: Arc<WebSocketTransport>,
}

async fn start_bridge() -> Bridge {
    let settings = BrokerSettings {
        accepted_origins: vec![FRAME_ORIGIN.to_string()],
        ..BrokerSettings::default()
    };
    let transport = Arc::new(WebSocketTransport::new());
    let engine = Arc::new(Mutex::new(MessageBrokerEngine::new(
        &settings,
        transport.clone(),
    )));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, engine.clone(), transport.clone()));
    Bridge {
        addr,
        engine,
        transport,
    }
}

async fn open_frame(addr: &str, origin: &str) -> Result<WsStream, tungstenite::Error> {
    let mut request = addr.into_client_request()?;
    request
        .headers_mut()
        .insert("Origin", origin.parse().unwrap());
    let (ws, _) = connect_async(request).await?;
    Ok(ws)
}

async fn send(ws: &mut WsStream, message: Value) {
    ws.send(WsMessage::text(message.to_string()))
        .await
        .expect("Failed to send");
}

async fn next_envelope(ws: &mut WsStream) -> Envelope {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("Timed out waiting for envelope")
        .expect("Stream ended")
        .expect("WebSocket error");
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

fn lifecycle(request_id: &str, client_id: &str, message_name: &str) -> Value {
    json!({
        "type": "request",
        "request_id": request_id,
        "service": "sap.ushell.services.MessageBroker",
        "body": {
            "clientId": client_id,
            "messageName": message_name,
            "subscribedChannels": [{ "channelId": "room1" }]
        }
    })
}

async fn join(ws: &mut WsStream, client_id: &str) -> Envelope {
    send(ws, lifecycle("r1", client_id, "connect")).await;
    let connected = next_envelope(ws).await;
    assert_eq!(connected.kind, EnvelopeKind::Response);
    assert_eq!(connected.body.message_name, "connect");

    send(ws, lifecycle("r2", client_id, "subscribe")).await;
    next_envelope(ws).await
}

#[tokio::test]
async fn test_rejects_unknown_origin() {
    let Bridge { addr, .. } = start_bridge().await;

    match open_frame(&addr, "https://evil.example").await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 403),
        Err(e) => panic!("Expected an HTTP rejection, got {e}"),
        Ok(_) => panic!("Expected the handshake to be rejected"),
    }
}

#[tokio::test]
async fn test_frames_exchange_messages() {
    let Bridge { addr, engine, .. } = start_bridge().await;
    let mut f1 = open_frame(&addr, FRAME_ORIGIN).await.unwrap();
    let mut f2 = open_frame(&addr, FRAME_ORIGIN).await.unwrap();

    let subscribed = join(&mut f1, "F1").await;
    assert_eq!(subscribed.request_id, "r2");
    assert_eq!(subscribed.body.active_clients, Some(vec![]));

    let subscribed = join(&mut f2, "F2").await;
    let active = subscribed.body.active_clients.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].client_id, "F1");

    let event = next_envelope(&mut f1).await;
    assert_eq!(event.body.message_name, CLIENT_SUBSCRIBED);
    assert_eq!(event.body.client_id, "F2");

    send(
        &mut f1,
        json!({
            "type": "request",
            "request_id": "r3",
            "service": "sap.ushell.services.MessageBroker",
            "body": {
                "clientId": "F1",
                "channelId": "room1",
                "messageName": "chat",
                "requestId": "m1",
                "targetClientIds": ["*"],
                "data": { "text": "hi" }
            }
        }),
    )
    .await;

    let delivered = next_envelope(&mut f2).await;
    assert_eq!(delivered.kind, EnvelopeKind::Request);
    assert_eq!(delivered.body.client_id, "F1");
    assert_eq!(delivered.body.channel_id, "room1");
    assert_eq!(delivered.body.message_name, "chat");
    assert_eq!(delivered.body.data, Some(json!({ "text": "hi" })));

    f1.close(None).await.unwrap();

    let gone = next_envelope(&mut f2).await;
    assert_eq!(gone.body.message_name, CLIENT_UNSUBSCRIBED);
    assert_eq!(gone.body.client_id, "F1");
    assert!(!engine.lock().unwrap().is_connected("F1"));
    assert!(engine.lock().unwrap().is_connected("F2"));
}

#[tokio::test]
async fn test_invalid_requests_get_no_response() {
    let Bridge { addr, engine, .. } = start_bridge().await;
    let mut f1 = open_frame(&addr, FRAME_ORIGIN).await.unwrap();

    f1.send(WsMessage::text("not json")).await.unwrap();
    // Subscribing before connecting fails and is not acknowledged.
    send(&mut f1, lifecycle("r1", "F1", "subscribe")).await;
    send(&mut f1, lifecycle("r2", "F1", "connect")).await;

    let response = next_envelope(&mut f1).await;
    assert_eq!(response.request_id, "r2");
    assert_eq!(response.body.message_name, "connect");
    assert!(engine.lock().unwrap().channel_members("room1").is_none());
}

#[tokio::test]
async fn test_closing_frame_keeps_clients_reconnected_elsewhere() {
    let Bridge {
        addr,
        engine,
        transport,
    } = start_bridge().await;
    let mut f1 = open_frame(&addr, FRAME_ORIGIN).await.unwrap();
    let mut f2 = open_frame(&addr, FRAME_ORIGIN).await.unwrap();

    send(&mut f1, lifecycle("r1", "X", "connect")).await;
    assert_eq!(next_envelope(&mut f1).await.body.message_name, "connect");

    // X moves to f2: disconnected there, then connected and subscribed again.
    send(&mut f2, lifecycle("r2", "X", "disconnect")).await;
    assert_eq!(next_envelope(&mut f2).await.body.message_name, "disconnect");
    let subscribed = join(&mut f2, "X").await;
    assert_eq!(subscribed.body.message_name, "subscribe");

    f1.close(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while transport.frame_count() > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timed out waiting for the frame to close");

    let engine = engine.lock().unwrap();
    assert!(engine.is_connected("X"));
    assert_eq!(engine.channel_members("room1"), Some(vec!["X".to_string()]));
}
