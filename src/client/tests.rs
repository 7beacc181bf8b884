use super::record::{ChannelDescriptor, ClientTransport, FrameHandle, SubscriptionEntry};
use serde_json::json;

#[test]
fn test_frame_handle_random_is_unique() {
    let a = FrameHandle::random();
    let b = FrameHandle::random();
    assert!(!a.as_str().is_empty());
    assert_ne!(a, b);
}

#[test]
fn test_transport_variants() {
    let local = ClientTransport::same_process(|_, _, _, _| {}, |_, _, _| {});
    assert!(local.is_same_process());

    let frame = ClientTransport::iframe(FrameHandle::new("f1"), "https://app.example");
    assert!(!frame.is_same_process());
    assert_eq!(
        format!("{frame:?}"),
        "Iframe { handle: FrameHandle(\"f1\"), origin: \"https://app.example\" }"
    );
}

#[test]
fn test_subscription_entry_wire_shape() {
    let entry = SubscriptionEntry {
        client_id: "A".to_string(),
        channels: vec![ChannelDescriptor::new("room1")],
    };
    assert_eq!(
        serde_json::to_value(&entry).unwrap(),
        json!({ "clientId": "A", "channels": [{ "channelId": "room1" }] })
    );
}
