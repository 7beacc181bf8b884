use super::error::BrokerError;
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Repeated initialisation must not panic.
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn parse_level_falls_back_to_info() {
    assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
    assert_eq!(logging::parse_level(" trace "), tracing::Level::TRACE);
    assert_eq!(logging::parse_level("verbose"), tracing::Level::INFO);
}

#[test]
fn broker_error_messages_carry_context() {
    let err = BrokerError::NotSubscribedToChannel {
        client_id: "A".to_string(),
        channel_id: "room1".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "client 'A' is not subscribed to channel 'room1'"
    );

    let err = BrokerError::MissingParameters {
        operation: "subscribe",
    };
    assert_eq!(err.to_string(), "missing parameters for subscribe");
}
