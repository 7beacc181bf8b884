pub mod channel;
pub mod engine;
pub mod envelope;
pub mod origin;
pub mod router;

pub use engine::{CLIENT_SUBSCRIBED, CLIENT_UNSUBSCRIBED, MessageBrokerEngine, WILDCARD_TARGET};
pub use envelope::{Envelope, EnvelopeBody, EnvelopeBuilder, EnvelopeKind, Status};
pub use origin::OriginRegistry;
pub use router::PostMessage;
