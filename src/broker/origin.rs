//! Origin registry
//!
//! Tracks which origins may exchange messages with the broker. The engine
//! itself never consults it before delivery; the transport layer checks an
//! incoming connection's origin here before handing anything to the engine.

use indexmap::IndexSet;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone)]
pub struct OriginRegistry {
    accepted: IndexSet<String>,
}

impl OriginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with an initial set of origins.
    pub fn with_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for origin in origins {
            registry.add_accepted_origin(origin.as_ref());
        }
        registry
    }

    /// Accept `origin`. Empty input is ignored with a warning; repeated adds
    /// are no-ops.
    pub fn add_accepted_origin(&mut self, origin: &str) {
        if origin.is_empty() {
            warn!("Ignoring empty origin");
            return;
        }
        if self.accepted.insert(origin.to_string()) {
            debug!("Accepted origin {origin}");
        }
    }

    pub fn remove_accepted_origin(&mut self, origin: &str) {
        if self.accepted.shift_remove(origin) {
            debug!("Removed origin {origin}");
        }
    }

    pub fn accepted_origins(&self) -> Vec<String> {
        self.accepted.iter().cloned().collect()
    }

    pub fn is_accepted(&self, origin: &str) -> bool {
        self.accepted.contains(origin)
    }
}
