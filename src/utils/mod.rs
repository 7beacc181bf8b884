//! The `utils` module provides the pieces shared by every other module of
//! `framebus`: the broker error taxonomy and logging setup.

pub mod error;
pub mod logging;

pub use error::{BrokerError, Result, TransportError};

#[cfg(test)]
mod tests;
