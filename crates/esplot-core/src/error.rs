//! Centralized error types for ESPlot.

use thiserror::Error;

use crate::config::ConfigError;
use crate::payload::PayloadError;

/// Main error type for ESPlot operations.
#[derive(Error, Debug)]
pub enum EsplotError {
    #[error("Hub is not running")]
    HubClosed,

    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Broker rejected submission with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Broker unreachable after {attempts} attempts")]
    Unreachable { attempts: u32 },
}

/// Result type for ESPlot operations.
pub type EsplotResult<T> = Result<T, EsplotError>;

/// Failure of a single viewer transport.
///
/// Always local to one session: the session is torn down and nothing else.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),
}

impl TransportError {
    /// Create a send error.
    pub fn send(msg: impl Into<String>) -> Self {
        Self::Send(msg.into())
    }

    /// Create a receive error.
    pub fn receive(msg: impl Into<String>) -> Self {
        Self::Receive(msg.into())
    }
}
