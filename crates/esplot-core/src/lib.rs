//! ESPlot Core Library
//!
//! The live-update broker behind the ESPlot viewer: a broadcast hub that
//! fans each submitted plot out to every connected viewer session, plus the
//! producer-side client and plot document rendering.

pub mod config;
pub mod connection;
pub mod document;
pub mod error;
pub mod hub;
pub mod payload;
pub mod producer;
pub mod session;

pub use config::BrokerConfig;
pub use error::{EsplotError, EsplotResult, TransportError};
pub use hub::{Hub, HubHandle, HubStats};
pub use payload::{Payload, PayloadError, PayloadKind};
pub use producer::PlotClient;
pub use session::{ClientSession, SessionHandle, SessionId, TeardownReason};
