//! Application state.

use esplot_core::{BrokerConfig, HubHandle};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub config: Arc<BrokerConfig>,
}

impl AppState {
    pub fn new(hub: HubHandle, config: BrokerConfig) -> Self {
        Self {
            hub,
            config: Arc::new(config),
        }
    }
}
