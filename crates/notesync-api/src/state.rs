//! Shared state handed to every route.

use std::sync::Arc;

use notesync_core::Result;
use notesync_db::CollaborationService;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub service: CollaborationService,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open the registry and build the collaboration service.
    pub async fn from_config(config: ServerConfig) -> Result<Self> {
        let service = CollaborationService::open(&config.storage()).await?;
        Ok(Self {
            service,
            config: Arc::new(config),
        })
    }
}
