use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use fedlens_match::alias::MatchConfig;
use fedlens_storage::RecordStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub match_config: Arc<MatchConfig>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
