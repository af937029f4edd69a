pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod provider;
pub mod routes;
pub mod stats;

use std::sync::Arc;

use config::Config;
use db::pool::DbPool;
use gateway::changes::ChangeFeed;
use gateway::hub::BroadcastHub;
use provider::ExternalProviderStub;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub hub: Arc<BroadcastHub>,
    pub changes: ChangeFeed,
    pub provider: Arc<ExternalProviderStub>,
}
