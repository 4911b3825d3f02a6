pub mod config;
pub mod db;
pub mod error;
pub mod hub;
pub mod models;
pub mod routes;

use std::sync::Arc;

use tokio::task::JoinHandle;

use config::Config;
use db::notes::NoteStore;
use hub::{HubConfig, HubHandle};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NoteStore>,
    pub hub: HubHandle,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the state and start the broadcast hub over `store`.
    pub fn start(config: Config, store: Arc<dyn NoteStore>) -> (Self, JoinHandle<()>) {
        let (hub, task) = HubHandle::spawn(store.clone(), HubConfig::from(&config));
        let state = Self {
            store,
            hub,
            config: Arc::new(config),
        };
        (state, task)
    }
}
