pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod resources;
pub mod state;
pub mod wait;

use std::sync::Arc;

use provider::Provider;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<Provider>,
}
