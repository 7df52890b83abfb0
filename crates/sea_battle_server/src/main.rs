use std::sync::Arc;

use log::{error, info};

use crate::config_provider::default_config_provider;
use crate::server::spawn_server_task;
use crate::store::MemoryStore;

mod auth;
mod config_provider;
mod connection;
mod matchmaker;
mod server;
mod session;
mod store;

#[cfg(test)]
mod session_test;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    info!("Sea Battle server startup");

    let cfg = default_config_provider();
    let store = Arc::new(MemoryStore::new());

    let control = spawn_server_task(cfg, store);

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Unable to listen for the shutdown signal: {e}"),
    }

    control.stop().await;
}
