#![warn(clippy::nursery, clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::task;
use tracing::info;

use pastegate_server::app;
use pastegate_server::config::Config;
use pastegate_server::store::{self, PasteStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::load());
    let store = Arc::new(PasteStore::open(&config.db_path)?);

    let stop_signal = Arc::new(AtomicBool::new(false));
    task::spawn(store::reaper(
        Arc::clone(&store),
        config.reap_interval,
        Arc::clone(&stop_signal),
    ));

    info!("listening on {}", config.bind_addr);
    axum::Server::bind(&config.bind_addr)
        .serve(
            app(store, Arc::clone(&config))
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

    stop_signal.store(true, Ordering::Release);
    Ok(())
}
