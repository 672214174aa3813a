#![warn(clippy::nursery, clippy::pedantic)]

//! HTTP server for pastegate: paste lifecycle, access gating, and
//! per-viewer view counting over a rocksdb store.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use pastegate_common::API_ENDPOINT;

pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod short_code;
pub mod store;

use config::Config;
use store::PasteStore;

/// Builds the API router with every paste endpoint mounted under
/// [`API_ENDPOINT`].
#[must_use]
pub fn app(store: Arc<PasteStore>, config: Arc<Config>) -> Router {
    Router::new()
        .route(
            &format!("{}/pastes", API_ENDPOINT),
            post(handlers::create_paste).get(handlers::list_pastes),
        )
        .route(
            &format!("{}/pastes/:id", API_ENDPOINT),
            get(handlers::fetch_paste)
                .put(handlers::update_paste)
                .delete(handlers::delete_paste),
        )
        .route(
            &format!("{}/pastes/:id/view", API_ENDPOINT),
            post(handlers::record_view),
        )
        .layer(Extension(store))
        .layer(Extension(config))
}
