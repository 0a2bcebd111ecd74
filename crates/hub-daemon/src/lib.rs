// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! HTTP entrypoint for the authenticated object-storage gateway hub.

mod batch_executor;
mod handlers;
mod middleware;
mod state;
mod validation;

pub use state::{build_state, AppState};

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use middleware::{request_id_middleware, CorsConfig, RequestLogger};
use std::sync::Arc;

/// Build the Axum router serving the hub's seven-endpoint HTTP surface.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsConfig {
        allowed_origins: vec!["*".to_string()],
        allowed_methods: vec![
            "DELETE".to_string(),
            "POST".to_string(),
            "GET".to_string(),
            "OPTIONS".to_string(),
            "HEAD".to_string(),
        ],
        allowed_headers: vec![
            "Authorization".to_string(),
            "Content-Type".to_string(),
            "If-Match".to_string(),
            "If-None-Match".to_string(),
        ],
    }
    .to_cors_layer();

    Router::new()
        .route("/store/{address}/{*rel_path}", post(handlers::handle_write))
        .route("/delete/{address}/{*rel_path}", axum::routing::delete(handlers::handle_delete))
        .route("/list-files/{address}", post(handlers::handle_list_files))
        .route("/list-files/{address}/", post(handlers::handle_list_files))
        .route("/perform-files/{address}", post(handlers::handle_perform_files))
        .route("/perform-files/{address}/", post(handlers::handle_perform_files))
        .route("/revoke-all/{address}", post(handlers::handle_revoke_all))
        .route("/revoke-all/{address}/", post(handlers::handle_revoke_all))
        .route("/hub_info/", get(handlers::hub_info))
        .route("/", get(handlers::welcome))
        .layer(cors)
        .layer(from_fn(RequestLogger::layer))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
