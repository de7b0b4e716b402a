//! HTTP router for the fnstack server

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use fnstack_runtime::{ModuleCatalog, RuntimeState};

use crate::config::Config;

/// Catalog of every module the server can resolve handlers from
pub fn build_catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    fnstack_sample::register(&mut catalog);
    catalog
}

/// Create the main application router
pub fn create_router(config: &Config) -> Router {
    let catalog = build_catalog();
    let modules: Vec<&str> = catalog.module_paths().collect();
    info!(
        modules = ?modules,
        default_handler = %config.runtime.default_handler,
        "Module catalog ready"
    );

    let state = Arc::new(
        RuntimeState::new(catalog, config.runtime.default_handler.clone())
            .with_body_limit(config.runtime.max_body_bytes),
    );

    fnstack_runtime::router(state).layer(TraceLayer::new_for_http())
}
