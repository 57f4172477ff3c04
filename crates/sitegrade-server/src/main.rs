//! Site grading server - earthwork analysis and road planning over HTTP

use anyhow::Result;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitegrade_server::api;
use sitegrade_server::config::Config;
use sitegrade_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sitegrade_server=debug".parse()?)
                .add_directive("sitegrade_core=info".parse()?),
        )
        .init();

    tracing::info!("Starting site grading server...");

    let config = Config::from_env();
    let port = config.server_port;
    tracing::info!(
        max_grid_cells = config.max_grid_cells,
        search_threads = config.search_threads,
        default_soil = %config.default_soil,
        "configuration loaded"
    );
    let state = Arc::new(AppState::new(config));

    let app = api::routes()
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
