//! API routes for the grading server.

pub mod error;
pub mod grading;
pub mod roads;
mod routes;

use axum::Router;

pub fn routes() -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router()
}
