//! `api` crate — HTTP surface of the pipeline.
//!
//! Exposes:
//!   POST   /api/v1/runs             start a manual run (202, returns the run id)
//!   GET    /api/v1/runs             recent run history
//!   GET    /api/v1/runs/{id}        one run with its batch attempts
//!   GET    /api/v1/schedules        schedule rules and their next firing
//!   POST   /api/v1/events/deploy    hosting deploy status change

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use db::RunStore;
use engine::{Scheduler, StartRun};
use status::StatusTopic;

pub mod error;
pub mod handlers;

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub launcher: Arc<dyn StartRun>,
    pub store: Arc<dyn RunStore>,
    pub topic: StatusTopic,
    pub scheduler: Arc<Scheduler>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/runs", post(handlers::runs::start).get(handlers::runs::list))
        .route("/api/v1/runs/:id", get(handlers::runs::get))
        .route("/api/v1/schedules", get(handlers::schedules::list))
        .route("/api/v1/events/deploy", post(handlers::events::deploy))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("api listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
