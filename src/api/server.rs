use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use super::db::ClaimStore;
use super::routes;
use super::service::LeaderboardService;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub ladder: Arc<LeaderboardService>,
    pub claims: ClaimStore,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/leaderboard", get(routes::leaderboard))
        .route("/api/competition", get(routes::competition))
        .route(
            "/api/competition/highest-percentage",
            get(routes::highest_percentage),
        )
        .route(
            "/api/competition/lowest-percentage",
            get(routes::lowest_percentage),
        )
        .route("/api/open-positions", get(routes::open_positions))
        .route("/api/claims", get(routes::claims))
        .route("/api/claim/nonce/{address}", get(routes::claim_nonce))
        .route("/api/claim", post(routes::submit_claim))
        .route("/api/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

pub async fn run(state: AppState, port: u16) -> std::io::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!("API server listening on port {port}");
    axum::serve(listener, app).await
}
