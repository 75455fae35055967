use std::sync::Arc;

mod api;
mod config;

use api::cache::SystemClock;
use api::db::{self, ClaimStore};
use api::server::AppState;
use api::service::LeaderboardService;
use api::subgraph::SubgraphClient;
use config::Config;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let conn = match db::init_claim_db(&config.claim_db_path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Failed to open claim DB: {e}");
            std::process::exit(1);
        }
    };
    let claims = ClaimStore::new(conn);

    let subgraph = Arc::new(SubgraphClient::new(
        reqwest::Client::new(),
        config.subgraphs.clone(),
    ));
    let ladder = LeaderboardService::new(
        subgraph.clone(),
        subgraph,
        Arc::new(claims.clone()),
        Arc::new(SystemClock),
    );

    let port = config.port;
    let state = AppState {
        ladder: Arc::new(ladder),
        claims,
        config: Arc::new(config),
    };

    if let Err(e) = api::server::run(state, port).await {
        tracing::error!("Server failed: {e}");
        std::process::exit(1);
    }
}
