use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::types::Chain;

#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("invalid request: {0}")]
    InvalidParams(String),

    #[error("no subgraph configured for {}", .0.name())]
    ChainNotConfigured(Chain),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream returned errors: {0}")]
    Graphql(String),

    #[error("malformed upstream payload: {0}")]
    Payload(String),

    /// A trade references a token that has no snapshot price.
    #[error("missing price for index token {token} at snapshot {timestamp}")]
    MissingPrice { token: String, timestamp: i64 },

    #[error("claim store failure: {0}")]
    ClaimStore(String),
}

impl From<rusqlite::Error> for LeaderboardError {
    fn from(e: rusqlite::Error) -> Self {
        LeaderboardError::ClaimStore(e.to_string())
    }
}

impl IntoResponse for LeaderboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidParams(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::Graphql(_) | Self::Payload(_) => StatusCode::BAD_GATEWAY,
            Self::ChainNotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::MissingPrice { .. } | Self::ClaimStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!("Leaderboard request failed: {self}");
        }
        (status, self.to_string()).into_response()
    }
}
