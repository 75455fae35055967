use std::collections::HashMap;
use std::env;

use crate::api::types::Chain;

/// 2021-11-02T13:00:00Z
const DEFAULT_COMPETITION_START: i64 = 1_635_858_000;
/// 2021-11-30T13:00:00Z
const DEFAULT_COMPETITION_END: i64 = 1_638_277_200;

const DEFAULT_ARBITRUM_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/nissoh/gmx-arbitrum";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub claim_db_path: String,
    pub subgraphs: HashMap<Chain, String>,
    pub competition_start: i64,
    pub competition_end: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let port = get("API_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3001);
        let claim_db_path = get("CLAIM_DB_PATH").unwrap_or_else(|| "data/claims.db".into());

        let mut subgraphs = HashMap::new();
        subgraphs.insert(
            Chain::Arbitrum,
            get("ARBITRUM_SUBGRAPH_URL").unwrap_or_else(|| DEFAULT_ARBITRUM_SUBGRAPH.into()),
        );
        // Avalanche is only served when an indexer is configured.
        if let Some(url) = get("AVALANCHE_SUBGRAPH_URL").filter(|u| !u.is_empty()) {
            subgraphs.insert(Chain::Avalanche, url);
        }

        let competition_start = get("COMPETITION_START")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_COMPETITION_START);
        let competition_end = get("COMPETITION_END")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_COMPETITION_END);

        Self {
            port,
            claim_db_path,
            subgraphs,
            competition_start,
            competition_end,
        }
    }
}
