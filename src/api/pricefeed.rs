use std::collections::HashMap;

use alloy_primitives::I256;

use super::error::LeaderboardError;
use super::types::Pricefeed;

/// Candle interval of the indexed price snapshots, in seconds.
pub const INTERVAL_MIN5: i64 = 300;

/// Separator the indexer prepends to token addresses in pricefeed rows.
const PRICE_KEY_PREFIX: char = '_';

/// Snapshot used to mark every open position of a ladder query: the last fully
/// closed 5-minute candle before `min(now, to)`.
pub fn snapshot_timestamp(now: i64, to: i64) -> i64 {
    let end = now.min(to);
    end.div_euclid(INTERVAL_MIN5) * INTERVAL_MIN5 - INTERVAL_MIN5
}

/// Key under which a token's pricefeed is stored.
/// "0xabc" → "_0xabc"
pub fn price_key(index_token: &str) -> String {
    format!("{PRICE_KEY_PREFIX}{index_token}")
}

/// One close price per token for a whole aggregation pass.
#[derive(Clone, Debug, Default)]
pub struct PriceIndex {
    timestamp: i64,
    prices: HashMap<String, Pricefeed>,
}

impl PriceIndex {
    /// Builds the index from a batch of pricefeeds. Rows are keyed by their
    /// stored token address; a later row for the same token replaces an earlier one.
    pub fn from_feeds(timestamp: i64, feeds: Vec<Pricefeed>) -> Self {
        let prices = feeds
            .into_iter()
            .map(|feed| (feed.token_address.clone(), feed))
            .collect();
        Self { timestamp, prices }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Close price for a trade's index token. A missing token is a data-integrity
    /// failure for the whole pass.
    pub fn mark_price(&self, index_token: &str) -> Result<I256, LeaderboardError> {
        self.prices
            .get(&price_key(index_token))
            .map(|feed| feed.c)
            .ok_or_else(|| LeaderboardError::MissingPrice {
                token: index_token.to_string(),
                timestamp: self.timestamp,
            })
    }
}
