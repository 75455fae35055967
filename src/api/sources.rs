use async_trait::async_trait;

use super::error::LeaderboardError;
use super::types::{Chain, Claim, Pricefeed, Trade};

#[async_trait]
pub trait TradeSource: Send + Sync {
    /// One page of trades with `from <= timestamp <= to`.
    async fn fetch_trades(
        &self,
        chain: Chain,
        from: i64,
        to: i64,
        offset: u32,
        page_size: u32,
    ) -> Result<Vec<Trade>, LeaderboardError>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Every token's pricefeed at exactly `timestamp`.
    async fn fetch_pricefeeds(
        &self,
        chain: Chain,
        timestamp: i64,
    ) -> Result<Vec<Pricefeed>, LeaderboardError>;
}

#[async_trait]
pub trait ClaimSource: Send + Sync {
    async fn fetch_claims(&self) -> Result<Vec<Claim>, LeaderboardError>;
}
