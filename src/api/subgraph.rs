use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::error::LeaderboardError;
use super::sources::{PriceSource, TradeSource};
use super::types::{Chain, Pricefeed, Trade};

const TRADES_QUERY: &str = r#"
query competitionTrades($from: Int!, $to: Int!, $offset: Int!, $pageSize: Int!) {
  trades(
    first: $pageSize
    skip: $offset
    orderBy: timestamp
    orderDirection: asc
    where: { timestamp_gte: $from, timestamp_lte: $to }
  ) {
    id
    account
    key
    timestamp
    collateral
    collateralDelta
    size
    sizeDelta
    fee
    realisedPnl
    realisedPnlPercentage
    averagePrice
    isLong
    indexToken
    status
  }
}"#;

const PRICEFEEDS_QUERY: &str = r#"
query competitionPricefeeds($timestamp: Int!) {
  pricefeeds(first: 1000, where: { timestamp: $timestamp }) {
    id
    timestamp
    tokenAddress
    c
    interval
  }
}"#;

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

impl<T> GraphqlResponse<T> {
    fn into_data(self) -> Result<T, LeaderboardError> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(LeaderboardError::Graphql(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| LeaderboardError::Payload("response carried no data".into()))
    }
}

#[derive(Deserialize)]
struct TradesData {
    trades: Vec<Trade>,
}

#[derive(Deserialize)]
struct PricefeedsData {
    pricefeeds: Vec<Pricefeed>,
}

/// GraphQL client for the per-chain trade indexer.
pub struct SubgraphClient {
    http: reqwest::Client,
    endpoints: HashMap<Chain, String>,
}

impl SubgraphClient {
    pub fn new(http: reqwest::Client, endpoints: HashMap<Chain, String>) -> Self {
        Self { http, endpoints }
    }

    fn endpoint(&self, chain: Chain) -> Result<&str, LeaderboardError> {
        self.endpoints
            .get(&chain)
            .map(String::as_str)
            .ok_or(LeaderboardError::ChainNotConfigured(chain))
    }

    async fn query<T: DeserializeOwned>(
        &self,
        chain: Chain,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, LeaderboardError> {
        let url = self.endpoint(chain)?;
        let body = serde_json::json!({ "query": query, "variables": variables });

        let resp = self
            .http
            .post(url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: GraphqlResponse<T> = resp.json().await?;
        parsed.into_data()
    }
}

#[async_trait]
impl TradeSource for SubgraphClient {
    async fn fetch_trades(
        &self,
        chain: Chain,
        from: i64,
        to: i64,
        offset: u32,
        page_size: u32,
    ) -> Result<Vec<Trade>, LeaderboardError> {
        let variables = serde_json::json!({
            "from": from,
            "to": to,
            "offset": offset,
            "pageSize": page_size,
        });
        let data: TradesData = self.query(chain, TRADES_QUERY, variables).await?;
        Ok(data.trades)
    }
}

#[async_trait]
impl PriceSource for SubgraphClient {
    async fn fetch_pricefeeds(
        &self,
        chain: Chain,
        timestamp: i64,
    ) -> Result<Vec<Pricefeed>, LeaderboardError> {
        let variables = serde_json::json!({ "timestamp": timestamp });
        let data: PricefeedsData = self.query(chain, PRICEFEEDS_QUERY, variables).await?;
        tracing::debug!(
            "Fetched {} pricefeeds for {} at {timestamp}",
            data.pricefeeds.len(),
            chain.name()
        );
        Ok(data.pricefeeds)
    }
}
