use std::collections::BTreeMap;

use alloy_primitives::I256;
use serde::{Deserialize, Serialize};

// -- Chains --

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Arbitrum,
    Avalanche,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::Arbitrum, Chain::Avalanche];

    pub fn id(self) -> u64 {
        match self {
            Self::Arbitrum => 42161,
            Self::Avalanche => 43114,
        }
    }

    /// Accepts either the chain name or its numeric id ("arbitrum", "42161").
    pub fn from_param(raw: &str) -> Option<Chain> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|c| {
            raw.eq_ignore_ascii_case(c.name()) || raw == c.id().to_string()
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Arbitrum => "arbitrum",
            Self::Avalanche => "avalanche",
        }
    }
}

// -- Upstream records --

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum TradeStatus {
    #[serde(rename = "0", alias = "OPEN")]
    Open,
    #[serde(rename = "1", alias = "CLOSED")]
    Closed,
    #[serde(rename = "2", alias = "LIQUIDATED")]
    Liquidated,
}

/// One position lifecycle as indexed by the subgraph.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[serde(default)]
    pub id: String,
    pub account: String,
    /// Position slot, reused when a position is reopened on the same market/side.
    pub key: String,
    #[serde(deserialize_with = "lenient::deserialize_i64")]
    pub timestamp: i64,
    #[serde(with = "dec")]
    pub collateral: I256,
    #[serde(with = "dec")]
    pub collateral_delta: I256,
    #[serde(with = "dec")]
    pub size: I256,
    #[serde(with = "dec")]
    pub size_delta: I256,
    #[serde(with = "dec")]
    pub fee: I256,
    #[serde(with = "dec")]
    pub realised_pnl: I256,
    #[serde(with = "dec")]
    pub realised_pnl_percentage: I256,
    #[serde(with = "dec")]
    pub average_price: I256,
    pub is_long: bool,
    pub index_token: String,
    pub status: TradeStatus,
}

impl Trade {
    pub fn is_settled(&self) -> bool {
        matches!(self.status, TradeStatus::Closed | TradeStatus::Liquidated)
    }

    pub fn is_liquidated(&self) -> bool {
        self.status == TradeStatus::Liquidated
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }
}

/// Candle snapshot for one token at a 5-minute boundary. Only the close is used.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricefeed {
    pub id: String,
    #[serde(deserialize_with = "lenient::deserialize_i64")]
    pub timestamp: i64,
    /// Stored by the indexer with a leading `_` separator, see `pricefeed::price_key`.
    pub token_address: String,
    #[serde(with = "dec")]
    pub c: I256,
    #[serde(default, deserialize_with = "lenient::deserialize_i64")]
    pub interval: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub account: String,
    pub claimed_at: String,
}

/// Canonical form of an account used for claim lookups. Trade rows keep the
/// casing supplied by the indexer; only comparisons go through this.
pub fn normalize_account(account: &str) -> String {
    account.trim().to_lowercase()
}

// -- Ladder output --

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLadderSummary {
    pub account: String,

    #[serde(with = "dec")]
    pub collateral: I256,
    #[serde(with = "dec")]
    pub size: I256,
    #[serde(with = "dec")]
    pub fee: I256,
    #[serde(with = "dec")]
    pub collateral_delta: I256,
    #[serde(with = "dec")]
    pub size_delta: I256,
    #[serde(with = "dec")]
    pub realised_pnl_percentage: I256,
    /// Always zero; the time-weighted variant is not computed.
    #[serde(with = "dec")]
    pub performance_percentage: I256,

    #[serde(serialize_with = "dec::serialize_map")]
    pub used_collateral_map: BTreeMap<String, I256>,
    #[serde(with = "dec")]
    pub max_collateral: I256,

    #[serde(with = "dec")]
    pub realised_pnl: I256,
    #[serde(with = "dec")]
    pub open_pnl: I256,
    #[serde(with = "dec")]
    pub pnl: I256,
    /// Basis points of `pnl` over `max_collateral`.
    #[serde(with = "dec")]
    pub roi: I256,

    pub win_trade_count: u32,
    pub settled_trade_count: u32,
    pub open_trade_count: u32,
}

impl AccountLadderSummary {
    pub fn seed(account: &str) -> Self {
        Self {
            account: account.to_string(),
            collateral: I256::ZERO,
            size: I256::ZERO,
            fee: I256::ZERO,
            collateral_delta: I256::ZERO,
            size_delta: I256::ZERO,
            realised_pnl_percentage: I256::ZERO,
            performance_percentage: I256::ZERO,
            used_collateral_map: BTreeMap::new(),
            max_collateral: I256::ZERO,
            realised_pnl: I256::ZERO,
            open_pnl: I256::ZERO,
            pnl: I256::ZERO,
            roi: I256::ZERO,
            win_trade_count: 0,
            settled_trade_count: 0,
            open_trade_count: 0,
        }
    }
}

// -- HTTP params / responses --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardParams {
    pub chain: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub offset: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page: Vec<T>,
    pub offset: u32,
    pub page_size: u32,
    pub total: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub cached_windows: usize,
}

#[derive(Serialize)]
pub struct ClaimsResponse {
    pub claims: Vec<Claim>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub nonce: String,
    pub issued_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub address: String,
    pub nonce: String,
    pub issued_at: String,
    pub signature: String,
}

// -- Serde helpers --

/// Big integers travel as decimal strings; subgraphs occasionally send small
/// values as bare JSON numbers.
pub mod dec {
    use std::collections::BTreeMap;

    use alloy_primitives::I256;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::lenient::Lenient;

    pub fn serialize<S: Serializer>(value: &I256, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<I256, D::Error> {
        let raw = match Lenient::deserialize(d)? {
            Lenient::Str(s) => s,
            Lenient::Int(i) => i.to_string(),
            Lenient::UInt(u) => u.to_string(),
        };
        I256::from_dec_str(raw.trim())
            .map_err(|e| de::Error::custom(format!("invalid big integer {raw:?}: {e}")))
    }

    pub fn serialize_map<S: Serializer>(
        map: &BTreeMap<String, I256>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let mut out = s.serialize_map(Some(map.len()))?;
        for (k, v) in map {
            out.serialize_entry(k, &v.to_string())?;
        }
        out.end()
    }
}

pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(crate) enum Lenient {
        Int(i64),
        UInt(u64),
        Str(String),
    }

    pub fn deserialize_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Lenient::deserialize(d)? {
            Lenient::Int(i) => Ok(i),
            Lenient::UInt(u) => i64::try_from(u).map_err(de::Error::custom),
            Lenient::Str(s) => s
                .trim()
                .parse()
                .map_err(|e| de::Error::custom(format!("invalid integer {s:?}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_from_subgraph_json() {
        let json = r#"{
            "id": "t1",
            "account": "0xAbC",
            "key": "p1",
            "timestamp": "1636000000",
            "collateral": "100000000000000000000000000000000",
            "collateralDelta": "0",
            "size": 500,
            "sizeDelta": "0",
            "fee": "1",
            "realisedPnl": "-20",
            "realisedPnlPercentage": "0",
            "averagePrice": "4000",
            "isLong": true,
            "indexToken": "0xweth",
            "status": "2"
        }"#;
        let trade: Trade = serde_json::from_str(json).unwrap();

        assert_eq!(trade.timestamp, 1_636_000_000);
        assert_eq!(trade.account, "0xAbC");
        assert_eq!(
            trade.collateral,
            I256::from_dec_str("100000000000000000000000000000000").unwrap()
        );
        assert_eq!(trade.size, I256::from_dec_str("500").unwrap());
        assert_eq!(trade.realised_pnl, I256::from_dec_str("-20").unwrap());
        assert!(trade.is_settled());
        assert!(trade.is_liquidated());
        assert!(!trade.is_open());
    }

    #[test]
    fn test_status_accepts_names() {
        let s: TradeStatus = serde_json::from_str("\"CLOSED\"").unwrap();
        assert_eq!(s, TradeStatus::Closed);
    }

    #[test]
    fn test_summary_serializes_decimals() {
        let mut summary = AccountLadderSummary::seed("0xa");
        summary.pnl = I256::from_dec_str("-123456789012345678901234567890").unwrap();
        summary
            .used_collateral_map
            .insert("p1".into(), I256::from_dec_str("150").unwrap());

        let v = serde_json::to_value(&summary).unwrap();
        assert_eq!(v["pnl"], "-123456789012345678901234567890");
        assert_eq!(v["usedCollateralMap"]["p1"], "150");
        assert_eq!(v["performancePercentage"], "0");
        assert_eq!(v["winTradeCount"], 0);
    }

    #[test]
    fn test_chain_from_param() {
        assert_eq!(Chain::from_param("Arbitrum"), Some(Chain::Arbitrum));
        assert_eq!(Chain::from_param("43114"), Some(Chain::Avalanche));
        assert_eq!(Chain::from_param("polygon"), None);
    }

    #[test]
    fn test_normalize_account() {
        assert_eq!(normalize_account(" 0xAbCd "), "0xabcd");
    }
}
