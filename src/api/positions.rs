use std::collections::HashSet;

use alloy_primitives::{I256, U256};
use serde::Serialize;

use super::error::LeaderboardError;
use super::ladder::{BASIS_POINTS_DIVISOR, position_delta};
use super::pricefeed::PriceIndex;
use super::types::{Trade, dec, normalize_account};

/// Smallest collateral a settled trade needs to enter the single-trade ladders:
/// $100 in 30-decimal USD.
pub fn min_settled_collateral() -> I256 {
    I256::from_raw(U256::from(100u64) * U256::from(10u64).pow(U256::from(30u64)))
}

/// One closed or liquidated trade on the single-trade percentage ladders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledTradeSummary {
    pub id: String,
    pub account: String,
    pub key: String,
    pub timestamp: i64,
    #[serde(with = "dec")]
    pub collateral: I256,
    #[serde(with = "dec")]
    pub size: I256,
    #[serde(with = "dec")]
    pub realised_pnl: I256,
    #[serde(with = "dec")]
    pub realised_pnl_percentage: I256,
    pub is_long: bool,
    pub index_token: String,
    pub is_liquidated: bool,
    pub claimed: bool,
}

impl SettledTradeSummary {
    fn from_trade(trade: &Trade, claimed: &HashSet<String>) -> Self {
        Self {
            id: trade.id.clone(),
            account: trade.account.clone(),
            key: trade.key.clone(),
            timestamp: trade.timestamp,
            collateral: trade.collateral,
            size: trade.size,
            realised_pnl: trade.realised_pnl,
            realised_pnl_percentage: trade.realised_pnl_percentage,
            is_long: trade.is_long,
            index_token: trade.index_token.clone(),
            is_liquidated: trade.is_liquidated(),
            claimed: claimed.contains(&normalize_account(&trade.account)),
        }
    }
}

/// Both orderings of the same settled-trade set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettledLadders {
    pub highest: Vec<SettledTradeSummary>,
    pub lowest: Vec<SettledTradeSummary>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettledOrder {
    Highest,
    Lowest,
}

impl SettledLadders {
    pub fn ordered(&self, order: SettledOrder) -> &[SettledTradeSummary] {
        match order {
            SettledOrder::Highest => &self.highest,
            SettledOrder::Lowest => &self.lowest,
        }
    }
}

/// Ranks settled trades with at least `min_collateral` by realised PnL percentage.
/// Equal percentages keep trade order in both lists.
pub fn settled_percentage_ladders(
    trades: &[Trade],
    claimed: &HashSet<String>,
    min_collateral: I256,
) -> SettledLadders {
    let eligible: Vec<SettledTradeSummary> = trades
        .iter()
        .filter(|t| t.is_settled() && t.collateral >= min_collateral)
        .map(|t| SettledTradeSummary::from_trade(t, claimed))
        .collect();

    let mut highest = eligible.clone();
    highest.sort_by(|a, b| b.realised_pnl_percentage.cmp(&a.realised_pnl_percentage));

    let mut lowest = eligible;
    lowest.sort_by(|a, b| a.realised_pnl_percentage.cmp(&b.realised_pnl_percentage));

    SettledLadders { highest, lowest }
}

/// An open position marked at the snapshot price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionSummary {
    pub id: String,
    pub account: String,
    pub key: String,
    pub timestamp: i64,
    #[serde(with = "dec")]
    pub collateral: I256,
    #[serde(with = "dec")]
    pub size: I256,
    #[serde(with = "dec")]
    pub average_price: I256,
    #[serde(with = "dec")]
    pub mark_price: I256,
    pub is_long: bool,
    pub index_token: String,
    #[serde(with = "dec")]
    pub delta: I256,
    /// Basis points of `delta` over `collateral`.
    #[serde(with = "dec")]
    pub delta_percentage: I256,
}

/// Open trades sorted by unrealised PnL, largest first. A missing price fails the batch.
pub fn open_positions(
    trades: &[Trade],
    prices: &PriceIndex,
) -> Result<Vec<OpenPositionSummary>, LeaderboardError> {
    let mut open = Vec::new();
    for trade in trades.iter().filter(|t| t.is_open()) {
        let mark_price = prices.mark_price(&trade.index_token)?;
        let delta = position_delta(mark_price, trade.average_price, trade.is_long, trade.size);
        let delta_percentage = if trade.collateral == I256::ZERO {
            I256::ZERO
        } else {
            delta * BASIS_POINTS_DIVISOR / trade.collateral
        };

        open.push(OpenPositionSummary {
            id: trade.id.clone(),
            account: trade.account.clone(),
            key: trade.key.clone(),
            timestamp: trade.timestamp,
            collateral: trade.collateral,
            size: trade.size,
            average_price: trade.average_price,
            mark_price,
            is_long: trade.is_long,
            index_token: trade.index_token.clone(),
            delta,
            delta_percentage,
        });
    }

    open.sort_by(|a, b| b.delta.cmp(&a.delta));
    Ok(open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ladder::tests::{n, prices, trade};
    use crate::api::types::TradeStatus;

    fn settled(account: &str, ts: i64, pct: i64, status: TradeStatus) -> Trade {
        let mut t = trade(account, "p1", ts);
        t.status = status;
        t.realised_pnl_percentage = n(pct);
        t
    }

    fn ids(list: &[SettledTradeSummary]) -> Vec<i64> {
        list.iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn test_min_collateral_is_100_usd() {
        assert_eq!(
            min_settled_collateral().to_string(),
            format!("100{}", "0".repeat(30))
        );
    }

    #[test]
    fn test_settled_orderings() {
        let trades = vec![
            settled("0xA", 1, 500, TradeStatus::Closed),
            settled("0xB", 2, -9_000, TradeStatus::Liquidated),
            trade("0xC", "p1", 3),
            settled("0xD", 4, 2_000, TradeStatus::Closed),
            settled("0xE", 5, 500, TradeStatus::Closed),
        ];
        let ladders = settled_percentage_ladders(&trades, &HashSet::new(), n(100));

        assert_eq!(ids(&ladders.highest), vec![4, 1, 5, 2]);
        // Ties keep trade order in the ascending list too.
        assert_eq!(ids(&ladders.lowest), vec![2, 1, 5, 4]);
        assert!(ladders.lowest[0].is_liquidated);
        assert_eq!(ladders.ordered(SettledOrder::Highest)[0].account, "0xD");
    }

    #[test]
    fn test_small_trades_excluded() {
        let mut small = settled("0xA", 1, 90_000, TradeStatus::Closed);
        small.collateral = n(99);
        let trades = vec![small, settled("0xB", 2, 10, TradeStatus::Closed)];

        let ladders = settled_percentage_ladders(&trades, &HashSet::new(), n(100));
        assert_eq!(ids(&ladders.highest), vec![2]);
    }

    #[test]
    fn test_claimed_flag_is_case_insensitive() {
        let claimed: HashSet<String> = ["0xabc".to_string()].into_iter().collect();
        let trades = vec![
            settled("0xABC", 1, 10, TradeStatus::Closed),
            settled("0xdef", 2, 20, TradeStatus::Closed),
        ];
        let ladders = settled_percentage_ladders(&trades, &claimed, n(0));

        assert!(!ladders.highest[0].claimed);
        assert!(ladders.highest[1].claimed);
    }

    #[test]
    fn test_open_positions_marked_and_sorted() {
        let mut long = trade("0xA", "p1", 1);
        long.collateral = n(100);
        let mut short = trade("0xB", "p1", 2);
        short.is_long = false;
        short.collateral = n(50);
        let mut closed = trade("0xC", "p1", 3);
        closed.status = TradeStatus::Closed;

        let out = open_positions(&[long, short, closed], &prices(&[("0xweth", 1100)])).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].account, "0xA");
        assert_eq!(out[0].mark_price, n(1100));
        assert_eq!(out[0].delta, n(50));
        assert_eq!(out[0].delta_percentage, n(5_000));
        assert_eq!(out[1].delta, n(-50));
        assert_eq!(out[1].delta_percentage, n(-10_000));
    }

    #[test]
    fn test_open_position_zero_collateral() {
        let mut t = trade("0xA", "p1", 1);
        t.collateral = n(0);
        let out = open_positions(&[t], &prices(&[("0xweth", 1100)])).unwrap();
        assert_eq!(out[0].delta_percentage, n(0));
    }

    #[test]
    fn test_open_position_missing_price() {
        let mut t = trade("0xA", "p1", 1);
        t.index_token = "0xlink".into();
        assert!(matches!(
            open_positions(&[t], &prices(&[("0xweth", 1000)])),
            Err(LeaderboardError::MissingPrice { .. })
        ));
    }
}
