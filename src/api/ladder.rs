use std::collections::HashMap;

use alloy_primitives::{I256, U256};

use super::error::LeaderboardError;
use super::pricefeed::PriceIndex;
use super::types::{AccountLadderSummary, Trade};

pub const BASIS_POINTS_DIVISOR: I256 = I256::from_raw(U256::from_limbs([10_000, 0, 0, 0]));

/// Unrealised PnL of a position of `size` opened at `average_price`, marked at `mark_price`.
/// Result is in the same units as `size`.
pub fn position_delta(mark_price: I256, average_price: I256, is_long: bool, size: I256) -> I256 {
    if average_price == I256::ZERO {
        return I256::ZERO;
    }

    let price_delta = if average_price > mark_price {
        average_price - mark_price
    } else {
        mark_price - average_price
    };
    let delta = size * price_delta / average_price;

    let has_profit = if is_long {
        mark_price > average_price
    } else {
        average_price > mark_price
    };

    if has_profit { delta } else { -delta }
}

/// Folds one trade into an account's running summary. Trades must arrive in
/// chronological order: the collateral slot map is last-write-wins.
fn apply_trade(seed: AccountLadderSummary, next: &Trade, mark_price: I256) -> AccountLadderSummary {
    let mut used_collateral_map = seed.used_collateral_map;
    used_collateral_map.insert(next.key.clone(), next.collateral);

    let current_used_collateral = used_collateral_map
        .values()
        .fold(I256::ZERO, |sum, c| sum + *c);
    let used_collateral = if current_used_collateral > seed.max_collateral {
        current_used_collateral
    } else {
        seed.max_collateral
    };

    let pos_delta = position_delta(mark_price, next.average_price, next.is_long, next.size);
    let is_settled = next.is_settled();

    let realised_pnl = seed.realised_pnl + next.realised_pnl;
    let open_pnl = seed.open_pnl + pos_delta;
    let pnl = open_pnl + realised_pnl;

    // Capital at risk net of unrealised gains.
    let used_min_profit = used_collateral - pnl;
    let max_collateral = if used_min_profit > seed.collateral {
        used_min_profit
    } else {
        used_collateral
    };
    let roi = if max_collateral == I256::ZERO {
        I256::ZERO
    } else {
        pnl * BASIS_POINTS_DIVISOR / max_collateral
    };

    AccountLadderSummary {
        account: seed.account,
        collateral: seed.collateral + next.collateral,
        size: seed.size + next.size,
        fee: seed.fee + next.fee,
        collateral_delta: seed.collateral_delta + next.collateral_delta,
        size_delta: seed.size_delta + next.size_delta,
        realised_pnl_percentage: seed.realised_pnl_percentage + next.realised_pnl_percentage,
        performance_percentage: I256::ZERO,
        used_collateral_map,
        max_collateral,
        realised_pnl,
        open_pnl,
        pnl,
        roi,
        win_trade_count: seed.win_trade_count
            + u32::from(is_settled && next.realised_pnl > I256::ZERO),
        settled_trade_count: seed.settled_trade_count + u32::from(is_settled),
        open_trade_count: seed.open_trade_count + u32::from(next.is_open()),
    }
}

/// Builds one summary per distinct account in `trades`, in order of each
/// account's first appearance. Fails on the first trade whose index token has
/// no snapshot price.
pub fn fold_trades(
    trades: &[Trade],
    prices: &PriceIndex,
) -> Result<Vec<AccountLadderSummary>, LeaderboardError> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_account: HashMap<&str, Vec<&Trade>> = HashMap::new();
    for trade in trades {
        by_account
            .entry(trade.account.as_str())
            .or_insert_with(|| {
                order.push(trade.account.as_str());
                Vec::new()
            })
            .push(trade);
    }

    let mut summaries = Vec::with_capacity(order.len());
    for account in order {
        let mut account_trades = by_account.remove(account).unwrap_or_default();
        // Stable: same-block events keep their indexed order.
        account_trades.sort_by_key(|t| t.timestamp);

        let mut summary = AccountLadderSummary::seed(account);
        for trade in account_trades {
            let mark_price = prices.mark_price(&trade.index_token)?;
            summary = apply_trade(summary, trade, mark_price);
        }
        summaries.push(summary);
    }

    tracing::debug!(
        "Folded {} trades into {} account summaries",
        trades.len(),
        summaries.len()
    );
    Ok(summaries)
}
