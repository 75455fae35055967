use std::cmp::Ordering;
use std::collections::HashSet;

use alloy_primitives::{I256, U256};

use super::types::{AccountLadderSummary, Claim, normalize_account};

/// Subtracted from the sort key of unclaimed accounts; far above any realised PnL
/// (30-decimal USD values stay well below 1e50).
pub fn priority_penalty() -> I256 {
    I256::from_raw(U256::from(10u64).pow(U256::from(50u64)))
}

/// Lower-cased set of accounts holding a claim.
pub fn claimed_accounts(claims: &[Claim]) -> HashSet<String> {
    claims.iter().map(|c| normalize_account(&c.account)).collect()
}

fn priority_key(summary: &AccountLadderSummary, claimed: &HashSet<String>) -> I256 {
    if claimed.contains(&normalize_account(&summary.account)) {
        summary.realised_pnl
    } else {
        summary.realised_pnl - priority_penalty()
    }
}

/// Sorts by realised PnL descending with claimed accounts ahead of unclaimed ones.
/// Stable for equal keys.
pub fn rank_by_priority(summaries: &mut [AccountLadderSummary], claimed: &HashSet<String>) {
    summaries.sort_by(|a, b| {
        let diff = priority_key(b, claimed) - priority_key(a, claimed);
        if diff > I256::ZERO {
            Ordering::Greater
        } else if diff < I256::ZERO {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    });
}
