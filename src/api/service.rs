use std::sync::Arc;

use super::cache::{CacheKey, Clock, ResultCache, ttl_for_window};
use super::error::LeaderboardError;
use super::ladder::fold_trades;
use super::paging::page_of;
use super::positions::{
    OpenPositionSummary, SettledLadders, SettledOrder, SettledTradeSummary, min_settled_collateral,
    open_positions, settled_percentage_ladders,
};
use super::pricefeed::{PriceIndex, snapshot_timestamp};
use super::ranking::{claimed_accounts, rank_by_priority};
use super::sources::{ClaimSource, PriceSource, TradeSource};
use super::types::{AccountLadderSummary, Chain, Page, Trade};

pub const CUMULATIVE_PNL_QUERY: &str = "competitionCumulativePnl";
pub const SETTLED_PERCENTAGE_QUERY: &str = "competitionSettledPercentage";
pub const OPEN_POSITIONS_QUERY: &str = "openPositions";
pub const TRADE_PAGE_SIZE: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LadderQuery {
    pub chain: Chain,
    pub from: i64,
    pub to: i64,
}

/// Ladders over a competition window, each memoized per window start and chain.
pub struct LeaderboardService {
    trades: Arc<dyn TradeSource>,
    prices: Arc<dyn PriceSource>,
    claims: Arc<dyn ClaimSource>,
    cache: ResultCache<Vec<AccountLadderSummary>>,
    settled: ResultCache<SettledLadders>,
    open: ResultCache<Vec<OpenPositionSummary>>,
}

impl LeaderboardService {
    pub fn new(
        trades: Arc<dyn TradeSource>,
        prices: Arc<dyn PriceSource>,
        claims: Arc<dyn ClaimSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            trades,
            prices,
            claims,
            cache: ResultCache::new(clock.clone()),
            settled: ResultCache::new(clock.clone()),
            open: ResultCache::new(clock),
        }
    }

    /// Serves `name` for `query` from `cache` while fresh, otherwise runs
    /// `compute(now)` and stores a successful result.
    async fn memoized<V, F, Fut>(
        cache: &ResultCache<V>,
        name: &'static str,
        query: LadderQuery,
        compute: F,
    ) -> Result<Arc<V>, LeaderboardError>
    where
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = Result<V, LeaderboardError>>,
    {
        let now = cache.now();
        let key = CacheKey {
            query: name,
            from: query.from,
            chain: query.chain,
        };

        if let Some(hit) = cache.get_fresh(&key).await {
            tracing::debug!("{name} cache hit: {} from={}", query.chain.name(), query.from);
            return Ok(hit);
        }

        let ttl = ttl_for_window(query.to, now);
        tracing::info!(
            "{name} cache miss: {} from={} to={} (ttl {ttl}s)",
            query.chain.name(),
            query.from,
            query.to
        );

        let value = Arc::new(compute(now).await?);
        cache.put(key, Arc::clone(&value), ttl).await;
        Ok(value)
    }

    /// Full ranked ladder for `query`, from cache while fresh.
    pub async fn cumulative_pnl(
        &self,
        query: LadderQuery,
    ) -> Result<Arc<Vec<AccountLadderSummary>>, LeaderboardError> {
        Self::memoized(&self.cache, CUMULATIVE_PNL_QUERY, query, |now| {
            self.compute(query, now)
        })
        .await
    }

    /// Settled trades of the window ranked by realised PnL percentage, both ways.
    pub async fn settled_percentage(
        &self,
        query: LadderQuery,
    ) -> Result<Arc<SettledLadders>, LeaderboardError> {
        Self::memoized(&self.settled, SETTLED_PERCENTAGE_QUERY, query, |now| {
            self.compute_settled(query, now)
        })
        .await
    }

    /// Positions still open in the window, marked at the snapshot price.
    pub async fn open_positions(
        &self,
        query: LadderQuery,
    ) -> Result<Arc<Vec<OpenPositionSummary>>, LeaderboardError> {
        Self::memoized(&self.open, OPEN_POSITIONS_QUERY, query, |now| {
            self.compute_open(query, now)
        })
        .await
    }

    pub async fn page(
        &self,
        query: LadderQuery,
        offset: u32,
        page_size: u32,
    ) -> Result<Page<AccountLadderSummary>, LeaderboardError> {
        let ranked = self.cumulative_pnl(query).await?;
        Ok(page_of(&ranked, offset, page_size))
    }

    pub async fn settled_page(
        &self,
        query: LadderQuery,
        order: SettledOrder,
        offset: u32,
        page_size: u32,
    ) -> Result<Page<SettledTradeSummary>, LeaderboardError> {
        let ladders = self.settled_percentage(query).await?;
        Ok(page_of(ladders.ordered(order), offset, page_size))
    }

    pub async fn open_page(
        &self,
        query: LadderQuery,
        offset: u32,
        page_size: u32,
    ) -> Result<Page<OpenPositionSummary>, LeaderboardError> {
        let open = self.open_positions(query).await?;
        Ok(page_of(&open, offset, page_size))
    }

    /// Cached results across every ladder.
    pub async fn cached_windows(&self) -> usize {
        self.cache.len().await + self.settled.len().await + self.open.len().await
    }

    async fn compute(
        &self,
        query: LadderQuery,
        now: i64,
    ) -> Result<Vec<AccountLadderSummary>, LeaderboardError> {
        let to = now.min(query.to);
        let snapshot = snapshot_timestamp(now, query.to);

        let (trades, feeds, claims) = tokio::try_join!(
            self.fetch_all_trades(query.chain, query.from, to),
            self.prices.fetch_pricefeeds(query.chain, snapshot),
            self.claims.fetch_claims(),
        )?;

        let index = PriceIndex::from_feeds(snapshot, feeds);
        let mut summaries = fold_trades(&trades, &index)?;
        rank_by_priority(&mut summaries, &claimed_accounts(&claims));

        tracing::info!(
            "Computed ladder for {}: {} trades, {} accounts, {} prices at {snapshot}, {} claims",
            query.chain.name(),
            trades.len(),
            summaries.len(),
            index.len(),
            claims.len()
        );
        Ok(summaries)
    }

    async fn compute_settled(
        &self,
        query: LadderQuery,
        now: i64,
    ) -> Result<SettledLadders, LeaderboardError> {
        let (trades, claims) = tokio::try_join!(
            self.fetch_all_trades(query.chain, query.from, now.min(query.to)),
            self.claims.fetch_claims(),
        )?;

        let ladders =
            settled_percentage_ladders(&trades, &claimed_accounts(&claims), min_settled_collateral());
        tracing::info!(
            "Computed settled ladder for {}: {} of {} trades eligible",
            query.chain.name(),
            ladders.highest.len(),
            trades.len()
        );
        Ok(ladders)
    }

    async fn compute_open(
        &self,
        query: LadderQuery,
        now: i64,
    ) -> Result<Vec<OpenPositionSummary>, LeaderboardError> {
        let snapshot = snapshot_timestamp(now, query.to);
        let (trades, feeds) = tokio::try_join!(
            self.fetch_all_trades(query.chain, query.from, now.min(query.to)),
            self.prices.fetch_pricefeeds(query.chain, snapshot),
        )?;

        let index = PriceIndex::from_feeds(snapshot, feeds);
        let open = open_positions(&trades, &index)?;
        tracing::info!(
            "Computed open positions for {}: {} open at {snapshot}",
            query.chain.name(),
            open.len()
        );
        Ok(open)
    }

    async fn fetch_all_trades(
        &self,
        chain: Chain,
        from: i64,
        to: i64,
    ) -> Result<Vec<Trade>, LeaderboardError> {
        let mut all = Vec::new();
        let mut offset = 0u32;

        loop {
            let page = self
                .trades
                .fetch_trades(chain, from, to, offset, TRADE_PAGE_SIZE)
                .await?;
            let count = page.len();
            all.extend(page);

            if count < TRADE_PAGE_SIZE as usize {
                break;
            }
            offset += TRADE_PAGE_SIZE;
        }

        tracing::debug!("Fetched {} trades for {}", all.len(), chain.name());
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::api::cache::LIVE_TTL_SECS;
    use crate::api::cache::tests::FakeClock;
    use crate::api::ladder::tests::{n, trade};
    use crate::api::pricefeed::{INTERVAL_MIN5, price_key};
    use crate::api::types::{Claim, Pricefeed, TradeStatus};

    const NOW: i64 = 1_637_000_000;

    #[derive(Default)]
    struct FakeTrades {
        trades: Vec<Trade>,
        calls: AtomicUsize,
        windows: Mutex<Vec<(i64, i64)>>,
    }

    #[async_trait]
    impl TradeSource for FakeTrades {
        async fn fetch_trades(
            &self,
            _chain: Chain,
            from: i64,
            to: i64,
            offset: u32,
            page_size: u32,
        ) -> Result<Vec<Trade>, LeaderboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.windows.lock().unwrap().push((from, to));
            let start = (offset as usize).min(self.trades.len());
            let end = (start + page_size as usize).min(self.trades.len());
            Ok(self.trades[start..end].to_vec())
        }
    }

    struct FakePrices {
        tokens: Vec<(&'static str, i64)>,
        requested: Mutex<Vec<i64>>,
        fail: bool,
    }

    impl FakePrices {
        fn new(tokens: Vec<(&'static str, i64)>) -> Self {
            Self {
                tokens,
                requested: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PriceSource for FakePrices {
        async fn fetch_pricefeeds(
            &self,
            _chain: Chain,
            timestamp: i64,
        ) -> Result<Vec<Pricefeed>, LeaderboardError> {
            self.requested.lock().unwrap().push(timestamp);
            if self.fail {
                return Err(LeaderboardError::Graphql("indexer unavailable".into()));
            }
            Ok(self
                .tokens
                .iter()
                .map(|(token, close)| Pricefeed {
                    id: token.to_string(),
                    timestamp,
                    token_address: price_key(token),
                    c: n(*close),
                    interval: INTERVAL_MIN5,
                })
                .collect())
        }
    }

    struct FakeClaims(Vec<&'static str>);

    #[async_trait]
    impl ClaimSource for FakeClaims {
        async fn fetch_claims(&self) -> Result<Vec<Claim>, LeaderboardError> {
            Ok(self
                .0
                .iter()
                .map(|a| Claim {
                    account: a.to_string(),
                    claimed_at: String::new(),
                })
                .collect())
        }
    }

    struct Harness {
        service: LeaderboardService,
        trades: Arc<FakeTrades>,
        prices: Arc<FakePrices>,
        clock: Arc<FakeClock>,
    }

    fn harness(trades: Vec<Trade>, prices: FakePrices, claims: Vec<&'static str>) -> Harness {
        let trades = Arc::new(FakeTrades {
            trades,
            ..Default::default()
        });
        let prices = Arc::new(prices);
        let clock = FakeClock::at(NOW);
        let service = LeaderboardService::new(
            trades.clone(),
            prices.clone(),
            Arc::new(FakeClaims(claims)),
            clock.clone(),
        );
        Harness {
            service,
            trades,
            prices,
            clock,
        }
    }

    fn query(from: i64, to: i64) -> LadderQuery {
        LadderQuery {
            chain: Chain::Arbitrum,
            from,
            to,
        }
    }

    fn winning(account: &str, realised: i64) -> Trade {
        let mut t = trade(account, "p1", NOW - 1000);
        t.realised_pnl = n(realised);
        t
    }

    #[tokio::test]
    async fn test_ranks_claimed_accounts_first() {
        let h = harness(
            vec![winning("0xB", 1000), winning("0xA", 100)],
            FakePrices::new(vec![("0xweth", 1000)]),
            vec!["0xa"],
        );

        let ladder = h.service.cumulative_pnl(query(NOW - 10_000, NOW - 100)).await.unwrap();
        let accounts: Vec<&str> = ladder.iter().map(|s| s.account.as_str()).collect();
        assert_eq!(accounts, vec!["0xA", "0xB"]);
    }

    #[tokio::test]
    async fn test_historical_window_served_from_cache() {
        let h = harness(
            vec![winning("0xA", 5)],
            FakePrices::new(vec![("0xweth", 1000)]),
            vec![],
        );
        let q = query(NOW - 10_000, NOW - 100);

        let first = h.service.cumulative_pnl(q).await.unwrap();
        h.clock.advance(LIVE_TTL_SECS * 10);
        let second = h.service.cumulative_pnl(q).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(h.trades.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_live_window_recomputes_after_ttl() {
        let h = harness(
            vec![winning("0xA", 5)],
            FakePrices::new(vec![("0xweth", 1000)]),
            vec![],
        );
        let q = query(NOW - 10_000, NOW + 86_400);

        let first = h.service.cumulative_pnl(q).await.unwrap();
        h.clock.advance(LIVE_TTL_SECS - 1);
        let cached = h.service.cumulative_pnl(q).await.unwrap();
        assert!(Arc::ptr_eq(&first, &cached));

        h.clock.advance(1);
        let refreshed = h.service.cumulative_pnl(q).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert_eq!(first, refreshed);
        assert_eq!(h.trades.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_window_end_clamped_to_now() {
        let h = harness(vec![], FakePrices::new(vec![]), vec![]);
        h.service
            .cumulative_pnl(query(NOW - 10_000, NOW + 86_400))
            .await
            .unwrap();

        assert_eq!(h.trades.windows.lock().unwrap()[0], (NOW - 10_000, NOW));
        let snapshot = (NOW / INTERVAL_MIN5) * INTERVAL_MIN5 - INTERVAL_MIN5;
        assert_eq!(h.prices.requested.lock().unwrap()[0], snapshot);
    }

    #[tokio::test]
    async fn test_pages_through_all_trades() {
        let trades: Vec<Trade> = (0..2500)
            .map(|i| trade(&format!("0x{}", i % 7), "p1", NOW - 5000 + i))
            .collect();
        let h = harness(trades, FakePrices::new(vec![("0xweth", 1000)]), vec![]);

        let ladder = h.service.cumulative_pnl(query(0, NOW - 1)).await.unwrap();
        assert_eq!(ladder.len(), 7);
        assert_eq!(h.trades.calls.load(Ordering::SeqCst), 3);
        let total_fee = ladder.iter().fold(n(0), |sum, s| sum + s.fee);
        assert_eq!(total_fee, n(2500));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mut prices = FakePrices::new(vec![]);
        prices.fail = true;
        let h = harness(vec![winning("0xA", 5)], prices, vec![]);
        let q = query(NOW - 10_000, NOW - 100);

        assert!(matches!(
            h.service.cumulative_pnl(q).await,
            Err(LeaderboardError::Graphql(_))
        ));
        assert_eq!(h.service.cached_windows().await, 0);

        assert!(h.service.cumulative_pnl(q).await.is_err());
        assert_eq!(h.prices.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_price_fails_whole_batch() {
        let mut t = winning("0xA", 5);
        t.index_token = "0xlink".into();
        let h = harness(
            vec![winning("0xB", 1), t],
            FakePrices::new(vec![("0xweth", 1000)]),
            vec![],
        );

        let res = h.service.cumulative_pnl(query(NOW - 10_000, NOW - 100)).await;
        assert!(matches!(res, Err(LeaderboardError::MissingPrice { .. })));
        assert_eq!(h.service.cached_windows().await, 0);
    }

    #[tokio::test]
    async fn test_page_slices_ranked_ladder() {
        let trades: Vec<Trade> = (0..45).map(|i| winning(&format!("0x{i:02}"), i)).collect();
        let h = harness(trades, FakePrices::new(vec![("0xweth", 1000)]), vec![]);
        let q = query(NOW - 10_000, NOW - 100);

        let full = h.service.cumulative_pnl(q).await.unwrap();
        let page = h.service.page(q, 20, 20).await.unwrap();

        assert_eq!(page.total, 45);
        assert_eq!(page.page.as_slice(), &full[20..40]);
        // Highest realised PnL first: 0x44 .. 0x00
        assert_eq!(page.page[0].account, "0x24");
    }

    fn closed(account: &str, pct: i64) -> Trade {
        let mut t = winning(account, pct);
        t.collateral = min_settled_collateral();
        t.realised_pnl_percentage = n(pct);
        t.status = TradeStatus::Closed;
        t
    }

    #[tokio::test]
    async fn test_settled_pages_share_one_computation() {
        let trades = vec![
            closed("0xA", 300),
            closed("0xB", -700),
            winning("0xC", 0),
            closed("0xD", 1_200),
        ];
        let h = harness(trades, FakePrices::new(vec![]), vec!["0xd"]);
        let q = query(NOW - 10_000, NOW - 100);

        let high = h.service.settled_page(q, SettledOrder::Highest, 0, 20).await.unwrap();
        let low = h.service.settled_page(q, SettledOrder::Lowest, 0, 2).await.unwrap();

        let accounts = |p: &Page<SettledTradeSummary>| -> Vec<String> {
            p.page.iter().map(|s| s.account.clone()).collect()
        };
        assert_eq!(accounts(&high), vec!["0xD", "0xA", "0xB"]);
        assert!(high.page[0].claimed);
        assert_eq!(accounts(&low), vec!["0xB", "0xA"]);
        assert_eq!(low.total, 3);

        assert_eq!(h.trades.calls.load(Ordering::SeqCst), 1);
        // Settled ladders need no prices.
        assert!(h.prices.requested.lock().unwrap().is_empty());
        assert_eq!(h.service.cached_windows().await, 1);
    }

    #[tokio::test]
    async fn test_open_positions_page() {
        let mut short = winning("0xB", 0);
        short.is_long = false;
        let h = harness(
            vec![winning("0xA", 0), short, closed("0xC", 50)],
            FakePrices::new(vec![("0xweth", 1100)]),
            vec![],
        );
        let q = query(NOW - 10_000, NOW + 86_400);

        let page = h.service.open_page(q, 0, 20).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.page[0].account, "0xA");
        assert_eq!(page.page[0].delta, n(50));
        assert_eq!(page.page[1].delta, n(-50));

        // Live window: refreshed after the short TTL.
        h.service.open_page(q, 0, 20).await.unwrap();
        assert_eq!(h.trades.calls.load(Ordering::SeqCst), 1);
        h.clock.advance(LIVE_TTL_SECS);
        h.service.open_page(q, 0, 20).await.unwrap();
        assert_eq!(h.trades.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ladders_cached_independently() {
        let h = harness(
            vec![closed("0xA", 10)],
            FakePrices::new(vec![("0xweth", 1000)]),
            vec![],
        );
        let q = query(NOW - 10_000, NOW - 100);

        h.service.cumulative_pnl(q).await.unwrap();
        h.service.settled_percentage(q).await.unwrap();
        h.service.open_positions(q).await.unwrap();
        h.service.settled_percentage(q).await.unwrap();

        assert_eq!(h.service.cached_windows().await, 3);
        assert_eq!(h.trades.calls.load(Ordering::SeqCst), 3);
    }
}
