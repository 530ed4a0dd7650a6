//! Backfill run loop.
//!
//! Generic over [`HistorySource`] and [`RecordSink`] so the pacing, resume
//! and failure-isolation logic can be exercised against in-memory fakes.
//!
//! Loop shape per `(account, symbol)`: read the resume cursor, then fetch
//! pages ascending from it. A full page advances the cursor one past the
//! page's last identifier and paces before the next fetch; a short or empty
//! page means the symbol's history is exhausted. A failing symbol is logged,
//! counted, cooled down and skipped so one bad symbol never stalls the rest
//! of the universe.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backfill::{BackfillConfig, BackfillError, RunSummary, SymbolError};
use crate::exchange::{ExchangeResult, HistorySource};
use crate::schema::{Kind, RecordBatch};
use crate::storage::RecordSink;
use crate::symbols::discover_active_symbols;

/// One account's name and its credentialed data source.
pub struct AccountContext<S> {
    pub name: String,
    pub source: S,
}

/// Drives one backfill run to completion.
pub struct BackfillRunner<S, K> {
    accounts: Vec<AccountContext<S>>,
    sink: K,
    kind: Kind,
    config: BackfillConfig,
    token: CancellationToken,
}

impl<S: HistorySource, K: RecordSink> BackfillRunner<S, K> {
    pub fn new(
        accounts: Vec<AccountContext<S>>,
        sink: K,
        kind: Kind,
        config: BackfillConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            accounts,
            sink,
            kind,
            config,
            token,
        }
    }

    /// Run the backfill across all accounts and symbols.
    ///
    /// Returns `Err` only for fatal startup conditions (store never became
    /// ready, or symbol discovery failed); both also trigger cancellation so
    /// sibling tasks unwind. Cancellation mid-run is not an error: the
    /// summary comes back with `cancelled` set.
    pub async fn run(&self) -> Result<RunSummary, BackfillError> {
        let mut summary = RunSummary::default();

        if !self.wait_for_store().await? {
            summary.cancelled = true;
            return Ok(summary);
        }

        let Some(first) = self.accounts.first() else {
            warn!("No accounts configured, nothing to do");
            return Ok(summary);
        };

        let symbols = match discover_active_symbols(
            &first.source,
            &self.token,
            self.config.discovery_retry_delay,
        )
        .await
        {
            Ok(symbols) => symbols,
            Err(e) => {
                self.token.cancel();
                return Err(BackfillError::Discovery(e));
            }
        };

        if self.token.is_cancelled() {
            summary.cancelled = true;
            return Ok(summary);
        }

        'accounts: for account in &self.accounts {
            info!(account = %account.name, kind = %self.kind, "Backfilling account");

            for symbol in &symbols {
                if self.token.is_cancelled() {
                    break 'accounts;
                }

                match self.backfill_symbol(account, symbol, &mut summary).await {
                    Ok(()) if self.token.is_cancelled() => break 'accounts,
                    Ok(()) => {
                        summary.symbols_completed += 1;
                    }
                    Err(e) => {
                        warn!(
                            account = %account.name,
                            symbol,
                            error = %e,
                            "Symbol backfill failed, skipping"
                        );
                        summary.symbols_failed += 1;
                        if self.pause(self.config.error_cooldown).await {
                            break 'accounts;
                        }
                    }
                }
            }
        }

        if self.token.is_cancelled() {
            summary.cancelled = true;
        }

        info!(
            completed = summary.symbols_completed,
            failed = summary.symbols_failed,
            pages = summary.pages_fetched,
            records = summary.records_written,
            cancelled = summary.cancelled,
            "Backfill run finished"
        );
        Ok(summary)
    }

    /// Probe the store until ready, with doubling backoff between attempts.
    ///
    /// Returns `Ok(false)` when cancelled before the store became ready.
    /// Exhausting all attempts is fatal and triggers cancellation.
    async fn wait_for_store(&self) -> Result<bool, BackfillError> {
        let attempts = self.config.readiness_attempts;
        let mut delay = self.config.readiness_backoff_base;
        let mut last_err = None;

        for attempt in 1..=attempts {
            if self.token.is_cancelled() {
                return Ok(false);
            }

            match self.sink.ensure_ready(self.kind).await {
                Ok(()) => return Ok(true),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Store not ready");
                    last_err = Some(e);
                }
            }

            if attempt < attempts {
                if self.pause(delay).await {
                    return Ok(false);
                }
                delay *= 2;
            }
        }

        self.token.cancel();
        Err(BackfillError::Readiness {
            attempts,
            source: last_err.unwrap_or(crate::storage::StorageError::Configuration(
                "no readiness attempts configured".to_string(),
            )),
        })
    }

    /// Backfill one symbol for one account from its resume cursor.
    async fn backfill_symbol(
        &self,
        account: &AccountContext<S>,
        symbol: &str,
        summary: &mut RunSummary,
    ) -> Result<(), SymbolError> {
        let mut cursor = self
            .sink
            .resume_cursor(self.kind, symbol, &account.name)
            .await?;
        debug!(account = %account.name, symbol, cursor, "Resuming symbol");

        loop {
            if self.token.is_cancelled() {
                return Ok(());
            }

            let batch = self.fetch_page(&account.source, symbol, cursor).await?;
            summary.pages_fetched += 1;

            if !batch.is_empty() {
                let written = self.sink.persist_batch(&batch, &account.name).await?;
                summary.records_written += written as u64;
            }

            let full = batch.len() as u32 >= self.config.page_limit;
            match batch.last_id() {
                Some(last_id) if full => {
                    cursor = last_id + 1;
                    if self.pause(self.config.page_delay).await {
                        return Ok(());
                    }
                }
                _ => {
                    debug!(account = %account.name, symbol, "Symbol history exhausted");
                    return Ok(());
                }
            }
        }
    }

    async fn fetch_page(
        &self,
        source: &S,
        symbol: &str,
        cursor: u64,
    ) -> ExchangeResult<RecordBatch> {
        match self.kind {
            Kind::Trades => Ok(RecordBatch::Trades(
                source
                    .trades_page(symbol, cursor, self.config.page_limit)
                    .await?,
            )),
            Kind::Orders => Ok(RecordBatch::Orders(
                source
                    .orders_page(symbol, cursor, self.config.page_limit)
                    .await?,
            )),
        }
    }

    /// Sleep unless cancelled first. Returns true when cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::exchange::types::{ExchangeInfo, OrderRecord, SymbolInfo, TradeRecord};
    use crate::exchange::ExchangeError;
    use crate::storage::{StorageError, StorageResult};

    fn trade(symbol: &str, id: u64) -> TradeRecord {
        TradeRecord {
            symbol: symbol.to_string(),
            id,
            order_id: id * 10,
            side: "BUY".to_string(),
            position_side: "LONG".to_string(),
            buyer: true,
            price: "100.0".to_string(),
            qty: "1.0".to_string(),
            quote_qty: "100.0".to_string(),
            realized_pnl: "0".to_string(),
            commission: "0.01".to_string(),
            commission_asset: "USDT".to_string(),
            time: 1_700_000_000_000 + id as i64,
        }
    }

    fn page(symbol: &str, start_id: u64, count: u64) -> Vec<TradeRecord> {
        (start_id..start_id + count).map(|id| trade(symbol, id)).collect()
    }

    #[derive(Default)]
    struct ScriptedSource {
        symbols: Vec<SymbolInfo>,
        pages: Mutex<HashMap<String, VecDeque<Vec<TradeRecord>>>>,
        requests: Mutex<Vec<(String, u64)>>,
        fail_symbols: HashSet<String>,
        fail_info: bool,
    }

    impl ScriptedSource {
        fn new(symbols: &[&str]) -> Self {
            Self {
                symbols: symbols
                    .iter()
                    .map(|s| SymbolInfo {
                        symbol: s.to_string(),
                        status: "TRADING".to_string(),
                    })
                    .collect(),
                ..Default::default()
            }
        }

        fn script(&self, symbol: &str, pages: Vec<Vec<TradeRecord>>) {
            self.pages
                .lock()
                .unwrap()
                .insert(symbol.to_string(), pages.into());
        }

        fn requests(&self) -> Vec<(String, u64)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HistorySource for ScriptedSource {
        async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
            if self.fail_info {
                return Err(ExchangeError::Api {
                    code: -1003,
                    message: "banned".to_string(),
                });
            }
            Ok(ExchangeInfo {
                symbols: self.symbols.clone(),
            })
        }

        async fn trades_page(
            &self,
            symbol: &str,
            from_id: u64,
            _limit: u32,
        ) -> ExchangeResult<Vec<TradeRecord>> {
            self.requests
                .lock()
                .unwrap()
                .push((symbol.to_string(), from_id));

            if self.fail_symbols.contains(symbol) {
                return Err(ExchangeError::Api {
                    code: -1121,
                    message: "Invalid symbol.".to_string(),
                });
            }

            Ok(self
                .pages
                .lock()
                .unwrap()
                .get_mut(symbol)
                .and_then(|q| q.pop_front())
                .unwrap_or_default())
        }

        async fn orders_page(
            &self,
            _symbol: &str,
            _from_order_id: u64,
            _limit: u32,
        ) -> ExchangeResult<Vec<OrderRecord>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        cursors: Mutex<HashMap<(String, String), u64>>,
        persisted: Mutex<Vec<(String, String, usize, u64)>>,
        ready_failures: AtomicU32,
        ready_calls: AtomicU32,
        cancel_on_persist: Mutex<Option<CancellationToken>>,
    }

    impl MemorySink {
        fn set_cursor(&self, symbol: &str, account: &str, cursor: u64) {
            self.cursors
                .lock()
                .unwrap()
                .insert((symbol.to_string(), account.to_string()), cursor);
        }

        fn persisted(&self) -> Vec<(String, String, usize, u64)> {
            self.persisted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn ensure_ready(&self, _kind: Kind) -> StorageResult<()> {
            self.ready_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.ready_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.ready_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StorageError::Configuration("store offline".to_string()));
            }
            Ok(())
        }

        async fn resume_cursor(
            &self,
            _kind: Kind,
            symbol: &str,
            account: &str,
        ) -> StorageResult<u64> {
            Ok(*self
                .cursors
                .lock()
                .unwrap()
                .get(&(symbol.to_string(), account.to_string()))
                .unwrap_or(&0))
        }

        async fn persist_batch(&self, batch: &RecordBatch, account: &str) -> StorageResult<usize> {
            if let Some(token) = self.cancel_on_persist.lock().unwrap().as_ref() {
                token.cancel();
            }

            let symbol = match batch {
                RecordBatch::Trades(records) => {
                    records.first().map(|r| r.symbol.clone()).unwrap_or_default()
                }
                RecordBatch::Orders(records) => {
                    records.first().map(|r| r.symbol.clone()).unwrap_or_default()
                }
            };
            let last_id = batch.last_id().unwrap_or(0);
            self.persisted.lock().unwrap().push((
                symbol,
                account.to_string(),
                batch.len(),
                last_id,
            ));
            Ok(batch.len())
        }
    }

    fn test_config() -> BackfillConfig {
        BackfillConfig {
            page_limit: 3,
            page_delay: Duration::ZERO,
            error_cooldown: Duration::ZERO,
            discovery_retry_delay: Duration::ZERO,
            readiness_attempts: 5,
            readiness_backoff_base: Duration::ZERO,
        }
    }

    fn runner(
        accounts: Vec<AccountContext<Arc<ScriptedSource>>>,
        sink: Arc<MemorySink>,
        config: BackfillConfig,
        token: CancellationToken,
    ) -> BackfillRunner<Arc<ScriptedSource>, Arc<MemorySink>> {
        BackfillRunner::new(accounts, sink, Kind::Trades, config, token)
    }

    fn account(name: &str, source: &Arc<ScriptedSource>) -> AccountContext<Arc<ScriptedSource>> {
        AccountContext {
            name: name.to_string(),
            source: Arc::clone(source),
        }
    }

    #[tokio::test]
    async fn test_full_page_advances_cursor_past_last_id() {
        let source = Arc::new(ScriptedSource::new(&["BTCUSDT"]));
        source.script("BTCUSDT", vec![page("BTCUSDT", 5, 3), page("BTCUSDT", 9, 2)]);
        let sink = Arc::new(MemorySink::default());

        let runner = runner(
            vec![account("main", &source)],
            Arc::clone(&sink),
            test_config(),
            CancellationToken::new(),
        );
        let summary = runner.run().await.unwrap();

        // Full page of ids 5,6,7 resumes from 8; short page ends the symbol.
        assert_eq!(
            source.requests(),
            vec![("BTCUSDT".to_string(), 0), ("BTCUSDT".to_string(), 8)]
        );
        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.records_written, 5);
        assert_eq!(summary.symbols_completed, 1);
        assert_eq!(summary.symbols_failed, 0);
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_resume_cursor_seeds_first_request() {
        let source = Arc::new(ScriptedSource::new(&["BTCUSDT"]));
        source.script("BTCUSDT", vec![page("BTCUSDT", 42, 1)]);
        let sink = Arc::new(MemorySink::default());
        sink.set_cursor("BTCUSDT", "main", 42);

        let runner = runner(
            vec![account("main", &source)],
            Arc::clone(&sink),
            test_config(),
            CancellationToken::new(),
        );
        runner.run().await.unwrap();

        assert_eq!(source.requests(), vec![("BTCUSDT".to_string(), 42)]);
    }

    #[tokio::test]
    async fn test_empty_first_page_completes_without_persisting() {
        let source = Arc::new(ScriptedSource::new(&["BTCUSDT"]));
        let sink = Arc::new(MemorySink::default());

        let runner = runner(
            vec![account("main", &source)],
            Arc::clone(&sink),
            test_config(),
            CancellationToken::new(),
        );
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.pages_fetched, 1);
        assert_eq!(summary.records_written, 0);
        assert_eq!(summary.symbols_completed, 1);
        assert!(sink.persisted().is_empty());
    }

    #[tokio::test]
    async fn test_symbol_failure_is_isolated() {
        let source = Arc::new(ScriptedSource {
            symbols: ScriptedSource::new(&["BADUSDT", "ETHUSDT"]).symbols,
            fail_symbols: HashSet::from(["BADUSDT".to_string()]),
            ..Default::default()
        });
        source.script("ETHUSDT", vec![page("ETHUSDT", 1, 2)]);
        let sink = Arc::new(MemorySink::default());

        let runner = runner(
            vec![account("main", &source)],
            Arc::clone(&sink),
            test_config(),
            CancellationToken::new(),
        );
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.symbols_failed, 1);
        assert_eq!(summary.symbols_completed, 1);
        let persisted = sink.persisted();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].0, "ETHUSDT");
    }

    #[tokio::test]
    async fn test_accounts_processed_with_scoped_cursors() {
        let main_source = Arc::new(ScriptedSource::new(&["BTCUSDT"]));
        main_source.script("BTCUSDT", vec![page("BTCUSDT", 10, 1)]);
        let hedge_source = Arc::new(ScriptedSource::new(&["BTCUSDT"]));
        hedge_source.script("BTCUSDT", vec![page("BTCUSDT", 99, 1)]);

        let sink = Arc::new(MemorySink::default());
        sink.set_cursor("BTCUSDT", "main", 10);
        sink.set_cursor("BTCUSDT", "hedge", 99);

        let runner = runner(
            vec![
                account("main", &main_source),
                account("hedge", &hedge_source),
            ],
            Arc::clone(&sink),
            test_config(),
            CancellationToken::new(),
        );
        let summary = runner.run().await.unwrap();

        assert_eq!(main_source.requests(), vec![("BTCUSDT".to_string(), 10)]);
        assert_eq!(hedge_source.requests(), vec![("BTCUSDT".to_string(), 99)]);
        assert_eq!(summary.symbols_completed, 2);

        let persisted = sink.persisted();
        assert_eq!(persisted[0].1, "main");
        assert_eq!(persisted[1].1, "hedge");
    }

    #[tokio::test]
    async fn test_store_readiness_retries_then_succeeds() {
        let source = Arc::new(ScriptedSource::new(&["BTCUSDT"]));
        let sink = Arc::new(MemorySink {
            ready_failures: AtomicU32::new(2),
            ..Default::default()
        });

        let runner = runner(
            vec![account("main", &source)],
            Arc::clone(&sink),
            test_config(),
            CancellationToken::new(),
        );
        let summary = runner.run().await.unwrap();

        assert_eq!(sink.ready_calls.load(Ordering::SeqCst), 3);
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_store_readiness_exhaustion_is_fatal() {
        let source = Arc::new(ScriptedSource::new(&["BTCUSDT"]));
        let sink = Arc::new(MemorySink {
            ready_failures: AtomicU32::new(10),
            ..Default::default()
        });
        let token = CancellationToken::new();

        let runner = runner(
            vec![account("main", &source)],
            Arc::clone(&sink),
            test_config(),
            token.clone(),
        );
        let result = runner.run().await;

        assert!(matches!(
            result,
            Err(BackfillError::Readiness { attempts: 5, .. })
        ));
        assert_eq!(sink.ready_calls.load(Ordering::SeqCst), 5);
        // Fatal startup errors propagate cancellation; no fetches happened.
        assert!(token.is_cancelled());
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_discovery_error_is_fatal() {
        let source = Arc::new(ScriptedSource {
            fail_info: true,
            ..Default::default()
        });
        let sink = Arc::new(MemorySink::default());
        let token = CancellationToken::new();

        let runner = runner(
            vec![account("main", &source)],
            Arc::clone(&sink),
            test_config(),
            token.clone(),
        );
        let result = runner.run().await;

        assert!(matches!(result, Err(BackfillError::Discovery(_))));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_during_pacing_stops_promptly() {
        let source = Arc::new(ScriptedSource::new(&["BTCUSDT"]));
        // Two full pages scripted; cancellation must stop after the first.
        source.script(
            "BTCUSDT",
            vec![page("BTCUSDT", 0, 3), page("BTCUSDT", 3, 3)],
        );

        let token = CancellationToken::new();
        let sink = Arc::new(MemorySink {
            cancel_on_persist: Mutex::new(Some(token.clone())),
            ..Default::default()
        });

        let config = BackfillConfig {
            page_delay: Duration::from_secs(60),
            ..test_config()
        };

        let runner = runner(
            vec![account("main", &source)],
            Arc::clone(&sink),
            config,
            token,
        );
        let summary = runner.run().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(source.requests().len(), 1);
        assert_eq!(sink.persisted().len(), 1);
    }

    #[tokio::test]
    async fn test_no_accounts_is_a_noop() {
        let sink = Arc::new(MemorySink::default());
        let runner = runner(
            Vec::new(),
            Arc::clone(&sink),
            test_config(),
            CancellationToken::new(),
        );

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.symbols_completed, 0);
        assert_eq!(summary.pages_fetched, 0);
    }
}
