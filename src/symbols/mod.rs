//! Symbol discovery.
//!
//! The symbol universe comes from exchange metadata at startup, filtered to
//! actively trading symbols. An empty universe is treated as transient and
//! retried; an exchange error during discovery is fatal to the run.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::exchange::{ExchangeResult, HistorySource};

const TRADING_STATUS: &str = "TRADING";

/// Fetch the active symbol universe, retrying while it comes back empty.
///
/// Returns an empty list only when cancelled before a non-empty universe
/// was observed.
pub async fn discover_active_symbols<S: HistorySource>(
    source: &S,
    token: &CancellationToken,
    retry_delay: Duration,
) -> ExchangeResult<Vec<String>> {
    loop {
        if token.is_cancelled() {
            return Ok(Vec::new());
        }

        let info = source.exchange_info().await?;
        let symbols: Vec<String> = info
            .symbols
            .into_iter()
            .filter(|s| s.status == TRADING_STATUS)
            .map(|s| s.symbol)
            .collect();

        if !symbols.is_empty() {
            info!(count = symbols.len(), "Discovered active symbols");
            return Ok(symbols);
        }

        warn!("No active symbols returned, retrying");
        tokio::select! {
            _ = token.cancelled() => return Ok(Vec::new()),
            _ = tokio::time::sleep(retry_delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::exchange::types::{ExchangeInfo, OrderRecord, SymbolInfo, TradeRecord};
    use crate::exchange::ExchangeError;

    struct StaticSource {
        calls: AtomicUsize,
        responses: Vec<Vec<SymbolInfo>>,
        fail: bool,
    }

    impl StaticSource {
        fn with_responses(responses: Vec<Vec<SymbolInfo>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl HistorySource for StaticSource {
        async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
            if self.fail {
                return Err(ExchangeError::Api {
                    code: -1003,
                    message: "banned".to_string(),
                });
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = call.min(self.responses.len() - 1);
            Ok(ExchangeInfo {
                symbols: self.responses[idx].clone(),
            })
        }

        async fn trades_page(
            &self,
            _symbol: &str,
            _from_id: u64,
            _limit: u32,
        ) -> ExchangeResult<Vec<TradeRecord>> {
            Ok(Vec::new())
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

    fn symbol(name: &str, status: &str) -> SymbolInfo {
        SymbolInfo {
            symbol: name.to_string(),
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_filters_non_trading_symbols() {
        let source = StaticSource::with_responses(vec![vec![
            symbol("BTCUSDT", "TRADING"),
            symbol("OLDUSDT", "DELISTED"),
            symbol("ETHUSDT", "TRADING"),
            symbol("HALTUSDT", "BREAK"),
        ]]);

        let token = CancellationToken::new();
        let symbols = discover_active_symbols(&source, &token, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[tokio::test]
    async fn test_retries_while_universe_is_empty() {
        let source = StaticSource::with_responses(vec![
            vec![],
            vec![symbol("NEWUSDT", "DELISTED")],
            vec![symbol("BTCUSDT", "TRADING")],
        ]);

        let token = CancellationToken::new();
        let symbols = discover_active_symbols(&source, &token, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(symbols, vec!["BTCUSDT"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exchange_error_is_fatal() {
        let source = StaticSource {
            calls: AtomicUsize::new(0),
            responses: vec![vec![]],
            fail: true,
        };

        let token = CancellationToken::new();
        let result = discover_active_symbols(&source, &token, Duration::ZERO).await;

        assert!(matches!(result, Err(ExchangeError::Api { .. })));
    }

    #[tokio::test]
    async fn test_cancellation_stops_retry_loop() {
        let source = StaticSource::with_responses(vec![vec![]]);

        let token = CancellationToken::new();
        token.cancel();

        let symbols = discover_active_symbols(&source, &token, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(symbols.is_empty());
    }
}
