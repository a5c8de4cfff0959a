//! Shared candle cache in front of the exchange connector.

use autotrade_core::{Candle, ExchangeConnector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct CachedCandles {
    interval: String,
    limit: usize,
    candles: Vec<Candle>,
    fetched_at: Instant,
}

/// Candles keyed by (exchange account, symbol), refreshed after the TTL.
///
/// Readers share the lock; a miss fetches outside the lock and then stores.
pub struct MarketDataCache {
    exchange: Arc<dyn ExchangeConnector>,
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), CachedCandles>>,
}

impl MarketDataCache {
    #[must_use]
    pub fn new(exchange: Arc<dyn ExchangeConnector>, ttl: Duration) -> Self {
        Self {
            exchange,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns cached candles when fresh, otherwise fetches them.
    ///
    /// A failed fetch yields an empty series; strategies hold on missing data.
    pub async fn get_candles(
        &self,
        account_id: &str,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Vec<Candle> {
        let key = (account_id.to_string(), symbol.to_string());
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if entry.interval == interval
                    && entry.limit == limit
                    && entry.fetched_at.elapsed() < self.ttl
                {
                    debug!(account = account_id, symbol, "Candle cache hit");
                    return entry.candles.clone();
                }
            }
        }

        match self
            .exchange
            .get_candles(account_id, symbol, interval, limit)
            .await
        {
            Ok(candles) => {
                self.entries.write().await.insert(
                    key,
                    CachedCandles {
                        interval: interval.to_string(),
                        limit,
                        candles: candles.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                candles
            }
            Err(e) => {
                warn!(account = account_id, symbol, error = %e, "Candle fetch failed");
                Vec::new()
            }
        }
    }

    pub async fn invalidate(&self, account_id: &str, symbol: &str) {
        self.entries
            .write()
            .await
            .remove(&(account_id.to_string(), symbol.to_string()));
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperExchange;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn exchange() -> Arc<PaperExchange> {
        let exchange = Arc::new(PaperExchange::new(Decimal::ZERO));
        exchange.set_candles(
            "BTC/USDT",
            vec![Candle::flat(Utc::now(), dec!(100), dec!(1))],
        );
        exchange
    }

    #[tokio::test]
    async fn serves_from_cache_within_ttl() {
        let exchange = exchange();
        let cache = MarketDataCache::new(exchange.clone(), Duration::from_secs(60));

        assert_eq!(cache.get_candles("a", "BTC/USDT", "1h", 10).await.len(), 1);
        exchange.set_candles("BTC/USDT", Vec::new());
        assert_eq!(cache.get_candles("a", "BTC/USDT", "1h", 10).await.len(), 1);

        cache.invalidate("a", "BTC/USDT").await;
        assert!(cache.get_candles("a", "BTC/USDT", "1h", 10).await.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let exchange = exchange();
        let cache = MarketDataCache::new(exchange.clone(), Duration::ZERO);
        assert_eq!(cache.get_candles("a", "BTC/USDT", "1h", 10).await.len(), 1);
        exchange.set_candles("BTC/USDT", Vec::new());
        assert!(cache.get_candles("a", "BTC/USDT", "1h", 10).await.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_yields_empty() {
        let exchange = exchange();
        exchange.fail_market_data(true);
        let cache = MarketDataCache::new(exchange, Duration::from_secs(60));
        assert!(cache.get_candles("a", "BTC/USDT", "1h", 10).await.is_empty());
        assert!(cache.is_empty().await);
    }
}
