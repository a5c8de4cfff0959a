//! Getting orders to the exchange: retry, logging, cached market data, and a
//! paper exchange.

pub mod market_cache;
pub mod paper;
pub mod pipeline;
pub mod retry;

pub use market_cache::MarketDataCache;
pub use paper::PaperExchange;
pub use pipeline::ExecutionPipeline;
pub use retry::RetryPolicy;
