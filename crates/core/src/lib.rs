pub mod bot_config;
pub mod config;
pub mod config_loader;
pub mod context;
pub mod error;
pub mod execution_record;
pub mod lifecycle;
pub mod market;
pub mod metrics_formatter;
pub mod orders;
pub mod performance;
pub mod position;
pub mod position_sizing;
pub mod risk_analytics;
pub mod rules;
pub mod signal;
pub mod strategy_kind;
pub mod traits;

pub use bot_config::{
    BotConfig, BotConfigPatch, ExecutionPolicy, MarketDescriptor, RiskManagement,
    StrategyDescriptor, StrategyParameters,
};
pub use config::{AppConfig, DatabaseConfig, EngineSettings, PaperSettings};
pub use config_loader::ConfigLoader;
pub use context::BotContext;
pub use error::{EngineError, EngineResult};
pub use execution_record::{BotExecutionRecord, ExecutionAction, ExecutionStatus};
pub use lifecycle::{BotLifecycleState, StoredBot};
pub use market::{split_symbol, Candle, Ticker};
pub use metrics_formatter::MetricsFormatter;
pub use orders::{
    OpenOrder, OrderRequest, OrderResult, OrderSide, OrderStatus, OrderType, TimeInForce,
    TradeRecord,
};
pub use performance::PerformanceMetrics;
pub use position::{Position, PositionTracker};
pub use risk_analytics::{
    KellyRiskAnalytics, SizingRequest, SizingResult, StopLossDecision, StopLossRequest,
};
pub use rules::{Comparison, ConditionNode, IndicatorConfig, IndicatorKind, Operand};
pub use signal::{Signal, TradeSignal};
pub use strategy_kind::StrategyKind;
pub use traits::{BotStore, ExchangeConnector, RiskAnalytics};
