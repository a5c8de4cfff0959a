pub mod arbitrage;
pub mod catalog;
pub mod dca;
pub mod factory;
pub mod grid;
pub mod helpers;
pub mod market_making;
pub mod mean_reversion;
pub mod risk_gate;
pub mod router;
pub mod traits;
pub mod trend_following;

#[cfg(test)]
mod test_support;

pub use arbitrage::{ArbitragePosition, ArbitrageState, ArbitrageStrategy};
pub use catalog::{
    default_config, describe, list_available_strategies, validate_descriptor,
    validate_strategy_config, StrategyInfo, ValidationReport,
};
pub use dca::DcaStrategy;
pub use factory::StrategyFactory;
pub use grid::GridStrategy;
pub use market_making::MarketMakingStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use risk_gate::RiskGate;
pub use router::OrderRouter;
pub use traits::{Strategy, StrategyDeps};
pub use trend_following::TrendFollowingStrategy;
