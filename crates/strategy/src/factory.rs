use crate::arbitrage::ArbitrageStrategy;
use crate::dca::DcaStrategy;
use crate::grid::GridStrategy;
use crate::market_making::MarketMakingStrategy;
use crate::mean_reversion::MeanReversionStrategy;
use crate::traits::{Strategy, StrategyDeps};
use crate::trend_following::TrendFollowingStrategy;
use autotrade_core::{EngineError, StrategyKind};
use std::collections::HashMap;

type Constructor = Box<dyn Fn(StrategyDeps) -> Box<dyn Strategy> + Send + Sync>;

/// Maps each strategy kind to a constructor. Built once at startup.
pub struct StrategyFactory {
    constructors: HashMap<StrategyKind, Constructor>,
}

impl Default for StrategyFactory {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl StrategyFactory {
    /// A factory with no registered kinds.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A factory with every built-in variant registered.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut factory = Self::empty();
        factory.register(StrategyKind::Grid, |_| Box::new(GridStrategy::new()));
        factory.register(StrategyKind::Dca, |_| Box::new(DcaStrategy::new()));
        factory.register(StrategyKind::Arbitrage, |deps| {
            Box::new(ArbitrageStrategy::new(deps))
        });
        factory.register(StrategyKind::TrendFollowing, |_| {
            Box::new(TrendFollowingStrategy::new())
        });
        factory.register(StrategyKind::MeanReversion, |_| {
            Box::new(MeanReversionStrategy::new())
        });
        factory.register(StrategyKind::MarketMaking, |deps| {
            Box::new(MarketMakingStrategy::new(deps))
        });
        factory
    }

    /// Registers or replaces the constructor for `kind`.
    pub fn register<F>(&mut self, kind: StrategyKind, constructor: F)
    where
        F: Fn(StrategyDeps) -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
    }

    #[must_use]
    pub fn supports(&self, kind: StrategyKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Creates an uninitialized strategy.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` when no constructor is registered for `kind`.
    pub fn create(&self, kind: StrategyKind, deps: StrategyDeps) -> Result<Box<dyn Strategy>, EngineError> {
        self.constructors
            .get(&kind)
            .map(|constructor| constructor(deps))
            .ok_or_else(|| EngineError::configuration(format!("Unsupported strategy type: {kind}")))
    }
}
