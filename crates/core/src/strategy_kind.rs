use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of strategy variants the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Grid,
    Dca,
    Arbitrage,
    TrendFollowing,
    MeanReversion,
    MarketMaking,
}

impl StrategyKind {
    pub const ALL: [Self; 6] = [
        Self::Grid,
        Self::Dca,
        Self::Arbitrage,
        Self::TrendFollowing,
        Self::MeanReversion,
        Self::MarketMaking,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Dca => "dca",
            Self::Arbitrage => "arbitrage",
            Self::TrendFollowing => "trend_following",
            Self::MeanReversion => "mean_reversion",
            Self::MarketMaking => "market_making",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = EngineError;

    /// Accepts snake_case, kebab-case, or upper-case spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .or(match normalized.as_str() {
                "dollar_cost_average" | "dollar_cost_averaging" => Some(Self::Dca),
                "trend" => Some(Self::TrendFollowing),
                _ => None,
            })
            .ok_or_else(|| EngineError::configuration(format!("Unsupported strategy type: {s}")))
    }
}
