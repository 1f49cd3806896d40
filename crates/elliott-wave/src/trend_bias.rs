use analysis_core::{AnalysisError, Num};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scenario::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Unknown,
}

impl TrendDirection {
    pub fn name(&self) -> &'static str {
        match self {
            TrendDirection::Bullish => "BULLISH",
            TrendDirection::Bearish => "BEARISH",
            TrendDirection::Unknown => "UNKNOWN",
        }
    }

    /// +1 bullish, -1 bearish, 0 unknown.
    pub fn sign(&self) -> f64 {
        match self {
            TrendDirection::Bullish => 1.0,
            TrendDirection::Bearish => -1.0,
            TrendDirection::Unknown => 0.0,
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Confidence-weighted lean of a set of scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBias {
    pub direction: TrendDirection,
    /// |net score|, in [0, 1]
    pub strength: f64,
    /// Share of total confidence held by bullish scenarios
    pub bullish_score: f64,
    pub bearish_score: f64,
}

impl TrendBias {
    pub fn unknown() -> Self {
        Self {
            direction: TrendDirection::Unknown,
            strength: 0.0,
            bullish_score: 0.0,
            bearish_score: 0.0,
        }
    }

    /// Signed score in [-1, 1].
    pub fn net_score(&self) -> f64 {
        self.bullish_score - self.bearish_score
    }

    pub fn is_directional(&self) -> bool {
        self.direction != TrendDirection::Unknown
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrendBiasAggregator {
    neutral_threshold: f64,
}

impl Default for TrendBiasAggregator {
    fn default() -> Self {
        Self { neutral_threshold: 0.1 }
    }
}

impl TrendBiasAggregator {
    pub fn new(neutral_threshold: f64) -> Result<Self, AnalysisError> {
        if !(0.0..1.0).contains(&neutral_threshold) {
            return Err(AnalysisError::InvalidConfig(format!(
                "neutral threshold must lie in [0, 1), got {}",
                neutral_threshold
            )));
        }
        Ok(Self { neutral_threshold })
    }

    pub fn neutral_threshold(&self) -> f64 {
        self.neutral_threshold
    }

    pub fn aggregate<'a, N, I>(&self, scenarios: I) -> TrendBias
    where
        N: Num + 'a,
        I: IntoIterator<Item = &'a Scenario<N>>,
    {
        let mut bullish = 0.0;
        let mut bearish = 0.0;
        for s in scenarios {
            let weight = s.confidence_score();
            if !weight.is_finite() || weight <= 0.0 {
                continue;
            }
            if s.is_bullish() {
                bullish += weight;
            } else {
                bearish += weight;
            }
        }

        let total = bullish + bearish;
        if total <= 0.0 {
            return TrendBias::unknown();
        }

        let bullish_score = bullish / total;
        let bearish_score = bearish / total;
        let score = bullish_score - bearish_score;
        let direction = if score > self.neutral_threshold {
            TrendDirection::Bullish
        } else if score < -self.neutral_threshold {
            TrendDirection::Bearish
        } else {
            TrendDirection::Unknown
        };

        TrendBias {
            direction,
            strength: score.abs().min(1.0),
            bullish_score,
            bearish_score,
        }
    }
}
