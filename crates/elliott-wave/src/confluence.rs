use analysis_core::Num;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::fibonacci::{ratio, EXTENSION_LEVELS, RETRACEMENT_LEVELS};
use crate::swing::Swing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RatioType {
    Retracement,
    Extension,
    None,
}

impl RatioType {
    pub fn name(&self) -> &'static str {
        match self {
            RatioType::Retracement => "RETRACEMENT",
            RatioType::Extension => "EXTENSION",
            RatioType::None => "NONE",
        }
    }
}

/// Size of the newest swing relative to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestRatio {
    pub ratio_type: RatioType,
    pub value: f64,
}

impl LatestRatio {
    pub fn none() -> Self {
        Self {
            ratio_type: RatioType::None,
            value: f64::NAN,
        }
    }

    /// Below 1 the newest leg retraced the previous one, otherwise it
    /// extended past it.
    pub fn of<N: Num>(swings: &[Swing<N>]) -> Self {
        let [.., previous, last] = swings else {
            return Self::none();
        };
        let value = ratio(last, previous).to_f64();
        if !value.is_finite() {
            return Self::none();
        }
        let ratio_type = if value < 1.0 {
            RatioType::Retracement
        } else {
            RatioType::Extension
        };
        Self { ratio_type, value }
    }
}

/// Agreement between the latest Fibonacci ratio and the channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confluence {
    pub score: u8,
    pub ratio_match: bool,
    pub inside_channel: bool,
}

impl Confluence {
    pub fn is_confluent(&self, minimum_score: u8) -> bool {
        self.score >= minimum_score
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfluenceDetector {
    ratio_tolerance: f64,
    channel_tolerance: f64,
    minimum_score: u8,
}

impl Default for ConfluenceDetector {
    fn default() -> Self {
        Self {
            ratio_tolerance: 0.05,
            channel_tolerance: 0.1,
            minimum_score: 2,
        }
    }
}

impl ConfluenceDetector {
    pub fn new(ratio_tolerance: f64, channel_tolerance: f64) -> Self {
        Self {
            ratio_tolerance,
            channel_tolerance,
            ..Self::default()
        }
    }

    pub fn ratio_tolerance(&self) -> f64 {
        self.ratio_tolerance
    }

    pub fn minimum_score(&self) -> u8 {
        self.minimum_score
    }

    pub fn assess<N: Num>(&self, latest: &LatestRatio, close: N, channel: &Channel<N>) -> Confluence {
        let levels: &[f64] = match latest.ratio_type {
            RatioType::Retracement => &RETRACEMENT_LEVELS,
            RatioType::Extension => &EXTENSION_LEVELS,
            RatioType::None => &[],
        };
        let ratio_match = latest.value.is_finite()
            && levels
                .iter()
                .any(|level| (latest.value - level).abs() <= self.ratio_tolerance);
        let inside_channel = channel.contains(close, self.channel_tolerance);
        Confluence {
            score: ratio_match as u8 + inside_channel as u8,
            ratio_match,
            inside_channel,
        }
    }

    pub fn is_confluent(&self, confluence: &Confluence) -> bool {
        confluence.is_confluent(self.minimum_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelFitter;
    use crate::degree::Degree;
    use crate::swing::test_support::{bullish_impulse, chain};

    #[test]
    fn test_latest_ratio_types() {
        let swings: Vec<Swing<f64>> = bullish_impulse();
        // wave 5 (20) over wave 4 (10)
        let latest = LatestRatio::of(&swings);
        assert_eq!(latest.ratio_type, RatioType::Extension);
        assert!((latest.value - 2.0).abs() < 1e-12);

        // wave 4 (10) over wave 3 (32)
        let latest = LatestRatio::of(&swings[..4]);
        assert_eq!(latest.ratio_type, RatioType::Retracement);
        assert!((latest.value - 0.3125).abs() < 1e-12);

        assert_eq!(LatestRatio::of(&swings[..1]).ratio_type, RatioType::None);
    }

    #[test]
    fn test_full_confluence() {
        let swings: Vec<Swing<f64>> = bullish_impulse();
        let channel = ChannelFitter::new().fit(&swings, 46);
        let latest = LatestRatio::of(&swings);
        let detector = ConfluenceDetector::default();
        let c = detector.assess(&latest, 145.0, &channel);
        assert!(c.ratio_match);
        assert!(c.inside_channel);
        assert_eq!(c.score, 2);
        assert!(detector.is_confluent(&c));
    }

    #[test]
    fn test_partial_confluence() {
        let swings: Vec<Swing<f64>> =
            chain(&[(0, 100.0), (10, 120.0), (16, 108.0), (30, 140.0), (36, 135.0)], Degree::Minor);
        // 5 / 32 is not near a retracement level
        let latest = LatestRatio::of(&swings);
        let channel = Channel::invalid(36);
        let c = ConfluenceDetector::default().assess(&latest, 135.0, &channel);
        assert_eq!(c.score, 0);
        assert!(!ConfluenceDetector::default().is_confluent(&c));

        let none = ConfluenceDetector::default().assess(&LatestRatio::none(), 135.0, &channel);
        assert!(!none.ratio_match);
    }
}
