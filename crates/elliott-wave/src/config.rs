use analysis_core::AnalysisError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::compressor::SwingCompressorConfig;
use crate::confidence::{ConfidenceScorer, ScoreWeights};
use crate::fibonacci::{FibonacciValidator, ToleranceMode};
use crate::generator::{GeneratorConfig, PatternSet};
use crate::probability::ProbabilityNormalizer;
use crate::zigzag::SwingDetectorConfig;

/// Settings for analysing one degree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub swing_detector: SwingDetectorConfig,
    pub compressor: SwingCompressorConfig,
    /// Widening applied to Fibonacci ratio bands
    pub fibonacci_tolerance: f64,
    pub tolerance_mode: ToleranceMode,
    pub score_weights: ScoreWeights,
    /// Channel slack as a fraction of the channel width
    pub channel_tolerance: f64,
    pub min_confidence: f64,
    pub max_scenarios: usize,
    /// Unconfirmed legs a count may assume past its structure, at most 2
    pub max_continuation_legs: usize,
    /// Most recent structural swings considered for counting
    pub scenario_swing_window: usize,
    pub trend_neutral_threshold: f64,
    pub patterns: PatternSet,
    pub probability: ProbabilityNormalizer,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            swing_detector: SwingDetectorConfig::default(),
            compressor: SwingCompressorConfig::default(),
            fibonacci_tolerance: 0.05,
            tolerance_mode: ToleranceMode::Absolute,
            score_weights: ScoreWeights::default(),
            channel_tolerance: 0.1,
            min_confidence: 0.15,
            max_scenarios: 5,
            max_continuation_legs: 2,
            scenario_swing_window: 8,
            trend_neutral_threshold: 0.1,
            patterns: PatternSet::default(),
            probability: ProbabilityNormalizer::default(),
        }
    }
}

impl WaveConfig {
    /// Defaults overridden by `ELLIOTT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_value("ELLIOTT_FIB_TOLERANCE") {
            config.fibonacci_tolerance = v;
        }
        if let Some(v) = env_value("ELLIOTT_MIN_CONFIDENCE") {
            config.min_confidence = v;
        }
        if let Some(v) = env_value("ELLIOTT_MAX_SCENARIOS") {
            config.max_scenarios = v;
        }
        if let Some(v) = env_value("ELLIOTT_SWING_WINDOW") {
            config.scenario_swing_window = v;
        }
        if let SwingDetectorConfig::Adaptive(ref mut adaptive) = config.swing_detector {
            if let Some(v) = env_value("ELLIOTT_ATR_PERIOD") {
                adaptive.atr_period = v;
            }
            if let Some(v) = env_value("ELLIOTT_ATR_MULTIPLIER") {
                adaptive.multiplier = v;
            }
        }
        config
    }

    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AnalysisError::InvalidConfig(format!("malformed wave config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.swing_detector.validate()?;
        self.compressor.validate()?;
        self.score_weights.validate()?;
        self.generator_config().validate()?;
        self.probability.validate()?;
        if !self.fibonacci_tolerance.is_finite() || self.fibonacci_tolerance < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "fibonacci_tolerance must be non-negative, got {}",
                self.fibonacci_tolerance
            )));
        }
        if !self.channel_tolerance.is_finite() || self.channel_tolerance < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "channel_tolerance must be non-negative, got {}",
                self.channel_tolerance
            )));
        }
        // an impulse needs five swings
        if self.scenario_swing_window < 5 {
            return Err(AnalysisError::InvalidConfig(format!(
                "scenario_swing_window must be at least 5, got {}",
                self.scenario_swing_window
            )));
        }
        if !(0.0..1.0).contains(&self.trend_neutral_threshold) {
            return Err(AnalysisError::InvalidConfig(format!(
                "trend_neutral_threshold must lie in [0, 1), got {}",
                self.trend_neutral_threshold
            )));
        }
        Ok(())
    }

    pub fn validator(&self) -> Result<FibonacciValidator, AnalysisError> {
        FibonacciValidator::new(self.fibonacci_tolerance, self.tolerance_mode)
    }

    pub fn scorer(&self) -> Result<ConfidenceScorer, AnalysisError> {
        ConfidenceScorer::new(self.score_weights, self.validator()?, self.channel_tolerance)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            min_confidence: self.min_confidence,
            max_scenarios: self.max_scenarios,
            max_continuation_legs: self.max_continuation_legs,
            patterns: self.patterns,
        }
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}: cannot parse '{}'", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zigzag::AdaptiveZigZagConfig;

    #[test]
    fn test_defaults_are_valid() {
        let config = WaveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_scenarios, 5);
        assert_eq!(config.min_confidence, 0.15);
        assert!(config.scorer().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = WaveConfig::from_json(
            r#"{
                "fibonacci_tolerance": 0.25,
                "swing_detector": {"mode": "fixed", "reversal_pct": 0.05},
                "patterns": {"flat": false}
            }"#,
        )
        .unwrap();
        assert_eq!(config.fibonacci_tolerance, 0.25);
        assert_eq!(config.swing_detector, SwingDetectorConfig::fixed(0.05));
        assert!(config.patterns.impulse);
        assert!(!config.patterns.flat);
        assert_eq!(config.scenario_swing_window, 8);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(WaveConfig::from_json("{not json").is_err());
        assert!(matches!(
            WaveConfig::from_json(r#"{"max_scenarios": 0}"#),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(WaveConfig::from_json(r#"{"fibonacci_tolerance": -1.0}"#).is_err());
        assert!(WaveConfig::from_json(r#"{"scenario_swing_window": 3}"#).is_err());
    }

    #[test]
    fn test_generator_and_probability_settings() {
        let config = WaveConfig::from_json(
            r#"{
                "max_continuation_legs": 1,
                "probability": {"consensus_weight": 0.2, "max_blend": 0.25}
            }"#,
        )
        .unwrap();
        assert_eq!(config.generator_config().max_continuation_legs, 1);
        assert_eq!(config.probability.consensus_weight(), 0.2);
        assert_eq!(config.probability.max_blend(), 0.25);

        assert!(WaveConfig::from_json(r#"{"max_continuation_legs": 3}"#).is_err());
        assert!(WaveConfig::from_json(r#"{"probability": {"sharpening": 0.5}}"#).is_err());
        assert!(WaveConfig::from_json(r#"{"probability": {"max_blend": 0.9}}"#).is_err());
    }

    #[test]
    fn test_invalid_detector_is_reported() {
        let config = WaveConfig {
            swing_detector: SwingDetectorConfig::Adaptive(AdaptiveZigZagConfig {
                atr_period: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    // Single test touching the environment to avoid races between threads.
    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("ELLIOTT_FIB_TOLERANCE", "0.2");
        std::env::set_var("ELLIOTT_MAX_SCENARIOS", "3");
        std::env::set_var("ELLIOTT_ATR_PERIOD", "21");
        std::env::set_var("ELLIOTT_MIN_CONFIDENCE", "lots");
        let config = WaveConfig::from_env();
        for key in [
            "ELLIOTT_FIB_TOLERANCE",
            "ELLIOTT_MAX_SCENARIOS",
            "ELLIOTT_ATR_PERIOD",
            "ELLIOTT_MIN_CONFIDENCE",
        ] {
            std::env::remove_var(key);
        }

        assert_eq!(config.fibonacci_tolerance, 0.2);
        assert_eq!(config.max_scenarios, 3);
        assert_eq!(config.min_confidence, 0.15);
        match config.swing_detector {
            SwingDetectorConfig::Adaptive(adaptive) => assert_eq!(adaptive.atr_period, 21),
            other => panic!("unexpected detector {:?}", other),
        }
    }
}
