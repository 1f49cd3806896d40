use analysis_core::adaptive::{clamp_unit, mean};
use analysis_core::{AnalysisError, Num};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::fibonacci::{
    ratio, FibonacciValidator, WAVE2_RETRACEMENT, WAVE3_EXTENSION, WAVE4_RETRACEMENT, WAVE5_PROJECTION,
    WAVE_B_FLAT_RETRACEMENT, WAVE_B_RETRACEMENT, WAVE_C_EXTENSION,
};
use crate::phase::Phase;
use crate::scenario::ScenarioType;
use crate::swing::Swing;

pub const HIGH_CONFIDENCE: f64 = 0.7;
pub const LOW_CONFIDENCE: f64 = 0.3;

/// Relative weight of each scoring factor. Must sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub fibonacci: f64,
    pub time: f64,
    pub alternation: f64,
    pub channel: f64,
    pub completeness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fibonacci: 0.35,
            time: 0.20,
            alternation: 0.15,
            channel: 0.15,
            completeness: 0.15,
        }
    }
}

impl ScoreWeights {
    fn as_array(&self) -> [f64; 5] {
        [self.fibonacci, self.time, self.alternation, self.channel, self.completeness]
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let weights = self.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "score weights must be non-negative numbers: {:?}",
                weights
            )));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(AnalysisError::InvalidConfig(format!(
                "score weights must sum to 1, got {:.6}",
                total
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
        }
    }
}

/// Multi-factor confidence of a wave count. All scores lie in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub overall: f64,
    pub fibonacci: f64,
    pub time: f64,
    pub alternation: f64,
    pub channel: f64,
    pub completeness: f64,
    pub primary_reason: String,
    pub weakest_factor: String,
}

impl Confidence {
    pub fn zero() -> Self {
        Self {
            overall: 0.0,
            fibonacci: 0.0,
            time: 0.0,
            alternation: 0.0,
            channel: 0.0,
            completeness: 0.0,
            primary_reason: "No wave structure".to_string(),
            weakest_factor: "Structure completeness".to_string(),
        }
    }

    pub fn as_percentage(&self) -> f64 {
        self.overall * 100.0
    }

    pub fn is_high(&self) -> bool {
        self.overall >= HIGH_CONFIDENCE
    }

    pub fn is_low(&self) -> bool {
        self.overall < LOW_CONFIDENCE
    }

    pub fn level(&self) -> ConfidenceLevel {
        if self.is_high() {
            ConfidenceLevel::High
        } else if self.is_low() {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Medium
        }
    }
}

const FACTOR_STRENGTHS: [&str; 5] = [
    "Strong Fibonacci conformance",
    "Good time proportions",
    "Clear wave alternation",
    "Strong channel adherence",
    "Complete structure",
];

const FACTOR_NAMES: [&str; 5] = [
    "Fibonacci ratios",
    "Time proportions",
    "Wave alternation",
    "Channel adherence",
    "Structure completeness",
];

const NEUTRAL: f64 = 0.5;

/// Scores a wave count on Fibonacci conformance, time proportion,
/// alternation, channel adherence and completeness.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    weights: ScoreWeights,
    validator: FibonacciValidator,
    channel_tolerance: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            validator: FibonacciValidator::default(),
            channel_tolerance: 0.1,
        }
    }
}

impl ConfidenceScorer {
    pub fn new(
        weights: ScoreWeights,
        validator: FibonacciValidator,
        channel_tolerance: f64,
    ) -> Result<Self, AnalysisError> {
        weights.validate()?;
        if !channel_tolerance.is_finite() || channel_tolerance < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "channel tolerance must be non-negative, got {}",
                channel_tolerance
            )));
        }
        Ok(Self {
            weights,
            validator,
            channel_tolerance,
        })
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Score the legs of the current structure, counted from wave 1 (or wave
    /// A for corrective phases). `closes[i]` is the close of bar `i`.
    pub fn score<N: Num>(&self, swings: &[Swing<N>], phase: Phase, channel: &Channel<N>, closes: &[N]) -> Confidence {
        self.score_with_continuation(swings, phase, channel, closes, 0)
    }

    /// Like [`score`](Self::score), for a count that also assumes
    /// `continuation_legs` unconfirmed legs of the following structure.
    pub fn score_with_continuation<N: Num>(
        &self,
        swings: &[Swing<N>],
        phase: Phase,
        channel: &Channel<N>,
        closes: &[N],
        continuation_legs: usize,
    ) -> Confidence {
        self.score_counted(swings, phase, None, channel, closes, continuation_legs)
    }

    /// Score a complete structure of the given pattern. Corrective patterns
    /// are held to their own wave B band, so a zigzag and a flat over the
    /// same swings score differently.
    pub fn score_pattern<N: Num>(
        &self,
        swings: &[Swing<N>],
        pattern: ScenarioType,
        channel: &Channel<N>,
        closes: &[N],
        continuation_legs: usize,
    ) -> Confidence {
        let phase = if pattern.is_impulse() { Phase::Wave5 } else { Phase::CorrectiveC };
        self.score_counted(swings, phase, Some(pattern), channel, closes, continuation_legs)
    }

    fn score_counted<N: Num>(
        &self,
        swings: &[Swing<N>],
        phase: Phase,
        pattern: Option<ScenarioType>,
        channel: &Channel<N>,
        closes: &[N],
        continuation_legs: usize,
    ) -> Confidence {
        if swings.is_empty() || phase == Phase::None {
            return Confidence::zero();
        }

        let impulse = phase.is_impulse();
        let scores = [
            clamp_unit(if impulse {
                self.impulse_fibonacci(swings)
            } else {
                self.corrective_fibonacci(swings, pattern)
            }),
            clamp_unit(if impulse { impulse_time(swings) } else { corrective_time(swings) }),
            clamp_unit(if impulse { alternation(swings) } else { NEUTRAL }),
            clamp_unit(self.channel_adherence(swings, channel, closes)),
            clamp_unit(completeness(swings.len(), phase) - 0.1 * continuation_legs as f64),
        ];

        let weighted: Vec<f64> = self
            .weights
            .as_array()
            .iter()
            .zip(scores.iter())
            .map(|(w, s)| w * s)
            .collect();
        let overall = clamp_unit(weighted.iter().sum());

        let primary = argmax(&weighted);
        let weakest = argmin(&scores);

        Confidence {
            overall,
            fibonacci: scores[0],
            time: scores[1],
            alternation: scores[2],
            channel: scores[3],
            completeness: scores[4],
            primary_reason: FACTOR_STRENGTHS[primary].to_string(),
            weakest_factor: FACTOR_NAMES[weakest].to_string(),
        }
    }

    fn impulse_fibonacci<N: Num>(&self, w: &[Swing<N>]) -> f64 {
        let v = &self.validator;
        let mut parts = Vec::with_capacity(4);
        if w.len() >= 2 {
            parts.push(v.retracement_fit(ratio(&w[1], &w[0]).to_f64(), WAVE2_RETRACEMENT));
        }
        if w.len() >= 3 {
            parts.push(v.extension_fit(ratio(&w[2], &w[0]).to_f64(), WAVE3_EXTENSION));
        }
        if w.len() >= 4 {
            parts.push(v.retracement_fit(ratio(&w[3], &w[2]).to_f64(), WAVE4_RETRACEMENT));
        }
        if w.len() >= 5 {
            parts.push(v.extension_fit(ratio(&w[4], &w[0]).to_f64(), WAVE5_PROJECTION));
        }
        mean(&parts)
    }

    /// Without a pattern wave B is scored against whichever band it fits best.
    fn corrective_fibonacci<N: Num>(&self, w: &[Swing<N>], pattern: Option<ScenarioType>) -> f64 {
        let v = &self.validator;
        let mut parts = Vec::with_capacity(2);
        if w.len() >= 2 {
            let b = ratio(&w[1], &w[0]).to_f64();
            let zigzag = v.proximity_score(b, WAVE_B_RETRACEMENT);
            let flat = v.proximity_score(b, WAVE_B_FLAT_RETRACEMENT);
            parts.push(match pattern {
                Some(ScenarioType::CorrectiveZigzag) => zigzag,
                Some(ScenarioType::CorrectiveFlat) => flat,
                Some(ScenarioType::Impulse) | None => zigzag.max(flat),
            });
        }
        if w.len() >= 3 {
            parts.push(v.proximity_score(ratio(&w[2], &w[0]).to_f64(), WAVE_C_EXTENSION));
        }
        mean(&parts)
    }

    fn channel_adherence<N: Num>(&self, swings: &[Swing<N>], channel: &Channel<N>, closes: &[N]) -> f64 {
        if !channel.is_valid() || closes.is_empty() {
            return NEUTRAL;
        }
        let (Some(first), Some(last)) = (swings.first(), swings.last()) else {
            return NEUTRAL;
        };
        let end = last.to_index.min(closes.len() - 1);
        if first.from_index > end {
            return NEUTRAL;
        }
        let mut inside = 0usize;
        let mut total = 0usize;
        for (i, close) in closes.iter().enumerate().take(end + 1).skip(first.from_index) {
            if !close.is_valid() {
                continue;
            }
            total += 1;
            if channel.contains_at(i, *close, self.channel_tolerance) {
                inside += 1;
            }
        }
        if total == 0 {
            return NEUTRAL;
        }
        inside as f64 / total as f64
    }
}

fn impulse_time<N: Num>(w: &[Swing<N>]) -> f64 {
    if w.len() < 3 {
        return NEUTRAL;
    }
    let mut score = NEUTRAL;
    if w[2].length() >= w[0].length() {
        score += 0.25;
    }
    if let Some(w5) = w.get(4) {
        let proportion = w5.length() as f64 / w[0].length().max(1) as f64;
        if (0.5..=1.5).contains(&proportion) {
            score += 0.25;
        }
    }
    score
}

fn corrective_time<N: Num>(w: &[Swing<N>]) -> f64 {
    if w.len() < 3 {
        return NEUTRAL;
    }
    let mut score = NEUTRAL;
    let proportion = w[2].length() as f64 / w[0].length().max(1) as f64;
    if (0.618..=1.618).contains(&proportion) {
        score += 0.25;
    }
    if w[1].length() <= w[0].length() + w[2].length() {
        score += 0.25;
    }
    score
}

/// Waves 2 and 4 should differ in depth and duration.
fn alternation<N: Num>(w: &[Swing<N>]) -> f64 {
    if w.len() < 4 {
        return NEUTRAL;
    }
    let depth2 = ratio(&w[1], &w[0]).to_f64();
    let depth4 = ratio(&w[3], &w[2]).to_f64();
    if !depth2.is_finite() || !depth4.is_finite() {
        return NEUTRAL;
    }
    let depth_contrast = (2.0 * (depth2 - depth4).abs()).min(1.0);
    let (bars2, bars4) = (w[1].length() as f64, w[3].length() as f64);
    let duration_contrast = ((bars2 - bars4).abs() / bars2.max(bars4).max(1.0)).min(1.0);
    (depth_contrast + duration_contrast) / 2.0
}

fn completeness(actual: usize, phase: Phase) -> f64 {
    let expected = if phase.is_impulse() {
        5
    } else if phase.is_corrective() {
        3
    } else {
        return 0.0;
    };
    let mut score = (actual as f64 / expected as f64).min(1.0);
    if phase.completes_structure() {
        score += 0.1;
    }
    score.min(1.0)
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn argmin(values: &[f64]) -> usize {
    let mut worst = 0;
    for (i, v) in values.iter().enumerate() {
        if *v < values[worst] {
            worst = i;
        }
    }
    worst
}
