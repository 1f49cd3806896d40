use analysis_core::adaptive::{clamp_unit, scaled};
use analysis_core::{AnalysisError, Num, PriceSeries, SeriesWindow};
use chrono::Duration;
use elliott_wave::{DegreeAnalysis, Degree, ElliottWaveAnalyzer, Scenario, SwingCompressorConfig, WaveConfig};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const CONFIDENCE_WEIGHT: f64 = 0.7;
const SUPPORT_WEIGHT: f64 = 0.3;

const DIRECTION_WEIGHT: f64 = 0.55;
const STRUCTURE_WEIGHT: f64 = 0.30;
const INVALIDATION_WEIGHT: f64 = 0.15;

/// Support assumed when no other degree has an opinion.
const NEUTRAL_SUPPORT: f64 = 0.5;

/// Contiguous run of degrees around a central one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegreeBand {
    pub central: Degree,
    pub higher: usize,
    pub lower: usize,
}

impl Default for DegreeBand {
    fn default() -> Self {
        Self {
            central: Degree::Primary,
            higher: 1,
            lower: 1,
        }
    }
}

impl DegreeBand {
    pub fn new(central: Degree, higher: usize, lower: usize) -> Self {
        Self { central, higher, lower }
    }

    pub fn single(central: Degree) -> Self {
        Self::new(central, 0, 0)
    }

    /// Degrees in the band, largest first, cut off at either end of the scale.
    pub fn degrees(&self) -> Vec<Degree> {
        Degree::band(self.central, self.higher, self.lower)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub band: DegreeBand,
    /// Settings shared by every degree
    pub wave: WaveConfig,
    /// Compressor floor at the central degree; `wave.compressor` may raise it
    pub base_compressor: SwingCompressorConfig,
    /// Growth of the compressor amplitude per degree step
    pub compressor_step_factor: f64,
    pub min_amplitude_pct: f64,
    pub max_amplitude_pct: f64,
    pub max_min_bars: usize,
    /// Cut each degree's input to the longest history its range recommends.
    /// Needs a known bar duration.
    pub limit_history: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            band: DegreeBand::default(),
            wave: WaveConfig::default(),
            base_compressor: SwingCompressorConfig {
                min_amplitude_pct: 0.01,
                min_bars: 2,
            },
            compressor_step_factor: 1.5,
            min_amplitude_pct: 0.0025,
            max_amplitude_pct: 0.05,
            max_min_bars: 200,
            limit_history: true,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.wave.validate()?;
        self.base_compressor.validate()?;
        if !self.compressor_step_factor.is_finite() || self.compressor_step_factor < 1.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "compressor_step_factor must be at least 1, got {}",
                self.compressor_step_factor
            )));
        }
        if !(self.max_amplitude_pct > 0.0 && self.max_amplitude_pct <= 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "max_amplitude_pct must lie in (0, 1], got {}",
                self.max_amplitude_pct
            )));
        }
        if !(self.min_amplitude_pct >= 0.0 && self.min_amplitude_pct <= self.max_amplitude_pct) {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_amplitude_pct must lie in [0, {}], got {}",
                self.max_amplitude_pct, self.min_amplitude_pct
            )));
        }
        let central = self.central_compressor();
        if central.min_amplitude_pct > self.max_amplitude_pct {
            return Err(AnalysisError::InvalidConfig(format!(
                "compressor amplitude {} exceeds max_amplitude_pct {}",
                central.min_amplitude_pct, self.max_amplitude_pct
            )));
        }
        if self.max_min_bars == 0 || central.min_bars > self.max_min_bars {
            return Err(AnalysisError::InvalidConfig(format!(
                "compressor min_bars {} must not exceed max_min_bars {} (at least 1)",
                central.min_bars, self.max_min_bars
            )));
        }
        Ok(())
    }

    /// Compressor of the central degree.
    pub fn central_compressor(&self) -> SwingCompressorConfig {
        SwingCompressorConfig {
            min_amplitude_pct: self
                .base_compressor
                .min_amplitude_pct
                .max(self.wave.compressor.min_amplitude_pct),
            min_bars: self.base_compressor.min_bars.max(self.wave.compressor.min_bars),
        }
    }

    /// Wave settings for `degree`. The compressor amplitude grows by
    /// `compressor_step_factor` per step above the central degree and its
    /// bar spacing by one bar per step, both shrinking below it.
    pub fn wave_config_for(&self, degree: Degree) -> WaveConfig {
        let steps = self.band.central.steps_to(degree);
        let central = self.central_compressor();
        let mut wave = self.wave.clone();
        wave.compressor.min_amplitude_pct = scaled(
            central.min_amplitude_pct,
            steps,
            self.compressor_step_factor,
            self.min_amplitude_pct,
            self.max_amplitude_pct,
        );
        wave.compressor.min_bars =
            (central.min_bars as i64 + i64::from(steps)).clamp(1, self.max_min_bars as i64) as usize;
        wave
    }

    /// First bar analysed at `degree` when evaluating at `index`.
    pub fn history_start(&self, degree: Degree, bar_duration: Option<Duration>, index: usize) -> usize {
        if !self.limit_history {
            return 0;
        }
        let (Some(duration), Some(max_days)) = (bar_duration, degree.history_range().max_days) else {
            return 0;
        };
        let bar_ms = duration.num_milliseconds();
        if bar_ms <= 0 {
            return 0;
        }
        let max_ms = max_days * Duration::days(1).num_milliseconds() as f64;
        let max_bars = ((max_ms / bar_ms as f64).floor() as usize).max(1);
        (index + 1).saturating_sub(max_bars)
    }
}

/// The scenario picked across all degrees, with how it was ranked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedScenario<N = f64> {
    pub degree: Degree,
    pub scenario: Scenario<N>,
    pub probability: f64,
    pub cross_degree_support: f64,
    pub composite_score: f64,
    pub strong_consensus: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiDegreeResult<N = f64> {
    /// Successful analyses in band order.
    pub analyses: Vec<DegreeAnalysis<N>>,
    pub recommended: Option<RecommendedScenario<N>>,
    pub notes: Vec<String>,
}

impl<N: Num> MultiDegreeResult<N> {
    pub fn analysis(&self, degree: Degree) -> Option<&DegreeAnalysis<N>> {
        self.analyses.iter().find(|a| a.degree == degree)
    }

    pub fn degrees(&self) -> Vec<Degree> {
        self.analyses.iter().map(|a| a.degree).collect()
    }
}

/// Runs the single-degree pipeline over a band of degrees and picks one
/// scenario to recommend.
#[derive(Debug, Clone)]
pub struct MultiDegreeRunner {
    config: RunnerConfig,
    bar_duration: Option<Duration>,
}

impl Default for MultiDegreeRunner {
    fn default() -> Self {
        Self {
            config: RunnerConfig::default(),
            bar_duration: None,
        }
    }
}

impl MultiDegreeRunner {
    pub fn new(config: RunnerConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            bar_duration: None,
        })
    }

    /// Bar spacing of the series, used to weight degrees by history fit.
    pub fn with_bar_duration(mut self, bar_duration: Duration) -> Self {
        self.bar_duration = Some(bar_duration);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn bar_duration(&self) -> Option<Duration> {
        self.bar_duration
    }

    pub fn run<S: PriceSeries + ?Sized>(&self, series: &S, index: usize) -> MultiDegreeResult<S::Num> {
        let degrees = self.config.band.degrees();

        let outcomes: Vec<(Degree, Result<DegreeAnalysis<S::Num>, AnalysisError>)> = degrees
            .par_iter()
            .map(|&degree| (degree, self.analyze_degree(series, degree, index)))
            .collect();

        let mut analyses = Vec::with_capacity(outcomes.len());
        let mut notes = Vec::new();
        for (degree, outcome) in outcomes {
            match outcome {
                Ok(analysis) => {
                    debug!("{} done: {} scenario(s)", degree, analysis.scenario_set.len());
                    analyses.push(analysis);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", degree, e);
                    notes.push(format!("{} analysis failed: {}", degree, e));
                }
            }
        }

        let recommended = self.recommend(&analyses, series.bar_count());
        if recommended.is_none() && !analyses.is_empty() {
            notes.push("No degree produced a scenario".to_string());
        }

        MultiDegreeResult {
            analyses,
            recommended,
            notes,
        }
    }

    pub fn run_latest<S: PriceSeries + ?Sized>(&self, series: &S) -> MultiDegreeResult<S::Num> {
        self.run(series, series.end_index().unwrap_or(0))
    }

    fn analyze_degree<S: PriceSeries + ?Sized>(
        &self,
        series: &S,
        degree: Degree,
        index: usize,
    ) -> Result<DegreeAnalysis<S::Num>, AnalysisError> {
        let analyzer = ElliottWaveAnalyzer::new(self.config.wave_config_for(degree))?;
        let start = self.config.history_start(degree, self.bar_duration, index);
        if start > series.begin_index() {
            debug!("{}: analysing from bar {}", degree, start);
            analyzer.analyze(&SeriesWindow::new(series, start), degree, index)
        } else {
            analyzer.analyze(series, degree, index)
        }
    }

    fn recommend<N: Num>(&self, analyses: &[DegreeAnalysis<N>], bar_count: usize) -> Option<RecommendedScenario<N>> {
        analyses
            .iter()
            .filter_map(|analysis| {
                let base = analysis.base_case()?;
                let support = self.cross_degree_support(base, analysis.degree, analyses, bar_count);
                Some(RecommendedScenario {
                    degree: analysis.degree,
                    scenario: base.clone(),
                    probability: analysis.probability_of(base.id()),
                    cross_degree_support: support,
                    composite_score: CONFIDENCE_WEIGHT * base.confidence_score() + SUPPORT_WEIGHT * support,
                    strong_consensus: analysis.scenario_set.has_strong_consensus(),
                })
            })
            .min_by(recommendation_order)
    }

    /// Weighted agreement of the other degrees with `base`, in `[0, 1]`.
    ///
    /// Each other degree contributes its best-matching scenario. With a
    /// known bar duration degrees count by how well the history suits them.
    pub fn cross_degree_support<N: Num>(
        &self,
        base: &Scenario<N>,
        degree: Degree,
        analyses: &[DegreeAnalysis<N>],
        bar_count: usize,
    ) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for other in analyses.iter().filter(|a| a.degree != degree) {
            let best = other
                .scenario_set
                .iter()
                .map(|s| compatibility(base, s))
                .fold(f64::NAN, f64::max);
            if best.is_nan() {
                continue;
            }
            let weight = match self.bar_duration {
                Some(duration) => other.degree.history_fit_score(duration, bar_count),
                None => 1.0,
            };
            weighted += weight * best;
            total_weight += weight;
        }
        if total_weight <= f64::EPSILON {
            NEUTRAL_SUPPORT
        } else {
            clamp_unit(weighted / total_weight)
        }
    }
}

/// How well two scenarios from different degrees fit together.
pub fn compatibility<N: Num>(a: &Scenario<N>, b: &Scenario<N>) -> f64 {
    let direction = if a.is_bullish() == b.is_bullish() {
        1.0
    } else if a.scenario_type().is_corrective() || b.scenario_type().is_corrective() {
        // a correction can sit against the larger trend
        0.5
    } else {
        0.0
    };
    let structure = if a.scenario_type() == b.scenario_type() {
        1.0
    } else if a.scenario_type().is_impulse() == b.scenario_type().is_impulse() {
        0.8
    } else {
        0.4
    };
    let invalidation = invalidation_proximity(a.invalidation_price().to_f64(), b.invalidation_price().to_f64());

    clamp_unit(DIRECTION_WEIGHT * direction + STRUCTURE_WEIGHT * structure + INVALIDATION_WEIGHT * invalidation)
}

fn invalidation_proximity(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if !a.is_finite() || !b.is_finite() || scale <= f64::EPSILON {
        return NEUTRAL_SUPPORT;
    }
    1.0 - ((a - b).abs() / scale).min(1.0)
}

fn recommendation_order<N: Num>(a: &RecommendedScenario<N>, b: &RecommendedScenario<N>) -> Ordering {
    b.strong_consensus
        .cmp(&a.strong_consensus)
        .then_with(|| b.composite_score.partial_cmp(&a.composite_score).unwrap_or(Ordering::Equal))
        .then_with(|| a.degree.cmp(&b.degree))
        .then_with(|| {
            b.scenario
                .confidence_score()
                .partial_cmp(&a.scenario.confidence_score())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.scenario.id().cmp(b.scenario.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use elliott_wave::{Confidence, Phase, ScenarioParts, ScenarioType, Swing};

    fn swings(points: &[(usize, f64)]) -> Vec<Swing<f64>> {
        points
            .windows(2)
            .map(|w| Swing::new(w[0].0, w[1].0, w[0].1, w[1].1, Degree::Minor).unwrap())
            .collect()
    }

    fn zigzag(id: &str, bullish: bool, invalidation: f64) -> Scenario<f64> {
        let points = if bullish {
            [(0, 100.0), (5, 115.0), (8, 105.0), (12, 125.0)]
        } else {
            [(0, 100.0), (5, 85.0), (8, 95.0), (12, 75.0)]
        };
        Scenario::new(ScenarioParts {
            id: id.to_string(),
            current_phase: Phase::CorrectiveC,
            swings: swings(&points),
            confidence: Confidence {
                overall: 0.5,
                ..Confidence::zero()
            },
            degree: Degree::Minor,
            scenario_type: ScenarioType::CorrectiveZigzag,
            invalidation_price: invalidation,
            primary_target: f64::NAN,
            fibonacci_targets: vec![],
            start_index: 0,
        })
        .unwrap()
    }

    fn impulse(id: &str, invalidation: f64) -> Scenario<f64> {
        Scenario::new(ScenarioParts {
            id: id.to_string(),
            current_phase: Phase::Wave5,
            swings: swings(&[(0, 100.0), (10, 120.0), (16, 108.0), (30, 140.0), (36, 130.0), (46, 150.0)]),
            confidence: Confidence {
                overall: 0.6,
                ..Confidence::zero()
            },
            degree: Degree::Minor,
            scenario_type: ScenarioType::Impulse,
            invalidation_price: invalidation,
            primary_target: f64::NAN,
            fibonacci_targets: vec![],
            start_index: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_band_degrees() {
        assert_eq!(
            DegreeBand::default().degrees(),
            vec![Degree::Cycle, Degree::Primary, Degree::Intermediate]
        );
        assert_eq!(
            DegreeBand::new(Degree::GrandSupercycle, 2, 1).degrees(),
            vec![Degree::GrandSupercycle, Degree::Supercycle]
        );
        assert_eq!(DegreeBand::single(Degree::Minor).degrees(), vec![Degree::Minor]);
    }

    #[test]
    fn test_compressor_scales_with_degree() {
        let mut config = RunnerConfig::default();
        config.wave.compressor.min_amplitude_pct = 0.02;
        config.wave.compressor.min_bars = 4;

        let higher = config.wave_config_for(Degree::Cycle);
        let lower = config.wave_config_for(Degree::Intermediate);
        let central = config.wave_config_for(Degree::Primary);
        assert_relative_eq!(higher.compressor.min_amplitude_pct, 0.03, epsilon = 1e-12);
        assert_eq!(higher.compressor.min_bars, 5);
        assert_relative_eq!(lower.compressor.min_amplitude_pct, 0.02 / 1.5, epsilon = 1e-12);
        assert_eq!(lower.compressor.min_bars, 3);
        assert_eq!(central.compressor, config.wave.compressor);

        config.wave.compressor.min_amplitude_pct = 0.04;
        assert_eq!(config.wave_config_for(Degree::Cycle).compressor.min_amplitude_pct, 0.05);
    }

    #[test]
    fn test_default_compressor_differs_per_degree() {
        let config = RunnerConfig::default();
        assert_eq!(config.wave.compressor, SwingCompressorConfig::default());

        let cycle = config.wave_config_for(Degree::Cycle).compressor;
        let primary = config.wave_config_for(Degree::Primary).compressor;
        let minor = config.wave_config_for(Degree::Minor).compressor;
        assert_relative_eq!(primary.min_amplitude_pct, 0.01, epsilon = 1e-12);
        assert_eq!(primary.min_bars, 2);
        assert_relative_eq!(cycle.min_amplitude_pct, 0.015, epsilon = 1e-12);
        assert_eq!(cycle.min_bars, 3);
        // two steps down: 0.01 / 2.25, bars floored at one
        assert_relative_eq!(minor.min_amplitude_pct, 0.01 / 2.25, epsilon = 1e-12);
        assert_eq!(minor.min_bars, 1);
        assert_eq!(
            config.wave_config_for(Degree::SubMinuette).compressor.min_amplitude_pct,
            config.min_amplitude_pct
        );
    }

    #[test]
    fn test_history_start_follows_degree_range() {
        let config = RunnerConfig::default();
        let daily = Some(Duration::days(1));
        // Minute tops out at 90 days
        assert_eq!(config.history_start(Degree::Minute, daily, 94), 5);
        assert_eq!(config.history_start(Degree::Minute, daily, 50), 0);
        assert_eq!(config.history_start(Degree::Minuette, daily, 94), 65);
        assert_eq!(config.history_start(Degree::Primary, daily, 94), 0);
        assert_eq!(config.history_start(Degree::GrandSupercycle, daily, 94), 0);
        assert_eq!(config.history_start(Degree::Minute, None, 94), 0);
        // hourly bars: 30 days of Minuette history is 720 bars
        assert_eq!(config.history_start(Degree::Minuette, Some(Duration::hours(1)), 1000), 281);

        let unlimited = RunnerConfig {
            limit_history: false,
            ..Default::default()
        };
        assert_eq!(unlimited.history_start(Degree::Minute, daily, 94), 0);
    }

    #[test]
    fn test_invalid_runner_config() {
        let config = RunnerConfig {
            compressor_step_factor: 0.5,
            ..Default::default()
        };
        assert!(MultiDegreeRunner::new(config).is_err());

        let config = RunnerConfig {
            max_amplitude_pct: 0.0,
            ..Default::default()
        };
        assert!(matches!(MultiDegreeRunner::new(config), Err(AnalysisError::InvalidConfig(_))));

        let config = RunnerConfig {
            min_amplitude_pct: 0.1,
            ..Default::default()
        };
        assert!(MultiDegreeRunner::new(config).is_err());
    }

    #[test]
    fn test_compressor_beyond_caps_is_rejected() {
        let mut config = RunnerConfig::default();
        config.wave.compressor.min_amplitude_pct = 0.2;
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));

        let mut config = RunnerConfig::default();
        config.base_compressor.min_amplitude_pct = 0.06;
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.wave.compressor.min_bars = 201;
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.wave.compressor.min_amplitude_pct = 0.05;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_compatibility() {
        let bull = zigzag("a", true, 100.0);
        assert_relative_eq!(compatibility(&bull, &bull), 1.0, epsilon = 1e-12);

        // opposite corrective: 0.55 * 0.5 + 0.30 + 0.15
        let bear = zigzag("b", false, 100.0);
        assert_relative_eq!(compatibility(&bull, &bear), 0.725, epsilon = 1e-12);

        // same direction, mixed families, invalidations 10% apart
        let up = impulse("c", 90.0);
        assert_relative_eq!(compatibility(&bull, &up), 0.55 + 0.3 * 0.4 + 0.15 * 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_invalidation_proximity() {
        assert_eq!(invalidation_proximity(100.0, 100.0), 1.0);
        assert_relative_eq!(invalidation_proximity(100.0, 50.0), 0.5, epsilon = 1e-12);
        assert_eq!(invalidation_proximity(f64::NAN, 50.0), NEUTRAL_SUPPORT);
        assert_eq!(invalidation_proximity(0.0, 0.0), NEUTRAL_SUPPORT);
    }

    #[test]
    fn test_recommendation_order() {
        let pick = |degree, strong, composite, id: &str| RecommendedScenario {
            degree,
            scenario: zigzag(id, true, 100.0),
            probability: 1.0,
            cross_degree_support: 0.5,
            composite_score: composite,
            strong_consensus: strong,
        };
        let weak_best = pick(Degree::Minor, false, 0.9, "a");
        let strong = pick(Degree::Minor, true, 0.4, "b");
        assert_eq!(recommendation_order(&strong, &weak_best), Ordering::Less);

        let higher = pick(Degree::Primary, true, 0.4, "c");
        assert_eq!(recommendation_order(&higher, &strong), Ordering::Less);

        let better = pick(Degree::Minor, true, 0.5, "d");
        assert_eq!(recommendation_order(&better, &higher), Ordering::Less);
        assert_eq!(recommendation_order(&strong, &strong), Ordering::Equal);
    }
}
