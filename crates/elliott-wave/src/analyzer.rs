use analysis_core::{AnalysisError, Num, PriceSeries};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::channel::{Channel, ChannelFitter};
use crate::compressor::SwingCompressor;
use crate::config::WaveConfig;
use crate::confluence::{Confluence, ConfluenceDetector, LatestRatio};
use crate::degree::Degree;
use crate::generator::ScenarioGenerator;
use crate::phase::{PhaseAssessment, PhaseClassifier};
use crate::probability::ProbabilityNormalizer;
use crate::scenario::Scenario;
use crate::scenario_set::ScenarioSet;
use crate::swing::Swing;
use crate::trend_bias::{TrendBias, TrendBiasAggregator};
use crate::zigzag::SwingDetector;

/// Everything known about one degree at one evaluation bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegreeAnalysis<N = f64> {
    pub degree: Degree,
    pub evaluation_index: usize,
    pub raw_swings: Vec<Swing<N>>,
    pub structural_swings: Vec<Swing<N>>,
    pub phase: PhaseAssessment<N>,
    pub scenario_set: ScenarioSet<N>,
    pub channel: Channel<N>,
    pub trend_bias: TrendBias,
    pub probabilities: BTreeMap<String, f64>,
    pub latest_ratio: LatestRatio,
    pub confluence: Confluence,
    pub confluent: bool,
}

impl<N: Num> DegreeAnalysis<N> {
    /// Result for a series with nothing to count.
    pub fn empty(degree: Degree, evaluation_index: usize) -> Self {
        Self {
            degree,
            evaluation_index,
            raw_swings: Vec::new(),
            structural_swings: Vec::new(),
            phase: PhaseAssessment::none(),
            scenario_set: ScenarioSet::empty(evaluation_index),
            channel: Channel::invalid(evaluation_index),
            trend_bias: TrendBias::unknown(),
            probabilities: BTreeMap::new(),
            latest_ratio: LatestRatio::none(),
            confluence: Confluence {
                score: 0,
                ratio_match: false,
                inside_channel: false,
            },
            confluent: false,
        }
    }

    pub fn base_case(&self) -> Option<&Scenario<N>> {
        self.scenario_set.base()
    }

    /// Normalized probability of a scenario, zero when unknown.
    pub fn probability_of(&self, id: &str) -> f64 {
        self.probabilities.get(id).copied().unwrap_or(0.0)
    }

    pub fn has_scenarios(&self) -> bool {
        !self.scenario_set.is_empty()
    }
}

/// Single-degree Elliott Wave pipeline: swings, phase, channel, scenarios,
/// consensus, trend bias and probabilities.
#[derive(Debug, Clone)]
pub struct ElliottWaveAnalyzer {
    config: WaveConfig,
    detector: SwingDetector,
    compressor: SwingCompressor,
    classifier: PhaseClassifier,
    fitter: ChannelFitter,
    generator: ScenarioGenerator,
    aggregator: TrendBiasAggregator,
    normalizer: ProbabilityNormalizer,
    confluence: ConfluenceDetector,
}

impl ElliottWaveAnalyzer {
    pub fn new(config: WaveConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let validator = config.validator()?;
        Ok(Self {
            detector: SwingDetector::new(config.swing_detector)?,
            compressor: SwingCompressor::new(config.compressor)?,
            classifier: PhaseClassifier::new(validator),
            fitter: ChannelFitter::new(),
            generator: ScenarioGenerator::new(config.generator_config(), validator, config.scorer()?)?,
            aggregator: TrendBiasAggregator::new(config.trend_neutral_threshold)?,
            normalizer: config.probability,
            confluence: ConfluenceDetector::new(config.fibonacci_tolerance, config.channel_tolerance),
            config,
        })
    }

    pub fn config(&self) -> &WaveConfig {
        &self.config
    }

    /// Analyse `series` as seen at bar `index` (clamped to the last bar).
    pub fn analyze<S: PriceSeries + ?Sized>(
        &self,
        series: &S,
        degree: Degree,
        index: usize,
    ) -> Result<DegreeAnalysis<S::Num>, AnalysisError> {
        let Some(end) = series.end_index() else {
            return Ok(DegreeAnalysis::empty(degree, index));
        };
        let index = index.min(end);

        let raw_swings = self.detector.detect(series, index, degree);
        let compressed = self.compressor.compress(&raw_swings);
        let window = self.config.scenario_swing_window;
        let structural_swings = compressed[compressed.len().saturating_sub(window)..].to_vec();

        let phase = self.classifier.classify(&structural_swings);
        let channel = self.fitter.fit(&structural_swings, index);
        let closes: Vec<S::Num> = (0..=index).map(|i| series.close(i)).collect();

        let scenarios = self.generator.generate(&structural_swings, degree, &channel, &closes);
        let scenario_set = ScenarioSet::of(scenarios, index)?;
        let trend_bias = self.aggregator.aggregate(&scenario_set);
        let probabilities = self.normalizer.normalize(&scenario_set);

        let latest_ratio = LatestRatio::of(&structural_swings);
        let confluence = self.confluence.assess(&latest_ratio, series.close(index), &channel);

        debug!(
            "{} @ {}: {} raw / {} structural swings, phase {}, {} scenario(s)",
            degree,
            index,
            raw_swings.len(),
            structural_swings.len(),
            phase.phase,
            scenario_set.len()
        );

        Ok(DegreeAnalysis {
            degree,
            evaluation_index: index,
            raw_swings,
            structural_swings,
            phase,
            scenario_set,
            channel,
            trend_bias,
            probabilities,
            latest_ratio,
            confluent: self.confluence.is_confluent(&confluence),
            confluence,
        })
    }

    /// Analyse at the last bar of the series.
    pub fn analyze_latest<S: PriceSeries + ?Sized>(
        &self,
        series: &S,
        degree: Degree,
    ) -> Result<DegreeAnalysis<S::Num>, AnalysisError> {
        let index = series.end_index().unwrap_or(0);
        self.analyze(series, degree, index)
    }
}
