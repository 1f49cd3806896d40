//! Serializable view of the analysis results.
//!
//! Prices and scores are flattened to `f64`. Missing values (NaN) come out as
//! JSON `null` and probabilities are rounded to three decimals on output.

use analysis_core::{AnalysisError, Num};
use elliott_wave::{
    price_extremes, swings_alternate, ConfidenceLevel, Degree, DegreeAnalysis, Phase, RatioType, Scenario,
    ScenarioType, Swing, TrendBias,
};
use serde::{Serialize, Serializer};

use crate::runner::{MultiDegreeResult, RecommendedScenario};

fn nan_as_null<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

fn probability<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    nan_as_null(&((value * 1000.0).round() / 1000.0), serializer)
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, AnalysisError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.map_err(|e| AnalysisError::CalculationError(format!("report serialization failed: {}", e)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwingReport {
    pub from_index: usize,
    pub to_index: usize,
    #[serde(serialize_with = "nan_as_null")]
    pub from_price: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub to_price: f64,
    pub rising: bool,
}

impl SwingReport {
    fn of<N: Num>(swing: &Swing<N>) -> Self {
        Self {
            from_index: swing.from_index,
            to_index: swing.to_index,
            from_price: swing.from_price.to_f64(),
            to_price: swing.to_price.to_f64(),
            rising: swing.is_rising(),
        }
    }

    fn all<N: Num>(swings: &[Swing<N>]) -> Vec<Self> {
        swings.iter().map(Self::of).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwingSnapshot {
    pub valid: bool,
    pub swings: usize,
    #[serde(serialize_with = "nan_as_null")]
    pub high: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub low: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReport {
    #[serde(serialize_with = "nan_as_null")]
    pub upper: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub lower: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestAnalysis {
    pub phase: Phase,
    pub impulse_confirmed: bool,
    pub corrective_confirmed: bool,
    pub ratio_type: RatioType,
    #[serde(serialize_with = "nan_as_null")]
    pub ratio_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelReport>,
    pub confluence_score: u8,
    pub confluent: bool,
    #[serde(serialize_with = "nan_as_null")]
    pub invalidation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub summary: String,
    pub strong_consensus: bool,
    pub consensus_phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCaseReport {
    pub id: String,
    pub phase: Phase,
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    pub overall_confidence: f64,
    #[serde(serialize_with = "probability")]
    pub scenario_probability: f64,
    pub confidence_level: ConfidenceLevel,
    pub fibonacci_score: f64,
    pub time_score: f64,
    pub alternation_score: f64,
    pub channel_score: f64,
    pub completeness_score: f64,
    pub primary_reason: String,
    pub weakest_factor: String,
    pub direction: String,
    #[serde(serialize_with = "nan_as_null")]
    pub invalidation_price: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub primary_target: f64,
    pub swings: Vec<SwingReport>,
}

impl BaseCaseReport {
    fn of<N: Num>(scenario: &Scenario<N>, probability: f64) -> Self {
        let c = scenario.confidence();
        Self {
            id: scenario.id().to_string(),
            phase: scenario.current_phase(),
            scenario_type: scenario.scenario_type(),
            overall_confidence: c.as_percentage(),
            scenario_probability: probability,
            confidence_level: c.level(),
            fibonacci_score: c.fibonacci * 100.0,
            time_score: c.time * 100.0,
            alternation_score: c.alternation * 100.0,
            channel_score: c.channel * 100.0,
            completeness_score: c.completeness * 100.0,
            primary_reason: c.primary_reason.clone(),
            weakest_factor: c.weakest_factor.clone(),
            direction: scenario.direction_label().to_string(),
            invalidation_price: scenario.invalidation_price().to_f64(),
            primary_target: scenario.primary_target().to_f64(),
            swings: SwingReport::all(scenario.swings()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeReport {
    pub id: String,
    pub phase: Phase,
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    pub confidence_percent: f64,
    #[serde(serialize_with = "probability")]
    pub scenario_probability: f64,
    pub swings: Vec<SwingReport>,
}

/// Report for one degree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveReport {
    pub degree: Degree,
    pub end_index: usize,
    pub swing_snapshot: SwingSnapshot,
    pub latest_analysis: LatestAnalysis,
    pub scenario_summary: ScenarioSummary,
    pub trend_bias: TrendBias,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_case: Option<BaseCaseReport>,
    pub alternatives: Vec<AlternativeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_case_chart_image: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternative_chart_images: Vec<String>,
}

impl WaveReport {
    /// Attach rendered charts, one per alternative in report order.
    pub fn with_chart_images(mut self, base_case: Option<String>, alternatives: Vec<String>) -> Self {
        self.base_case_chart_image = base_case;
        self.alternative_chart_images = alternatives;
        self
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        to_json(self, false)
    }

    pub fn to_json_pretty(&self) -> Result<String, AnalysisError> {
        to_json(self, true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedReport {
    pub degree: Degree,
    pub scenario_id: String,
    pub phase: Phase,
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    pub direction: String,
    pub confidence_percent: f64,
    #[serde(serialize_with = "probability")]
    pub scenario_probability: f64,
    pub cross_degree_support: f64,
    pub composite_score: f64,
    pub strong_consensus: bool,
    #[serde(serialize_with = "nan_as_null")]
    pub invalidation_price: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub primary_target: f64,
}

impl RecommendedReport {
    fn of<N: Num>(recommended: &RecommendedScenario<N>) -> Self {
        let scenario = &recommended.scenario;
        Self {
            degree: recommended.degree,
            scenario_id: scenario.id().to_string(),
            phase: scenario.current_phase(),
            scenario_type: scenario.scenario_type(),
            direction: scenario.direction_label().to_string(),
            confidence_percent: scenario.confidence().as_percentage(),
            scenario_probability: recommended.probability,
            cross_degree_support: recommended.cross_degree_support,
            composite_score: recommended.composite_score,
            strong_consensus: recommended.strong_consensus,
            invalidation_price: scenario.invalidation_price().to_f64(),
            primary_target: scenario.primary_target().to_f64(),
        }
    }
}

/// Reports for every analysed degree plus the overall recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiDegreeReport {
    pub base_degree: Degree,
    pub analyses: Vec<WaveReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended: Option<RecommendedReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl MultiDegreeReport {
    pub fn report_for(&self, degree: Degree) -> Option<&WaveReport> {
        self.analyses.iter().find(|r| r.degree == degree)
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        to_json(self, false)
    }

    pub fn to_json_pretty(&self) -> Result<String, AnalysisError> {
        to_json(self, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAssembler;

impl ReportAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble<N: Num>(&self, analysis: &DegreeAnalysis<N>) -> WaveReport {
        let structural = &analysis.structural_swings;
        let (high, low) = price_extremes(structural)
            .map(|(h, l)| (h.to_f64(), l.to_f64()))
            .unwrap_or((f64::NAN, f64::NAN));
        let set = &analysis.scenario_set;
        let base = set.base();

        let channel = analysis.channel.is_valid().then(|| ChannelReport {
            upper: analysis.channel.upper_bound().to_f64(),
            lower: analysis.channel.lower_bound().to_f64(),
            median: analysis.channel.median().to_f64(),
        });

        WaveReport {
            degree: analysis.degree,
            end_index: analysis.evaluation_index,
            swing_snapshot: SwingSnapshot {
                valid: !structural.is_empty() && swings_alternate(structural),
                swings: structural.len(),
                high,
                low,
            },
            latest_analysis: LatestAnalysis {
                phase: analysis.phase.phase,
                impulse_confirmed: analysis.phase.impulse_confirmed,
                corrective_confirmed: analysis.phase.corrective_confirmed,
                ratio_type: analysis.latest_ratio.ratio_type,
                ratio_value: analysis.latest_ratio.value,
                channel,
                confluence_score: analysis.confluence.score,
                confluent: analysis.confluent,
                invalidation: base.map(|s| s.invalidation_price().to_f64()).unwrap_or(f64::NAN),
            },
            scenario_summary: ScenarioSummary {
                summary: set.summary(),
                strong_consensus: set.has_strong_consensus(),
                consensus_phase: set.consensus(),
            },
            trend_bias: analysis.trend_bias,
            base_case: base.map(|s| BaseCaseReport::of(s, analysis.probability_of(s.id()))),
            alternatives: set
                .alternatives()
                .iter()
                .map(|s| AlternativeReport {
                    id: s.id().to_string(),
                    phase: s.current_phase(),
                    scenario_type: s.scenario_type(),
                    confidence_percent: s.confidence().as_percentage(),
                    scenario_probability: analysis.probability_of(s.id()),
                    swings: SwingReport::all(s.swings()),
                })
                .collect(),
            base_case_chart_image: None,
            alternative_chart_images: Vec::new(),
        }
    }

    pub fn assemble_multi<N: Num>(&self, result: &MultiDegreeResult<N>, base_degree: Degree) -> MultiDegreeReport {
        MultiDegreeReport {
            base_degree,
            analyses: result.analyses.iter().map(|a| self.assemble(a)).collect(),
            recommended: result.recommended.as_ref().map(RecommendedReport::of),
            notes: result.notes.clone(),
        }
    }
}
