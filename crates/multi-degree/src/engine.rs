use analysis_core::{AnalysisError, AnalysisResult, Bar, SignalStrength, TechnicalAnalyzer};
use async_trait::async_trait;
use chrono::Utc;
use elliott_wave::{TrendBias, WaveConfig};

use crate::report::ReportAssembler;
use crate::runner::{MultiDegreeRunner, RunnerConfig};

/// Elliott Wave analysis behind the common analyzer interface.
pub struct ElliottWaveEngine {
    runner: MultiDegreeRunner,
    assembler: ReportAssembler,
}

impl ElliottWaveEngine {
    pub fn new(config: RunnerConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            runner: MultiDegreeRunner::new(config)?,
            assembler: ReportAssembler::new(),
        })
    }

    /// Default band with wave settings taken from the environment.
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::new(RunnerConfig {
            wave: WaveConfig::from_env(),
            ..RunnerConfig::default()
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        self.runner.config()
    }

    pub fn analyze_sync(&self, symbol: &str, bars: &[Bar]) -> Result<AnalysisResult, AnalysisError> {
        let runner = match bars {
            [first, second, ..] if second.timestamp > first.timestamp => {
                self.runner.clone().with_bar_duration(second.timestamp - first.timestamp)
            }
            _ => self.runner.clone(),
        };
        let result = runner.run_latest(bars);
        let report = self.assembler.assemble_multi(&result, self.config().band.central);
        let metrics = serde_json::to_value(&report)
            .map_err(|e| AnalysisError::CalculationError(format!("report serialization failed: {}", e)))?;

        let (signal, confidence, reason) = match &result.recommended {
            Some(rec) => {
                let bias = result
                    .analysis(rec.degree)
                    .map(|a| a.trend_bias)
                    .unwrap_or_else(TrendBias::unknown);
                let score = if bias.is_directional() {
                    (bias.net_score() * 100.0).round() as i32
                } else {
                    0
                };
                let scenario = &rec.scenario;
                let reason = format!(
                    "{} {} {} at {} degree ({:.1}% confidence, {:.0}% cross-degree support)",
                    scenario.direction_label(),
                    scenario.scenario_type(),
                    scenario.current_phase(),
                    rec.degree,
                    scenario.confidence().as_percentage(),
                    rec.cross_degree_support * 100.0
                );
                (SignalStrength::from_score(score), rec.composite_score, reason)
            }
            None => {
                let mut reason = "No Elliott wave count across the degree band".to_string();
                if !result.notes.is_empty() {
                    reason = format!("{}: {}", reason, result.notes.join("; "));
                }
                (SignalStrength::Neutral, 0.0, reason)
            }
        };

        Ok(AnalysisResult {
            symbol: symbol.to_string(),
            timestamp: Utc::now(),
            signal,
            confidence,
            reason,
            metrics,
        })
    }
}

#[async_trait]
impl TechnicalAnalyzer for ElliottWaveEngine {
    async fn analyze(&self, symbol: &str, bars: &[Bar]) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_sync(symbol, bars)
    }
}

impl Default for ElliottWaveEngine {
    fn default() -> Self {
        Self {
            runner: MultiDegreeRunner::default(),
            assembler: ReportAssembler::new(),
        }
    }
}
