use analysis_core::{AnalysisError, Num};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::confidence::ConfidenceScorer;
use crate::degree::Degree;
use crate::fibonacci::FibonacciValidator;
use crate::phase::Phase;
use crate::scenario::{Scenario, ScenarioParts, ScenarioType};
use crate::swing::{swings_alternate, Swing};

/// Structure types the generator may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSet {
    pub impulse: bool,
    pub zigzag: bool,
    pub flat: bool,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            impulse: true,
            zigzag: true,
            flat: true,
        }
    }
}

impl PatternSet {
    pub fn allowed(&self) -> Vec<ScenarioType> {
        ScenarioType::all()
            .into_iter()
            .filter(|t| match t {
                ScenarioType::Impulse => self.impulse,
                ScenarioType::CorrectiveZigzag => self.zigzag,
                ScenarioType::CorrectiveFlat => self.flat,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Candidates scoring below this are dropped.
    pub min_confidence: f64,
    pub max_scenarios: usize,
    /// How many legs past a completed structure a scenario may assume.
    pub max_continuation_legs: usize,
    pub patterns: PatternSet,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.15,
            max_scenarios: 5,
            max_continuation_legs: 2,
            patterns: PatternSet::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_confidence must lie in [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_scenarios == 0 {
            return Err(AnalysisError::InvalidConfig("max_scenarios must be at least 1".to_string()));
        }
        if self.max_continuation_legs > 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "max_continuation_legs must be at most 2, got {}",
                self.max_continuation_legs
            )));
        }
        if self.patterns.allowed().is_empty() {
            return Err(AnalysisError::InvalidConfig("at least one pattern must be enabled".to_string()));
        }
        Ok(())
    }
}

/// Enumerates admissible wave counts over the most recent swings.
#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    config: GeneratorConfig,
    validator: FibonacciValidator,
    scorer: ConfidenceScorer,
}

impl ScenarioGenerator {
    pub fn new(
        config: GeneratorConfig,
        validator: FibonacciValidator,
        scorer: ConfidenceScorer,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            validator,
            scorer,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Candidate scenarios ranked by confidence, highest first.
    ///
    /// Each candidate is a complete structure ending `t` legs before the last
    /// swing, with `t` between zero and the configured continuation limit.
    /// `closes[i]` is the close of bar `i`.
    pub fn generate<N: Num>(
        &self,
        swings: &[Swing<N>],
        degree: Degree,
        channel: &Channel<N>,
        closes: &[N],
    ) -> Vec<Scenario<N>> {
        let mut scenarios = Vec::new();
        let mut considered = 0usize;

        for continuation in 0..=self.config.max_continuation_legs {
            for kind in self.config.patterns.allowed() {
                let len = kind.expected_swings();
                if swings.len() < len + continuation {
                    continue;
                }
                let end = swings.len() - continuation;
                let start = end - len;
                let structure = &swings[start..end];
                let tail = &swings[end..];
                considered += 1;

                if !swings_alternate(&swings[start..]) || !self.admits(kind, structure) || !continues(tail) {
                    continue;
                }

                let confidence = self.scorer.score_pattern(structure, kind, channel, closes, continuation);
                if confidence.overall < self.config.min_confidence {
                    continue;
                }

                let phase = current_phase(kind, continuation);
                let targets = fibonacci_targets(kind, structure, tail);
                let parts = ScenarioParts {
                    id: format!("{}-{}-{}", kind.slug(), structure[0].from_index, phase.name().to_lowercase()),
                    current_phase: phase,
                    swings: structure.iter().map(|s| s.with_degree(degree)).collect(),
                    confidence,
                    degree,
                    scenario_type: kind,
                    invalidation_price: structure[0].from_price,
                    primary_target: targets.first().copied().unwrap_or_else(N::nan),
                    fibonacci_targets: targets,
                    start_index: structure[0].from_index,
                };
                match Scenario::new(parts) {
                    Ok(scenario) => scenarios.push(scenario),
                    Err(err) => debug!("discarding candidate: {}", err),
                }
            }
        }

        rank(&mut scenarios);
        scenarios.truncate(self.config.max_scenarios);
        debug!(
            "{}: kept {} of {} candidate windows",
            degree,
            scenarios.len(),
            considered
        );
        scenarios
    }

    fn admits<N: Num>(&self, kind: ScenarioType, w: &[Swing<N>]) -> bool {
        match kind {
            ScenarioType::Impulse => admits_impulse(w),
            ScenarioType::CorrectiveZigzag => admits_zigzag(w),
            ScenarioType::CorrectiveFlat => {
                let c_ratio = w[2].amplitude().to_f64() / w[0].amplitude().to_f64();
                self.validator.is_wave_b_flat_valid(&w[0], &w[1]) && c_ratio.is_finite() && c_ratio >= 0.618
            }
        }
    }
}

/// Sort by confidence descending, then id ascending.
pub(crate) fn rank<N: Num>(scenarios: &mut [Scenario<N>]) {
    scenarios.sort_by(|a, b| {
        b.confidence_score()
            .total_cmp(&a.confidence_score())
            .then_with(|| a.id().cmp(b.id()))
    });
}

fn beyond<N: Num>(rising: bool, a: N, b: N) -> bool {
    if rising {
        a > b
    } else {
        a < b
    }
}

fn admits_impulse<N: Num>(w: &[Swing<N>]) -> bool {
    let rising = w[0].is_rising();
    let (a1, a3, a5) = (w[0].amplitude(), w[2].amplitude(), w[4].amplitude());
    let wave3_shortest = a3 < a1 && a3 < a5;
    beyond(rising, w[1].to_price, w[0].from_price)
        && beyond(rising, w[2].to_price, w[0].to_price)
        && beyond(rising, w[3].to_price, w[0].to_price)
        && !wave3_shortest
}

fn admits_zigzag<N: Num>(w: &[Swing<N>]) -> bool {
    let rising = w[0].is_rising();
    // B stays inside A, C breaks past the end of A
    !beyond(!rising, w[1].to_price, w[0].from_price) && beyond(rising, w[2].to_price, w[0].to_price)
}

/// The second continuation leg may not undo the first entirely.
fn continues<N: Num>(tail: &[Swing<N>]) -> bool {
    match tail {
        [first, second, ..] => beyond(first.is_rising(), second.to_price, first.from_price),
        _ => true,
    }
}

fn current_phase(kind: ScenarioType, continuation: usize) -> Phase {
    match (kind.is_impulse(), continuation) {
        (true, 0) => Phase::Wave5,
        (true, 1) => Phase::CorrectiveA,
        (true, _) => Phase::CorrectiveB,
        (false, 0) => Phase::CorrectiveC,
        (false, 1) => Phase::Wave1,
        (false, _) => Phase::Wave2,
    }
}

fn project<N: Num>(from: N, amount: N, factor: f64, up: bool) -> N {
    let step = amount * N::from_f64(factor);
    if up {
        from + step
    } else {
        from - step
    }
}

/// Price objectives for the leg currently expected to unfold.
fn fibonacci_targets<N: Num>(kind: ScenarioType, structure: &[Swing<N>], tail: &[Swing<N>]) -> Vec<N> {
    let first = &structure[0];
    let up = first.is_rising();
    match (kind, tail) {
        (ScenarioType::Impulse, []) => {
            // wave 5 measured from the end of wave 4
            let w4_end = structure[3].to_price;
            [1.0, 0.618, 1.618]
                .iter()
                .map(|f| project(w4_end, first.amplitude(), *f, up))
                .collect()
        }
        (ScenarioType::Impulse, [_a]) => {
            // retracement of the whole impulse
            let w5_end = structure[4].to_price;
            let span = (w5_end - first.from_price).abs();
            [0.382, 0.5, 0.618]
                .iter()
                .map(|f| project(w5_end, span, *f, !up))
                .collect()
        }
        (ScenarioType::Impulse, [a, b, ..]) => [1.0, 1.618]
            .iter()
            .map(|f| project(b.to_price, a.amplitude(), *f, a.is_rising()))
            .collect(),
        (_, []) => {
            // wave C measured from the end of wave B
            let b_end = structure[1].to_price;
            [1.0, 1.618]
                .iter()
                .map(|f| project(b_end, first.amplitude(), *f, up))
                .collect()
        }
        (_, [w1]) => [0.5, 0.618]
            .iter()
            .map(|f| project(w1.to_price, w1.amplitude(), *f, !w1.is_rising()))
            .collect(),
        (_, [w1, w2, ..]) => [1.618, 2.618]
            .iter()
            .map(|f| project(w2.to_price, w1.amplitude(), *f, w1.is_rising()))
            .collect(),
    }
}
