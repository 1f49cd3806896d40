use analysis_core::{AnalysisError, Num};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::confidence::Confidence;
use crate::degree::Degree;
use crate::phase::Phase;
use crate::swing::{swings_alternate, Swing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioType {
    Impulse,
    CorrectiveZigzag,
    CorrectiveFlat,
}

impl ScenarioType {
    pub fn all() -> [ScenarioType; 3] {
        [ScenarioType::Impulse, ScenarioType::CorrectiveZigzag, ScenarioType::CorrectiveFlat]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioType::Impulse => "IMPULSE",
            ScenarioType::CorrectiveZigzag => "CORRECTIVE_ZIGZAG",
            ScenarioType::CorrectiveFlat => "CORRECTIVE_FLAT",
        }
    }

    /// Short form used in scenario ids.
    pub fn slug(&self) -> &'static str {
        match self {
            ScenarioType::Impulse => "impulse",
            ScenarioType::CorrectiveZigzag => "zigzag",
            ScenarioType::CorrectiveFlat => "flat",
        }
    }

    pub fn is_impulse(&self) -> bool {
        matches!(self, ScenarioType::Impulse)
    }

    pub fn is_corrective(&self) -> bool {
        !self.is_impulse()
    }

    /// Number of legs in a complete structure of this type.
    pub fn expected_swings(&self) -> usize {
        match self {
            ScenarioType::Impulse => 5,
            ScenarioType::CorrectiveZigzag | ScenarioType::CorrectiveFlat => 3,
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything needed to build a [`Scenario`]. All fields are required.
#[derive(Debug, Clone)]
pub struct ScenarioParts<N = f64> {
    pub id: String,
    pub current_phase: Phase,
    pub swings: Vec<Swing<N>>,
    pub confidence: Confidence,
    pub degree: Degree,
    pub scenario_type: ScenarioType,
    pub invalidation_price: N,
    pub primary_target: N,
    pub fibonacci_targets: Vec<N>,
    pub start_index: usize,
}

/// One labelled interpretation of the recent swings.
///
/// Built only through [`Scenario::new`], which enforces the swing count of
/// the structure type and strict alternation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario<N = f64> {
    id: String,
    current_phase: Phase,
    swings: Vec<Swing<N>>,
    confidence: Confidence,
    degree: Degree,
    scenario_type: ScenarioType,
    bullish_direction: bool,
    invalidation_price: N,
    primary_target: N,
    fibonacci_targets: Vec<N>,
    start_index: usize,
}

impl<N: Num> Scenario<N> {
    pub fn new(parts: ScenarioParts<N>) -> Result<Self, AnalysisError> {
        if parts.id.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("scenario id cannot be empty".to_string()));
        }
        let expected = parts.scenario_type.expected_swings();
        if parts.swings.len() != expected {
            return Err(AnalysisError::InvalidInput(format!(
                "{} scenario '{}' needs {} swings, got {}",
                parts.scenario_type,
                parts.id,
                expected,
                parts.swings.len()
            )));
        }
        if !swings_alternate(&parts.swings) {
            return Err(AnalysisError::InvalidInput(format!(
                "scenario '{}' swings do not alternate",
                parts.id
            )));
        }
        if parts.current_phase == Phase::None {
            return Err(AnalysisError::InvalidInput(format!(
                "scenario '{}' must have a phase",
                parts.id
            )));
        }
        let overall = parts.confidence.overall;
        if !(0.0..=1.0).contains(&overall) {
            return Err(AnalysisError::InvalidInput(format!(
                "scenario '{}' confidence {} outside [0, 1]",
                parts.id, overall
            )));
        }

        // checked above: swings has at least three elements
        let first = &parts.swings[0];
        let last = &parts.swings[parts.swings.len() - 1];
        let bullish_direction = last.to_price > first.from_price;

        Ok(Self {
            id: parts.id,
            current_phase: parts.current_phase,
            swings: parts.swings,
            confidence: parts.confidence,
            degree: parts.degree,
            scenario_type: parts.scenario_type,
            bullish_direction,
            invalidation_price: parts.invalidation_price,
            primary_target: parts.primary_target,
            fibonacci_targets: parts.fibonacci_targets,
            start_index: parts.start_index,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn current_phase(&self) -> Phase {
        self.current_phase
    }

    pub fn swings(&self) -> &[Swing<N>] {
        &self.swings
    }

    pub fn confidence(&self) -> &Confidence {
        &self.confidence
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence.overall
    }

    pub fn degree(&self) -> Degree {
        self.degree
    }

    pub fn scenario_type(&self) -> ScenarioType {
        self.scenario_type
    }

    pub fn is_bullish(&self) -> bool {
        self.bullish_direction
    }

    pub fn direction_label(&self) -> &'static str {
        if self.bullish_direction {
            "BULLISH"
        } else {
            "BEARISH"
        }
    }

    pub fn invalidation_price(&self) -> N {
        self.invalidation_price
    }

    pub fn primary_target(&self) -> N {
        self.primary_target
    }

    pub fn fibonacci_targets(&self) -> &[N] {
        &self.fibonacci_targets
    }

    /// Bar index of the first swing.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn wave_count(&self) -> usize {
        self.swings.len()
    }

    /// A bullish count is broken by a price below its invalidation level, a
    /// bearish one by a price above it.
    pub fn is_invalidated_by(&self, price: N) -> bool {
        if !price.is_valid() || !self.invalidation_price.is_valid() {
            return false;
        }
        if self.bullish_direction {
            price < self.invalidation_price
        } else {
            price > self.invalidation_price
        }
    }

    /// True when the scenario sits in the final leg of its structure.
    pub fn expects_completion(&self) -> bool {
        self.current_phase.completes_structure()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::swing::test_support::chain;

    pub fn confidence(overall: f64) -> Confidence {
        Confidence {
            overall,
            ..Confidence::zero()
        }
    }

    /// Minimal valid scenario for set-level tests.
    pub fn scenario(id: &str, overall: f64, phase: Phase, bullish: bool) -> Scenario<f64> {
        let points: [(usize, f64); 4] = if bullish {
            [(0, 100.0), (5, 115.0), (8, 105.0), (12, 125.0)]
        } else {
            [(0, 100.0), (5, 85.0), (8, 95.0), (12, 75.0)]
        };
        Scenario::new(ScenarioParts {
            id: id.to_string(),
            current_phase: phase,
            swings: chain(&points, Degree::Minor),
            confidence: confidence(overall),
            degree: Degree::Minor,
            scenario_type: ScenarioType::CorrectiveZigzag,
            invalidation_price: 100.0,
            primary_target: f64::NAN,
            fibonacci_targets: vec![],
            start_index: 0,
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::swing::test_support::{bullish_impulse, chain};

    fn impulse_parts() -> ScenarioParts<f64> {
        ScenarioParts {
            id: "impulse-0-wave5".to_string(),
            current_phase: Phase::Wave5,
            swings: bullish_impulse(),
            confidence: confidence(0.6),
            degree: Degree::Primary,
            scenario_type: ScenarioType::Impulse,
            invalidation_price: 100.0,
            primary_target: 150.0,
            fibonacci_targets: vec![150.0, 142.36, 162.36],
            start_index: 0,
        }
    }

    #[test]
    fn test_impulse_scenario_builds() {
        let s = Scenario::new(impulse_parts()).unwrap();
        assert!(s.is_bullish());
        assert_eq!(s.wave_count(), 5);
        assert!(s.expects_completion());
        assert_eq!(s.direction_label(), "BULLISH");
        assert_eq!(s.fibonacci_targets().len(), 3);
    }

    #[test]
    fn test_wrong_arity_rejected() {
        let mut parts = impulse_parts();
        parts.swings.truncate(4);
        assert!(Scenario::new(parts).is_err());

        let mut corrective = impulse_parts();
        corrective.scenario_type = ScenarioType::CorrectiveZigzag;
        assert!(Scenario::new(corrective).is_err());
    }

    #[test]
    fn test_non_alternating_rejected() {
        let mut parts = impulse_parts();
        parts.swings = chain(&[(0, 1.0), (1, 2.0), (2, 3.0), (3, 2.0), (4, 3.0), (5, 2.0)], Degree::Minor);
        assert!(Scenario::new(parts).is_err());
    }

    #[test]
    fn test_phase_and_confidence_checked() {
        let mut parts = impulse_parts();
        parts.current_phase = Phase::None;
        assert!(Scenario::new(parts).is_err());

        let mut parts = impulse_parts();
        parts.confidence = confidence(1.5);
        assert!(Scenario::new(parts).is_err());

        let mut parts = impulse_parts();
        parts.id = "  ".to_string();
        assert!(Scenario::new(parts).is_err());
    }

    #[test]
    fn test_invalidation_direction() {
        let bull = scenario("a", 0.5, Phase::CorrectiveC, true);
        assert!(bull.is_invalidated_by(99.0));
        assert!(!bull.is_invalidated_by(101.0));
        assert!(!bull.is_invalidated_by(f64::NAN));

        let bear = scenario("b", 0.5, Phase::CorrectiveC, false);
        assert!(!bear.is_bullish());
        assert!(bear.is_invalidated_by(101.0));
        assert!(!bear.is_invalidated_by(99.0));
    }
}
