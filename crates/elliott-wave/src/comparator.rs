use analysis_core::Num;

use crate::scenario::Scenario;

/// Pairwise and group comparisons between scenarios.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioComparator;

impl ScenarioComparator {
    /// 0 for identical readings, 1 for scenarios disagreeing on everything.
    pub fn divergence_score<N: Num>(a: &Scenario<N>, b: &Scenario<N>) -> f64 {
        let mut score = 0.0;
        if a.current_phase() != b.current_phase() {
            score += 0.2;
            if a.current_phase().is_impulse() != b.current_phase().is_impulse() {
                score += 0.2;
            }
        }
        if a.is_bullish() != b.is_bullish() {
            score += 0.3;
        }
        if a.scenario_type() != b.scenario_type() {
            score += 0.15;
            if a.scenario_type().is_impulse() != b.scenario_type().is_impulse() {
                score += 0.15;
            }
        }
        score
    }

    /// The level that breaks every scenario at once: the lowest invalidation
    /// for bullish counts, the highest for bearish ones. NaN when the
    /// directions are mixed or the slice is empty.
    pub fn shared_invalidation<N: Num>(scenarios: &[&Scenario<N>]) -> N {
        let Some(first) = scenarios.first() else {
            return N::nan();
        };
        let bullish = first.is_bullish();
        if scenarios.iter().any(|s| s.is_bullish() != bullish) {
            return N::nan();
        }
        scenarios
            .iter()
            .skip(1)
            .fold(first.invalidation_price(), |acc, s| {
                if bullish {
                    acc.minimum(s.invalidation_price())
                } else {
                    acc.maximum(s.invalidation_price())
                }
            })
    }

    pub fn average_confidence<N: Num>(scenarios: &[&Scenario<N>]) -> f64 {
        if scenarios.is_empty() {
            return 0.0;
        }
        scenarios.iter().map(|s| s.confidence_score()).sum::<f64>() / scenarios.len() as f64
    }

    pub fn has_directional_consensus<N: Num>(scenarios: &[&Scenario<N>]) -> bool {
        match scenarios.first() {
            Some(first) => scenarios.iter().all(|s| s.is_bullish() == first.is_bullish()),
            None => false,
        }
    }

    /// Price band inside every scenario's target span, as `(low, high)`.
    pub fn common_target_range<N: Num>(scenarios: &[&Scenario<N>]) -> Option<(N, N)> {
        let mut range: Option<(N, N)> = None;
        for s in scenarios {
            let span = target_span(s.fibonacci_targets())?;
            range = Some(match range {
                None => span,
                Some((low, high)) => (low.maximum(span.0), high.minimum(span.1)),
            });
        }
        range.filter(|(low, high)| low <= high)
    }
}

fn target_span<N: Num>(targets: &[N]) -> Option<(N, N)> {
    let mut valid = targets.iter().copied().filter(|t| t.is_valid());
    let first = valid.next()?;
    Some(valid.fold((first, first), |(low, high), t| (low.minimum(t), high.maximum(t))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degree::Degree;
    use crate::phase::Phase;
    use crate::scenario::test_support::{confidence, scenario};
    use crate::scenario::{ScenarioParts, ScenarioType};
    use crate::swing::test_support::bullish_impulse;

    fn impulse(id: &str, invalidation: f64, targets: Vec<f64>) -> Scenario<f64> {
        Scenario::new(ScenarioParts {
            id: id.to_string(),
            current_phase: Phase::Wave5,
            swings: bullish_impulse(),
            confidence: confidence(0.6),
            degree: Degree::Primary,
            scenario_type: ScenarioType::Impulse,
            invalidation_price: invalidation,
            primary_target: targets.first().copied().unwrap_or(f64::NAN),
            fibonacci_targets: targets,
            start_index: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_divergence_bounds() {
        let a = scenario("a", 0.5, Phase::CorrectiveC, true);
        let same = scenario("b", 0.3, Phase::CorrectiveC, true);
        assert_eq!(ScenarioComparator::divergence_score(&a, &same), 0.0);

        let opposite = impulse("c", 100.0, vec![]);
        let bear = scenario("d", 0.5, Phase::CorrectiveC, false);
        // phase and family, type and family
        assert!((ScenarioComparator::divergence_score(&a, &opposite) - 0.7).abs() < 1e-12);
        assert!((ScenarioComparator::divergence_score(&bear, &opposite) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shared_invalidation() {
        let a = impulse("a", 100.0, vec![]);
        let b = impulse("b", 95.0, vec![]);
        assert_eq!(ScenarioComparator::shared_invalidation(&[&a, &b]), 95.0);

        let bear = scenario("c", 0.4, Phase::CorrectiveC, false);
        assert!(ScenarioComparator::shared_invalidation(&[&a, &bear]).is_nan());
        assert!(ScenarioComparator::shared_invalidation::<f64>(&[]).is_nan());
        assert!(!ScenarioComparator::has_directional_consensus(&[&a, &bear]));
        assert!(ScenarioComparator::has_directional_consensus(&[&a, &b]));
    }

    #[test]
    fn test_common_target_range() {
        let a = impulse("a", 100.0, vec![150.0, 142.0, 162.0]);
        let b = impulse("b", 100.0, vec![155.0, 170.0]);
        assert_eq!(ScenarioComparator::common_target_range(&[&a, &b]), Some((155.0, 162.0)));

        let c = impulse("c", 100.0, vec![180.0]);
        assert_eq!(ScenarioComparator::common_target_range(&[&a, &c]), None);
        let none = impulse("d", 100.0, vec![f64::NAN]);
        assert_eq!(ScenarioComparator::common_target_range(&[&a, &none]), None);
    }

    #[test]
    fn test_average_confidence() {
        let a = scenario("a", 0.8, Phase::Wave5, true);
        let b = scenario("b", 0.4, Phase::Wave5, true);
        assert!((ScenarioComparator::average_confidence(&[&a, &b]) - 0.6).abs() < 1e-12);
        assert_eq!(ScenarioComparator::average_confidence::<f64>(&[]), 0.0);
    }
}
