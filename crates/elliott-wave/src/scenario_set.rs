use analysis_core::{AnalysisError, Num};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::confidence::HIGH_CONFIDENCE;
use crate::generator::rank;
use crate::phase::Phase;
use crate::scenario::{Scenario, ScenarioType};

/// Share of total confidence a phase needs for a strong consensus.
pub const MAJORITY_THRESHOLD: f64 = 0.5;

/// Ranked scenarios for one evaluation bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSet<N = f64> {
    scenarios: Vec<Scenario<N>>,
    evaluation_index: usize,
}

/// Phase group with the largest summed confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consensus {
    pub phase: Phase,
    pub share: f64,
    pub members: usize,
}

impl<N: Num> ScenarioSet<N> {
    /// Ranks by confidence (descending) then id. Ids must be unique.
    pub fn of(mut scenarios: Vec<Scenario<N>>, evaluation_index: usize) -> Result<Self, AnalysisError> {
        let mut seen = HashSet::with_capacity(scenarios.len());
        for s in &scenarios {
            if !seen.insert(s.id()) {
                return Err(AnalysisError::InvalidInput(format!("duplicate scenario id '{}'", s.id())));
            }
        }
        rank(&mut scenarios);
        Ok(Self {
            scenarios,
            evaluation_index,
        })
    }

    pub fn empty(evaluation_index: usize) -> Self {
        Self {
            scenarios: Vec::new(),
            evaluation_index,
        }
    }

    pub fn scenarios(&self) -> &[Scenario<N>] {
        &self.scenarios
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scenario<N>> {
        self.scenarios.iter()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn evaluation_index(&self) -> usize {
        self.evaluation_index
    }

    pub fn get(&self, id: &str) -> Option<&Scenario<N>> {
        self.scenarios.iter().find(|s| s.id() == id)
    }

    /// Highest-confidence scenario.
    pub fn base(&self) -> Option<&Scenario<N>> {
        self.scenarios.first()
    }

    /// Everything but the base case, in rank order.
    pub fn alternatives(&self) -> &[Scenario<N>] {
        self.scenarios.get(1..).unwrap_or(&[])
    }

    pub fn consensus(&self) -> Phase {
        self.consensus_detail().map(|c| c.phase).unwrap_or(Phase::None)
    }

    pub fn consensus_share(&self) -> f64 {
        self.consensus_detail().map(|c| c.share).unwrap_or(0.0)
    }

    pub fn has_strong_consensus(&self) -> bool {
        self.consensus_share() > MAJORITY_THRESHOLD
    }

    /// Ties go to the group with more scenarios, then to the phase name.
    pub fn consensus_detail(&self) -> Option<Consensus> {
        let mut groups: BTreeMap<&'static str, (Phase, f64, usize)> = BTreeMap::new();
        let mut total = 0.0;
        for s in &self.scenarios {
            let entry = groups.entry(s.current_phase().name()).or_insert((s.current_phase(), 0.0, 0));
            entry.1 += s.confidence_score();
            entry.2 += 1;
            total += s.confidence_score();
        }

        let mut best: Option<(Phase, f64, usize)> = None;
        // BTreeMap iterates names ascending, so strict comparisons keep the
        // alphabetically first phase on a full tie
        for (_, group) in groups {
            best = match best {
                Some(b) if group.1 > b.1 || (group.1 == b.1 && group.2 > b.2) => Some(group),
                Some(b) => Some(b),
                None => Some(group),
            };
        }

        best.map(|(phase, sum, members)| Consensus {
            phase,
            share: if total > 0.0 { sum / total } else { 0.0 },
            members,
        })
    }

    pub fn by_phase(&self, phase: Phase) -> Vec<&Scenario<N>> {
        self.scenarios.iter().filter(|s| s.current_phase() == phase).collect()
    }

    pub fn by_type(&self, scenario_type: ScenarioType) -> Vec<&Scenario<N>> {
        self.scenarios
            .iter()
            .filter(|s| s.scenario_type() == scenario_type)
            .collect()
    }

    /// Scenarios a trade at `price` would break.
    pub fn invalidated_by(&self, price: N) -> Vec<&Scenario<N>> {
        self.scenarios.iter().filter(|s| s.is_invalidated_by(price)).collect()
    }

    /// The subset still standing at `price`.
    pub fn valid_at(&self, price: N) -> ScenarioSet<N> {
        ScenarioSet {
            scenarios: self
                .scenarios
                .iter()
                .filter(|s| !s.is_invalidated_by(price))
                .cloned()
                .collect(),
            evaluation_index: self.evaluation_index,
        }
    }

    /// Base confidence minus the weakest alternative's. Zero below two scenarios.
    pub fn confidence_spread(&self) -> f64 {
        match (self.scenarios.first(), self.scenarios.last()) {
            (Some(first), Some(last)) if self.scenarios.len() > 1 => {
                first.confidence_score() - last.confidence_score()
            }
            _ => 0.0,
        }
    }

    pub fn high_confidence_count(&self) -> usize {
        self.scenarios
            .iter()
            .filter(|s| s.confidence_score() >= HIGH_CONFIDENCE)
            .count()
    }

    pub fn summary(&self) -> String {
        let Some(base) = self.base() else {
            return "No scenarios".to_string();
        };
        let consensus = if self.has_strong_consensus() {
            format!("{} ({:.0}%)", self.consensus(), self.consensus_share() * 100.0)
        } else {
            "none".to_string()
        };
        format!(
            "{} scenario(s): Base case={} ({:.1}%), {} alternative(s), consensus={}",
            self.len(),
            base.current_phase(),
            base.confidence().as_percentage(),
            self.alternatives().len(),
            consensus
        )
    }
}

impl<'a, N> IntoIterator for &'a ScenarioSet<N> {
    type Item = &'a Scenario<N>;
    type IntoIter = std::slice::Iter<'a, Scenario<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenarios.iter()
    }
}
