use analysis_core::adaptive::normalize_shares;
use analysis_core::{AnalysisError, Num};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::phase::Phase;
use crate::scenario_set::ScenarioSet;

/// Turns scenario confidences into probabilities summing to one.
///
/// Stage 1 boosts scenarios agreeing with the consensus phase by
/// `1 + consensus_weight` and damps the rest by `1 - consensus_weight`.
/// Stage 2 redistributes each phase group's share between a proportional
/// split and a sharpened one (`confidence ^ sharpening`), so the strongest
/// member of a group pulls ahead while the group total stays fixed. The blend
/// factor is capped so that no consensus member falls below its naive share
/// and no outlier rises above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilityNormalizer {
    consensus_weight: f64,
    sharpening: f64,
    max_blend: f64,
}

impl Default for ProbabilityNormalizer {
    fn default() -> Self {
        Self {
            consensus_weight: 0.4,
            sharpening: 4.0,
            max_blend: 0.5,
        }
    }
}

struct Member<'a> {
    id: &'a str,
    confidence: f64,
    stage_one: f64,
}

impl ProbabilityNormalizer {
    pub fn new(consensus_weight: f64, sharpening: f64, max_blend: f64) -> Result<Self, AnalysisError> {
        let normalizer = Self {
            consensus_weight,
            sharpening,
            max_blend,
        };
        normalizer.validate()?;
        Ok(normalizer)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..1.0).contains(&self.consensus_weight) {
            return Err(AnalysisError::InvalidConfig(format!(
                "consensus weight must lie in [0, 1), got {}",
                self.consensus_weight
            )));
        }
        if !self.sharpening.is_finite() || self.sharpening < 1.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "sharpening exponent must be at least 1, got {}",
                self.sharpening
            )));
        }
        if !(0.0..=0.5).contains(&self.max_blend) {
            return Err(AnalysisError::InvalidConfig(format!(
                "max blend must lie in [0, 0.5], got {}",
                self.max_blend
            )));
        }
        Ok(())
    }

    pub fn consensus_weight(&self) -> f64 {
        self.consensus_weight
    }

    pub fn max_blend(&self) -> f64 {
        self.max_blend
    }

    /// Probability per scenario id. Empty for an empty set.
    pub fn normalize<N: Num>(&self, set: &ScenarioSet<N>) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        match set.len() {
            0 => return out,
            1 => {
                if let Some(s) = set.base() {
                    out.insert(s.id().to_string(), 1.0);
                }
                return out;
            }
            _ => {}
        }

        let confidences: Vec<f64> = set
            .iter()
            .map(|s| {
                let c = s.confidence_score();
                if c.is_finite() && c > 0.0 {
                    c
                } else {
                    0.0
                }
            })
            .collect();
        let total: f64 = confidences.iter().sum();
        if total <= 0.0 {
            let uniform = 1.0 / set.len() as f64;
            for s in set {
                out.insert(s.id().to_string(), uniform);
            }
            return out;
        }

        let consensus = set.consensus();
        let boosted: Vec<f64> = set
            .iter()
            .zip(&confidences)
            .map(|(s, c)| {
                if s.current_phase() == consensus {
                    c * (1.0 + self.consensus_weight)
                } else {
                    c * (1.0 - self.consensus_weight)
                }
            })
            .collect();
        let stage_one = normalize_shares(&boosted);

        let mut groups: BTreeMap<Phase, Vec<Member<'_>>> = BTreeMap::new();
        for ((s, c), p) in set.iter().zip(&confidences).zip(&stage_one) {
            groups.entry(s.current_phase()).or_default().push(Member {
                id: s.id(),
                confidence: *c,
                stage_one: *p,
            });
        }
        let single_group = groups.len() == 1;

        let mut raw = Vec::with_capacity(set.len());
        for (phase, members) in &groups {
            let group_sum: f64 = members.iter().map(|m| m.confidence).sum();
            let group_share: f64 = members.iter().map(|m| m.stage_one).sum();
            if group_sum <= 0.0 {
                raw.extend(members.iter().map(|m| (m.id, 0.0)));
                continue;
            }
            let sharpened: Vec<f64> = members.iter().map(|m| m.confidence.powf(self.sharpening)).collect();
            let sharpened_sum: f64 = sharpened.iter().sum();

            let lambda = if single_group {
                self.max_blend
            } else {
                // stage-one share relative to naive share, equal across the group
                let lift = group_share * total / group_sum;
                self.blend_limit(*phase == consensus, lift, members, &sharpened, group_sum, sharpened_sum)
            };

            for (m, sharp) in members.iter().zip(&sharpened) {
                let proportional = m.confidence / group_sum;
                let peaked = if sharpened_sum > 0.0 { sharp / sharpened_sum } else { proportional };
                raw.push((m.id, group_share * ((1.0 - lambda) * proportional + lambda * peaked)));
            }
        }

        let values: Vec<f64> = raw.iter().map(|(_, p)| *p).collect();
        for ((id, _), p) in raw.iter().zip(normalize_shares(&values)) {
            out.insert(id.to_string(), p);
        }
        out
    }

    /// Half the largest blend that keeps every member on its side of the
    /// naive share, capped at `max_blend`.
    fn blend_limit(
        &self,
        aligned: bool,
        lift: f64,
        members: &[Member<'_>],
        sharpened: &[f64],
        group_sum: f64,
        sharpened_sum: f64,
    ) -> f64 {
        if !lift.is_finite() || (lift - 1.0).abs() < 1e-12 || sharpened_sum <= 0.0 {
            return self.max_blend;
        }
        let mut limit = f64::INFINITY;
        for (m, sharp) in members.iter().zip(sharpened) {
            // a zero member gets nothing at any blend and sets no bound
            if m.confidence <= 0.0 {
                continue;
            }
            let k = (sharp / sharpened_sum) / (m.confidence / group_sum);
            let bound = if aligned && k < 1.0 {
                (1.0 - 1.0 / lift) / (1.0 - k)
            } else if !aligned && k > 1.0 {
                (1.0 / lift - 1.0) / (k - 1.0)
            } else {
                continue;
            };
            if bound.is_finite() && bound >= 0.0 {
                limit = limit.min(bound);
            }
        }
        if limit.is_finite() {
            (0.5 * limit).min(self.max_blend)
        } else {
            self.max_blend
        }
    }
}
