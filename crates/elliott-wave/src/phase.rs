use analysis_core::{Num, PriceSeries};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::degree::Degree;
use crate::fibonacci::FibonacciValidator;
use crate::swing::Swing;
use crate::zigzag::SwingDetector;

/// Position within an Elliott cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    None,
    Wave1,
    Wave2,
    Wave3,
    Wave4,
    Wave5,
    CorrectiveA,
    CorrectiveB,
    CorrectiveC,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::None => "NONE",
            Phase::Wave1 => "WAVE1",
            Phase::Wave2 => "WAVE2",
            Phase::Wave3 => "WAVE3",
            Phase::Wave4 => "WAVE4",
            Phase::Wave5 => "WAVE5",
            Phase::CorrectiveA => "CORRECTIVE_A",
            Phase::CorrectiveB => "CORRECTIVE_B",
            Phase::CorrectiveC => "CORRECTIVE_C",
        }
    }

    pub fn is_impulse(&self) -> bool {
        matches!(self, Phase::Wave1 | Phase::Wave2 | Phase::Wave3 | Phase::Wave4 | Phase::Wave5)
    }

    pub fn is_corrective(&self) -> bool {
        matches!(self, Phase::CorrectiveA | Phase::CorrectiveB | Phase::CorrectiveC)
    }

    /// 1-based wave number within an impulse.
    pub fn impulse_index(&self) -> Option<usize> {
        match self {
            Phase::Wave1 => Some(1),
            Phase::Wave2 => Some(2),
            Phase::Wave3 => Some(3),
            Phase::Wave4 => Some(4),
            Phase::Wave5 => Some(5),
            _ => None,
        }
    }

    /// 1-based leg number within a correction (A = 1).
    pub fn corrective_index(&self) -> Option<usize> {
        match self {
            Phase::CorrectiveA => Some(1),
            Phase::CorrectiveB => Some(2),
            Phase::CorrectiveC => Some(3),
            _ => None,
        }
    }

    /// Last leg of a structure: wave 5 or wave C.
    pub fn completes_structure(&self) -> bool {
        matches!(self, Phase::Wave5 | Phase::CorrectiveC)
    }

    fn impulse_at(count: usize) -> Phase {
        match count {
            1 => Phase::Wave1,
            2 => Phase::Wave2,
            3 => Phase::Wave3,
            4 => Phase::Wave4,
            5 => Phase::Wave5,
            _ => Phase::None,
        }
    }

    fn corrective_at(count: usize) -> Phase {
        match count {
            1 => Phase::CorrectiveA,
            2 => Phase::CorrectiveB,
            3 => Phase::CorrectiveC,
            _ => Phase::None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reading of the wave count at one evaluation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAssessment<N = f64> {
    pub phase: Phase,
    pub impulse_swings: Vec<Swing<N>>,
    pub corrective_swings: Vec<Swing<N>>,
    pub impulse_confirmed: bool,
    pub corrective_confirmed: bool,
}

impl<N: Num> PhaseAssessment<N> {
    pub fn none() -> Self {
        Self {
            phase: Phase::None,
            impulse_swings: Vec::new(),
            corrective_swings: Vec::new(),
            impulse_confirmed: false,
            corrective_confirmed: false,
        }
    }

    /// Direction of the impulse, if one has started.
    pub fn rising(&self) -> Option<bool> {
        self.impulse_swings.first().map(Swing::is_rising)
    }
}

/// Walks swings through the impulse and corrective state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseClassifier {
    validator: FibonacciValidator,
}

impl PhaseClassifier {
    pub fn new(validator: FibonacciValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &FibonacciValidator {
        &self.validator
    }

    /// Classify the cycle that starts at the first swing. A completed
    /// five-three cycle followed by further swings restarts the count after
    /// wave C.
    pub fn classify<N: Num>(&self, swings: &[Swing<N>]) -> PhaseAssessment<N> {
        let mut start = 0;
        loop {
            let impulse_len = self.impulse_progress(swings, start);
            if impulse_len == 0 {
                return PhaseAssessment::none();
            }
            let impulse = &swings[start..start + impulse_len];
            if impulse_len < 5 {
                return PhaseAssessment {
                    phase: Phase::impulse_at(impulse_len),
                    impulse_swings: impulse.to_vec(),
                    corrective_swings: Vec::new(),
                    impulse_confirmed: false,
                    corrective_confirmed: false,
                };
            }

            let corrective_start = start + 5;
            let corrective_len = self.corrective_progress(swings, corrective_start, impulse[0].is_rising());
            if corrective_len == 3 && corrective_start + 3 < swings.len() {
                start = corrective_start + 3;
                continue;
            }

            let corrective = &swings[corrective_start..corrective_start + corrective_len];
            let phase = if corrective_len == 0 {
                Phase::Wave5
            } else {
                Phase::corrective_at(corrective_len)
            };
            return PhaseAssessment {
                phase,
                impulse_swings: impulse.to_vec(),
                corrective_swings: corrective.to_vec(),
                impulse_confirmed: true,
                corrective_confirmed: corrective_len == 3,
            };
        }
    }

    /// Number of valid impulse waves starting at `start` (0 to 5).
    fn impulse_progress<N: Num>(&self, swings: &[Swing<N>], start: usize) -> usize {
        let v = &self.validator;
        let Some(w1) = swings.get(start) else {
            return 0;
        };
        if !w1.amplitude().is_valid() || w1.amplitude().is_zero() {
            return 0;
        }
        let rising = w1.is_rising();
        let beyond = |a: N, b: N| if rising { a > b } else { a < b };

        let Some(w2) = swings.get(start + 1) else { return 1 };
        if w2.is_rising() == rising || !v.is_wave2_retracement_valid(w1, w2) || !beyond(w2.to_price, w1.from_price) {
            return 1;
        }
        let Some(w3) = swings.get(start + 2) else { return 2 };
        if w3.is_rising() != rising || !v.is_wave3_extension_valid(w1, w3) || !beyond(w3.to_price, w1.to_price) {
            return 2;
        }
        let Some(w4) = swings.get(start + 3) else { return 3 };
        if w4.is_rising() == rising || !v.is_wave4_retracement_valid(w3, w4) || !beyond(w4.to_price, w1.to_price) {
            return 3;
        }
        let Some(w5) = swings.get(start + 4) else { return 4 };
        if w5.is_rising() != rising || !v.is_wave5_projection_valid(w1, w5) || !beyond(w5.to_price, w3.to_price) {
            return 4;
        }
        5
    }

    /// Number of valid corrective legs starting at `start` (0 to 3).
    fn corrective_progress<N: Num>(&self, swings: &[Swing<N>], start: usize, impulse_rising: bool) -> usize {
        let v = &self.validator;
        let Some(a) = swings.get(start) else {
            return 0;
        };
        if a.is_rising() == impulse_rising || a.amplitude().is_zero() {
            return 0;
        }
        let down = !a.is_rising();
        let beyond = |x: N, y: N| if down { x < y } else { x > y };

        let Some(b) = swings.get(start + 1) else { return 1 };
        if b.is_rising() == a.is_rising() || !v.is_wave_b_valid(a, b) || !beyond(b.to_price, a.from_price) {
            return 1;
        }
        let Some(c) = swings.get(start + 2) else { return 2 };
        if c.is_rising() != a.is_rising() || !v.is_wave_c_valid(a, c) || !beyond(c.to_price, a.to_price) {
            return 2;
        }
        3
    }
}

/// Caller-owned cache of phase readings keyed by evaluation index.
#[derive(Debug, Clone)]
pub struct PhaseMemo<N = f64> {
    entries: HashMap<usize, PhaseAssessment<N>>,
}

impl<N: Num> Default for PhaseMemo<N> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<N: Num> PhaseMemo<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&PhaseAssessment<N>> {
        self.entries.get(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Per-bar phase labelling over a price series.
pub struct PhaseIndicator<'a, S: PriceSeries + ?Sized> {
    series: &'a S,
    detector: SwingDetector,
    classifier: PhaseClassifier,
    degree: Degree,
}

impl<'a, S: PriceSeries + ?Sized> PhaseIndicator<'a, S> {
    pub fn new(series: &'a S, detector: SwingDetector, classifier: PhaseClassifier, degree: Degree) -> Self {
        Self {
            series,
            detector,
            classifier,
            degree,
        }
    }

    pub fn swings(&self, index: usize) -> Vec<Swing<S::Num>> {
        self.detector.detect(self.series, index, self.degree)
    }

    pub fn assess(&self, index: usize) -> PhaseAssessment<S::Num> {
        self.classifier.classify(&self.swings(index))
    }

    /// Same as [`assess`](Self::assess), reusing readings stored in `memo`.
    pub fn assess_cached<'m>(&self, index: usize, memo: &'m mut PhaseMemo<S::Num>) -> &'m PhaseAssessment<S::Num> {
        memo.entries.entry(index).or_insert_with(|| self.assess(index))
    }

    pub fn phase(&self, index: usize) -> Phase {
        self.assess(index).phase
    }

    pub fn is_impulse_confirmed(&self, index: usize) -> bool {
        self.assess(index).impulse_confirmed
    }

    pub fn is_corrective_confirmed(&self, index: usize) -> bool {
        self.assess(index).corrective_confirmed
    }

    pub fn impulse_swings(&self, index: usize) -> Vec<Swing<S::Num>> {
        self.assess(index).impulse_swings
    }

    pub fn corrective_swings(&self, index: usize) -> Vec<Swing<S::Num>> {
        self.assess(index).corrective_swings
    }
}
