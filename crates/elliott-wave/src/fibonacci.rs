use analysis_core::adaptive::{band_score, clamp_unit};
use analysis_core::{AnalysisError, Num};
use serde::{Deserialize, Serialize};

use crate::swing::Swing;

/// Canonical Fibonacci ratios, ascending.
pub const FIBONACCI_RATIOS: [f64; 10] = [0.236, 0.382, 0.5, 0.618, 0.786, 1.0, 1.272, 1.618, 2.0, 2.618];

/// Ratio levels used for retracement readings.
pub const RETRACEMENT_LEVELS: [f64; 6] = [0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Ratio levels used for extension readings.
pub const EXTENSION_LEVELS: [f64; 4] = [1.272, 1.414, 1.618, 2.0];

/// Inclusive ratio band with a preferred value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioRange {
    pub lower: f64,
    pub upper: f64,
    pub ideal: f64,
}

impl RatioRange {
    pub const fn new(lower: f64, upper: f64, ideal: f64) -> Self {
        Self { lower, upper, ideal }
    }
}

pub const WAVE2_RETRACEMENT: RatioRange = RatioRange::new(0.382, 0.786, 0.618);
pub const WAVE3_EXTENSION: RatioRange = RatioRange::new(1.0, 2.618, 1.618);
pub const WAVE4_RETRACEMENT: RatioRange = RatioRange::new(0.236, 0.786, 0.382);
pub const WAVE5_PROJECTION: RatioRange = RatioRange::new(0.618, 1.618, 1.0);
pub const WAVE_B_RETRACEMENT: RatioRange = RatioRange::new(0.382, 0.886, 0.618);
pub const WAVE_B_FLAT_RETRACEMENT: RatioRange = RatioRange::new(0.786, 1.386, 1.0);
pub const WAVE_C_EXTENSION: RatioRange = RatioRange::new(1.0, 1.618, 1.0);

/// How a tolerance widens a target ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToleranceMode {
    /// `|ratio - target| <= tolerance`
    #[default]
    Absolute,
    /// `|ratio - target| <= tolerance * target`
    Relative,
}

/// Amplitude of `numerator` relative to `denominator`.
///
/// NaN when the denominator is flat or either swing carries invalid prices.
pub fn ratio<N: Num>(numerator: &Swing<N>, denominator: &Swing<N>) -> N {
    let den = denominator.amplitude();
    let num = numerator.amplitude();
    if !den.is_valid() || !num.is_valid() || den.is_zero() {
        return N::nan();
    }
    num / den
}

/// Closest canonical ratio to `value`.
pub fn nearest_fibonacci(value: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    FIBONACCI_RATIOS
        .iter()
        .copied()
        .min_by(|a, b| (a - value).abs().total_cmp(&(b - value).abs()))
}

/// Checks wave ratios against Fibonacci bands, widened by a tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibonacciValidator {
    tolerance: f64,
    mode: ToleranceMode,
}

impl Default for FibonacciValidator {
    fn default() -> Self {
        Self {
            tolerance: 0.05,
            mode: ToleranceMode::Absolute,
        }
    }
}

impl FibonacciValidator {
    pub fn new(tolerance: f64, mode: ToleranceMode) -> Result<Self, AnalysisError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "fibonacci tolerance must be a non-negative number, got {}",
                tolerance
            )));
        }
        Ok(Self { tolerance, mode })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn mode(&self) -> ToleranceMode {
        self.mode
    }

    fn slack(&self, target: f64) -> f64 {
        match self.mode {
            ToleranceMode::Absolute => self.tolerance,
            ToleranceMode::Relative => self.tolerance * target.abs(),
        }
    }

    /// True if `value` lies within tolerance of any canonical ratio.
    pub fn is_near_fibonacci(&self, value: f64) -> bool {
        value.is_finite()
            && FIBONACCI_RATIOS
                .iter()
                .any(|target| (value - target).abs() <= self.slack(*target))
    }

    /// True if `value` lies within tolerance of one of `levels`.
    pub fn is_near_any(&self, value: f64, levels: &[f64]) -> bool {
        value.is_finite() && levels.iter().any(|target| (value - target).abs() <= self.slack(*target))
    }

    /// Ratio band membership, band widened on both sides by the tolerance.
    pub fn within(&self, value: f64, range: RatioRange) -> bool {
        value.is_finite()
            && value >= range.lower - self.slack(range.lower)
            && value <= range.upper + self.slack(range.upper)
    }

    fn swing_ratio_within<N: Num>(&self, numerator: &Swing<N>, denominator: &Swing<N>, range: RatioRange) -> bool {
        self.within(ratio(numerator, denominator).to_f64(), range)
    }

    pub fn is_wave2_retracement_valid<N: Num>(&self, wave1: &Swing<N>, wave2: &Swing<N>) -> bool {
        self.swing_ratio_within(wave2, wave1, WAVE2_RETRACEMENT)
    }

    pub fn is_wave3_extension_valid<N: Num>(&self, wave1: &Swing<N>, wave3: &Swing<N>) -> bool {
        self.swing_ratio_within(wave3, wave1, WAVE3_EXTENSION)
    }

    pub fn is_wave4_retracement_valid<N: Num>(&self, wave3: &Swing<N>, wave4: &Swing<N>) -> bool {
        self.swing_ratio_within(wave4, wave3, WAVE4_RETRACEMENT)
    }

    pub fn is_wave5_projection_valid<N: Num>(&self, wave1: &Swing<N>, wave5: &Swing<N>) -> bool {
        self.swing_ratio_within(wave5, wave1, WAVE5_PROJECTION)
    }

    pub fn is_wave_b_valid<N: Num>(&self, wave_a: &Swing<N>, wave_b: &Swing<N>) -> bool {
        self.swing_ratio_within(wave_b, wave_a, WAVE_B_RETRACEMENT)
    }

    pub fn is_wave_b_flat_valid<N: Num>(&self, wave_a: &Swing<N>, wave_b: &Swing<N>) -> bool {
        self.swing_ratio_within(wave_b, wave_a, WAVE_B_FLAT_RETRACEMENT)
    }

    pub fn is_wave_c_valid<N: Num>(&self, wave_a: &Swing<N>, wave_c: &Swing<N>) -> bool {
        self.swing_ratio_within(wave_c, wave_a, WAVE_C_EXTENSION)
    }

    /// 1 inside the widened band, fading to 0 at 80% of its lower edge and
    /// 120% of its upper edge.
    pub fn retracement_fit(&self, value: f64, range: RatioRange) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let lower = range.lower - self.slack(range.lower);
        let upper = range.upper + self.slack(range.upper);
        if value >= lower && value <= upper {
            return 1.0;
        }
        if value < lower {
            if lower <= 0.0 {
                return 0.0;
            }
            return clamp_unit((value - 0.8 * lower) / (0.2 * lower));
        }
        clamp_unit((1.2 * upper - value) / (0.2 * upper))
    }

    /// Band membership blended with closeness to the ideal extension.
    pub fn extension_fit(&self, value: f64, range: RatioRange) -> f64 {
        if !value.is_finite() || range.ideal <= 0.0 {
            return 0.0;
        }
        let lower = range.lower - self.slack(range.lower);
        let upper = range.upper + self.slack(range.upper);
        let membership = band_score(value, lower, upper, 0.25 * range.upper);
        let closeness = clamp_unit(1.0 - (value - range.ideal).abs() / range.ideal);
        clamp_unit(0.7 * membership + 0.3 * closeness)
    }

    /// Closeness of `value` to the ideal of `range`, in `[0, 1]`.
    ///
    /// 1 at the ideal, 0.5 at the edge of the band, 0 outside the widened band.
    pub fn proximity_score(&self, value: f64, range: RatioRange) -> f64 {
        if !self.within(value, range) {
            return 0.0;
        }
        let half_width = ((range.upper - range.lower) / 2.0).max(f64::EPSILON);
        (1.0 - 0.5 * (value - range.ideal).abs() / half_width).clamp(0.0, 1.0)
    }
}
