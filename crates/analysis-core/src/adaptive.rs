//! Small statistics helpers shared by the scoring and probability stages.
//!
//! Scores in this workspace live on the unit interval. These helpers keep that
//! invariant cheap to uphold: anything NaN or out of range is folded back into
//! `[0, 1]` before it reaches a caller.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Clamp a score into `[0, 1]`, mapping NaN to zero.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Linear membership score: 1 inside `[lower, upper]`, falling to 0 at
/// `lower - margin` and `upper + margin`.
pub fn band_score(value: f64, lower: f64, upper: f64, margin: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    if value >= lower && value <= upper {
        return 1.0;
    }
    if margin <= 0.0 {
        return 0.0;
    }
    let distance = if value < lower { lower - value } else { value - upper };
    clamp_unit(1.0 - distance / margin)
}

/// Normalize non-negative weights so they sum to one.
///
/// Negative and NaN weights count as zero. If nothing positive remains the
/// result is uniform.
pub fn normalize_shares(weights: &[f64]) -> Vec<f64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let cleaned: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .collect();
    let total: f64 = cleaned.iter().sum();
    if total <= f64::EPSILON {
        let uniform = 1.0 / weights.len() as f64;
        return vec![uniform; weights.len()];
    }
    cleaned.iter().map(|w| w / total).collect()
}

/// Geometric scale factor for a parameter that grows `factor`-fold per step,
/// bounded to `[min, max]`.
pub fn scaled(base: f64, steps: i32, factor: f64, min: f64, max: f64) -> f64 {
    (base * factor.powi(steps)).clamp(min, max)
}
