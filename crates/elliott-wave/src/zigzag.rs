use analysis_core::{AnalysisError, Num, PriceSeries};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::degree::Degree;
use crate::indicators::atr;
use crate::swing::Swing;

/// Which prices feed the zigzag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    /// Closing prices for both legs.
    #[default]
    Close,
    /// Highs extend up-legs, lows extend down-legs.
    HighLow,
}

impl PriceSource {
    fn up_price<S: PriceSeries + ?Sized>(&self, series: &S, index: usize) -> S::Num {
        match self {
            PriceSource::Close => series.close(index),
            PriceSource::HighLow => series.high(index),
        }
    }

    fn down_price<S: PriceSeries + ?Sized>(&self, series: &S, index: usize) -> S::Num {
        match self {
            PriceSource::Close => series.close(index),
            PriceSource::HighLow => series.low(index),
        }
    }
}

/// Zigzag with a reversal threshold proportional to the running extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedZigZagConfig {
    /// Minimum counter-move as a fraction of the extreme price (0.05 = 5%).
    pub reversal_pct: f64,
    pub price_source: PriceSource,
}

impl Default for FixedZigZagConfig {
    fn default() -> Self {
        Self {
            reversal_pct: 0.05,
            price_source: PriceSource::Close,
        }
    }
}

/// Zigzag with a volatility-scaled reversal threshold (ATR x multiplier).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveZigZagConfig {
    pub atr_period: usize,
    pub multiplier: f64,
    /// Absolute floor for the threshold, ignored when zero.
    pub min_threshold: f64,
    /// Absolute cap for the threshold, ignored when zero.
    pub max_threshold: f64,
    pub min_bars_between_pivots: usize,
    pub price_source: PriceSource,
}

impl Default for AdaptiveZigZagConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            multiplier: 1.0,
            min_threshold: 0.0,
            max_threshold: 0.0,
            min_bars_between_pivots: 3,
            price_source: PriceSource::Close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SwingDetectorConfig {
    Fixed(FixedZigZagConfig),
    Adaptive(AdaptiveZigZagConfig),
}

impl Default for SwingDetectorConfig {
    fn default() -> Self {
        SwingDetectorConfig::Adaptive(AdaptiveZigZagConfig::default())
    }
}

impl SwingDetectorConfig {
    pub fn fixed(reversal_pct: f64) -> Self {
        SwingDetectorConfig::Fixed(FixedZigZagConfig {
            reversal_pct,
            ..Default::default()
        })
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        match self {
            SwingDetectorConfig::Fixed(cfg) => {
                if !(cfg.reversal_pct.is_finite() && cfg.reversal_pct > 0.0) {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "reversal_pct must be positive, got {}",
                        cfg.reversal_pct
                    )));
                }
            }
            SwingDetectorConfig::Adaptive(cfg) => {
                if cfg.atr_period == 0 {
                    return Err(AnalysisError::InvalidConfig("atr_period must be at least 1".to_string()));
                }
                if !(cfg.multiplier.is_finite() && cfg.multiplier > 0.0) {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "multiplier must be positive, got {}",
                        cfg.multiplier
                    )));
                }
                if cfg.min_threshold < 0.0 || cfg.max_threshold < 0.0 {
                    return Err(AnalysisError::InvalidConfig("thresholds cannot be negative".to_string()));
                }
                if cfg.min_threshold > 0.0 && cfg.max_threshold > 0.0 && cfg.min_threshold > cfg.max_threshold {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "min_threshold {} exceeds max_threshold {}",
                        cfg.min_threshold, cfg.max_threshold
                    )));
                }
            }
        }
        Ok(())
    }

    fn price_source(&self) -> PriceSource {
        match self {
            SwingDetectorConfig::Fixed(cfg) => cfg.price_source,
            SwingDetectorConfig::Adaptive(cfg) => cfg.price_source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PivotKind {
    High,
    Low,
}

/// A confirmed turning point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot<N = f64> {
    pub index: usize,
    pub price: N,
    pub kind: PivotKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Undefined,
    Up,
    Down,
}

/// Incremental zigzag state shared by the detector and the swing compressor.
#[derive(Debug, Clone)]
pub(crate) struct ZigZagMachine<N> {
    trend: Trend,
    anchor_price: N,
    extreme_index: usize,
    extreme_price: N,
    last_pivot_index: Option<usize>,
}

impl<N: Num> ZigZagMachine<N> {
    pub(crate) fn new(index: usize, price: N) -> Self {
        Self {
            trend: Trend::Undefined,
            anchor_price: price,
            extreme_index: index,
            extreme_price: price,
            last_pivot_index: None,
        }
    }

    /// Start with `index` already counted as a pivot for spacing purposes.
    pub(crate) fn anchored(index: usize, price: N) -> Self {
        Self {
            last_pivot_index: Some(index),
            ..Self::new(index, price)
        }
    }

    /// Feed one observation. Returns the pivot confirmed by this step, if any.
    pub(crate) fn step(
        &mut self,
        index: usize,
        up: N,
        down: N,
        threshold: impl Fn(N) -> N,
        min_spacing: usize,
    ) -> Option<Pivot<N>> {
        match self.trend {
            Trend::Undefined => {
                if up > self.anchor_price {
                    self.trend = Trend::Up;
                    self.set_extreme(index, up);
                } else if down < self.anchor_price {
                    self.trend = Trend::Down;
                    self.set_extreme(index, down);
                }
                None
            }
            Trend::Up => {
                if up > self.extreme_price {
                    self.set_extreme(index, up);
                    return None;
                }
                let counter_move = self.extreme_price - down;
                if self.confirms(index, counter_move, threshold(self.extreme_price), min_spacing) {
                    let pivot = self.confirm(PivotKind::High);
                    self.trend = Trend::Down;
                    self.set_extreme(index, down);
                    return Some(pivot);
                }
                None
            }
            Trend::Down => {
                if down < self.extreme_price {
                    self.set_extreme(index, down);
                    return None;
                }
                let counter_move = up - self.extreme_price;
                if self.confirms(index, counter_move, threshold(self.extreme_price), min_spacing) {
                    let pivot = self.confirm(PivotKind::Low);
                    self.trend = Trend::Up;
                    self.set_extreme(index, up);
                    return Some(pivot);
                }
                None
            }
        }
    }

    /// The extreme of the leg still in progress.
    pub(crate) fn pending(&self) -> Option<Pivot<N>> {
        let kind = match self.trend {
            Trend::Undefined => return None,
            Trend::Up => PivotKind::High,
            Trend::Down => PivotKind::Low,
        };
        Some(Pivot {
            index: self.extreme_index,
            price: self.extreme_price,
            kind,
        })
    }

    fn confirms(&self, index: usize, counter_move: N, threshold: N, min_spacing: usize) -> bool {
        let spaced = self
            .last_pivot_index
            .map_or(true, |last| index.saturating_sub(last) >= min_spacing);
        counter_move > N::zero() && counter_move >= threshold && spaced
    }

    fn confirm(&mut self, kind: PivotKind) -> Pivot<N> {
        self.last_pivot_index = Some(self.extreme_index);
        Pivot {
            index: self.extreme_index,
            price: self.extreme_price,
            kind,
        }
    }

    fn set_extreme(&mut self, index: usize, price: N) {
        self.extreme_index = index;
        self.extreme_price = price;
    }
}

/// Append a pivot, merging it into the previous one when both have the same
/// kind so that the list keeps alternating. The more extreme price wins.
pub(crate) fn absorb_pivot<N: Num>(pivots: &mut Vec<Pivot<N>>, pivot: Pivot<N>) {
    if !pivot.price.is_valid() {
        return;
    }
    match pivots.last_mut() {
        Some(last) if last.kind == pivot.kind => {
            let more_extreme = match pivot.kind {
                PivotKind::High => pivot.price > last.price,
                PivotKind::Low => pivot.price < last.price,
            };
            if more_extreme {
                *last = pivot;
            }
        }
        _ => pivots.push(pivot),
    }
}

/// Connect consecutive pivots into swings.
pub fn swings_from_pivots<N: Num>(pivots: &[Pivot<N>], degree: Degree) -> Vec<Swing<N>> {
    pivots
        .windows(2)
        .filter_map(|w| Swing::new(w[0].index, w[1].index, w[0].price, w[1].price, degree).ok())
        .collect()
}

/// Zigzag swing detector.
///
/// Only confirmed pivots become swing endpoints: the leg still in progress at
/// the evaluation index is never reported.
#[derive(Debug, Clone)]
pub struct SwingDetector {
    config: SwingDetectorConfig,
}

impl SwingDetector {
    pub fn new(config: SwingDetectorConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SwingDetectorConfig {
        &self.config
    }

    /// Confirmed pivots using bars from the start of the series through `end`.
    pub fn pivots<S: PriceSeries + ?Sized>(&self, series: &S, end: usize) -> Vec<Pivot<S::Num>> {
        let Some(last) = series.end_index() else {
            return vec![];
        };
        let begin = series.begin_index();
        let end = end.min(last);
        let source = self.config.price_source();

        // first bar with a usable close anchors the machine
        let Some(anchor) = (begin..=end).find(|&i| series.close(i).is_valid()) else {
            return vec![];
        };

        let atr_values = match &self.config {
            SwingDetectorConfig::Adaptive(cfg) => atr(series, cfg.atr_period, end),
            SwingDetectorConfig::Fixed(_) => vec![],
        };

        let mut machine = ZigZagMachine::new(anchor, series.close(anchor));
        let mut pivots = Vec::new();

        for i in (anchor + 1)..=end {
            let up = source.up_price(series, i);
            let down = source.down_price(series, i);
            if !up.is_valid() || !down.is_valid() {
                trace!("skipping bar {} with missing prices", i);
                continue;
            }

            let confirmed = match &self.config {
                SwingDetectorConfig::Fixed(cfg) => {
                    let pct = S::Num::from_f64(cfg.reversal_pct);
                    machine.step(i, up, down, |extreme| extreme.abs() * pct, 0)
                }
                SwingDetectorConfig::Adaptive(cfg) => {
                    let threshold = adaptive_threshold(cfg, atr_values.get(i - begin).copied());
                    machine.step(i, up, down, |_| threshold, cfg.min_bars_between_pivots)
                }
            };

            if let Some(pivot) = confirmed {
                absorb_pivot(&mut pivots, pivot);
            }
        }

        debug!("zigzag confirmed {} pivots through bar {}", pivots.len(), end);
        pivots
    }

    /// Alternating swings between confirmed pivots, labelled with `degree`.
    pub fn detect<S: PriceSeries + ?Sized>(&self, series: &S, end: usize, degree: Degree) -> Vec<Swing<S::Num>> {
        swings_from_pivots(&self.pivots(series, end), degree)
    }
}

fn adaptive_threshold<N: Num>(cfg: &AdaptiveZigZagConfig, atr_value: Option<N>) -> N {
    let Some(atr_value) = atr_value else {
        return N::nan();
    };
    let mut threshold = atr_value * N::from_f64(cfg.multiplier);
    if cfg.min_threshold > 0.0 {
        threshold = threshold.maximum(N::from_f64(cfg.min_threshold));
    }
    if cfg.max_threshold > 0.0 {
        threshold = threshold.minimum(N::from_f64(cfg.max_threshold));
    }
    threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swing::swings_alternate;
    use analysis_core::{BarSeries, DecimalNum};
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        BarSeries::from_closes("TEST", start, Duration::days(1), closes)
    }

    fn fixed(pct: f64) -> SwingDetector {
        SwingDetector::new(SwingDetectorConfig::fixed(pct)).unwrap()
    }

    #[test]
    fn test_fixed_zigzag_confirms_reversals() {
        let s = series(&[100.0, 95.0, 90.0, 100.0, 110.0, 120.0, 110.0, 100.0, 106.0]);
        let pivots = fixed(0.05).pivots(&s, 8);
        let points: Vec<(usize, f64, PivotKind)> = pivots.iter().map(|p| (p.index, p.price, p.kind)).collect();
        assert_eq!(
            points,
            vec![(2, 90.0, PivotKind::Low), (5, 120.0, PivotKind::High), (7, 100.0, PivotKind::Low)]
        );

        let swings = fixed(0.05).detect(&s, 8, Degree::Minor);
        assert_eq!(swings.len(), 2);
        assert!(swings[0].is_rising());
        assert!(!swings[1].is_rising());
        assert!(swings_alternate(&swings));
    }

    #[test]
    fn test_unconfirmed_leg_is_not_reported() {
        // final rally from 100 never reverses
        let s = series(&[100.0, 90.0, 100.0, 110.0, 120.0]);
        let swings = fixed(0.05).detect(&s, 4, Degree::Minor);
        assert!(swings.is_empty());
    }

    #[test]
    fn test_evaluation_index_limits_history() {
        let s = series(&[100.0, 95.0, 90.0, 100.0, 110.0, 120.0, 110.0, 100.0, 106.0]);
        assert_eq!(fixed(0.05).pivots(&s, 4).len(), 1);
        assert_eq!(fixed(0.05).pivots(&s, 100).len(), 3);
    }

    #[test]
    fn test_empty_and_flat_series() {
        let empty = series(&[]);
        assert!(fixed(0.05).detect(&empty, 0, Degree::Minor).is_empty());

        let single = series(&[100.0]);
        assert!(fixed(0.05).detect(&single, 0, Degree::Minor).is_empty());

        let flat = series(&[100.0; 30]);
        let adaptive = SwingDetector::new(SwingDetectorConfig::default()).unwrap();
        assert!(adaptive.detect(&flat, 29, Degree::Minor).is_empty());
    }

    #[test]
    fn test_nan_bars_are_skipped() {
        let s = series(&[100.0, 95.0, 90.0, f64::NAN, 100.0, 110.0, 120.0, f64::NAN, 110.0, 100.0, 106.0]);
        let pivots = fixed(0.05).pivots(&s, 10);
        assert_eq!(pivots.len(), 3);
        assert!(pivots.iter().all(|p| p.price.is_finite()));
    }

    #[test]
    fn test_adaptive_min_spacing_suppresses_wiggles() {
        let s = series(&[100.0, 80.0, 100.0, 120.0, 110.0, 130.0, 100.0, 90.0, 120.0]);
        // floor and cap pin the threshold at 5 price units
        let cfg = AdaptiveZigZagConfig {
            atr_period: 3,
            min_threshold: 5.0,
            max_threshold: 5.0,
            min_bars_between_pivots: 0,
            ..Default::default()
        };
        let loose = SwingDetector::new(SwingDetectorConfig::Adaptive(cfg)).unwrap();
        let strict = SwingDetector::new(SwingDetectorConfig::Adaptive(AdaptiveZigZagConfig {
            min_bars_between_pivots: 3,
            ..cfg
        }))
        .unwrap();

        assert_eq!(loose.pivots(&s, 8).len(), 5);
        let strict_pivots = strict.pivots(&s, 8);
        let indices: Vec<usize> = strict_pivots.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 3, 7]);
        for pair in strict_pivots.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
        }
    }

    #[test]
    fn test_decimal_and_float_agree() {
        let closes = [100.0, 95.0, 90.0, 100.0, 110.0, 120.0, 110.0, 100.0, 106.0, 95.0];
        let s = series(&closes);
        let dec: BarSeries<DecimalNum> = s.convert();
        let f = fixed(0.05).pivots(&s, 9);
        let d = fixed(0.05).pivots(&dec, 9);
        assert_eq!(f.len(), d.len());
        for (a, b) in f.iter().zip(d.iter()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.kind, b.kind);
            assert!((a.price - b.price.to_f64()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_absorb_keeps_more_extreme() {
        let mut pivots = vec![Pivot { index: 1, price: 10.0, kind: PivotKind::High }];
        absorb_pivot(&mut pivots, Pivot { index: 3, price: 12.0, kind: PivotKind::High });
        absorb_pivot(&mut pivots, Pivot { index: 4, price: 11.0, kind: PivotKind::High });
        absorb_pivot(&mut pivots, Pivot { index: 5, price: f64::NAN, kind: PivotKind::Low });
        assert_eq!(pivots.len(), 1);
        assert_eq!(pivots[0].index, 3);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(SwingDetector::new(SwingDetectorConfig::fixed(0.0)).is_err());
        assert!(SwingDetector::new(SwingDetectorConfig::fixed(f64::NAN)).is_err());
        let bad_period = AdaptiveZigZagConfig { atr_period: 0, ..Default::default() };
        assert!(SwingDetector::new(SwingDetectorConfig::Adaptive(bad_period)).is_err());
        let bad_bounds = AdaptiveZigZagConfig { min_threshold: 5.0, max_threshold: 1.0, ..Default::default() };
        assert!(SwingDetector::new(SwingDetectorConfig::Adaptive(bad_bounds)).is_err());
        let bad_mult = AdaptiveZigZagConfig { multiplier: -1.0, ..Default::default() };
        assert!(SwingDetector::new(SwingDetectorConfig::Adaptive(bad_mult)).is_err());
    }
}
