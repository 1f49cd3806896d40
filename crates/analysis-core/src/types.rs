use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::num::Num;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar<N = f64> {
    pub timestamp: DateTime<Utc>,
    pub open: N,
    pub high: N,
    pub low: N,
    pub close: N,
    #[serde(default)]
    pub volume: f64,
}

impl<N: Num> Bar<N> {
    /// Convert the price fields to another numeric representation.
    pub fn convert<M: Num>(&self) -> Bar<M> {
        Bar {
            timestamp: self.timestamp,
            open: M::from_f64(self.open.to_f64()),
            high: M::from_f64(self.high.to_f64()),
            low: M::from_f64(self.low.to_f64()),
            close: M::from_f64(self.close.to_f64()),
            volume: self.volume,
        }
    }
}

/// Read-only, index-addressable access to price bars.
///
/// The analysis engine only ever reads highs, lows and closes through this
/// trait; it never owns or loads the underlying data.
pub trait PriceSeries: Sync {
    type Num: Num;

    fn bar_count(&self) -> usize;
    fn high(&self, index: usize) -> Self::Num;
    fn low(&self, index: usize) -> Self::Num;
    fn close(&self, index: usize) -> Self::Num;

    fn begin_index(&self) -> usize {
        0
    }

    /// Index of the last bar, `None` for an empty series.
    fn end_index(&self) -> Option<usize> {
        match self.bar_count() {
            0 => None,
            n => Some(self.begin_index() + n - 1),
        }
    }

    fn is_empty(&self) -> bool {
        self.bar_count() == 0
    }
}

impl<N: Num> PriceSeries for [Bar<N>] {
    type Num = N;

    fn bar_count(&self) -> usize {
        self.len()
    }

    fn high(&self, index: usize) -> N {
        self.get(index).map(|b| b.high).unwrap_or_else(N::nan)
    }

    fn low(&self, index: usize) -> N {
        self.get(index).map(|b| b.low).unwrap_or_else(N::nan)
    }

    fn close(&self, index: usize) -> N {
        self.get(index).map(|b| b.close).unwrap_or_else(N::nan)
    }
}

/// Trailing part of another series, from bar `begin` through its last bar.
/// Bars keep the indices they have in the parent.
#[derive(Debug)]
pub struct SeriesWindow<'a, S: ?Sized> {
    series: &'a S,
    begin: usize,
}

impl<'a, S: PriceSeries + ?Sized> SeriesWindow<'a, S> {
    pub fn new(series: &'a S, begin: usize) -> Self {
        Self {
            series,
            begin: begin.max(series.begin_index()),
        }
    }

    fn covers(&self, index: usize) -> bool {
        index >= self.begin
    }
}

impl<S: PriceSeries + ?Sized> PriceSeries for SeriesWindow<'_, S> {
    type Num = S::Num;

    fn bar_count(&self) -> usize {
        self.series
            .end_index()
            .map_or(0, |end| (end + 1).saturating_sub(self.begin))
    }

    fn high(&self, index: usize) -> S::Num {
        if self.covers(index) {
            self.series.high(index)
        } else {
            S::Num::nan()
        }
    }

    fn low(&self, index: usize) -> S::Num {
        if self.covers(index) {
            self.series.low(index)
        } else {
            S::Num::nan()
        }
    }

    fn close(&self, index: usize) -> S::Num {
        if self.covers(index) {
            self.series.close(index)
        } else {
            S::Num::nan()
        }
    }

    fn begin_index(&self) -> usize {
        self.begin
    }
}

/// Named, owned series of bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarSeries<N = f64> {
    pub name: String,
    pub bars: Vec<Bar<N>>,
}

impl<N: Num> BarSeries<N> {
    pub fn new(name: impl Into<String>, bars: Vec<Bar<N>>) -> Self {
        Self {
            name: name.into(),
            bars,
        }
    }

    /// Build a series from closes only; highs and lows equal the close.
    pub fn from_closes(name: impl Into<String>, start: DateTime<Utc>, step: Duration, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let price = N::from_f64(c);
                Bar {
                    timestamp: start + step * i as i32,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: 0.0,
                }
            })
            .collect();
        Self::new(name, bars)
    }

    /// Typical spacing between consecutive bars, if there are at least two.
    pub fn bar_duration(&self) -> Option<Duration> {
        match (self.bars.first(), self.bars.get(1)) {
            (Some(a), Some(b)) => Some(b.timestamp - a.timestamp),
            _ => None,
        }
    }

    pub fn convert<M: Num>(&self) -> BarSeries<M> {
        BarSeries {
            name: self.name.clone(),
            bars: self.bars.iter().map(Bar::convert).collect(),
        }
    }
}

impl<N: Num> PriceSeries for BarSeries<N> {
    type Num = N;

    fn bar_count(&self) -> usize {
        self.bars.len()
    }

    fn high(&self, index: usize) -> N {
        self.bars.as_slice().high(index)
    }

    fn low(&self, index: usize) -> N {
        self.bars.as_slice().low(index)
    }

    fn close(&self, index: usize) -> N {
        self.bars.as_slice().close(index)
    }
}

/// Signal strength
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SignalStrength {
    StrongBuy,
    Buy,
    WeakBuy,
    Neutral,
    WeakSell,
    Sell,
    StrongSell,
}

impl SignalStrength {
    /// Convert to numeric score (-100 to 100)
    pub fn to_score(&self) -> i32 {
        match self {
            SignalStrength::StrongBuy => 100,
            SignalStrength::Buy => 60,
            SignalStrength::WeakBuy => 30,
            SignalStrength::Neutral => 0,
            SignalStrength::WeakSell => -30,
            SignalStrength::Sell => -60,
            SignalStrength::StrongSell => -100,
        }
    }

    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 70 => SignalStrength::StrongBuy,
            s if s >= 30 => SignalStrength::Buy,
            s if s >= 5 => SignalStrength::WeakBuy,
            s if s >= -5 => SignalStrength::Neutral,
            s if s >= -30 => SignalStrength::WeakSell,
            s if s >= -70 => SignalStrength::Sell,
            _ => SignalStrength::StrongSell,
        }
    }

    /// Human-readable label for the signal
    pub fn to_label(&self) -> &'static str {
        match self {
            SignalStrength::StrongBuy => "Strong Buy",
            SignalStrength::Buy => "Buy",
            SignalStrength::WeakBuy => "Weak Buy",
            SignalStrength::Neutral => "Neutral",
            SignalStrength::WeakSell => "Weak Sell",
            SignalStrength::Sell => "Sell",
            SignalStrength::StrongSell => "Strong Sell",
        }
    }
}

/// Analysis result from any analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub signal: SignalStrength,
    pub confidence: f64, // 0.0 to 1.0
    pub reason: String,
    pub metrics: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::DecimalNum;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_series_bounds() {
        let series: BarSeries = BarSeries::from_closes("T", start(), Duration::days(1), &[1.0, 2.0, 3.0]);
        assert_eq!(series.begin_index(), 0);
        assert_eq!(series.end_index(), Some(2));
        assert_eq!(series.close(1), 2.0);
        assert!(series.close(10).is_nan());
        assert_eq!(series.bar_duration(), Some(Duration::days(1)));
    }

    #[test]
    fn test_empty_series_has_no_end() {
        let series: BarSeries = BarSeries::new("E", vec![]);
        assert!(series.is_empty());
        assert_eq!(series.end_index(), None);
        assert_eq!(series.bar_duration(), None);
    }

    #[test]
    fn test_window_keeps_parent_indices() {
        let series: BarSeries = BarSeries::from_closes("T", start(), Duration::days(1), &[1.0, 2.0, 3.0, 4.0]);
        let window = SeriesWindow::new(&series, 2);
        assert_eq!(window.begin_index(), 2);
        assert_eq!(window.bar_count(), 2);
        assert_eq!(window.end_index(), Some(3));
        assert_eq!(window.close(3), 4.0);
        assert!(window.close(1).is_nan());

        let past_end = SeriesWindow::new(&series, 9);
        assert!(past_end.is_empty());
        assert_eq!(past_end.end_index(), None);
        assert_eq!(SeriesWindow::new(&series, 0).bar_count(), 4);
    }

    #[test]
    fn test_convert_to_decimal() {
        let series: BarSeries = BarSeries::from_closes("T", start(), Duration::hours(1), &[10.5, 11.25]);
        let dec: BarSeries<DecimalNum> = series.convert();
        assert_eq!(dec.close(1).to_f64(), 11.25);
        assert_eq!(dec.bars.len(), 2);
    }

    #[test]
    fn test_signal_score_roundtrip() {
        assert_eq!(SignalStrength::from_score(SignalStrength::Buy.to_score()), SignalStrength::Buy);
        assert_eq!(SignalStrength::from_score(0), SignalStrength::Neutral);
    }
}
