use analysis_core::Num;
use serde::{Deserialize, Serialize};

use crate::swing::Swing;

/// Straight price line through two pivots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelLine<N = f64> {
    pub anchor_index: usize,
    pub anchor_price: N,
    /// Price change per bar.
    pub slope: N,
}

impl<N: Num> ChannelLine<N> {
    pub fn through(first: (usize, N), second: (usize, N)) -> Self {
        if first.0 == second.0 {
            return Self::undefined(second.0);
        }
        let run = N::from_f64(second.0 as f64 - first.0 as f64);
        Self {
            anchor_index: second.0,
            anchor_price: second.1,
            slope: (second.1 - first.1) / run,
        }
    }

    pub fn undefined(anchor_index: usize) -> Self {
        Self {
            anchor_index,
            anchor_price: N::nan(),
            slope: N::nan(),
        }
    }

    pub fn at(&self, index: usize) -> N {
        let offset = N::from_f64(index as f64 - self.anchor_index as f64);
        self.anchor_price + self.slope * offset
    }
}

/// Price channel projected to a reference bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Channel<N = f64> {
    pub upper: ChannelLine<N>,
    pub lower: ChannelLine<N>,
    pub reference_index: usize,
}

impl<N: Num> Channel<N> {
    pub fn invalid(reference_index: usize) -> Self {
        Self {
            upper: ChannelLine::undefined(reference_index),
            lower: ChannelLine::undefined(reference_index),
            reference_index,
        }
    }

    pub fn upper_bound(&self) -> N {
        self.upper.at(self.reference_index)
    }

    pub fn lower_bound(&self) -> N {
        self.lower.at(self.reference_index)
    }

    /// Midline at the reference bar.
    pub fn median(&self) -> N {
        self.median_at(self.reference_index)
    }

    pub fn upper_at(&self, index: usize) -> N {
        self.upper.at(index)
    }

    pub fn lower_at(&self, index: usize) -> N {
        self.lower.at(index)
    }

    pub fn median_at(&self, index: usize) -> N {
        (self.upper_at(index) + self.lower_at(index)) / N::from_f64(2.0)
    }

    pub fn is_valid(&self) -> bool {
        let upper = self.upper_bound();
        let lower = self.lower_bound();
        upper.is_valid() && lower.is_valid() && upper >= lower
    }

    /// `price` inside the channel at the reference bar, with `tolerance`
    /// expressed as a fraction of the channel width.
    pub fn contains(&self, price: N, tolerance: f64) -> bool {
        self.contains_at(self.reference_index, price, tolerance)
    }

    pub fn contains_at(&self, index: usize, price: N, tolerance: f64) -> bool {
        if !price.is_valid() || !self.is_valid() {
            return false;
        }
        let upper = self.upper_at(index);
        let lower = self.lower_at(index);
        if !upper.is_valid() || !lower.is_valid() {
            return false;
        }
        let slack = (upper - lower).abs() * N::from_f64(tolerance);
        price >= lower - slack && price <= upper + slack
    }
}

/// Fits a channel through the latest swing extremes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelFitter;

impl ChannelFitter {
    pub fn new() -> Self {
        Self
    }

    /// Upper line through the last two rising-swing peaks, lower line through
    /// the last two falling-swing troughs, both projected to `index`. Needs at
    /// least four swings with two in each direction.
    pub fn fit<N: Num>(&self, swings: &[Swing<N>], index: usize) -> Channel<N> {
        if swings.len() < 4 {
            return Channel::invalid(index);
        }
        let mut peaks = swings.iter().rev().filter(|s| s.is_rising());
        let mut troughs = swings.iter().rev().filter(|s| !s.is_rising());
        let (Some(p2), Some(p1)) = (peaks.next(), peaks.next()) else {
            return Channel::invalid(index);
        };
        let (Some(t2), Some(t1)) = (troughs.next(), troughs.next()) else {
            return Channel::invalid(index);
        };
        Channel {
            upper: ChannelLine::through((p1.to_index, p1.to_price), (p2.to_index, p2.to_price)),
            lower: ChannelLine::through((t1.to_index, t1.to_price), (t2.to_index, t2.to_price)),
            reference_index: index,
        }
    }
}
