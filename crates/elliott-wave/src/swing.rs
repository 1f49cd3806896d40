use analysis_core::{AnalysisError, Num};
use serde::{Deserialize, Serialize};

use crate::degree::Degree;

/// A directed price move between two confirmed pivots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Swing<N = f64> {
    pub from_index: usize,
    pub to_index: usize,
    pub from_price: N,
    pub to_price: N,
    pub degree: Degree,
}

impl<N: Num> Swing<N> {
    pub fn new(
        from_index: usize,
        to_index: usize,
        from_price: N,
        to_price: N,
        degree: Degree,
    ) -> Result<Self, AnalysisError> {
        if to_index <= from_index {
            return Err(AnalysisError::InvalidInput(format!(
                "swing must move forward in time ({} -> {})",
                from_index, to_index
            )));
        }
        if !from_price.is_valid() || !to_price.is_valid() {
            return Err(AnalysisError::InvalidInput(format!(
                "swing prices must be valid numbers ({} -> {})",
                from_price, to_price
            )));
        }
        Ok(Self {
            from_index,
            to_index,
            from_price,
            to_price,
            degree,
        })
    }

    pub fn is_rising(&self) -> bool {
        self.to_price > self.from_price
    }

    pub fn amplitude(&self) -> N {
        (self.to_price - self.from_price).abs()
    }

    /// Duration in bars.
    pub fn length(&self) -> usize {
        self.to_index - self.from_index
    }

    /// Same move relabelled at another degree.
    pub fn with_degree(&self, degree: Degree) -> Self {
        Self { degree, ..*self }
    }
}

/// True when every swing reverses the direction of the previous one and
/// starts where it ended.
pub fn swings_alternate<N: Num>(swings: &[Swing<N>]) -> bool {
    swings.windows(2).all(|pair| {
        pair[0].is_rising() != pair[1].is_rising() && pair[0].to_index == pair[1].from_index
    })
}

/// Highest and lowest pivot prices touched by the swings.
pub fn price_extremes<N: Num>(swings: &[Swing<N>]) -> Option<(N, N)> {
    let first = swings.first()?;
    let mut high = first.from_price.maximum(first.to_price);
    let mut low = first.from_price.minimum(first.to_price);
    for swing in &swings[1..] {
        high = high.maximum(swing.from_price.maximum(swing.to_price));
        low = low.minimum(swing.from_price.minimum(swing.to_price));
    }
    Some((high, low))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Chain of swings through `(index, price)` pivots.
    pub fn chain<N: Num>(points: &[(usize, f64)], degree: Degree) -> Vec<Swing<N>> {
        points
            .windows(2)
            .map(|w| Swing {
                from_index: w[0].0,
                to_index: w[1].0,
                from_price: N::from_f64(w[0].1),
                to_price: N::from_f64(w[1].1),
                degree,
            })
            .collect()
    }

    /// Textbook bullish impulse: 100 -> 120 -> 108 -> 140 -> 130 -> 150.
    pub fn bullish_impulse<N: Num>() -> Vec<Swing<N>> {
        chain(
            &[(0, 100.0), (10, 120.0), (16, 108.0), (30, 140.0), (36, 130.0), (46, 150.0)],
            Degree::Primary,
        )
    }
}
