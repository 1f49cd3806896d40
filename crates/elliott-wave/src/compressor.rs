use analysis_core::{AnalysisError, Num};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::swing::Swing;
use crate::zigzag::{absorb_pivot, swings_from_pivots, Pivot, PivotKind, ZigZagMachine};

/// Filters raw swings into structural swings by re-running the zigzag over
/// the pivot path with a coarser threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingCompressorConfig {
    /// Minimum swing amplitude as a fraction of the starting pivot price.
    pub min_amplitude_pct: f64,
    /// Minimum bars between structural pivots.
    pub min_bars: usize,
}

impl Default for SwingCompressorConfig {
    fn default() -> Self {
        Self {
            min_amplitude_pct: 0.0,
            min_bars: 0,
        }
    }
}

impl SwingCompressorConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.min_amplitude_pct.is_finite() || self.min_amplitude_pct < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_amplitude_pct must be a non-negative number, got {}",
                self.min_amplitude_pct
            )));
        }
        Ok(())
    }

    pub fn is_identity(&self) -> bool {
        self.min_amplitude_pct == 0.0 && self.min_bars == 0
    }
}

#[derive(Debug, Clone)]
pub struct SwingCompressor {
    config: SwingCompressorConfig,
}

impl SwingCompressor {
    pub fn new(config: SwingCompressorConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SwingCompressorConfig {
        &self.config
    }

    /// Merge swings smaller than the configured amplitude or duration into
    /// their neighbours. Output alternates and keeps the input degree.
    pub fn compress<N: Num>(&self, swings: &[Swing<N>]) -> Vec<Swing<N>> {
        let Some(first) = swings.first() else {
            return vec![];
        };
        if self.config.is_identity() {
            return swings.to_vec();
        }

        let first_kind = if first.is_rising() { PivotKind::Low } else { PivotKind::High };
        let mut pivots = vec![Pivot {
            index: first.from_index,
            price: first.from_price,
            kind: first_kind,
        }];

        let pct = N::from_f64(self.config.min_amplitude_pct);
        let mut machine = ZigZagMachine::anchored(first.from_index, first.from_price);
        for swing in swings {
            let confirmed = machine.step(
                swing.to_index,
                swing.to_price,
                swing.to_price,
                |extreme| extreme.abs() * pct,
                self.config.min_bars,
            );
            if let Some(pivot) = confirmed {
                absorb_pivot(&mut pivots, pivot);
            }
        }
        if let Some(pending) = machine.pending() {
            absorb_pivot(&mut pivots, pending);
        }

        let compressed = swings_from_pivots(&pivots, first.degree);
        debug!("compressed {} swings into {}", swings.len(), compressed.len());
        compressed
    }
}
