pub mod degree;
pub mod swing;
pub mod indicators;
pub mod zigzag;
pub mod compressor;
pub mod fibonacci;
pub mod phase;
pub mod channel;
pub mod confidence;
pub mod scenario;
pub mod generator;
pub mod scenario_set;
pub mod comparator;
pub mod trend_bias;
pub mod probability;
pub mod confluence;
pub mod config;
pub mod analyzer;

#[cfg(test)]
mod tests;

pub use analyzer::*;
pub use channel::*;
pub use comparator::*;
pub use compressor::*;
pub use confidence::*;
pub use config::*;
pub use confluence::*;
pub use degree::*;
pub use fibonacci::*;
pub use generator::*;
pub use indicators::*;
pub use phase::*;
pub use probability::*;
pub use scenario::*;
pub use scenario_set::*;
pub use swing::*;
pub use trend_bias::*;
pub use zigzag::*;
