use async_trait::async_trait;
use crate::{AnalysisError, AnalysisResult, Bar};

/// Trait for technical analysis engines
#[async_trait]
pub trait TechnicalAnalyzer: Send + Sync {
    async fn analyze(&self, symbol: &str, bars: &[Bar]) -> Result<AnalysisResult, AnalysisError>;
}
