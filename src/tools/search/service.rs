use super::engines::EngineError;
use crate::types::SearchCandidate;
use async_trait::async_trait;

/// One web-search backend in the cascade.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable label used in logs, config (`providers.disabled`) and `source_provider`.
    fn name(&self) -> &'static str;

    /// Keyed providers report `false` when their credentials are missing; the cascade skips
    /// them without counting a failure.
    fn is_configured(&self) -> bool {
        true
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchCandidate>, EngineError>;
}
