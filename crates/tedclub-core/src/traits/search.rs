//! Content search provider.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::SearchHit;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Search talks about `topic`, in provider relevance order.
    async fn search(&self, topic: &str) -> Result<Vec<SearchHit>>;
}
