//! Text generation provider.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Turn a single prompt into free text. No streaming.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
