//! Messaging platform: polls, announcements, pins.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MessageRef, PollRef, PollTally};

#[async_trait]
pub trait Messenger: Send + Sync {
    fn name(&self) -> &str;

    /// Open a poll with one option per entry, in order.
    async fn open_poll(&self, question: &str, options: &[String]) -> Result<PollRef>;

    /// Close the poll and return the final tally for every option.
    async fn close_poll(&self, poll: &PollRef) -> Result<Vec<PollTally>>;

    async fn send_message(&self, text: &str) -> Result<MessageRef>;

    async fn pin_message(&self, message: &MessageRef) -> Result<()>;

    /// Check that the platform is reachable with the configured credentials.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
