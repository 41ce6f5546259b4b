use anyhow::Result;
use async_trait::async_trait;

use crate::models::message::Message;
use crate::models::tool::Tool;

/// Base trait for LLM backends (Anthropic, OpenAI, Google)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run one inference turn over the full conversation history.
    ///
    /// Returns only the messages produced in this turn, in the order the backend
    /// emitted them. Makes exactly one request to the backend and never retries.
    async fn run_inference(&self, messages: &[Message], tools: &[Tool]) -> Result<Vec<Message>>;
}
