use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::Provider;

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<Vec<Message>, String>>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    tools: Arc<Mutex<Vec<Vec<Tool>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of turns
    pub fn new(responses: Vec<Vec<Message>>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock provider whose turns may fail with the given error text
    pub fn with_results(responses: Vec<Result<Vec<Message>, String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
            tools: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The histories received so far, one per inference call
    pub fn requests(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        Arc::clone(&self.requests)
    }

    /// The tool lists received so far, one per inference call
    pub fn tools(&self) -> Arc<Mutex<Vec<Vec<Tool>>>> {
        Arc::clone(&self.tools)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn run_inference(&self, messages: &[Message], tools: &[Tool]) -> Result<Vec<Message>> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.tools.lock().unwrap().push(tools.to_vec());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // No more pre-configured turns ends the conversation
            Ok(Vec::new())
        } else {
            responses.remove(0).map_err(|e| anyhow!(e))
        }
    }
}
