use anyhow::Result;
use async_stream;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use indoc::indoc;
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::message::{Message, ToolUse};
use crate::providers::base::Provider;
use crate::tools::ToolRegistry;

/// Instructions that open every conversation, ahead of the goal
pub const PREAMBLE: &str = indoc! {"
    You are an autonomous agent working in a project repository.
    Follow the goal given below:"};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Reached the limit of {0} inference turns while the model was still requesting tools")]
pub struct TurnLimitReached(pub usize);

/// Agent drives a model through tool calls until it stops asking for them
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    max_turns: Option<NonZeroUsize>,
}

impl Agent {
    /// Create a new Agent with the specified provider and tools
    pub fn new(provider: Box<dyn Provider>, registry: ToolRegistry) -> Self {
        Self {
            provider,
            registry,
            max_turns: None,
        }
    }

    /// Stop with [`TurnLimitReached`] once `max_turns` inference calls have been made
    /// and the model still wants tools run. Unlimited by default.
    pub fn with_max_turns(mut self, max_turns: NonZeroUsize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// The two messages every conversation starts with
    pub fn initial_messages(goal: &str) -> Vec<Message> {
        vec![
            Message::user(PREAMBLE),
            Message::user(format!("Goal: {}", goal)),
        ]
    }

    /// Run a single tool call. Failures become an error result for the model to read.
    fn dispatch_tool_call(&self, tool_use: &ToolUse) -> Message {
        info!(tool = %tool_use.name, id = %tool_use.id, "Dispatching tool call");
        debug!(input = %tool_use.input, "Tool input");
        match self.registry.execute(&tool_use.name, &tool_use.input) {
            Ok(output) => Message::tool_result(&tool_use.id, &tool_use.name, output, false),
            Err(e) => {
                warn!(tool = %tool_use.name, id = %tool_use.id, error = %e, "Tool call failed");
                Message::tool_result(&tool_use.id, &tool_use.name, e.to_string(), true)
            }
        }
    }

    /// Create a stream that yields each message as it's appended to the conversation.
    /// This includes the model's messages and the results of every tool call, but not
    /// the two opening messages. An inference error ends the stream.
    pub fn reply(&self, goal: &str) -> BoxStream<'_, Result<Message>> {
        let mut messages = Self::initial_messages(goal);
        let tools = self.registry.tools();

        Box::pin(async_stream::try_stream! {
            let mut turn = 0;
            loop {
                turn += 1;
                info!(turn, history = messages.len(), "Requesting inference");
                let response = self.provider.run_inference(&messages, &tools).await?;

                let mut tool_uses = Vec::new();
                for message in response {
                    messages.push(message.clone());
                    if let Some(tool_use) = message.as_tool_use() {
                        tool_uses.push(tool_use.clone());
                    }
                    yield message;
                }

                // Ensures the messages above are yielded before tools start running
                tokio::task::yield_now().await;

                if tool_uses.is_empty() {
                    info!(turn, "Model finished without requesting tools");
                    break;
                }

                if let Some(max_turns) = self.max_turns {
                    if turn >= max_turns.get() {
                        Err::<(), _>(TurnLimitReached(max_turns.get()))?;
                    }
                }

                for tool_use in &tool_uses {
                    let result = self.dispatch_tool_call(tool_use);
                    messages.push(result.clone());
                    yield result;
                }
            }
        })
    }

    /// Run the conversation to completion and return the full history
    pub async fn run(&self, goal: &str) -> Result<Vec<Message>> {
        let mut history = Self::initial_messages(goal);
        let mut stream = self.reply(goal);
        while let Some(message) = stream.try_next().await? {
            history.push(message);
        }
        Ok(history)
    }
}
