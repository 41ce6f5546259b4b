use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::base::Provider;
use super::configs::AnthropicProviderConfig;
use super::utils::{content_text, handle_response, http_client, tools_with_schemas};
use crate::models::message::{Message, MessageContent, ToolResult, ToolUse};
use crate::models::role::Role;
use crate::models::tool::Tool;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Convert internal messages to Anthropic's messages array.
///
/// Consecutive messages with the same role are merged into one turn, so parallel
/// tool calls land in one assistant turn and their results in one user turn.
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut spec: Vec<Value> = Vec::new();

    for message in messages {
        let role = role_name(message.role);
        let block = match &message.content {
            MessageContent::Text(text) => json!({
                "type": "text",
                "text": text.text,
            }),
            MessageContent::ToolUse(tool_use) => json!({
                "type": "tool_use",
                "id": tool_use.id,
                "name": tool_use.name,
                "input": tool_use.input,
            }),
            MessageContent::ToolResult(result) => json!({
                "type": "tool_result",
                "tool_use_id": result.id,
                "content": result.content,
                "is_error": result.is_error,
            }),
        };

        match spec.last_mut() {
            Some(last) if last["role"] == role => {
                if let Some(blocks) = last["content"].as_array_mut() {
                    blocks.push(block);
                }
            }
            _ => spec.push(json!({
                "role": role,
                "content": [block],
            })),
        }
    }

    spec
}

pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
    tools_with_schemas(tools)
        .into_iter()
        .map(|(tool, schema)| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": schema,
            })
        })
        .collect()
}

/// Convert an Anthropic messages array back into internal messages, one per block
pub fn anthropic_spec_to_messages(spec: &[Value]) -> Result<Vec<Message>> {
    let mut tool_names = HashMap::new();
    let mut messages = Vec::new();
    for message in spec {
        messages.extend(anthropic_message_to_messages(message, &mut tool_names)?);
    }
    Ok(messages)
}

fn anthropic_message_to_messages(
    message: &Value,
    tool_names: &mut HashMap<String, String>,
) -> Result<Vec<Message>> {
    let role = match message.get("role").and_then(Value::as_str) {
        Some("user") => Role::User,
        Some("assistant") => Role::Assistant,
        _ => return Err(anyhow!("Invalid response format from Anthropic API")),
    };

    let blocks = match message.get("content") {
        Some(Value::String(text)) => return Ok(vec![Message::new(role, MessageContent::text(text))]),
        Some(Value::Array(blocks)) => blocks,
        _ => return Err(anyhow!("Invalid response format from Anthropic API")),
    };

    let mut messages = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("Text block without text"))?;
                messages.push(Message::new(role, MessageContent::text(text)));
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("Tool use block without id"))?;
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("Tool use block without name"))?;
                tool_names.insert(id.to_string(), name.to_string());
                messages.push(Message::new(
                    role,
                    MessageContent::ToolUse(ToolUse {
                        id: id.to_string(),
                        name: name.to_string(),
                        input: block.get("input").cloned().unwrap_or_else(|| json!({})),
                        provider_extra: None,
                    }),
                ));
            }
            Some("tool_result") => {
                let id = block
                    .get("tool_use_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("Tool result block without tool_use_id"))?;
                messages.push(Message::new(
                    role,
                    MessageContent::ToolResult(ToolResult {
                        id: id.to_string(),
                        tool_name: tool_names.get(id).cloned().unwrap_or_default(),
                        content: block
                            .get("content")
                            .and_then(content_text)
                            .unwrap_or_default(),
                        is_error: block
                            .get("is_error")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                    }),
                ));
            }
            other => debug!(block_type = ?other, "Skipping unsupported Anthropic content block"),
        }
    }

    Ok(messages)
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn run_inference(&self, messages: &[Message], tools: &[Tool]) -> Result<Vec<Message>> {
        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages_to_anthropic_spec(messages),
        });

        let tools_spec = tools_to_anthropic_spec(tools);
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }

        let response = self.post(payload).await?;

        if response.get("stop_reason").and_then(Value::as_str) == Some("max_tokens") {
            warn!(model = %self.config.model, "Anthropic response was cut off at max_tokens");
        }
        if let Some(usage) = response.get("usage") {
            debug!(%usage, "Anthropic usage");
        }

        anthropic_message_to_messages(&response, &mut HashMap::new())
    }
}
