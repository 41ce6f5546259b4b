use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

use super::base::Provider;
use super::configs::OpenAiProviderConfig;
use super::utils::{content_text, handle_response, http_client, tools_with_schemas};
use crate::models::message::{Message, MessageContent, ToolResult, ToolUse};
use crate::models::role::Role;
use crate::models::tool::Tool;

/// Prefix marking a failed tool result, since tool messages carry no error flag
const ERROR_PREFIX: &str = "Error: ";

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

/// Arguments are sent as a json string. Input that was never valid json is kept
/// as a string value and sent back verbatim, any other string is sent as json text.
fn arguments_to_string(input: &Value) -> String {
    match input {
        Value::String(raw) if serde_json::from_str::<Value>(raw).is_err() => raw.clone(),
        other => other.to_string(),
    }
}

fn arguments_to_input(arguments: &str) -> Value {
    serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()))
}

/// Convert internal messages to OpenAI's chat messages.
///
/// An assistant text followed by tool calls, and runs of tool calls, become one
/// assistant message carrying `tool_calls`. Each tool result is its own `tool` message.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut spec: Vec<Value> = Vec::new();

    for message in messages {
        match &message.content {
            MessageContent::Text(text) => {
                let role = match message.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                spec.push(json!({"role": role, "content": text.text}));
            }
            MessageContent::ToolUse(tool_use) => {
                let tool_call = json!({
                    "id": tool_use.id,
                    "type": "function",
                    "function": {
                        "name": tool_use.name,
                        "arguments": arguments_to_string(&tool_use.input),
                    }
                });

                // An empty assistant text stays its own message, it would be dropped next to calls
                match spec.last_mut() {
                    Some(last) if last["role"] == "assistant" && last["content"] != "" => {
                        match last["tool_calls"].as_array_mut() {
                            Some(calls) => calls.push(tool_call),
                            None => last["tool_calls"] = json!([tool_call]),
                        }
                    }
                    _ => spec.push(json!({
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [tool_call],
                    })),
                }
            }
            MessageContent::ToolResult(result) => {
                let content = if result.is_error {
                    format!("{}{}", ERROR_PREFIX, result.content)
                } else {
                    result.content.clone()
                };
                spec.push(json!({
                    "role": "tool",
                    "tool_call_id": result.id,
                    "content": content,
                }));
            }
        }
    }

    spec
}

pub fn tools_to_openai_spec(tools: &[Tool]) -> Vec<Value> {
    tools_with_schemas(tools)
        .into_iter()
        .map(|(tool, schema)| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "strict": true,
                    "parameters": schema,
                }
            })
        })
        .collect()
}

/// Convert OpenAI chat messages back into internal messages, one per text, call or result
pub fn openai_spec_to_messages(spec: &[Value]) -> Result<Vec<Message>> {
    let mut tool_names = HashMap::new();
    let mut messages = Vec::new();
    for message in spec {
        messages.extend(openai_message_to_messages(message, &mut tool_names)?);
    }
    Ok(messages)
}

fn openai_message_to_messages(
    message: &Value,
    tool_names: &mut HashMap<String, String>,
) -> Result<Vec<Message>> {
    let text = message.get("content").and_then(content_text);

    let mut messages = Vec::new();
    match message.get("role").and_then(Value::as_str) {
        Some("user") | Some("system") => {
            if let Some(text) = text {
                messages.push(Message::user(text));
            }
        }
        Some("assistant") => {
            let tool_calls = message
                .get("tool_calls")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            // Backends send "" instead of null next to tool calls
            if let Some(text) = text.filter(|text| tool_calls.is_empty() || !text.is_empty()) {
                messages.push(Message::assistant(text));
            }
            for tool_call in tool_calls {
                let id = tool_call
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("Tool call without id"))?;
                let function = tool_call
                    .get("function")
                    .ok_or_else(|| anyhow!("Tool call without function"))?;
                let name = function
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("Tool call without function name"))?;
                let arguments = function
                    .get("arguments")
                    .and_then(Value::as_str)
                    .unwrap_or("{}");

                tool_names.insert(id.to_string(), name.to_string());
                messages.push(Message::new(
                    Role::Assistant,
                    MessageContent::ToolUse(ToolUse {
                        id: id.to_string(),
                        name: name.to_string(),
                        input: arguments_to_input(arguments),
                        provider_extra: None,
                    }),
                ));
            }
        }
        Some("tool") => {
            let id = message
                .get("tool_call_id")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("Tool message without tool_call_id"))?;
            let content = text.unwrap_or_default();
            let (content, is_error) = match content.strip_prefix(ERROR_PREFIX) {
                Some(stripped) => (stripped.to_string(), true),
                None => (content, false),
            };
            messages.push(Message::new(
                Role::User,
                MessageContent::ToolResult(ToolResult {
                    id: id.to_string(),
                    tool_name: tool_names.get(id).cloned().unwrap_or_default(),
                    content,
                    is_error,
                }),
            ));
        }
        other => return Err(anyhow!("Unsupported OpenAI message role: {:?}", other)),
    }

    Ok(messages)
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn run_inference(&self, messages: &[Message], tools: &[Tool]) -> Result<Vec<Message>> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(messages),
        });

        let tools_spec = tools_to_openai_spec(tools);
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_completion_tokens"] = json!(tokens);
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("OpenAI API error: {}", error));
        }
        if let Some(usage) = response.get("usage") {
            debug!(%usage, "OpenAI usage");
        }

        // Only the first choice is used
        match response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        {
            Some(choice) => {
                let message = choice
                    .get("message")
                    .ok_or_else(|| anyhow!("Invalid response format from OpenAI API"))?;
                openai_message_to_messages(message, &mut HashMap::new())
            }
            None => Ok(Vec::new()),
        }
    }
}
