use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::base::Provider;
use super::configs::GoogleProviderConfig;
use super::utils::{create_call_id, handle_response, http_client, tools_with_schemas};
use crate::models::message::{Message, MessageContent, ToolResult, ToolUse};
use crate::models::role::Role;
use crate::models::tool::Tool;

pub struct GoogleProvider {
    client: Client,
    config: GoogleProviderConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Convert internal messages to Gemini `contents`, merging same-role runs into one turn.
///
/// A tool use's provider data is sent back as the part's `thoughtSignature`.
pub fn messages_to_google_spec(messages: &[Message]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();

    for message in messages {
        let role = role_name(message.role);
        let part = match &message.content {
            MessageContent::Text(text) => json!({"text": text.text}),
            MessageContent::ToolUse(tool_use) => {
                let mut part = json!({
                    "functionCall": {
                        "id": tool_use.id,
                        "name": tool_use.name,
                        "args": tool_use.input,
                    }
                });
                if let Some(extra) = &tool_use.provider_extra {
                    part["thoughtSignature"] = json!(STANDARD.encode(extra));
                }
                part
            }
            MessageContent::ToolResult(result) => {
                let key = if result.is_error { "error" } else { "output" };
                json!({
                    "functionResponse": {
                        "id": result.id,
                        "name": result.tool_name,
                        "response": {key: result.content},
                    }
                })
            }
        };

        match contents.last_mut() {
            Some(last) if last["role"] == role => {
                if let Some(parts) = last["parts"].as_array_mut() {
                    parts.push(part);
                }
            }
            _ => contents.push(json!({"role": role, "parts": [part]})),
        }
    }

    contents
}

/// One tool entry per function declaration
pub fn tools_to_google_spec(tools: &[Tool]) -> Vec<Value> {
    tools_with_schemas(tools)
        .into_iter()
        .map(|(tool, schema)| {
            json!({
                "functionDeclarations": [{
                    "name": tool.name,
                    "description": tool.description,
                    "parametersJsonSchema": schema,
                }]
            })
        })
        .collect()
}

pub fn google_spec_to_messages(contents: &[Value]) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    for content in contents {
        messages.extend(google_content_to_messages(content)?);
    }
    Ok(messages)
}

fn google_content_to_messages(content: &Value) -> Result<Vec<Message>> {
    let role = match content.get("role").and_then(Value::as_str) {
        Some("model") => Role::Assistant,
        _ => Role::User,
    };

    let parts = content
        .get("parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut messages = Vec::new();
    for part in parts {
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            debug!("Skipping Gemini thought summary part");
            continue;
        }

        if let Some(text) = part.get("text").and_then(Value::as_str) {
            messages.push(Message::new(role, MessageContent::text(text)));
        }

        if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("Function call without name"))?;
            let id = match call.get("id").and_then(Value::as_str) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => create_call_id(),
            };
            let provider_extra = part
                .get("thoughtSignature")
                .and_then(Value::as_str)
                .map(|signature| {
                    STANDARD
                        .decode(signature)
                        .context("Invalid thoughtSignature in Gemini response")
                })
                .transpose()?;

            messages.push(Message::new(
                role,
                MessageContent::ToolUse(ToolUse {
                    id,
                    name: name.to_string(),
                    input: call.get("args").cloned().unwrap_or_else(|| json!({})),
                    provider_extra,
                }),
            ));
        }

        if let Some(response) = part.get("functionResponse") {
            let id = response
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let name = response
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let body = response.get("response").cloned().unwrap_or(Value::Null);
            let (content, is_error) = match body.get("error") {
                Some(error) => (value_to_text(error), true),
                None => (body.get("output").map(value_to_text).unwrap_or_default(), false),
            };

            messages.push(Message::new(
                role,
                MessageContent::ToolResult(ToolResult {
                    id: id.to_string(),
                    tool_name: name.to_string(),
                    content,
                    is_error,
                }),
            ));
        }
    }

    Ok(messages)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    async fn run_inference(&self, messages: &[Message], tools: &[Tool]) -> Result<Vec<Message>> {
        let mut payload = json!({
            "contents": messages_to_google_spec(messages),
        });

        let tools_spec = tools_to_google_spec(tools);
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }

        let response = self.post(payload).await?;

        if let Some(reason) = response
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
        {
            warn!(%reason, "Gemini blocked the prompt");
        }
        if let Some(usage) = response.get("usageMetadata") {
            debug!(%usage, "Gemini usage");
        }

        // Only the first candidate is used
        let candidate = match response
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
        {
            Some(candidate) => candidate,
            None => return Ok(Vec::new()),
        };

        match candidate.get("content") {
            Some(content) => google_content_to_messages(content),
            None => {
                warn!(
                    finish_reason = ?candidate.get("finishReason"),
                    "Gemini candidate has no content"
                );
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-test";

    async fn setup_mock_server(response_body: Value) -> (MockServer, GoogleProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{}:generateContent", MODEL)))
            .and(header("x-goog-api-key", "test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = GoogleProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: MODEL.to_string(),
        };

        let provider = GoogleProvider::new(config).unwrap();
        (mock_server, provider)
    }

    fn history() -> Vec<Message> {
        vec![
            Message::user("Goal: read the readme"),
            Message::tool_use("call_1", "read_file", json!({"path": "README.md"}))
                .with_provider_extra(Some(vec![0xde, 0xad, 0xbe, 0xef])),
            Message::tool_use("call_2", "list_files", json!({"directory": "."})),
            Message::tool_result("call_1", "read_file", "# Title", false),
            Message::tool_result("call_2", "list_files", "no such directory", true),
            Message::assistant("Done."),
        ]
    }

    #[test]
    fn test_messages_to_google_spec() {
        let contents = messages_to_google_spec(&history());

        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1]["role"], "model");
        let parts = contents[1]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["thoughtSignature"], STANDARD.encode([0xde_u8, 0xad, 0xbe, 0xef]));
        assert!(parts[1].get("thoughtSignature").is_none());

        assert_eq!(contents[2]["role"], "user");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"],
            json!({"output": "# Title"})
        );
        assert_eq!(
            contents[2]["parts"][1]["functionResponse"]["response"],
            json!({"error": "no such directory"})
        );
        assert_eq!(contents[3], json!({"role": "model", "parts": [{"text": "Done."}]}));
    }

    #[test]
    fn test_google_history_round_trip() -> Result<()> {
        let messages = history();
        let decoded = google_spec_to_messages(&messages_to_google_spec(&messages))?;
        assert_eq!(decoded, messages);
        Ok(())
    }

    #[test]
    fn test_empty_text_round_trip() -> Result<()> {
        let messages = vec![
            Message::user(""),
            Message::user("Goal: x"),
            Message::assistant(""),
            Message::tool_use("call_1", "list_files", json!({"directory": "."})),
            Message::tool_result("call_1", "list_files", "", false),
        ];
        let decoded = google_spec_to_messages(&messages_to_google_spec(&messages))?;
        assert_eq!(decoded, messages);
        Ok(())
    }

    #[test]
    fn test_missing_call_id_is_generated() -> Result<()> {
        let content = json!({
            "role": "model",
            "parts": [{"functionCall": {"name": "list_files", "args": {"directory": "."}}}]
        });

        let decoded = google_content_to_messages(&content)?;
        let tool_use = decoded[0].as_tool_use().unwrap();
        assert!(tool_use.id.starts_with("call_"));
        assert_eq!(tool_use.name, "list_files");
        Ok(())
    }

    #[test]
    fn test_tools_to_google_spec_one_declaration_per_tool() {
        let tools = [
            Tool::new("a", "first", json!({"type": "object", "properties": {}})),
            Tool::new("b", "second", json!({"type": "object", "properties": {}})),
        ];
        let spec = tools_to_google_spec(&tools);
        assert_eq!(spec.len(), 2);
        assert_eq!(spec[1]["functionDeclarations"][0]["name"], "b");
        assert!(spec[0]["functionDeclarations"][0]["parametersJsonSchema"].is_object());
    }

    #[tokio::test]
    async fn test_run_inference_function_call() -> Result<()> {
        let response_body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Let me check."},
                        {
                            "functionCall": {"id": "fc_9", "name": "read_file", "args": {"path": "a"}},
                            "thoughtSignature": STANDARD.encode(b"sig")
                        }
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}
        });
        let (_server, provider) = setup_mock_server(response_body).await;

        let messages = provider.run_inference(&[Message::user("Go")], &[]).await?;

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::assistant("Let me check."));
        assert_eq!(
            messages[1],
            Message::tool_use("fc_9", "read_file", json!({"path": "a"}))
                .with_provider_extra(Some(b"sig".to_vec()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_run_inference_blocked_candidate() -> Result<()> {
        let (_server, provider) =
            setup_mock_server(json!({"candidates": [{"finishReason": "SAFETY"}]})).await;
        let messages = provider.run_inference(&[Message::user("Go")], &[]).await?;
        assert!(messages.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unusable_tool_schema_is_dropped() -> Result<()> {
        let (server, provider) = setup_mock_server(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "ok"}]}}]
        }))
        .await;

        let tools = [
            Tool::new("good", "fine", json!({"type": "object", "properties": {}})),
            Tool::new(
                "bad",
                "recursive",
                json!({
                    "type": "object",
                    "properties": {"node": {"$ref": "#/$defs/Node"}},
                    "$defs": {"Node": {"type": "object", "properties": {"next": {"$ref": "#/$defs/Node"}}}}
                }),
            ),
        ];
        let messages = provider.run_inference(&[Message::user("Go")], &tools).await?;
        assert_eq!(messages, vec![Message::assistant("ok")]);

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body)?;
        let sent = body["tools"].as_array().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["functionDeclarations"][0]["name"], "good");
        Ok(())
    }
}
