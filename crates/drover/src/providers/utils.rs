use anyhow::{anyhow, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::models::tool::Tool;
use crate::schema;

/// HTTP client shared by every provider
pub fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(600)) // 10 minutes timeout
        .build()?)
}

/// Map a backend response to its json body, or an error carrying the status and body
pub async fn handle_response(response: Response) -> Result<Value> {
    let status = response.status();
    match status {
        StatusCode::OK => Ok(response.json().await?),
        status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!("Server error: {} - {}", status, error_text))
        }
        _ => {
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!("Request failed: {} - {}", status, error_text))
        }
    }
}

/// Pair each tool with its flattened input schema.
///
/// A tool whose schema cannot be flattened is left out of the request rather than
/// failing the whole call.
pub fn tools_with_schemas(tools: &[Tool]) -> Vec<(&Tool, Value)> {
    tools
        .iter()
        .filter_map(|tool| match schema::flatten(&tool.input_schema) {
            Ok(flat) => Some((tool, flat)),
            Err(e) => {
                warn!(tool = %tool.name, error = %e, "Dropping tool with unusable input schema");
                None
            }
        })
        .collect()
}

/// Id for a tool call the backend did not name itself
pub fn create_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Text of a content value that is either a plain string or a list of text blocks
pub fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(blocks) => Some(
            blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tools_with_schemas_drops_bad_tool() {
        let good = Tool::new(
            "good",
            "fine",
            json!({"type": "object", "properties": {"a": {"type": "string"}}}),
        );
        let bad = Tool::new("bad", "broken", json!({"type": "array"}));

        let tools = [bad, good];
        let pairs = tools_with_schemas(&tools);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.name, "good");
        assert_eq!(pairs[0].1["additionalProperties"], json!(false));
    }

    #[test]
    fn test_create_call_id_format() {
        let id = create_call_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), "call_".len() + 32);
        assert_ne!(id, create_call_id());
    }

    #[test]
    fn test_content_text() {
        assert_eq!(content_text(&json!("plain")), Some("plain".to_string()));
        assert_eq!(
            content_text(&json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}])),
            Some("a\nb".to_string())
        );
        assert_eq!(content_text(&json!(null)), None);
    }
}
