use super::role::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// A model-issued request to invoke a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
    /// Opaque continuation data owned by the backend that produced this call.
    /// It is handed back unchanged on the next request and never interpreted elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_extra: Option<Vec<u8>>,
}

/// The outcome of a tool call, addressed to the ToolUse with the same id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// The single piece of content carried by a message
pub enum MessageContent {
    Text(TextContent),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        if let MessageContent::ToolUse(ref tool_use) = self {
            Some(tool_use)
        } else {
            None
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        if let MessageContent::ToolResult(ref tool_result) = self {
            Some(tool_result)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Message { role, content }
    }

    /// Create a user text message
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, MessageContent::text(text))
    }

    /// Create an assistant text message
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(Role::Assistant, MessageContent::text(text))
    }

    /// Create a tool call issued by the assistant
    pub fn tool_use<I: Into<String>, N: Into<String>>(id: I, name: N, input: Value) -> Self {
        Self::new(
            Role::Assistant,
            MessageContent::ToolUse(ToolUse {
                id: id.into(),
                name: name.into(),
                input,
                provider_extra: None,
            }),
        )
    }

    /// Create the result of a tool call, sent back as the user
    pub fn tool_result<I, N, C>(id: I, tool_name: N, content: C, is_error: bool) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        C: Into<String>,
    {
        Self::new(
            Role::User,
            MessageContent::ToolResult(ToolResult {
                id: id.into(),
                tool_name: tool_name.into(),
                content: content.into(),
                is_error,
            }),
        )
    }

    /// Attach backend continuation data to a tool use. No-op on other content.
    pub fn with_provider_extra(mut self, extra: Option<Vec<u8>>) -> Self {
        if let MessageContent::ToolUse(ref mut tool_use) = self.content {
            tool_use.provider_extra = extra;
        }
        self
    }

    pub fn as_text(&self) -> Option<&str> {
        self.content.as_text()
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        self.content.as_tool_use()
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        self.content.as_tool_result()
    }
}
