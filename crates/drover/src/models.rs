//! These models represent the objects passed around by the agent
//!
//! There are several different related formats we need to interact with:
//! - anthropic messages/tools, sent from the agent to the LLM
//! - openai chat completion messages/tools, sent from the agent to the LLM
//! - gemini contents/function declarations, sent from the agent to the LLM
//! - tool calls, sent from the agent to the local tool registry
//!
//! We always immediately convert those data models into the internal structs using
//! to/from helpers in each provider. Each internal message carries exactly one piece
//! of content, and providers merge or split vendor turns as their wire format needs.
pub mod message;
pub mod role;
pub mod tool;
