use std::fmt::Debug;

use anyhow::{bail, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

/// The function that powers a tool
pub type ToolFn = Box<dyn Fn(&Value) -> AgentResult<String> + Send + Sync>;

/// A tool together with its executable
pub struct ToolDefinition {
    pub tool: Tool,
    pub function: ToolFn,
}

impl ToolDefinition {
    pub fn new(
        tool: Tool,
        function: impl Fn(&Value) -> AgentResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tool,
            function: Box::new(function),
        }
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

impl Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("tool", &self.tool)
            .field("function", &"<function>")
            .finish()
    }
}

/// Decode a tool's raw input into its typed shape
pub fn parse_input<T: DeserializeOwned>(input: &Value) -> AgentResult<T> {
    serde_json::from_value(input.clone()).map_err(|e| AgentError::InvalidParameters(e.to_string()))
}

/// The fixed set of tools available to the model for a run
#[derive(Debug, Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are the join key with model tool calls and must be unique.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<()> {
        if self.get(definition.name()).is_some() {
            bail!("Duplicate tool name: {}", definition.name());
        }
        self.definitions.push(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name() == name)
    }

    /// The advertised tools, in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.definitions.iter().map(|d| d.tool.clone()).collect()
    }

    /// Execute the named tool with its raw input
    pub fn execute(&self, name: &str, input: &Value) -> AgentResult<String> {
        let definition = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        debug!(tool = name, input = %input, "Executing tool");
        (definition.function)(input)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
