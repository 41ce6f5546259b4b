use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool as advertised to a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool, unique across the registry
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A json schema of the input the tool accepts, before flattening
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}
