//! Wire types shared between the planner and the dispatcher
//!
//! Contains the tool call/observation shapes and tool definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool call issued by the planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Get a boolean argument by key
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.arguments.get(key).and_then(|v| v.as_bool())
    }

    /// Get a non-negative integer argument by key
    ///
    /// Floats are accepted and truncated; planners often emit `500.0`.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        let value = self.arguments.get(key)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }

    /// Get a raw argument by key, ignoring explicit nulls
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key).filter(|v| !v.is_null())
    }
}

/// Definition of a tool that can be called by the planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Uniform result of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolObservation {
    /// Name of the tool that was called
    pub name: String,
    /// Whether the call succeeded
    pub ok: bool,
    /// Structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable status or error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolObservation {
    /// Create a successful observation carrying data
    pub fn success(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            ok: true,
            data: Some(data),
            message: None,
        }
    }

    /// Create a failed observation
    pub fn failure(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
