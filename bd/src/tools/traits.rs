//! Tool trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::ToolError;
use super::context::ToolContext;

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the model's function name)
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool, producing the JSON payload fed back to the model
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Result of a tool execution as sent back to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Serialized JSON
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(value: &Value) -> Self {
        Self {
            content: value.to_string(),
            is_error: false,
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            content: serde_json::json!({ "error": message.to_string() }).to_string(),
            is_error: true,
        }
    }
}

impl From<Result<Value, ToolError>> for ToolResult {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(value) => Self::success(&value),
            Err(e) => Self::error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success(&serde_json::json!({"ok": true}));
        assert!(!result.is_error);
        assert_eq!(result.content, r#"{"ok":true}"#);
    }

    #[test]
    fn test_tool_result_error_is_json() {
        let result: ToolResult = Err(ToolError::InvalidArgument("title is required".to_string())).into();
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.content).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("title is required"));
    }
}
