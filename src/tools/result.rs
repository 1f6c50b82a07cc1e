//! Tool observations fed back to the model

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Outcome of one tool call, as the model sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Ok { payload: Value },
    Failed { reason: String },
}

impl ToolResult {
    pub fn ok(payload: Value) -> Self {
        ToolResult::Ok { payload }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ToolResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ToolResult::Failed { .. })
    }

    /// JSON text placed in the tool message
    pub fn to_observation(&self) -> String {
        match self {
            ToolResult::Ok { payload } => json!({"status": "ok", "result": payload}).to_string(),
            ToolResult::Failed { reason } => json!({"status": "error", "error": reason}).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_shapes() {
        let ok: Value = serde_json::from_str(&ToolResult::ok(json!({"cwd": "/src"})).to_observation()).unwrap();
        assert_eq!(ok["status"], "ok");
        assert_eq!(ok["result"]["cwd"], "/src");

        let failed: Value = serde_json::from_str(&ToolResult::failed("Path not found: x").to_observation()).unwrap();
        assert_eq!(failed["status"], "error");
        assert_eq!(failed["error"], "Path not found: x");
    }

    #[test]
    fn test_serde_tag() {
        let value = serde_json::to_value(ToolResult::failed("nope")).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["reason"], "nope");
    }
}
