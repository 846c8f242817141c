//! Shell execution tool (spec §4.3 supplement): a single direct `Tool` impl,
//! since the registry already supplies the dispatch/timeout/cancellation
//! machinery a separate aggregating layer would otherwise provide.

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::registry::{Tool, ToolCallContext, ToolError, ToolSpec};

pub const TOOL_BASH: &str = "bash";

pub struct BashTool;

impl BashTool {
    pub fn new() -> Self {
        BashTool
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        TOOL_BASH
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_BASH.into(),
            description: Some("Run a shell command and return its combined stdout/stderr.".into()),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["command"],
                "properties": {
                    "command": { "type": "string" },
                },
            }),
        }
    }

    async fn call(&self, input: Value, _ctx: &ToolCallContext) -> Result<String, ToolError> {
        let command = input["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidInput("command must be a string".into()))?;

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| ToolError::ToolFailure(format!("spawn failed: {e}")))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            return Err(ToolError::ToolFailure(format!(
                "exit status {}: {}",
                output.status.code().unwrap_or(-1),
                text.trim()
            )));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CancelHandle;

    fn ctx() -> ToolCallContext {
        let (_h, cancel) = CancelHandle::new();
        ToolCallContext { thread_id: "t".into(), tool_use_id: "tu".into(), cancel }
    }

    #[tokio::test]
    async fn runs_and_captures_stdout() {
        let tool = BashTool::new();
        let out = tool
            .call(serde_json::json!({"command": "echo hi"}), &ctx())
            .await
            .unwrap();
        assert_eq!(out.trim(), "hi");
    }

    #[tokio::test]
    async fn nonzero_exit_is_tool_failure() {
        let tool = BashTool::new();
        let err = tool
            .call(serde_json::json!({"command": "exit 7"}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ToolFailure(msg) if msg.contains("7")));
    }
}
