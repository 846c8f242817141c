//! HTTP fetch tool (spec §4.3 supplement). GET when `body` is absent, POST
//! otherwise.

use async_trait::async_trait;
use serde_json::Value;

use crate::registry::{Tool, ToolCallContext, ToolError, ToolSpec};

pub const TOOL_WEB_FETCHER: &str = "web_fetcher";

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        TOOL_WEB_FETCHER
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_WEB_FETCHER.into(),
            description: Some("Fetch or send content via HTTP GET/POST.".into()),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string" },
                    "method": { "type": "string", "enum": ["GET", "POST"] },
                    "body": { "type": "string" },
                },
            }),
        }
    }

    async fn call(&self, input: Value, _ctx: &ToolCallContext) -> Result<String, ToolError> {
        let url = input["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidInput("url must be a string".into()))?;
        let method = input["method"].as_str().unwrap_or("GET").to_uppercase();
        let body = input["body"].as_str().map(|s| s.to_string());

        let request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => {
                let mut req = self.client.post(url);
                if let Some(body) = body {
                    req = req.body(body);
                }
                req
            }
            other => return Err(ToolError::InvalidInput(format!("unsupported method: {other}"))),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::ToolFailure(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ToolError::ToolFailure(format!("reading body failed: {e}")))?;

        if !status.is_success() {
            return Err(ToolError::ToolFailure(format!("http {status}: {text}")));
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
    async fn rejects_missing_url() {
        let tool = WebFetchTool::new();
        let err = tool.call(serde_json::json!({}), &ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rejects_unsupported_method() {
        let tool = WebFetchTool::new();
        let err = tool
            .call(serde_json::json!({"url": "http://example.invalid", "method": "DELETE"}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
