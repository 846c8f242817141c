//! Forge REST actions against a Gitea-compatible API, via an `octocrab`
//! client re-pointed at a Gitea instance's `base_url` — Gitea's
//! issue/PR/comment REST surface is source-compatible enough with GitHub's
//! that the same client crate works unmodified. One tool, dispatched on an
//! `action` field, rather than four separate tool names, since they share
//! one authenticated client and one `record_action` obligation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::registry::{Tool, ToolCallContext, ToolError, ToolSpec};

pub const TOOL_GITEA: &str = "gitea";

pub struct GiteaTool {
    client: octocrab::Octocrab,
    store: Arc<gigi_store::Store>,
}

impl GiteaTool {
    pub fn new(base_url: &str, token: String, store: Arc<gigi_store::Store>) -> Result<Self, ToolError> {
        let client = octocrab::OctocrabBuilder::new()
            .base_uri(base_url)
            .map_err(|e| ToolError::ToolFailure(format!("invalid base url: {e}")))?
            .personal_token(token)
            .build()
            .map_err(|e| ToolError::ToolFailure(format!("client build failed: {e}")))?;
        Ok(Self { client, store })
    }

    async fn list_repos(&self, owner: &str) -> Result<String, ToolError> {
        let page = self
            .client
            .orgs(owner)
            .list_repos()
            .send()
            .await
            .map_err(|e| ToolError::ToolFailure(format!("list_repos failed: {e}")))?;
        let names: Vec<String> = page.items.into_iter().map(|r| r.full_name.unwrap_or(r.name)).collect();
        Ok(serde_json::to_string(&names).unwrap())
    }

    async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<String, ToolError> {
        let issue = self
            .client
            .issues(owner, repo)
            .get(number)
            .await
            .map_err(|e| ToolError::ToolFailure(format!("get_issue failed: {e}")))?;
        serde_json::to_string(&issue).map_err(|e| ToolError::ToolFailure(e.to_string()))
    }

    async fn create_pr(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        thread_id: &str,
        tool_use_id: &str,
    ) -> Result<String, ToolError> {
        let pr = self
            .client
            .pulls(owner, repo)
            .create(title, head, base)
            .send()
            .await
            .map_err(|e| ToolError::ToolFailure(format!("create_pr failed: {e}")))?;
        let payload = format!("create_pr:{owner}/{repo}:{head}->{base}:{title}");
        self.store
            .record_action(
                "gitea.create_pr",
                Some(thread_id),
                Some(tool_use_id),
                Some(&format!("{owner}/{repo}")),
                &payload,
                None,
            )
            .await
            .map_err(|e| ToolError::ToolFailure(format!("record_action failed: {e}")))?;
        serde_json::to_string(&pr).map_err(|e| ToolError::ToolFailure(e.to_string()))
    }

    async fn comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
        thread_id: &str,
        tool_use_id: &str,
    ) -> Result<String, ToolError> {
        let comment = self
            .client
            .issues(owner, repo)
            .create_comment(number, body)
            .await
            .map_err(|e| ToolError::ToolFailure(format!("comment failed: {e}")))?;
        let payload = format!("comment:{owner}/{repo}#{number}:{body}");
        self.store
            .record_action(
                "gitea.comment",
                Some(thread_id),
                Some(tool_use_id),
                Some(&format!("{owner}/{repo}")),
                &payload,
                None,
            )
            .await
            .map_err(|e| ToolError::ToolFailure(format!("record_action failed: {e}")))?;
        serde_json::to_string(&comment).map_err(|e| ToolError::ToolFailure(e.to_string()))
    }
}

#[async_trait]
impl Tool for GiteaTool {
    fn name(&self) -> &str {
        TOOL_GITEA
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_GITEA.into(),
            description: Some("Forge REST actions: list_repos, get_issue, create_pr, comment.".into()),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["action", "owner", "repo"],
                "properties": {
                    "action": { "type": "string", "enum": ["list_repos", "get_issue", "create_pr", "comment"] },
                    "owner": { "type": "string" },
                    "repo": { "type": "string" },
                    "number": { "type": "integer" },
                    "title": { "type": "string" },
                    "head": { "type": "string" },
                    "base": { "type": "string" },
                    "body": { "type": "string" },
                },
            }),
        }
    }

    async fn call(&self, input: Value, ctx: &ToolCallContext) -> Result<String, ToolError> {
        let action = input["action"].as_str().unwrap_or_default();
        let owner = input["owner"].as_str().unwrap_or_default();
        let repo = input["repo"].as_str().unwrap_or_default();
        match action {
            "list_repos" => self.list_repos(owner).await,
            "get_issue" => {
                let number = input["number"]
                    .as_u64()
                    .ok_or_else(|| ToolError::InvalidInput("number is required for get_issue".into()))?;
                self.get_issue(owner, repo, number).await
            }
            "create_pr" => {
                let title = input["title"].as_str().unwrap_or_default();
                let head = input["head"].as_str().unwrap_or_default();
                let base = input["base"].as_str().unwrap_or_default();
                self.create_pr(owner, repo, title, head, base, &ctx.thread_id, &ctx.tool_use_id).await
            }
            "comment" => {
                let number = input["number"]
                    .as_u64()
                    .ok_or_else(|| ToolError::InvalidInput("number is required for comment".into()))?;
                let body = input["body"].as_str().unwrap_or_default();
                self.comment(owner, repo, number, body, &ctx.thread_id, &ctx.tool_use_id).await
            }
            other => Err(ToolError::InvalidInput(format!("unknown action: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_all_actions() {
        let store = Arc::new(gigi_store::Store::in_memory().unwrap());
        let tool = GiteaTool::new("https://gitea.example/api/v1", "token".into(), store).unwrap();
        let schema = tool.spec().input_schema;
        let actions: Vec<&str> = schema["properties"]["action"]["enum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(actions, vec!["list_repos", "get_issue", "create_pr", "comment"]);
    }
}
