//! Payload normalization (spec §4.6: "from the payload, extract (repo,
//! ref_type, number)"). The forge's JSON shape is GitHub/Gitea-compatible
//! (both speak the same webhook schema for these event kinds), matching the
//! `octocrab` client the sibling `gigi-tools::gitea` tool uses.

use gigi_store::RefType;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// A webhook event normalized to what the router cares about: which
/// reference it concerns, what happened, and text for the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub repo: String,
    pub ref_type: RefType,
    pub number: String,
    pub title: String,
    /// `opened` | `closed` | `reopened` | `edited` | `merged` | ... (forge action field).
    pub action: String,
    pub login: String,
    pub url: String,
    /// Comment body, for `issue_comment` events (used both for the
    /// formatted event text and for echo-dedup matching).
    pub comment_body: Option<String>,
}

/// Parses one webhook delivery. Returns `Ok(None)` for event kinds the
/// router doesn't bind to a thread (`push`, `release`, `pipeline`) — those
/// are accepted (204) but otherwise ignored.
pub fn parse(event_kind: &str, payload: &Value) -> Result<Option<ParsedEvent>, PayloadError> {
    let repo = payload
        .get("repository")
        .and_then(|r| r.get("full_name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(PayloadError::MissingField("repository.full_name"))?;
    let action = payload.get("action").and_then(Value::as_str).unwrap_or("").to_string();
    let sender_login = payload
        .get("sender")
        .and_then(|s| s.get("login"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    match event_kind {
        "issues" => {
            let issue = payload.get("issue").ok_or(PayloadError::MissingField("issue"))?;
            Ok(Some(ParsedEvent {
                repo,
                ref_type: RefType::Issue,
                number: issue.get("number").and_then(Value::as_i64).map(|n| n.to_string()).ok_or(PayloadError::MissingField("issue.number"))?,
                title: issue.get("title").and_then(Value::as_str).unwrap_or("").to_string(),
                action,
                login: sender_login,
                url: issue.get("html_url").and_then(Value::as_str).unwrap_or("").to_string(),
                comment_body: None,
            }))
        }
        "pull_request" => {
            let pr = payload.get("pull_request").ok_or(PayloadError::MissingField("pull_request"))?;
            let merged = pr.get("merged").and_then(Value::as_bool).unwrap_or(false);
            Ok(Some(ParsedEvent {
                repo,
                ref_type: RefType::Pr,
                number: pr.get("number").and_then(Value::as_i64).map(|n| n.to_string()).ok_or(PayloadError::MissingField("pull_request.number"))?,
                title: pr.get("title").and_then(Value::as_str).unwrap_or("").to_string(),
                action: if merged && action == "closed" { "merged".to_string() } else { action },
                login: sender_login,
                url: pr.get("html_url").and_then(Value::as_str).unwrap_or("").to_string(),
                comment_body: None,
            }))
        }
        "issue_comment" => {
            let issue = payload.get("issue").ok_or(PayloadError::MissingField("issue"))?;
            let comment = payload.get("comment").ok_or(PayloadError::MissingField("comment"))?;
            let is_pr = issue.get("pull_request").is_some();
            Ok(Some(ParsedEvent {
                repo,
                ref_type: if is_pr { RefType::Pr } else { RefType::Issue },
                number: issue.get("number").and_then(Value::as_i64).map(|n| n.to_string()).ok_or(PayloadError::MissingField("issue.number"))?,
                title: issue.get("title").and_then(Value::as_str).unwrap_or("").to_string(),
                action: "commented".to_string(),
                login: sender_login,
                url: comment.get("html_url").and_then(Value::as_str).unwrap_or("").to_string(),
                comment_body: comment.get("body").and_then(Value::as_str).map(str::to_string),
            }))
        }
        "push" | "release" | "pipeline" => Ok(None),
        other => {
            tracing::warn!(event_kind = other, "unrecognized webhook event kind; ignoring");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_issues_opened() {
        let payload = json!({
            "action": "opened",
            "repository": {"full_name": "gigi/gigi"},
            "sender": {"login": "alice"},
            "issue": {"number": 42, "title": "bug", "html_url": "https://forge/gigi/gigi/issues/42"},
        });
        let parsed = parse("issues", &payload).unwrap().unwrap();
        assert_eq!(parsed.repo, "gigi/gigi");
        assert_eq!(parsed.ref_type, RefType::Issue);
        assert_eq!(parsed.number, "42");
        assert_eq!(parsed.action, "opened");
    }

    #[test]
    fn parses_pull_request_merged() {
        let payload = json!({
            "action": "closed",
            "repository": {"full_name": "gigi/gigi"},
            "sender": {"login": "bob"},
            "pull_request": {"number": 7, "title": "fix", "html_url": "u", "merged": true},
        });
        let parsed = parse("pull_request", &payload).unwrap().unwrap();
        assert_eq!(parsed.action, "merged");
    }

    #[test]
    fn push_events_are_ignored() {
        let payload = json!({"repository": {"full_name": "gigi/gigi"}});
        assert!(parse("push", &payload).unwrap().is_none());
    }
}
