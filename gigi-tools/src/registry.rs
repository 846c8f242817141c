//! Declarative tool catalog and dispatch (spec §4.3): one concrete registry
//! over a fixed catalog (`list_tools`, `call` with a per-call context)
//! rather than a pluggable trait object per concern — the spec names a
//! fixed catalog (§4.3 supplement), not an open-ended tool protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

/// Default handler timeout (spec §4.4.4: tool 5 min).
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A known error sigil: handlers that return a string starting with this
/// prefix are surfaced as `ToolFailure` instead of a successful result.
pub const ERROR_SIGIL: &str = "ERROR:";

/// Tool specification: name, description, JSON Schema for arguments.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Errors from locating, validating, or calling a tool (spec §6.5 taxonomy).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("tool failure: {0}")]
    ToolFailure(String),
}

/// Cooperative cancellation signal, checked at suspension points (spec
/// §4.4.4). Built on `tokio::sync::watch` rather than an external crate,
/// since the only operation needed is "has someone flipped this yet".
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is signalled. Safe to call repeatedly.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Per-call context: which thread issued the call, and the cancel token for
/// this turn. Tool handlers that need to record a forge action read
/// `thread_id`; `ask_user` reads `tool_use_id` to key its durable park row.
pub struct ToolCallContext {
    pub thread_id: String,
    pub tool_use_id: String,
    pub cancel: CancelToken,
}

/// Policy gate consulted before running a handler (spec §4.3 step 3). The
/// default allows everything; a deployment wires its own policy (e.g. deny
/// `gitea` writes outside business hours) without touching the registry.
pub trait ToolPolicy: Send + Sync {
    fn allows(&self, tool_name: &str, ctx: &ToolCallContext) -> bool;
}

pub struct AllowAll;

impl ToolPolicy for AllowAll {
    fn allows(&self, _tool_name: &str, _ctx: &ToolCallContext) -> bool {
        true
    }
}

/// A single tool implementation. `call` returns the result text on success;
/// handlers signal a recoverable failure either by returning `Err` directly
/// or by returning `Ok` text prefixed with [`ERROR_SIGIL`] (mirroring shell
/// tools that can only report failure through their output).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn spec(&self) -> ToolSpec;
    async fn call(&self, input: Value, ctx: &ToolCallContext) -> Result<String, ToolError>;
}

/// Declarative registry: name → tool, plus a shared policy and per-tool
/// timeout overrides.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    policy: Arc<dyn ToolPolicy>,
    timeouts: HashMap<String, Duration>,
}

impl ToolRegistry {
    pub fn new(policy: Arc<dyn ToolPolicy>) -> Self {
        Self {
            tools: HashMap::new(),
            policy,
            timeouts: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_timeout(&mut self, tool_name: &str, timeout: Duration) {
        self.timeouts.insert(tool_name.to_string(), timeout);
    }

    pub fn list_tools(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    fn timeout_for(&self, name: &str) -> Duration {
        self.timeouts.get(name).copied().unwrap_or(DEFAULT_TOOL_TIMEOUT)
    }

    /// Validates `input` against a minimal subset of JSON Schema: object
    /// type plus `required` property presence. Good enough for the fixed
    /// catalog here; a richer validator is unnecessary machinery for five
    /// hand-written schemas.
    fn validate(spec: &ToolSpec, input: &Value) -> Result<(), ToolError> {
        let schema = &spec.input_schema;
        if schema.get("type").and_then(Value::as_str) == Some("object") && !input.is_object() {
            return Err(ToolError::InvalidInput(format!(
                "{}: expected an object",
                spec.name
            )));
        }
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for field in required {
                let Some(field) = field.as_str() else { continue };
                if input.get(field).is_none() {
                    return Err(ToolError::InvalidInput(format!(
                        "{}: missing required field `{field}`",
                        spec.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Dispatch steps (spec §4.3): locate, validate, consult policy, run
    /// under a cancellation token and timeout, map a known error sigil to
    /// `ToolFailure`.
    pub async fn invoke(
        &self,
        name: &str,
        raw_input: Value,
        ctx: &mut ToolCallContext,
    ) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        Self::validate(&tool.spec(), &raw_input)?;

        if !self.policy.allows(name, ctx) {
            return Err(ToolError::PermissionDenied(name.to_string()));
        }

        let timeout = self.timeout_for(name);
        let call = tool.call(raw_input, ctx);
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(ToolError::ToolFailure("cancelled".into())),
            res = tokio::time::timeout(timeout, call) => match res {
                Ok(Ok(text)) if text.starts_with(ERROR_SIGIL) => {
                    Err(ToolError::ToolFailure(text.trim_start_matches(ERROR_SIGIL).trim().to_string()))
                }
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(e),
                Err(_elapsed) => Err(ToolError::ToolFailure("timeout".into())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".into(),
                description: Some("echoes its input".into()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "required": ["text"],
                    "properties": { "text": { "type": "string" } }
                }),
            }
        }

        async fn call(&self, input: Value, _ctx: &ToolCallContext) -> Result<String, ToolError> {
            Ok(input["text"].as_str().unwrap_or_default().to_string())
        }
    }

    struct SigilTool;

    #[async_trait]
    impl Tool for SigilTool {
        fn name(&self) -> &str {
            "sigil"
        }

        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "sigil".into(),
                description: None,
                input_schema: serde_json::json!({"type": "object"}),
            }
        }

        async fn call(&self, _input: Value, _ctx: &ToolCallContext) -> Result<String, ToolError> {
            Ok(format!("{ERROR_SIGIL} disk full"))
        }
    }

    fn ctx() -> ToolCallContext {
        let (_handle, cancel) = CancelHandle::new();
        ToolCallContext {
            thread_id: "t-1".into(),
            tool_use_id: "tu-1".into(),
            cancel,
        }
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let registry = ToolRegistry::new(Arc::new(AllowAll));
        let err = registry.invoke("nope", serde_json::json!({}), &mut ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn missing_required_field_is_invalid_input() {
        let mut registry = ToolRegistry::new(Arc::new(AllowAll));
        registry.register(Arc::new(EchoTool));
        let err = registry.invoke("echo", serde_json::json!({}), &mut ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn happy_path_returns_text() {
        let mut registry = ToolRegistry::new(Arc::new(AllowAll));
        registry.register(Arc::new(EchoTool));
        let out = registry
            .invoke("echo", serde_json::json!({"text": "hi"}), &mut ctx())
            .await
            .unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn error_sigil_becomes_tool_failure() {
        let mut registry = ToolRegistry::new(Arc::new(AllowAll));
        registry.register(Arc::new(SigilTool));
        let err = registry.invoke("sigil", serde_json::json!({}), &mut ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::ToolFailure(msg) if msg.contains("disk full")));
    }

    #[tokio::test]
    async fn policy_can_deny() {
        struct DenyAll;
        impl ToolPolicy for DenyAll {
            fn allows(&self, _tool_name: &str, _ctx: &ToolCallContext) -> bool {
                false
            }
        }
        let mut registry = ToolRegistry::new(Arc::new(DenyAll));
        registry.register(Arc::new(EchoTool));
        let err = registry
            .invoke("echo", serde_json::json!({"text": "hi"}), &mut ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        struct SlowTool;
        #[async_trait]
        impl Tool for SlowTool {
            fn name(&self) -> &str {
                "slow"
            }
            fn spec(&self) -> ToolSpec {
                ToolSpec { name: "slow".into(), description: None, input_schema: serde_json::json!({"type": "object"}) }
            }
            async fn call(&self, _input: Value, _ctx: &ToolCallContext) -> Result<String, ToolError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("never".into())
            }
        }
        let mut registry = ToolRegistry::new(Arc::new(AllowAll));
        registry.register(Arc::new(SlowTool));
        let (handle, cancel) = CancelHandle::new();
        let mut ctx = ToolCallContext { thread_id: "t-1".into(), tool_use_id: "tu-1".into(), cancel };
        handle.cancel();
        let err = registry.invoke("slow", serde_json::json!({}), &mut ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::ToolFailure(msg) if msg == "cancelled"));
    }
}
