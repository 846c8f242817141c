//! Turn state machine: LLM loop, retry accounting, completion enforcement,
//! suspension, and cost metering (spec §4.4): the fixed turn protocol shape
//! named directly by the spec, built from an LLM client trait, tool error
//! handling, and cost awareness rather than a generic graph compiler.

mod cost;
mod enforcement;
mod llm;
mod retry;
mod runtime;

pub use cost::{period_key, CostMeter};
pub use enforcement::{EnforcementEngine, EnforcementEvidence, EnforcementOutcome, MAX_CYCLES, STALE_AFTER_MS};
pub use llm::{ChatMessage, ChatOpenAi, LlmClient, LlmError, LlmResponse, LlmUsage, MockLlm, ToolCallRequest};
pub use retry::{canonical_json, RetryCounter, MAX_ATTEMPTS};
pub use runtime::{AgentError, EnforcementContext, TurnRuntime};
