//! Declarative tool catalog and dispatch (spec §4.3): one concrete registry
//! over a fixed five-tool catalog, since the spec names the catalog rather
//! than an open-ended tool protocol.

mod ask_user;
mod bash;
mod gitea;
mod registry;
mod telegram;
mod web_fetch;

pub use ask_user::{AskUserBroker, AskUserTool, TOOL_ASK_USER};
pub use bash::{BashTool, TOOL_BASH};
pub use gitea::{GiteaTool, TOOL_GITEA};
pub use registry::{
    AllowAll, CancelHandle, CancelToken, Tool, ToolCallContext, ToolError, ToolPolicy,
    ToolRegistry, ToolSpec, DEFAULT_TOOL_TIMEOUT, ERROR_SIGIL,
};
pub use telegram::{TelegramSendTool, TOOL_TELEGRAM_SEND};
pub use web_fetch::{WebFetchTool, TOOL_WEB_FETCHER};
