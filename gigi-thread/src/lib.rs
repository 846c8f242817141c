//! Thread service (spec §4.5): fork, compact, lineage, status transitions,
//! search. Each operation is a free function over `&gigi_store::Store`
//! rather than a method on a service struct with its own state — there's no
//! per-thread state to own beyond what the store already persists.

pub mod compact;
pub mod fork;
pub mod lineage;
pub mod search;
pub mod status;

pub use compact::{compact, recommend_by_event_count, CompactError, LlmSummarizer, Summarizer, DEFAULT_KEEP_RECENT, RECOMMEND_EVENT_THRESHOLD};
pub use fork::{fork, ForkError, ForkRequest};
pub use lineage::{lineage, Lineage};
pub use search::{search, SearchError};
pub use status::{archive, delete, reopen, stop, StatusError};
