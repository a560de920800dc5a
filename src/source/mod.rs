//! # Remote Source
//!
//! The external paginated service and the window-oriented adapter the engine
//! uses to talk to it.
//!
//! ## Window contract
//! Window `k` covers rows `[k*W, (k+1)*W)`. A window shorter than `W` is the
//! authoritative end-of-data signal. A window longer than `W` is an error.

mod adapter;
mod errors;
mod memory;
mod remote;
mod usage;

pub use adapter::RemoteCursorAdapter;
pub use errors::{SourceError, SourceResult};
pub use memory::{FetchCall, FetchGate, InMemorySource, DEFAULT_USAGE_BUDGET, DEFAULT_USAGE_COST};
pub use remote::{RemoteSource, ResultCursor, Row, SearchHandle, SourceFuture};
pub use usage::UsageGauge;
