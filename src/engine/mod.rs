//! # Paging Engine
//!
//! Turns consumer requests for "the next N rows" into the fewest remote
//! window fetches that can answer them.
//!
//! ## Guarantees
//! - Requests complete in the order they were issued
//! - Rows are delivered once each, in source order, with no gaps
//! - A window is fetched only when the head request needs it
//! - A failed fetch fails every queued request and leaves the buffer intact,
//!   so the next request retries the same window
//! - Requests of a cancelled session are dropped without completing

mod buffer;
mod request;
mod scheduler;
mod session;

pub use buffer::FetchBuffer;
pub use request::{Amount, Batch, Completion, PendingRequest};
pub use scheduler::{CancelFlag, DrainState, Scheduler};
pub use session::Session;
