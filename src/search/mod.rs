//! # Search
//!
//! Public entry point: build a descriptor, then pull result batches.
//!
//! Result requests are answered in the order they were made. Every request
//! either completes once with its rows or error, or, if its session was
//! cancelled, never completes at all.

mod errors;
mod search;

pub use errors::{SearchError, SearchResult};
pub use search::Search;
