//! pagedsearch - lazy, windowed paging over a remote search service
//!
//! A `Search` accumulates filters and columns, then answers requests for
//! "the next N rows" from a buffer it refills one remote window at a time.

pub mod cli;
pub mod config;
pub mod engine;
pub mod observability;
pub mod query;
pub mod search;
pub mod source;

pub use config::EngineConfig;
pub use engine::{Amount, Batch};
pub use query::{ColumnSpec, FilterSpec, Operator, QueryDescriptor, SortOrder, SummaryType};
pub use search::{Search, SearchError, SearchResult};
pub use source::{InMemorySource, RemoteSource, Row};
