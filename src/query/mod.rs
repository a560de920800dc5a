//! # Query Descriptor
//!
//! Builder for the type, filters and columns of a search.
//!
//! ## Invariant
//! A descriptor is mutable only until execution begins. After the first
//! cursor is opened every `add_*` call fails with `QueryError::UsageOrder`.

mod column;
mod descriptor;
mod errors;
mod filter;

pub use column::{ColumnHandle, ColumnSpec, OrderByTarget, SortOrder};
pub use descriptor::QueryDescriptor;
pub use errors::{QueryError, QueryResult};
pub use filter::{FilterHandle, FilterSpec, Operator, SummaryType};
