//! Remote source interface
//!
//! The paginated service a search reads from. The engine only ever talks to
//! it through `RemoteCursorAdapter`.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::query::QueryDescriptor;

use super::errors::SourceResult;

/// An opaque result row
pub type Row = Value;

/// Boxed future returned by every remote call
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = SourceResult<T>> + Send + 'a>>;

/// Handle to a search definition on the remote side
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchHandle(String);

impl SearchHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

/// Handle to one execution of a search definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultCursor(String);

impl ResultCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

/// External paginated data source
///
/// Implementations clone whatever they need out of borrowed arguments before
/// building the returned future; the future only borrows `self`.
pub trait RemoteSource: Send + Sync {
    /// Create a search definition from a descriptor
    fn create(&self, descriptor: &QueryDescriptor) -> SourceFuture<'_, SearchHandle>;

    /// Load a saved search definition, extended with the descriptor's
    /// filters and columns
    fn load(&self, id: &str, descriptor: &QueryDescriptor) -> SourceFuture<'_, SearchHandle>;

    /// Execute a search definition
    fn run(&self, handle: &SearchHandle) -> SourceFuture<'_, ResultCursor>;

    /// Rows `[start, end)` of an executed search
    fn fetch_range(
        &self,
        cursor: &ResultCursor,
        start: usize,
        end: usize,
    ) -> SourceFuture<'_, Vec<Row>>;

    /// Persist a search definition, returning its id
    fn save(&self, handle: &SearchHandle) -> SourceFuture<'_, String>;

    /// Read selected fields of a single record
    fn lookup_fields(
        &self,
        record_type: &str,
        id: &str,
        columns: &[String],
    ) -> SourceFuture<'_, Map<String, Value>>;

    /// Host usage units left; observed only
    fn remaining_usage(&self) -> u64;
}
