//! Query descriptor
//!
//! Describes what a search fetches: the record type, the filters and the
//! result columns. A descriptor is built up front and frozen the first time
//! it is used to open a cursor; every mutation after that is rejected.

use serde::{Deserialize, Serialize};

use super::column::{ColumnHandle, ColumnSpec};
use super::errors::{QueryError, QueryResult};
use super::filter::{FilterHandle, FilterSpec};

/// Specification of what a search fetches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Record type being searched
    #[serde(rename = "type")]
    search_type: String,

    #[serde(default)]
    filters: Vec<FilterSpec>,

    #[serde(default)]
    columns: Vec<ColumnSpec>,

    #[serde(skip)]
    frozen: bool,
}

impl QueryDescriptor {
    /// Create an empty descriptor for a record type
    pub fn new(search_type: impl Into<String>) -> Self {
        Self {
            search_type: search_type.into(),
            filters: Vec::new(),
            columns: Vec::new(),
            frozen: false,
        }
    }

    /// Unfrozen descriptor assembled from existing parts
    pub(crate) fn from_parts(
        search_type: impl Into<String>,
        filters: Vec<FilterSpec>,
        columns: Vec<ColumnSpec>,
    ) -> Self {
        Self {
            search_type: search_type.into(),
            filters,
            columns,
            frozen: false,
        }
    }

    pub fn search_type(&self) -> &str {
        &self.search_type
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Whether execution has begun
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Mark the descriptor as executed. Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Add a filter, returning a handle for optional modifiers
    pub fn add_filter(&mut self, filter: FilterSpec) -> QueryResult<FilterHandle<'_>> {
        self.check_mutable("filter")?;
        self.filters.push(filter);
        let last = self.filters.len() - 1;
        Ok(FilterHandle::new(&mut self.filters[last]))
    }

    /// Add a column, returning a handle for optional modifiers
    pub fn add_column(&mut self, column: ColumnSpec) -> QueryResult<ColumnHandle<'_>> {
        self.check_mutable("column")?;
        self.columns.push(column);
        let last = self.columns.len() - 1;
        Ok(ColumnHandle::new(&mut self.columns[last]))
    }

    /// Add several filters at once. All or nothing.
    pub fn add_filters(&mut self, filters: impl IntoIterator<Item = FilterSpec>) -> QueryResult<()> {
        self.check_mutable("filter")?;
        self.filters.extend(filters);
        Ok(())
    }

    /// Add several columns at once. All or nothing.
    pub fn add_columns(&mut self, columns: impl IntoIterator<Item = ColumnSpec>) -> QueryResult<()> {
        self.check_mutable("column")?;
        self.columns.extend(columns);
        Ok(())
    }

    fn check_mutable(&self, what: &'static str) -> QueryResult<()> {
        if self.frozen {
            return Err(QueryError::UsageOrder(what));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::column::SortOrder;
    use crate::query::filter::Operator;
    use serde_json::json;

    #[test]
    fn test_builder_preserves_order() {
        let mut descriptor = QueryDescriptor::new("transaction");
        descriptor.add_filter(FilterSpec::is("mainline", "T")).unwrap();
        descriptor
            .add_filters(vec![
                FilterSpec::is("tranid", "SO:12345"),
                FilterSpec::new("entity", Operator::AnyOf, vec![json!(11123), json!(7)]),
            ])
            .unwrap();
        descriptor
            .add_column(ColumnSpec::new("tranid"))
            .unwrap()
            .set_sort(SortOrder::Asc);

        let names: Vec<_> = descriptor.filters().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["mainline", "tranid", "entity"]);
        assert_eq!(descriptor.columns()[0].sort, SortOrder::Asc);
    }

    #[test]
    fn test_mutation_after_freeze_fails() {
        let mut descriptor = QueryDescriptor::new("customer");
        descriptor.add_column(ColumnSpec::new("email")).unwrap();
        descriptor.freeze();

        let err = descriptor.add_filter(FilterSpec::is("isinactive", "F")).err();
        assert_eq!(err, Some(QueryError::UsageOrder("filter")));
        assert!(descriptor.add_column(ColumnSpec::new("phone")).is_err());
        assert!(descriptor.add_columns(vec![ColumnSpec::new("fax")]).is_err());
        assert!(descriptor.add_filters(Vec::new()).is_err());

        // Nothing leaked through
        assert!(descriptor.filters().is_empty());
        assert_eq!(descriptor.columns().len(), 1);
    }

    #[test]
    fn test_frozen_flag_not_serialized() {
        let mut descriptor = QueryDescriptor::new("item");
        descriptor.freeze();

        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["type"], "item");
        assert!(value.get("frozen").is_none());

        let back: QueryDescriptor = serde_json::from_value(value).unwrap();
        assert!(!back.is_frozen());
    }
}
