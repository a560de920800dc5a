//! # Column Specifications

use serde::{Deserialize, Serialize};

use super::filter::SummaryType;

/// Sort direction for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    None,
    Asc,
    Desc,
}

/// Column that determines order when a grouped column is summarized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByTarget {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
}

/// A single result column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Field name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    #[serde(default)]
    pub sort: SortOrder,

    /// Aggregate/format function id applied by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderByTarget>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            join: None,
            summary: None,
            formula: None,
            sort: SortOrder::None,
            function: None,
            order_by: None,
        }
    }

    pub fn with_join(mut self, join: impl Into<String>) -> Self {
        self.join = Some(join.into());
        self
    }

    pub fn with_summary(mut self, summary: SummaryType) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// Refinement handle returned by `add_column`
#[derive(Debug)]
pub struct ColumnHandle<'a> {
    column: &'a mut ColumnSpec,
}

impl<'a> ColumnHandle<'a> {
    pub(crate) fn new(column: &'a mut ColumnSpec) -> Self {
        Self { column }
    }

    pub fn set_sort(self, order: SortOrder) -> Self {
        self.column.sort = order;
        self
    }

    pub fn set_formula(self, formula: impl Into<String>) -> Self {
        self.column.formula = Some(formula.into());
        self
    }

    pub fn set_function(self, function_id: impl Into<String>) -> Self {
        self.column.function = Some(function_id.into());
        self
    }

    /// Order a summarized column by another column's value
    pub fn set_when_order_by(self, name: impl Into<String>, join: Option<String>) -> Self {
        self.column.order_by = Some(OrderByTarget {
            name: name.into(),
            join,
        });
        self
    }
}
