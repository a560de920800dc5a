//! # Filter Specifications

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator carried by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Is,
    IsNot,
    AnyOf,
    NoneOf,
    GreaterThan,
    LessThan,
    Contains,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    /// Parse the lowercase wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "is" => Some(Operator::Is),
            "isnot" => Some(Operator::IsNot),
            "anyof" => Some(Operator::AnyOf),
            "noneof" => Some(Operator::NoneOf),
            "greaterthan" => Some(Operator::GreaterThan),
            "lessthan" => Some(Operator::LessThan),
            "contains" => Some(Operator::Contains),
            "isempty" => Some(Operator::IsEmpty),
            "isnotempty" => Some(Operator::IsNotEmpty),
            _ => None,
        }
    }
}

/// Summary applied to a filter or column in grouped searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    Group,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// A single filter on the search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Field the filter applies to
    pub name: String,

    /// Joined record the field lives on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,

    /// Comparison operator
    pub operator: Operator,

    /// Operand values
    #[serde(default)]
    pub values: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_type: Option<SummaryType>,
}

impl FilterSpec {
    /// Create a filter without modifiers
    pub fn new(name: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            join: None,
            operator,
            values,
            formula: None,
            summary_type: None,
        }
    }

    /// Shorthand for an `is` filter on a single value
    pub fn is(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operator::Is, vec![value.into()])
    }

    /// Place the field on a joined record
    pub fn with_join(mut self, join: impl Into<String>) -> Self {
        self.join = Some(join.into());
        self
    }
}

/// Refinement handle returned by `add_filter`
///
/// Sets the optional modifiers on the filter that was just added.
#[derive(Debug)]
pub struct FilterHandle<'a> {
    filter: &'a mut FilterSpec,
}

impl<'a> FilterHandle<'a> {
    pub(crate) fn new(filter: &'a mut FilterSpec) -> Self {
        Self { filter }
    }

    pub fn set_formula(self, formula: impl Into<String>) -> Self {
        self.filter.formula = Some(formula.into());
        self
    }

    pub fn set_summary_type(self, summary: SummaryType) -> Self {
        self.filter.summary_type = Some(summary);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_wire_names() {
        assert_eq!(Operator::parse("anyof"), Some(Operator::AnyOf));
        assert_eq!(Operator::parse("between"), None);

        let encoded = serde_json::to_string(&Operator::GreaterThan).unwrap();
        assert_eq!(encoded, "\"greaterthan\"");
    }

    #[test]
    fn test_filter_handle_sets_modifiers() {
        let mut filter = FilterSpec::is("tranid", "SO:12345").with_join("createdfrom");
        FilterHandle::new(&mut filter)
            .set_formula("{amount} * 2")
            .set_summary_type(SummaryType::Sum);

        assert_eq!(filter.join.as_deref(), Some("createdfrom"));
        assert_eq!(filter.formula.as_deref(), Some("{amount} * 2"));
        assert_eq!(filter.summary_type, Some(SummaryType::Sum));
        assert_eq!(filter.values, vec![json!("SO:12345")]);
    }

    #[test]
    fn test_filter_json_shape() {
        let filter: FilterSpec = serde_json::from_value(json!({
            "name": "entity",
            "operator": "is",
            "values": [11123]
        }))
        .unwrap();

        assert_eq!(filter.name, "entity");
        assert!(filter.join.is_none());
        assert!(filter.formula.is_none());
    }
}
