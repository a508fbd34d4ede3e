//! CQL-style filter expressions.
//!
//! A filter is an ordered list of clauses, each pairing a column with one
//! [`Condition`]. All clauses must hold for a row to match, so an empty
//! filter matches everything. Filters come either from the builder methods
//! on [`Filter`] or from the JSON mapping form:
//!
//! ```json
//! {"rent": {"gte": 1000, "lte": 2000}, "address": {"contains": "Nørrebro"}, "rooms": 3}
//! ```
//!
//! A bare scalar is shorthand for `eq`.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::{parse_timestamp, Value};

/// Kind of string match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Substring anywhere.
    Contains,
    /// Prefix.
    StartsWith,
    /// Suffix.
    EndsWith,
}

/// A single test applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equal to the operand.
    Eq(Value),
    /// Not equal to the operand.
    Ne(Value),
    /// Strictly greater than the operand.
    Gt(Value),
    /// Greater than or equal to the operand.
    Gte(Value),
    /// Strictly less than the operand.
    Lt(Value),
    /// Less than or equal to the operand.
    Lte(Value),
    /// Equal to one of the operands.
    In(Vec<Value>),
    /// Equal to none of the operands.
    NotIn(Vec<Value>),
    /// String substring/prefix/suffix test.
    StringMatch {
        /// Which end of the string to anchor on.
        kind: MatchKind,
        /// Literal pattern.
        pattern: String,
    },
    /// Nullness test. `expect_null = false` selects non-null cells.
    Nullness {
        /// Whether matching cells must be null.
        expect_null: bool,
    },
}

/// One column/condition pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Column the condition applies to.
    pub column: String,
    /// The condition.
    pub condition: Condition,
}

/// A conjunction of clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Create an empty filter (matches every row).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause.
    pub fn with(mut self, column: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push(Clause {
            column: column.into(),
            condition,
        });
        self
    }

    /// `column == value`
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Eq(value.into()))
    }

    /// `column != value`
    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Ne(value.into()))
    }

    /// `column > value`
    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Gt(value.into()))
    }

    /// `column >= value`
    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Gte(value.into()))
    }

    /// `column < value`
    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Lt(value.into()))
    }

    /// `column <= value`
    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Lte(value.into()))
    }

    /// `column IN values`
    pub fn is_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.with(column, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    /// `column NOT IN values`
    pub fn not_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.with(column, Condition::NotIn(values.into_iter().map(Into::into).collect()))
    }

    /// Substring match.
    pub fn contains(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.string_match(column, MatchKind::Contains, pattern)
    }

    /// Prefix match.
    pub fn starts_with(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.string_match(column, MatchKind::StartsWith, pattern)
    }

    /// Suffix match.
    pub fn ends_with(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.string_match(column, MatchKind::EndsWith, pattern)
    }

    /// Null test.
    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.with(column, Condition::Nullness { expect_null: true })
    }

    /// Non-null test.
    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.with(column, Condition::Nullness { expect_null: false })
    }

    fn string_match(
        self,
        column: impl Into<String>,
        kind: MatchKind,
        pattern: impl Into<String>,
    ) -> Self {
        self.with(
            column,
            Condition::StringMatch {
                kind,
                pattern: pattern.into(),
            },
        )
    }

    /// The clauses, in order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Check if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Drop clauses on columns the predicate does not know.
    ///
    /// Referencing a column that is not in the schema contributes no
    /// condition rather than failing.
    pub fn retain_columns(&self, mut known: impl FnMut(&str) -> bool) -> Filter {
        Filter {
            clauses: self
                .clauses
                .iter()
                .filter(|c| known(&c.column))
                .cloned()
                .collect(),
        }
    }

    /// Parse a filter from a JSON string.
    pub fn parse(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidFilter(format!("not valid JSON: {}", e)))?;
        Self::from_json(&json)
    }

    /// Build a filter from its JSON mapping form.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = match json {
            serde_json::Value::Null => return Ok(Filter::new()),
            serde_json::Value::Object(object) => object,
            other => {
                return Err(Error::InvalidFilter(format!(
                    "expected an object mapping columns to criteria, got {}",
                    other
                )))
            }
        };

        let mut filter = Filter::new();
        for (column, criterion) in object {
            match criterion {
                serde_json::Value::Object(operators) => {
                    for (operator, operand) in operators {
                        let condition = parse_condition(column, operator, operand)?;
                        filter = filter.with(column.clone(), condition);
                    }
                }
                scalar => {
                    filter = filter.with(column.clone(), Condition::Eq(scalar_operand(column, scalar)?));
                }
            }
        }
        Ok(filter)
    }
}

fn scalar_operand(column: &str, json: &serde_json::Value) -> Result<Value> {
    Value::from_json(json).ok_or_else(|| {
        Error::InvalidFilter(format!("operand for '{}' must be a scalar, got {}", column, json))
    })
}

fn list_operand(column: &str, operator: &str, json: &serde_json::Value) -> Result<Vec<Value>> {
    let items = json.as_array().ok_or_else(|| {
        Error::InvalidFilter(format!("'{}' on '{}' expects an array", operator, column))
    })?;
    items.iter().map(|item| scalar_operand(column, item)).collect()
}

fn string_operand(column: &str, operator: &str, json: &serde_json::Value) -> Result<String> {
    json.as_str().map(str::to_string).ok_or_else(|| {
        Error::InvalidFilter(format!("'{}' on '{}' expects a string", operator, column))
    })
}

fn flag_operand(column: &str, operator: &str, json: &serde_json::Value) -> Result<bool> {
    json.as_bool().ok_or_else(|| {
        Error::InvalidFilter(format!("'{}' on '{}' expects true or false", operator, column))
    })
}

fn parse_condition(column: &str, operator: &str, operand: &serde_json::Value) -> Result<Condition> {
    let condition = match operator {
        "eq" => Condition::Eq(scalar_operand(column, operand)?),
        "ne" => Condition::Ne(scalar_operand(column, operand)?),
        "gt" => Condition::Gt(scalar_operand(column, operand)?),
        "gte" => Condition::Gte(scalar_operand(column, operand)?),
        "lt" => Condition::Lt(scalar_operand(column, operand)?),
        "lte" => Condition::Lte(scalar_operand(column, operand)?),
        "in" => Condition::In(list_operand(column, operator, operand)?),
        "nin" => Condition::NotIn(list_operand(column, operator, operand)?),
        "contains" => Condition::StringMatch {
            kind: MatchKind::Contains,
            pattern: string_operand(column, operator, operand)?,
        },
        "startswith" => Condition::StringMatch {
            kind: MatchKind::StartsWith,
            pattern: string_operand(column, operator, operand)?,
        },
        "endswith" => Condition::StringMatch {
            kind: MatchKind::EndsWith,
            pattern: string_operand(column, operator, operand)?,
        },
        "is_null" => Condition::Nullness {
            expect_null: flag_operand(column, operator, operand)?,
        },
        "is_not_null" => Condition::Nullness {
            expect_null: !flag_operand(column, operator, operand)?,
        },
        unknown => {
            return Err(Error::InvalidFilter(format!(
                "unknown operator '{}' on '{}'",
                unknown, column
            )))
        }
    };
    Ok(condition)
}

/// Evaluates filters against records.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Evaluate a filter against a record.
    ///
    /// Absent columns read as null; callers that want the permissive
    /// unknown-column behavior strip those clauses first with
    /// [`Filter::retain_columns`].
    pub fn evaluate(filter: &Filter, record: &Record) -> bool {
        filter
            .clauses
            .iter()
            .all(|clause| Self::evaluate_condition(&clause.condition, record.value(&clause.column)))
    }

    /// Evaluate one condition against a cell.
    pub fn evaluate_condition(condition: &Condition, cell: &Value) -> bool {
        match condition {
            Condition::Nullness { expect_null } => cell.is_null() == *expect_null,
            // Every other operator is false on a null cell.
            _ if cell.is_null() => false,
            Condition::Eq(value) => Self::values_equal(cell, value),
            Condition::Ne(value) => !value.is_null() && !Self::values_equal(cell, value),
            Condition::Gt(value) => Self::compare_with(cell, value, Ordering::is_gt),
            Condition::Gte(value) => Self::compare_with(cell, value, Ordering::is_ge),
            Condition::Lt(value) => Self::compare_with(cell, value, Ordering::is_lt),
            Condition::Lte(value) => Self::compare_with(cell, value, Ordering::is_le),
            Condition::In(values) => values.iter().any(|v| Self::values_equal(cell, v)),
            Condition::NotIn(values) => !values.iter().any(|v| Self::values_equal(cell, v)),
            Condition::StringMatch { kind, pattern } => match cell {
                Value::String(s) => match kind {
                    MatchKind::Contains => s.contains(pattern.as_str()),
                    MatchKind::StartsWith => s.starts_with(pattern.as_str()),
                    MatchKind::EndsWith => s.ends_with(pattern.as_str()),
                },
                _ => false,
            },
        }
    }

    fn compare_with(cell: &Value, operand: &Value, predicate: fn(Ordering) -> bool) -> bool {
        Self::compare_values(cell, operand)
            .map(predicate)
            .unwrap_or(false)
    }

    /// Check if two values are equal. Null equals nothing.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        matches!(Self::compare_values(a, b), Some(Ordering::Equal))
            || matches!((a, b), (Value::Bool(x), Value::Bool(y)) if x == y)
    }

    /// Compare two values, returning their ordering if comparable.
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Float64(b)) => (*a as f64).partial_cmp(b),
            (Value::Float64(a), Value::Int64(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::String(b)) => parse_timestamp(b).map(|b| a.cmp(&b)),
            (Value::String(a), Value::Timestamp(b)) => parse_timestamp(a).map(|a| a.cmp(b)),
            _ => None, // Incompatible types
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(rent: impl Into<Value>) -> Record {
        Record::new()
            .with("listing_url", "https://example.dk/bolig/1")
            .with("rent", rent)
            .with("address", "Jagtvej 12, 2200 København N")
    }

    #[test]
    fn test_eq_and_ne() {
        let row = listing(12000);

        assert!(FilterEvaluator::evaluate(&Filter::new().eq("rent", 12000), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().eq("rent", 11000), &row));
        assert!(FilterEvaluator::evaluate(&Filter::new().ne("rent", 11000), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().ne("rent", 12000), &row));
    }

    #[test]
    fn test_numeric_type_coercion() {
        let row = listing(12000);

        // Int64 cell, Float64 operand
        assert!(FilterEvaluator::evaluate(&Filter::new().eq("rent", 12000.0), &row));
        assert!(FilterEvaluator::evaluate(&Filter::new().lt("rent", 12000.5), &row));
    }

    #[test]
    fn test_range_filter() {
        let filter = Filter::new().gte("rent", 1000).lte("rent", 2000);
        let matched: Vec<i64> = [900, 1000, 1500, 2000, 2500]
            .into_iter()
            .filter(|rent| FilterEvaluator::evaluate(&filter, &listing(*rent)))
            .collect();
        assert_eq!(matched, vec![1000, 1500, 2000]);

        let strict = Filter::new().gt("rent", 1000).lt("rent", 2000);
        assert!(!FilterEvaluator::evaluate(&strict, &listing(1000)));
        assert!(FilterEvaluator::evaluate(&strict, &listing(1500)));
    }

    #[test]
    fn test_in_and_not_in() {
        let row = Record::new().with("rooms", 3);

        assert!(FilterEvaluator::evaluate(&Filter::new().is_in("rooms", [2, 3]), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().is_in("rooms", [4, 5]), &row));
        assert!(FilterEvaluator::evaluate(&Filter::new().not_in("rooms", [4, 5]), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().not_in("rooms", [3]), &row));
    }

    #[test]
    fn test_string_matches() {
        let row = listing(12000);

        assert!(FilterEvaluator::evaluate(&Filter::new().contains("address", "Jagtvej"), &row));
        assert!(FilterEvaluator::evaluate(&Filter::new().starts_with("listing_url", "https://"), &row));
        assert!(FilterEvaluator::evaluate(&Filter::new().ends_with("address", "København N"), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().contains("address", "Amager"), &row));

        // Patterns are literal, not regular expressions.
        assert!(!FilterEvaluator::evaluate(&Filter::new().contains("address", "Jag.vej"), &row));

        // Non-string cells never match.
        assert!(!FilterEvaluator::evaluate(&Filter::new().contains("rent", "12"), &row));
    }

    #[test]
    fn test_nullness() {
        let with_null = Record::new().with("deposit", Value::Null);
        let with_value = Record::new().with("deposit", 36000);

        assert!(FilterEvaluator::evaluate(&Filter::new().is_null("deposit"), &with_null));
        assert!(!FilterEvaluator::evaluate(&Filter::new().is_null("deposit"), &with_value));
        assert!(FilterEvaluator::evaluate(&Filter::new().is_not_null("deposit"), &with_value));
        assert!(!FilterEvaluator::evaluate(&Filter::new().is_not_null("deposit"), &with_null));
    }

    #[test]
    fn test_null_cells_fail_comparisons() {
        let row = Record::new().with("rent", Value::Null);

        assert!(!FilterEvaluator::evaluate(&Filter::new().eq("rent", 1000), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().ne("rent", 1000), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().gt("rent", 0), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().not_in("rent", [1000]), &row));
    }

    #[test]
    fn test_incompatible_types_never_match() {
        let row = listing(12000);
        assert!(!FilterEvaluator::evaluate(&Filter::new().gt("address", 5), &row));
        assert!(!FilterEvaluator::evaluate(&Filter::new().eq("rent", "12000"), &row));
    }

    #[test]
    fn test_timestamp_against_string_operand() {
        // 2024-01-01T00:00:00Z
        let row = Record::new().with("created_at", Value::Timestamp(1_704_067_200_000_000));

        let filter = Filter::new().gte("created_at", "2023-12-31T00:00:00Z");
        assert!(FilterEvaluator::evaluate(&filter, &row));
        let filter = Filter::new().lt("created_at", "2023-12-31T00:00:00Z");
        assert!(!FilterEvaluator::evaluate(&filter, &row));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(FilterEvaluator::evaluate(&Filter::new(), &listing(1)));
        assert!(FilterEvaluator::evaluate(&Filter::new(), &Record::new()));
    }

    #[test]
    fn test_parse_json_mapping() {
        let filter = Filter::parse(
            r#"{"rent": {"gte": 1000, "lte": 2000}, "rooms": 3, "deposit": {"is_null": false}}"#,
        )
        .unwrap();

        assert_eq!(
            filter.clauses(),
            Filter::new()
                .gte("rent", 1000)
                .lte("rent", 2000)
                .eq("rooms", 3)
                .is_not_null("deposit")
                .clauses()
        );
    }

    #[test]
    fn test_parse_nullness_inversion() {
        let filter = Filter::parse(r#"{"deposit": {"is_not_null": false}}"#).unwrap();
        assert_eq!(filter.clauses(), Filter::new().is_null("deposit").clauses());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            Filter::parse(r#"{"rent": {"between": [1, 2]}}"#),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            Filter::parse(r#"{"rent": {"in": 5}}"#),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(Filter::parse("[1, 2]"), Err(Error::InvalidFilter(_))));
        assert!(matches!(Filter::parse("{not json"), Err(Error::InvalidFilter(_))));
        assert!(Filter::parse("null").unwrap().is_empty());
    }

    #[test]
    fn test_retain_columns() {
        let filter = Filter::new().eq("rent", 1).eq("ghost", 2);
        let kept = filter.retain_columns(|c| c == "rent");
        assert_eq!(kept.clauses().len(), 1);
        assert_eq!(kept.clauses()[0].column, "rent");
    }
}
