//! Listing records: ordered column → value mappings.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// One row of the listings table.
///
/// Columns keep the order in which they were first inserted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, builder style.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    /// Set a column, returning the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(column.into(), value.into())
    }

    /// Remove a column, keeping the order of the others.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.fields.shift_remove(column)
    }

    /// Get a column's value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Get a column's value, treating an absent column as null.
    pub fn value(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(column).unwrap_or(&NULL)
    }

    /// Check whether the record carries a column (null or not).
    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the given columns, in the given order.
    pub fn project(&self, columns: &[String]) -> Record {
        columns
            .iter()
            .filter_map(|c| self.fields.get(c).map(|v| (c.clone(), v.clone())))
            .collect()
    }

    /// Build a record from a JSON object of scalars.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            Error::InvalidData(format!("expected a JSON object, got {}", json))
        })?;

        let mut record = Record::new();
        for (column, raw) in object {
            let value = Value::from_json(raw).ok_or_else(|| {
                Error::InvalidData(format!("column '{}' is not a scalar", column))
            })?;
            record.insert(column.clone(), value);
        }
        Ok(record)
    }

    /// Parse a JSON array of objects, as produced by the listing extractor.
    pub fn many_from_json(json: &serde_json::Value) -> Result<Vec<Self>> {
        let items = json.as_array().ok_or_else(|| {
            Error::InvalidData("expected a JSON array of listing objects".to_string())
        })?;
        items.iter().map(Record::from_json).collect()
    }

    /// Convert to a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let record = Record::new()
            .with("listing_url", "https://example.dk/1")
            .with("rent", 12500)
            .with("area", 72.5);

        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["listing_url", "rent", "area"]);
        assert_eq!(record.value("rent"), &Value::Int64(12500));
        assert_eq!(record.value("missing"), &Value::Null);
    }

    #[test]
    fn test_project_drops_unknown() {
        let record = Record::new().with("a", 1).with("b", 2).with("c", 3);
        let projected = record.project(&["c".to_string(), "zzz".to_string(), "a".to_string()]);
        let columns: Vec<&str> = projected.columns().collect();
        assert_eq!(columns, vec!["c", "a"]);
    }

    #[test]
    fn test_from_json_rejects_nested() {
        let json = serde_json::json!({"listing_url": "u", "tags": ["a"]});
        assert!(matches!(Record::from_json(&json), Err(Error::InvalidData(_))));

        let json = serde_json::json!([{"listing_url": "u", "rent": 9000}]);
        let records = Record::many_from_json(&json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value("rent"), &Value::Int64(9000));
    }
}
