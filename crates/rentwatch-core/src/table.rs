//! In-memory listings table.
//!
//! Rows live in an arena (`Vec<Record>`) in insertion order. Every row
//! carries every schema column, in schema order, with null filling the gaps.
//! A hash index maps each non-null unique-key value to the position of the
//! row that holds it.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use tracing::debug;

use crate::filter::{Filter, FilterEvaluator};
use crate::record::Record;
use crate::value::Value;

/// Hashable form of a unique-key value.
///
/// Integral floats fold into integers so that `1000` and `1000.0` index
/// the same way they compare in filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum IndexKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Timestamp(i64),
}

impl IndexKey {
    /// Build the index key for a value. Null has no key.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Int64(i) => Some(IndexKey::Int(*i)),
            Value::Float64(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Some(IndexKey::Int(*f as i64))
                } else {
                    Some(IndexKey::Float(f.to_bits()))
                }
            }
            Value::String(s) => Some(IndexKey::Str(s.clone())),
            Value::Timestamp(t) => Some(IndexKey::Timestamp(*t)),
        }
    }
}

/// Column-union table with a unique-key index.
#[derive(Debug, Clone)]
pub struct Table {
    unique_key: String,
    columns: IndexSet<String>,
    rows: Vec<Record>,
    key_index: HashMap<IndexKey, usize>,
}

impl Table {
    /// Create an empty table keyed on `unique_key`.
    pub fn new(unique_key: impl Into<String>) -> Self {
        Self {
            unique_key: unique_key.into(),
            columns: IndexSet::new(),
            rows: Vec::new(),
            key_index: HashMap::new(),
        }
    }

    /// Name of the unique-key column.
    pub fn unique_key(&self) -> &str {
        &self.unique_key
    }

    /// Schema columns in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// Check if the schema has a column.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// All rows in insertion order.
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the row holding a key value.
    pub fn position(&self, key: &Value) -> Option<usize> {
        IndexKey::from_value(key).and_then(|k| self.key_index.get(&k).copied())
    }

    /// Check if a key value is already present.
    pub fn contains_key(&self, key: &Value) -> bool {
        self.position(key).is_some()
    }

    /// The key value of a record, if it has a non-null one.
    pub fn key_of<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        record.get(&self.unique_key).filter(|v| !v.is_null())
    }

    /// Add a column to the schema, backfilling null into existing rows.
    pub fn ensure_column(&mut self, column: &str) {
        if self.columns.contains(column) {
            return;
        }
        debug!(column, rows = self.rows.len(), "extending schema");
        self.columns.insert(column.to_string());
        for row in &mut self.rows {
            row.insert(column, Value::Null);
        }
    }

    /// Append rows with diagonal concatenation.
    ///
    /// Unseen columns extend the schema; known columns missing from a row
    /// are filled with null. Returns the stored rows. Callers are
    /// responsible for unique-key checks.
    pub fn append(&mut self, records: Vec<Record>) -> Vec<Record> {
        for record in &records {
            for column in record.columns() {
                self.ensure_column(column);
            }
        }

        let mut stored = Vec::with_capacity(records.len());
        for mut record in records {
            let row: Record = self
                .columns
                .iter()
                .map(|c| (c.clone(), record.remove(c).unwrap_or_default()))
                .collect();

            if let Some(key) = IndexKey::from_value(row.value(&self.unique_key)) {
                self.key_index.entry(key).or_insert(self.rows.len());
            }
            stored.push(row.clone());
            self.rows.push(row);
        }
        stored
    }

    /// Partition records by whether their key is already stored.
    ///
    /// Only stored keys count: records without a key are new, and a key
    /// repeated within `records` lands in the same side every time.
    pub fn partition_known(&self, records: Vec<Record>) -> (Vec<Record>, Vec<Record>) {
        records.into_iter().partition(|record| {
            IndexKey::from_value(record.value(&self.unique_key))
                .map_or(true, |key| !self.key_index.contains_key(&key))
        })
    }

    /// Split records into those that can be inserted and duplicates.
    ///
    /// Records without a key are insertable. A key already stored, or
    /// repeated within `records` after its first occurrence, is a
    /// duplicate.
    pub fn split_new(&self, records: Vec<Record>) -> (Vec<Record>, Vec<Record>) {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        let mut existing = Vec::new();

        for record in records {
            match IndexKey::from_value(record.value(&self.unique_key)) {
                None => fresh.push(record),
                Some(key) if self.key_index.contains_key(&key) => existing.push(record),
                Some(key) => {
                    if seen.insert(key) {
                        fresh.push(record);
                    } else {
                        existing.push(record);
                    }
                }
            }
        }
        (fresh, existing)
    }

    /// Set one cell. New columns extend the schema.
    pub fn set(&mut self, position: usize, column: &str, value: Value) {
        self.ensure_column(column);
        self.rows[position].insert(column, value);
        if column == self.unique_key {
            self.rebuild_index();
        }
    }

    /// Row positions matching a filter.
    ///
    /// Clauses on columns outside the schema are ignored.
    pub fn matching(&self, filter: &Filter) -> Vec<usize> {
        let filter = filter.retain_columns(|c| self.columns.contains(c));
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| FilterEvaluator::evaluate(&filter, row))
            .map(|(i, _)| i)
            .collect()
    }

    /// Boolean mask over rows for a filter.
    pub fn mask(&self, filter: &Filter) -> Vec<bool> {
        let mut mask = vec![false; self.rows.len()];
        for position in self.matching(filter) {
            mask[position] = true;
        }
        mask
    }

    /// Remove the rows flagged in `mask`. Returns how many were removed.
    pub fn remove_masked(&mut self, mask: &[bool]) -> usize {
        let before = self.rows.len();
        let mut flags = mask.iter();
        self.rows
            .retain(|_| !flags.next().copied().unwrap_or(false));
        let removed = before - self.rows.len();
        if removed > 0 {
            self.rebuild_index();
        }
        removed
    }

    /// Replace the whole table, as when hydrating from a snapshot.
    pub fn replace(&mut self, columns: Vec<String>, rows: Vec<Record>) {
        self.columns = columns.into_iter().collect();
        self.rows = Vec::with_capacity(rows.len());
        self.key_index.clear();
        self.append(rows);
    }

    fn rebuild_index(&mut self) {
        self.key_index.clear();
        for (position, row) in self.rows.iter().enumerate() {
            if let Some(key) = IndexKey::from_value(row.value(&self.unique_key)) {
                self.key_index.entry(key).or_insert(position);
            }
        }
    }
}
