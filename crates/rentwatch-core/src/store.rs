//! The listings store: CRUD over a unique-keyed table with snapshot
//! persistence.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::query::ReadQuery;
use crate::record::Record;
use crate::snapshot;
use crate::table::{IndexKey, Table};
use crate::value::Value;

/// Reserved column stamped once when a record is first stored.
pub const CREATED_AT_COLUMN: &str = "created_at";

/// Reserved column stamped on creation and on every update.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Number of duplicate keys quoted in a [`Error::DuplicateBatch`].
const DUPLICATE_SAMPLE: usize = 5;

fn is_reserved(column: &str) -> bool {
    column == CREATED_AT_COLUMN || column == UPDATED_AT_COLUMN
}

fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Listings persistence and deduplication.
///
/// Every mutation that changes the table rewrites the snapshot file when
/// one is configured. Mutations are staged on a copy of the table, which
/// replaces the live one only after the snapshot is written, so a failed
/// save leaves the store unchanged. Mutating methods take `&mut self`;
/// share a store across tasks behind a mutex.
#[derive(Debug)]
pub struct ListingsStore {
    config: StoreConfig,
    table: Table,
}

impl ListingsStore {
    /// Open a store, hydrating it from the snapshot if the file exists.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mut table = Table::new(config.unique_key.clone());

        if let Some(path) = config.storage_path() {
            if let Some(snapshot) = snapshot::load(path)? {
                table.replace(snapshot.columns, snapshot.rows);
            }
        }

        info!(
            unique_key = %config.unique_key,
            path = ?config.storage_path(),
            rows = table.len(),
            "listings store opened"
        );
        Ok(Self { config, table })
    }

    /// Open a memory-only store keyed on the default column.
    pub fn in_memory() -> Self {
        let config = StoreConfig::in_memory();
        Self {
            table: Table::new(config.unique_key.clone()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn unique_key(&self) -> &str {
        self.table.unique_key()
    }

    /// The underlying table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Schema columns in order.
    pub fn columns(&self) -> Vec<String> {
        self.table.columns().map(str::to_string).collect()
    }

    // ----- create -----

    /// Insert one record.
    ///
    /// Fails with [`Error::DuplicateKey`] without touching the table when
    /// the record's key is already stored. Caller-supplied timestamps are
    /// replaced.
    pub fn create(&mut self, record: Record) -> Result<Record> {
        if let Some(key) = self.table.key_of(&record) {
            if self.table.contains_key(key) {
                return Err(Error::DuplicateKey {
                    column: self.unique_key().to_string(),
                    value: key.to_string(),
                });
            }
        }

        let mut table = self.table.clone();
        let mut stored = table.append(vec![stamp_new(record, now_micros())]);
        self.commit(table)?;

        debug!(rows = self.table.len(), "record created");
        Ok(stored.pop().unwrap_or_default())
    }

    /// Insert a batch.
    ///
    /// Keys already stored, or repeated within the batch, are duplicates.
    /// With `skip_existing` they are dropped; otherwise the whole batch is
    /// rejected with [`Error::DuplicateBatch`]. All inserted rows share one
    /// timestamp.
    pub fn create_many(&mut self, records: Vec<Record>, skip_existing: bool) -> Result<Vec<Record>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let (fresh, duplicates) = self.table.split_new(records);
        if !duplicates.is_empty() {
            if !skip_existing {
                let sample = duplicates
                    .iter()
                    .take(DUPLICATE_SAMPLE)
                    .map(|r| r.value(self.unique_key()).to_string())
                    .collect();
                return Err(Error::DuplicateBatch {
                    count: duplicates.len(),
                    sample,
                });
            }
            debug!(skipped = duplicates.len(), "skipping existing records");
        }

        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        let batch_time = now_micros();
        let fresh = fresh.into_iter().map(|r| stamp_new(r, batch_time)).collect();
        let mut table = self.table.clone();
        let stored = table.append(fresh);
        self.commit(table)?;

        debug!(inserted = stored.len(), rows = self.table.len(), "batch created");
        Ok(stored)
    }

    // ----- read -----

    /// Read rows: filter, then offset, then limit, then projection.
    pub fn read(&self, query: &ReadQuery) -> Vec<Record> {
        let positions: Vec<usize> = match &query.filter {
            Some(filter) => self.table.matching(filter),
            None => (0..self.table.len()).collect(),
        };

        let projection: Option<Vec<String>> = query.columns.as_ref().and_then(|requested| {
            let known: Vec<String> = requested
                .iter()
                .filter(|c| self.table.has_column(c))
                .cloned()
                .collect();
            // Nothing requested exists: fall back to every column.
            (!known.is_empty()).then_some(known)
        });

        let rows = self.table.rows();
        positions
            .into_iter()
            .skip(query.effective_offset())
            .take(query.effective_limit())
            .map(|i| match &projection {
                Some(columns) => rows[i].project(columns),
                None => rows[i].clone(),
            })
            .collect()
    }

    /// Copy of every row.
    pub fn read_all(&self) -> Vec<Record> {
        self.table.rows().to_vec()
    }

    /// Number of rows matching a filter, or all rows.
    pub fn count(&self, filter: Option<&Filter>) -> usize {
        match filter {
            Some(filter) => self.table.matching(filter).len(),
            None => self.table.len(),
        }
    }

    /// Check whether a key is stored.
    pub fn exists(&self, key: impl Into<Value>) -> bool {
        self.table.contains_key(&key.into())
    }

    // ----- update -----

    /// Update the record holding `key`.
    ///
    /// `created_at` in `updates` is ignored and `updated_at` is forced
    /// forward. Fails with [`Error::NotFound`] when no record has the key.
    pub fn update(&mut self, key: impl Into<Value>, updates: Record) -> Result<Record> {
        let key = key.into();
        let position = self.table.position(&key).ok_or_else(|| Error::NotFound {
            column: self.unique_key().to_string(),
            value: key.to_string(),
        })?;

        let mut table = self.table.clone();
        apply_updates(&mut table, &[position], &updates);
        let updated = table.rows()[position].clone();
        self.commit(table)?;

        debug!(key = %key, "record updated");
        Ok(updated)
    }

    /// Update every record matching `filter`. Returns the updated rows.
    pub fn update_many(&mut self, filter: &Filter, updates: Record) -> Result<Vec<Record>> {
        let positions = self.table.matching(filter);
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let mut table = self.table.clone();
        apply_updates(&mut table, &positions, &updates);
        let updated: Vec<Record> = positions.iter().map(|&i| table.rows()[i].clone()).collect();
        self.commit(table)?;

        debug!(updated = updated.len(), "records updated");
        Ok(updated)
    }

    // ----- delete -----

    /// Delete the record holding `key`. Returns whether one was removed.
    pub fn delete(&mut self, key: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        let Some(position) = self.table.position(&key) else {
            return Ok(false);
        };

        let mut mask = vec![false; self.table.len()];
        mask[position] = true;
        let mut table = self.table.clone();
        table.remove_masked(&mask);
        self.commit(table)?;

        debug!(key = %key, "record deleted");
        Ok(true)
    }

    /// Delete by key list or by filter, never both.
    ///
    /// A non-empty key list wins; otherwise a non-empty filter is used.
    /// With neither, nothing is deleted. Returns the number removed.
    pub fn delete_many(&mut self, keys: &[Value], filter: Option<&Filter>) -> Result<usize> {
        let mask = if !keys.is_empty() {
            let targets: HashSet<IndexKey> = keys.iter().filter_map(IndexKey::from_value).collect();
            let unique_key = self.unique_key().to_string();
            self.table
                .rows()
                .iter()
                .map(|row| {
                    IndexKey::from_value(row.value(&unique_key))
                        .is_some_and(|k| targets.contains(&k))
                })
                .collect::<Vec<bool>>()
        } else if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            self.table.mask(filter)
        } else {
            debug!("delete_many called without keys or filter");
            return Ok(0);
        };

        if !mask.contains(&true) {
            return Ok(0);
        }
        let mut table = self.table.clone();
        let removed = table.remove_masked(&mask);
        self.commit(table)?;

        debug!(removed, rows = self.table.len(), "records deleted");
        Ok(removed)
    }

    // ----- deduplication -----

    /// Split incoming records into new and already-stored ones.
    ///
    /// Only keys already in the store count as existing. Records without a
    /// key are new, and so is every copy of a key the store has not seen.
    pub fn find_new_listings(&self, incoming: &[Record]) -> (Vec<Record>, Vec<Record>) {
        self.table.partition_known(incoming.to_vec())
    }

    /// Insert only the records not already stored.
    ///
    /// A key repeated within `incoming` is inserted once. Returns the number
    /// inserted and the stored rows.
    pub fn add_new_listings(&mut self, incoming: Vec<Record>) -> Result<(usize, Vec<Record>)> {
        let (fresh, existing) = self.find_new_listings(&incoming);
        debug!(new = fresh.len(), existing = existing.len(), "diffed incoming listings");

        let inserted = self.create_many(fresh, true)?;
        Ok((inserted.len(), inserted))
    }

    // ----- persistence -----

    /// Write `table` to the snapshot, then make it the live table.
    fn commit(&mut self, table: Table) -> Result<()> {
        if let Some(path) = self.config.storage_path() {
            if !table.is_empty() {
                snapshot::save(path, &table)?;
            }
        }
        self.table = table;
        Ok(())
    }
}

/// Apply `updates` to the rows at `positions` and stamp them all with one
/// `updated_at`.
///
/// The stamp is later than every targeted row's previous one, so
/// `updated_at` strictly increases even when the clock has not moved.
fn apply_updates(table: &mut Table, positions: &[usize], updates: &Record) {
    let latest = positions
        .iter()
        .filter_map(|&i| {
            let row = &table.rows()[i];
            row.value(UPDATED_AT_COLUMN)
                .as_timestamp()
                .or_else(|| row.value(CREATED_AT_COLUMN).as_timestamp())
        })
        .max();
    let stamp = match latest {
        Some(latest) => now_micros().max(latest + 1),
        None => now_micros(),
    };

    for &position in positions {
        for (column, value) in updates.iter().filter(|(c, _)| !is_reserved(c)) {
            table.set(position, column, value.clone());
        }
        table.set(position, UPDATED_AT_COLUMN, Value::Timestamp(stamp));
    }
}

fn stamp_new(mut record: Record, now: i64) -> Record {
    record.remove(CREATED_AT_COLUMN);
    record.remove(UPDATED_AT_COLUMN);
    record.insert(CREATED_AT_COLUMN, Value::Timestamp(now));
    record.insert(UPDATED_AT_COLUMN, Value::Timestamp(now));
    record
}
