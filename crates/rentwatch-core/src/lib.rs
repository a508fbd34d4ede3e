//! Rentwatch Core - Listings store, filter language and snapshots.
//!
//! This crate holds the persistence and deduplication layer for crawled
//! rental listings: a unique-keyed table with CQL-style filters, Parquet or
//! CSV snapshots, and the ingestion workflow that announces new listings.

pub mod config;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod query;
pub mod record;
pub mod snapshot;
pub mod store;
pub mod table;
pub mod value;

pub use config::{StoreConfig, DEFAULT_UNIQUE_KEY};
pub use error::{Error, Result};
pub use filter::{Clause, Condition, Filter, FilterEvaluator, MatchKind};
pub use query::ReadQuery;
pub use record::Record;
pub use snapshot::SnapshotFormat;
pub use store::{ListingsStore, CREATED_AT_COLUMN, UPDATED_AT_COLUMN};
pub use table::Table;
pub use value::{format_timestamp, parse_timestamp, Value};

// Ingestion exports
pub use ingest::{IngestReport, Ingestor, Notifier, NotifyError};
