//! Durable table snapshots.
//!
//! A snapshot is the whole table written to one file, overwritten in full on
//! every save. `.parquet` paths get Apache Parquet; anything else gets CSV
//! with a header row. Neither format is written atomically.

mod columnar;
mod delimited;

use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;
use crate::record::Record;
use crate::table::Table;
use crate::value::{parse_timestamp, Value};

/// On-disk snapshot format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Columnar Apache Parquet.
    Parquet,
    /// Comma-separated text with a header row.
    Csv,
}

impl SnapshotFormat {
    /// Pick the format from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => SnapshotFormat::Parquet,
            _ => SnapshotFormat::Csv,
        }
    }
}

/// A table read back from disk.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Column names in file order.
    pub columns: Vec<String>,
    /// Rows in file order.
    pub rows: Vec<Record>,
}

/// Load a snapshot. Returns `None` when the file does not exist.
pub fn load(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        debug!(path = %path.display(), "no snapshot to load");
        return Ok(None);
    }

    let format = SnapshotFormat::from_path(path);
    let snapshot = match format {
        SnapshotFormat::Parquet => columnar::read(path)?,
        SnapshotFormat::Csv => delimited::read(path)?,
    };

    info!(
        path = %path.display(),
        ?format,
        rows = snapshot.rows.len(),
        columns = snapshot.columns.len(),
        "snapshot loaded"
    );
    Ok(Some(snapshot))
}

/// Write the whole table, replacing any previous snapshot.
pub fn save(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let columns: Vec<String> = table.columns().map(str::to_string).collect();
    let format = SnapshotFormat::from_path(path);
    match format {
        SnapshotFormat::Parquet => columnar::write(path, &columns, table.rows())?,
        SnapshotFormat::Csv => delimited::write(path, &columns, table.rows())?,
    }

    debug!(path = %path.display(), ?format, rows = table.len(), "snapshot saved");
    Ok(())
}

/// Physical type chosen for a column when it is written or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnType {
    Bool,
    Int64,
    Float64,
    Timestamp,
    Utf8,
}

impl ColumnType {
    /// Narrowest type holding every non-null cell.
    ///
    /// Integers widen to floats; any other mix falls back to text, as does
    /// a column with no values at all.
    pub(crate) fn infer<'a>(cells: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut inferred: Option<ColumnType> = None;
        for cell in cells {
            let cell_type = match cell {
                Value::Null => continue,
                Value::Bool(_) => ColumnType::Bool,
                Value::Int64(_) => ColumnType::Int64,
                Value::Float64(_) => ColumnType::Float64,
                Value::Timestamp(_) => ColumnType::Timestamp,
                Value::String(_) => return ColumnType::Utf8,
            };
            inferred = Some(match (inferred, cell_type) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(ColumnType::Int64), ColumnType::Float64)
                | (Some(ColumnType::Float64), ColumnType::Int64) => ColumnType::Float64,
                _ => return ColumnType::Utf8,
            });
        }
        inferred.unwrap_or(ColumnType::Utf8)
    }

    /// Narrowest type parsing every non-empty text cell.
    pub(crate) fn infer_text<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let (mut any, mut int, mut float, mut boolean, mut timestamp) = (false, true, true, true, true);
        for cell in cells.into_iter().filter(|c| !c.is_empty()) {
            any = true;
            int &= cell.parse::<i64>().is_ok();
            float &= cell.parse::<f64>().is_ok();
            boolean &= cell == "true" || cell == "false";
            timestamp &= parse_timestamp(cell).is_some();
        }

        if !any {
            ColumnType::Utf8
        } else if int {
            ColumnType::Int64
        } else if float {
            ColumnType::Float64
        } else if boolean {
            ColumnType::Bool
        } else if timestamp {
            ColumnType::Timestamp
        } else {
            ColumnType::Utf8
        }
    }

    /// Parse a text cell as this type. Empty text is null.
    pub(crate) fn parse_text(self, cell: &str) -> Value {
        if cell.is_empty() {
            return Value::Null;
        }
        let parsed = match self {
            ColumnType::Bool => Some(Value::Bool(cell == "true")),
            ColumnType::Int64 => cell.parse().ok().map(Value::Int64),
            ColumnType::Float64 => cell.parse().ok().map(Value::Float64),
            ColumnType::Timestamp => parse_timestamp(cell).map(Value::Timestamp),
            ColumnType::Utf8 => None,
        };
        parsed.unwrap_or_else(|| Value::String(cell.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            SnapshotFormat::from_path(Path::new("data/listings.parquet")),
            SnapshotFormat::Parquet
        );
        assert_eq!(
            SnapshotFormat::from_path(Path::new("data/listings.PARQUET")),
            SnapshotFormat::Parquet
        );
        assert_eq!(SnapshotFormat::from_path(Path::new("data/listings.csv")), SnapshotFormat::Csv);
        assert_eq!(SnapshotFormat::from_path(Path::new("listings")), SnapshotFormat::Csv);
    }

    #[test]
    fn test_infer_value_column() {
        let ints = [Value::Int64(1), Value::Null, Value::Int64(2)];
        assert_eq!(ColumnType::infer(&ints), ColumnType::Int64);

        let mixed = [Value::Int64(1), Value::Float64(2.5)];
        assert_eq!(ColumnType::infer(&mixed), ColumnType::Float64);

        let text = [Value::Int64(1), Value::String("x".into())];
        assert_eq!(ColumnType::infer(&text), ColumnType::Utf8);

        assert_eq!(ColumnType::infer(&[Value::Null]), ColumnType::Utf8);
    }

    #[test]
    fn test_infer_text_column() {
        assert_eq!(ColumnType::infer_text(["1", "", "3"]), ColumnType::Int64);
        assert_eq!(ColumnType::infer_text(["1", "2.5"]), ColumnType::Float64);
        assert_eq!(ColumnType::infer_text(["true", "false"]), ColumnType::Bool);
        assert_eq!(
            ColumnType::infer_text(["2024-01-01T00:00:00.000000Z"]),
            ColumnType::Timestamp
        );
        assert_eq!(ColumnType::infer_text(["3", "three"]), ColumnType::Utf8);
        assert_eq!(ColumnType::infer_text([""]), ColumnType::Utf8);
    }
}
