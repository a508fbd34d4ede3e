//! CSV snapshots with a header row.

use std::path::Path;

use super::{ColumnType, Snapshot};
use crate::error::Result;
use crate::record::Record;
use crate::value::Value;

pub(super) fn write(path: &Path, columns: &[String], rows: &[Record]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(columns.iter().map(|column| render(row.value(column))))?;
    }
    writer.flush()?;
    Ok(())
}

pub(super) fn read(path: &Path) -> Result<Snapshot> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut raw = Vec::new();
    for record in reader.records() {
        raw.push(record?);
    }

    // Types are decided per column over the whole file.
    let types: Vec<ColumnType> = (0..columns.len())
        .map(|i| ColumnType::infer_text(raw.iter().map(|r| r.get(i).unwrap_or(""))))
        .collect();

    let rows = raw
        .iter()
        .map(|r| {
            columns
                .iter()
                .zip(&types)
                .enumerate()
                .map(|(i, (name, ty))| (name.clone(), ty.parse_text(r.get(i).unwrap_or(""))))
                .collect::<Record>()
        })
        .collect();

    Ok(Snapshot { columns, rows })
}

/// Text for one cell.
///
/// CSV has no null marker, so null and the empty string share the empty
/// cell and both reload as null. Parquet keeps them apart.
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        // Debug keeps a trailing `.0` so integral floats reload as floats.
        Value::Float64(f) => format!("{:?}", f),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_cells() {
        assert_eq!(render(&Value::Null), "");
        assert_eq!(render(&Value::Float64(55.0)), "55.0");
        assert_eq!(render(&Value::Int64(1200)), "1200");
        assert_eq!(render(&Value::from("Main St 1")), "Main St 1");
    }

    #[test]
    fn test_round_trip_infers_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.csv");
        let columns = vec!["listing_url".to_string(), "rent".to_string(), "area".to_string()];
        let rows = vec![
            Record::new().with("listing_url", "a").with("rent", 1000).with("area", 50.0),
            Record::new().with("listing_url", "b").with("rent", Value::Null).with("area", 61.5),
        ];

        write(&path, &columns, &rows).unwrap();
        let snapshot = read(&path).unwrap();

        assert_eq!(snapshot.columns, columns);
        assert_eq!(snapshot.rows, rows);
    }

    #[test]
    fn test_empty_string_reloads_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.csv");
        let columns = vec!["listing_url".to_string(), "address".to_string()];
        let rows = vec![
            Record::new().with("listing_url", "a").with("address", ""),
            Record::new().with("listing_url", "b").with("address", "Elm St 9"),
        ];

        write(&path, &columns, &rows).unwrap();
        let snapshot = read(&path).unwrap();

        assert_eq!(snapshot.rows[0].value("address"), &Value::Null);
        assert_eq!(snapshot.rows[1].value("address"), &Value::from("Elm St 9"));
    }
}
