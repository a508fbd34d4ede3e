//! Parquet snapshots via Arrow record batches.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, StringArray, StringViewArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::{ColumnType, Snapshot};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::Value;

const UTC: &str = "UTC";

/// Write rows as a single-batch Parquet file.
pub(super) fn write(path: &Path, columns: &[String], rows: &[Record]) -> Result<()> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for column in columns {
        let cells: Vec<&Value> = rows.iter().map(|row| row.value(column)).collect();
        let (data_type, array) = build_array(&cells);
        fields.push(Field::new(column.as_str(), data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Read every row group back into records.
pub(super) fn read(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        for row in 0..batch.num_rows() {
            let record = columns
                .iter()
                .enumerate()
                .map(|(i, name)| Ok((name.clone(), cell_at(batch.column(i), row)?)))
                .collect::<Result<Record>>()?;
            rows.push(record);
        }
    }

    Ok(Snapshot { columns, rows })
}

fn build_array(cells: &[&Value]) -> (DataType, ArrayRef) {
    match ColumnType::infer(cells.iter().copied()) {
        ColumnType::Bool => {
            let values: Vec<Option<bool>> = cells.iter().map(|v| v.as_bool()).collect();
            (DataType::Boolean, Arc::new(BooleanArray::from(values)))
        }
        ColumnType::Int64 => {
            let values: Vec<Option<i64>> = cells.iter().map(|v| v.as_i64()).collect();
            (DataType::Int64, Arc::new(Int64Array::from(values)))
        }
        ColumnType::Float64 => {
            let values: Vec<Option<f64>> = cells.iter().map(|v| v.as_f64()).collect();
            (DataType::Float64, Arc::new(Float64Array::from(values)))
        }
        ColumnType::Timestamp => {
            let values: Vec<Option<i64>> = cells.iter().map(|v| v.as_timestamp()).collect();
            (
                DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
                Arc::new(TimestampMicrosecondArray::from(values).with_timezone(UTC)),
            )
        }
        ColumnType::Utf8 => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect();
            (DataType::Utf8, Arc::new(StringArray::from(values)))
        }
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::InvalidData(format!("unexpected array layout for {}", array.data_type()))
    })
}

fn cell_at(array: &ArrayRef, row: usize) -> Result<Value> {
    if matches!(array.data_type(), DataType::Null) || array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Boolean => Value::Bool(downcast::<BooleanArray>(array)?.value(row)),
        DataType::Int32 => Value::Int64(downcast::<Int32Array>(array)?.value(row) as i64),
        DataType::Int64 => Value::Int64(downcast::<Int64Array>(array)?.value(row)),
        DataType::UInt32 => Value::Int64(downcast::<UInt32Array>(array)?.value(row) as i64),
        DataType::UInt64 => {
            let raw = downcast::<UInt64Array>(array)?.value(row);
            i64::try_from(raw)
                .map(Value::Int64)
                .unwrap_or(Value::Float64(raw as f64))
        }
        DataType::Float32 => Value::Float64(downcast::<Float32Array>(array)?.value(row) as f64),
        DataType::Float64 => Value::Float64(downcast::<Float64Array>(array)?.value(row)),
        DataType::Utf8 => Value::String(downcast::<StringArray>(array)?.value(row).to_string()),
        DataType::LargeUtf8 => {
            Value::String(downcast::<LargeStringArray>(array)?.value(row).to_string())
        }
        DataType::Utf8View => {
            Value::String(downcast::<StringViewArray>(array)?.value(row).to_string())
        }
        DataType::Timestamp(unit, _) => {
            let micros = match unit {
                TimeUnit::Second => {
                    downcast::<TimestampSecondArray>(array)?.value(row) * 1_000_000
                }
                TimeUnit::Millisecond => {
                    downcast::<TimestampMillisecondArray>(array)?.value(row) * 1_000
                }
                TimeUnit::Microsecond => downcast::<TimestampMicrosecondArray>(array)?.value(row),
                TimeUnit::Nanosecond => {
                    downcast::<TimestampNanosecondArray>(array)?.value(row) / 1_000
                }
            };
            Value::Timestamp(micros)
        }
        other => {
            return Err(Error::InvalidData(format!(
                "unsupported parquet column type {}",
                other
            )))
        }
    };
    Ok(value)
}
