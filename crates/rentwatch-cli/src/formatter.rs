//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use rentwatch_core::{IngestReport, Record, Value};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format listing rows.
    fn format_rows(&self, rows: &[Record]) -> String;

    /// Format a single labelled count.
    fn format_count(&self, label: &str, count: usize) -> String;

    /// Format the outcome of an ingestion run.
    fn format_report(&self, report: &IngestReport) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

/// Columns of a result set, taken from its first row.
fn header(rows: &[Record]) -> Vec<String> {
    rows.first()
        .map(|row| row.columns().map(str::to_string).collect())
        .unwrap_or_default()
}

fn report_fields(report: &IngestReport) -> [(&'static str, usize); 5] {
    [
        ("found", report.found),
        ("notified", report.notified),
        ("failed", report.failed),
        ("skipped", report.skipped),
        ("inserted", report.inserted),
    ]
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_rows(&self, rows: &[Record]) -> String {
        if rows.is_empty() {
            return "No results".to_string();
        }

        let columns = header(rows);
        let mut table = Table::new();
        table.set_header(columns.iter().map(Cell::new));
        for row in rows {
            table.add_row(columns.iter().map(|c| Cell::new(format_value(row.value(c)))));
        }

        format!("{}\n{} row(s)", table, rows.len())
    }

    fn format_count(&self, label: &str, count: usize) -> String {
        format!("{}: {}", label, count)
    }

    fn format_report(&self, report: &IngestReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Metric", "Listings"]);
        for (name, count) in report_fields(report) {
            table.add_row(vec![name.to_string(), count.to_string()]);
        }
        table.to_string()
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_rows(&self, rows: &[Record]) -> String {
        let array: Vec<serde_json::Value> = rows.iter().map(Record::to_json).collect();
        serde_json::to_string_pretty(&array).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_count(&self, label: &str, count: usize) -> String {
        let mut obj = serde_json::Map::new();
        obj.insert(label.to_string(), count.into());
        serde_json::Value::Object(obj).to_string()
    }

    fn format_report(&self, report: &IngestReport) -> String {
        serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({
            "message": message
        })
        .to_string()
    }
}

/// CSV formatter.
pub struct CsvFormatter;

impl CsvFormatter {
    fn write<I, R>(records: I) -> String
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator,
        R::Item: AsRef<[u8]>,
    {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records {
            if writer.write_record(record).is_err() {
                return String::new();
            }
        }
        writer
            .into_inner()
            .map(|bytes| String::from_utf8_lossy(&bytes).trim_end().to_string())
            .unwrap_or_default()
    }
}

impl Formatter for CsvFormatter {
    fn format_rows(&self, rows: &[Record]) -> String {
        let columns = header(rows);
        let body = rows.iter().map(|row| {
            columns
                .iter()
                .map(|c| match row.value(c) {
                    Value::Null => String::new(),
                    value => format_value(value),
                })
                .collect::<Vec<_>>()
        });
        Self::write(std::iter::once(columns.clone()).chain(body))
    }

    fn format_count(&self, label: &str, count: usize) -> String {
        format!("{}\n{}", label, count)
    }

    fn format_report(&self, report: &IngestReport) -> String {
        let fields = report_fields(report);
        let names: Vec<String> = fields.iter().map(|(name, _)| name.to_string()).collect();
        let counts: Vec<String> = fields.iter().map(|(_, count)| count.to_string()).collect();
        Self::write([names, counts])
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// Format a Value as a display string.
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}
