//! Rentwatch Command-Line Client
//!
//! Operator surface over a listings store: ingest crawl batches, query,
//! update and delete listings.

mod formatter;
mod notifier;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formatter::{Formatter, OutputFormat};
use notifier::LogNotifier;
use rentwatch_core::{
    Filter, Ingestor, ListingsStore, ReadQuery, Record, StoreConfig, Value, DEFAULT_UNIQUE_KEY,
};

/// Rentwatch listings store
#[derive(Parser, Debug)]
#[command(name = "rentwatch")]
#[command(version, about = "Rentwatch listings store")]
pub struct Args {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Output format
    #[arg(long, default_value = "table", value_enum, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Store location and keying.
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// Snapshot file (.parquet for Parquet, anything else for CSV)
    #[arg(short = 'd', long, default_value = "data/listings.parquet", global = true)]
    pub data_path: PathBuf,

    /// Column whose values must be unique
    #[arg(long, default_value = DEFAULT_UNIQUE_KEY, global = true)]
    pub unique_key: String,

    /// Keep the store in memory; nothing is read or written
    #[arg(long, global = true)]
    pub memory: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Notify and store the new listings in a JSON batch file
    Ingest {
        /// JSON array of listing objects
        batch: PathBuf,
    },
    /// Read listings
    Read {
        /// JSON filter, e.g. '{"rent": {"lte": 1500}}'
        #[arg(long)]
        filter: Option<String>,
        /// Columns to return
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
    /// Count listings
    Count {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Check whether a key is stored
    Exists { key: String },
    /// Update one listing with a JSON object of new values
    Update { key: String, updates: String },
    /// Update every listing matching a filter
    UpdateMany {
        #[arg(long)]
        filter: String,
        updates: String,
    },
    /// Delete one listing
    Delete { key: String },
    /// Delete listings by key list or by filter
    DeleteMany {
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,
        #[arg(long)]
        filter: Option<String>,
    },
}

impl StoreArgs {
    /// Convert command-line arguments to a store configuration.
    pub fn into_config(self) -> StoreConfig {
        let config = StoreConfig::new(self.data_path).with_unique_key(self.unique_key);
        if self.memory {
            config.without_storage()
        } else {
            config
        }
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output stays machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rentwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let Args {
        store,
        format,
        command,
    } = args;

    let config = store.into_config();
    tracing::debug!(
        path = ?config.storage_path(),
        unique_key = %config.unique_key,
        "configuration loaded"
    );

    let mut store = ListingsStore::open(config)?;
    let formatter = formatter::create_formatter(format);
    let output = execute(&mut store, command, &*formatter).await?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

async fn execute(
    store: &mut ListingsStore,
    command: Command,
    formatter: &dyn Formatter,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match command {
        Command::Ingest { batch } => {
            let content = std::fs::read_to_string(&batch)?;
            let records = Record::many_from_json(&serde_json::from_str(&content)?)?;
            let report = Ingestor::new(&LogNotifier).run(store, records).await?;
            formatter.format_report(&report)
        }
        Command::Read {
            filter,
            columns,
            limit,
            offset,
        } => {
            let mut query = ReadQuery::new();
            query.filter = parse_filter(filter.as_deref())?;
            query.columns = columns;
            query.limit = limit;
            query.offset = offset;
            formatter.format_rows(&store.read(&query))
        }
        Command::Count { filter } => {
            let filter = parse_filter(filter.as_deref())?;
            formatter.format_count("count", store.count(filter.as_ref()))
        }
        Command::Exists { key } => {
            let exists = store.exists(parse_key(&key));
            formatter.format_message(&exists.to_string())
        }
        Command::Update { key, updates } => {
            let updated = store.update(parse_key(&key), parse_updates(&updates)?)?;
            formatter.format_rows(&[updated])
        }
        Command::UpdateMany { filter, updates } => {
            let filter = Filter::parse(&filter)?;
            let updated = store.update_many(&filter, parse_updates(&updates)?)?;
            formatter.format_count("updated", updated.len())
        }
        Command::Delete { key } => {
            let deleted = store.delete(parse_key(&key))?;
            formatter.format_count("deleted", usize::from(deleted))
        }
        Command::DeleteMany { keys, filter } => {
            let keys: Vec<Value> = keys.iter().map(String::as_str).map(parse_key).collect();
            let filter = parse_filter(filter.as_deref())?;
            let deleted = store.delete_many(&keys, filter.as_ref())?;
            formatter.format_count("deleted", deleted)
        }
    };
    Ok(output)
}

fn parse_filter(text: Option<&str>) -> rentwatch_core::Result<Option<Filter>> {
    text.map(Filter::parse).transpose()
}

fn parse_updates(text: &str) -> Result<Record, Box<dyn std::error::Error>> {
    Ok(Record::from_json(&serde_json::from_str(text)?)?)
}

/// Keys that read as JSON scalars keep their type; anything else is text.
fn parse_key(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|json| Value::from_json(&json))
        .filter(|value| !value.is_null())
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(
            parse_key("https://example.com/1"),
            Value::from("https://example.com/1")
        );
        assert_eq!(parse_key("42"), Value::Int64(42));
        assert_eq!(parse_key("null"), Value::from("null"));
    }

    #[test]
    fn test_into_config() {
        let args = Args::parse_from(["rentwatch", "--memory", "count"]);
        let config = args.store.into_config();
        assert!(config.storage_path().is_none());
        assert_eq!(config.unique_key, DEFAULT_UNIQUE_KEY);

        let args = Args::parse_from(["rentwatch", "-d", "listings.csv", "exists", "a"]);
        assert_eq!(
            args.store.into_config().storage_path(),
            Some(std::path::Path::new("listings.csv"))
        );
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let mut store = ListingsStore::in_memory();
        store
            .create(Record::new().with("listing_url", "a").with("rent", 900))
            .unwrap();
        let formatter = formatter::create_formatter(OutputFormat::Json);

        let output = execute(
            &mut store,
            Command::Update {
                key: "a".to_string(),
                updates: r#"{"rent": 950}"#.to_string(),
            },
            &*formatter,
        )
        .await
        .unwrap();
        assert!(output.contains("950"));

        let output = execute(
            &mut store,
            Command::Count {
                filter: Some(r#"{"rent": {"gt": 900}}"#.to_string()),
            },
            &*formatter,
        )
        .await
        .unwrap();
        assert_eq!(output, r#"{"count":1}"#);
    }
}
