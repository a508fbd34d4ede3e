//! Crawl-batch ingestion: diff, notify, commit.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::record::Record;
use crate::store::ListingsStore;
use crate::value::Value;

/// A notification that could not be delivered.
#[derive(Debug, thiserror::Error)]
#[error("failed to notify {listing_url}: {reason}")]
pub struct NotifyError {
    pub listing_url: String,
    pub reason: String,
}

impl NotifyError {
    pub fn new(listing_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
            reason: reason.into(),
        }
    }
}

/// Delivers new-listing announcements.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce one listing by its URL.
    async fn notify(&self, listing_url: &str) -> std::result::Result<(), NotifyError>;
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Records in the batch not yet stored.
    pub found: usize,
    /// Notifications delivered.
    pub notified: usize,
    /// Notifications that failed.
    pub failed: usize,
    /// New records without a key to announce.
    pub skipped: usize,
    /// Records committed to the store.
    pub inserted: usize,
}

/// Runs crawl batches through a store and a notifier.
pub struct Ingestor<'a, N: Notifier + ?Sized> {
    notifier: &'a N,
}

impl<'a, N: Notifier + ?Sized> Ingestor<'a, N> {
    pub fn new(notifier: &'a N) -> Self {
        Self { notifier }
    }

    /// Announce every new listing in `batch`, then store them.
    ///
    /// Notification failures are counted and logged; they never block the
    /// insert.
    pub async fn run(&self, store: &mut ListingsStore, batch: Vec<Record>) -> Result<IngestReport> {
        let (fresh, _) = store.find_new_listings(&batch);
        if fresh.is_empty() {
            info!(batch = batch.len(), "no new listings");
            return Ok(IngestReport::default());
        }

        let mut report = IngestReport {
            found: fresh.len(),
            ..IngestReport::default()
        };
        info!(found = report.found, "found new listings");

        let unique_key = store.unique_key().to_string();
        for (i, record) in fresh.iter().enumerate() {
            let url = match record.value(&unique_key) {
                Value::Null => {
                    report.skipped += 1;
                    continue;
                }
                Value::String(url) => url.clone(),
                other => other.to_string(),
            };

            match self.notifier.notify(&url).await {
                Ok(()) => {
                    report.notified += 1;
                    info!("sent listing {} of {}", i + 1, report.found);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(error = %e, "notification failed");
                }
            }
        }

        let (inserted, _) = store.add_new_listings(fresh)?;
        report.inserted = inserted;

        info!(
            notified = report.notified,
            failed = report.failed,
            inserted = report.inserted,
            "ingestion complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, listing_url: &str) -> std::result::Result<(), NotifyError> {
            if self.fail_on.as_deref() == Some(listing_url) {
                return Err(NotifyError::new(listing_url, "channel unavailable"));
            }
            self.sent.lock().unwrap().push(listing_url.to_string());
            Ok(())
        }
    }

    fn listing(url: &str) -> Record {
        Record::new().with("listing_url", url).with("rent", 1000)
    }

    #[tokio::test]
    async fn test_ingest_notifies_new_only() {
        let mut store = ListingsStore::in_memory();
        store.create(listing("a")).unwrap();

        let notifier = RecordingNotifier::default();
        let report = Ingestor::new(&notifier)
            .run(&mut store, vec![listing("a"), listing("b"), listing("c")])
            .await
            .unwrap();

        assert_eq!(report.found, 2);
        assert_eq!(report.notified, 2);
        assert_eq!(report.inserted, 2);
        assert_eq!(*notifier.sent.lock().unwrap(), vec!["b", "c"]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_second_run_is_quiet() {
        let mut store = ListingsStore::in_memory();
        let notifier = RecordingNotifier::default();
        let ingestor = Ingestor::new(&notifier);

        ingestor.run(&mut store, vec![listing("a")]).await.unwrap();
        let report = ingestor.run(&mut store, vec![listing("a")]).await.unwrap();

        assert_eq!(report, IngestReport::default());
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_and_missing_urls_still_insert() {
        let mut store = ListingsStore::in_memory();
        let notifier = RecordingNotifier {
            fail_on: Some("b".to_string()),
            ..Default::default()
        };

        let batch = vec![
            listing("a"),
            listing("b"),
            Record::new().with("listing_url", Value::Null).with("rent", 500),
        ];
        let report = Ingestor::new(&notifier).run(&mut store, batch).await.unwrap();

        assert_eq!(report.found, 3);
        assert_eq!(report.notified, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.inserted, 3);
    }
}
