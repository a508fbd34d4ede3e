//! Notifier used by the `ingest` command.

use async_trait::async_trait;
use rentwatch_core::{Notifier, NotifyError};

/// Prints each new listing URL on stdout and logs it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, listing_url: &str) -> Result<(), NotifyError> {
        println!("{}", listing_url);
        tracing::info!(listing_url, "new listing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_delivers() {
        assert!(LogNotifier.notify("https://example.com/1").await.is_ok());
    }
}
