use futures::{stream, StreamExt};
use std::io::Write;

use super::processor::{FeedError, FeedOutcome, FeedProcessor};

/// Source name used for failures that belong to no single feed.
pub const SEEN_STORE_SOURCE: &str = "<seen-store>";

/// Feeds processed at once when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// A feed that stopped early, with the reason.
#[derive(Debug)]
pub struct FeedFailure {
    pub source: String,
    pub error: FeedError,
}

/// Everything one pass over the feed list produced.
///
/// Both lists are in feed-list order.
#[derive(Debug, Default)]
pub struct RunResult {
    pub outcomes: Vec<FeedOutcome>,
    pub failures: Vec<FeedFailure>,
}

impl RunResult {
    /// True when no feed failed. A run with nothing new is still a success.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Entries delivered across all feeds.
    pub fn dispatched(&self) -> usize {
        self.outcomes.iter().map(|o| o.dispatched).sum()
    }

    /// Writes one `error processing <source> - <error>` line per failure.
    pub fn report(&self, out: &mut impl Write) -> std::io::Result<()> {
        for failure in &self.failures {
            writeln!(out, "error processing {} - {}", failure.source, failure.error)?;
        }
        Ok(())
    }
}

/// Runs every configured feed once.
///
/// Feeds are independent: a failed feed is collected into the result and
/// the rest carry on.
pub struct Orchestrator {
    processor: FeedProcessor,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(processor: FeedProcessor) -> Self {
        Self {
            processor,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Maximum feeds in flight. Values below 1 are treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run(&self, sources: &[String]) -> RunResult {
        tracing::debug!(
            feeds = sources.len(),
            concurrency = self.concurrency,
            "Starting run"
        );

        // buffered (not buffer_unordered) keeps results in input order
        let results: Vec<(String, Result<FeedOutcome, FeedError>)> = stream::iter(sources)
            .map(|source| async move {
                let result = self.processor.process(source).await;
                (source.clone(), result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut run = RunResult::default();
        for (source, result) in results {
            match result {
                Ok(outcome) => run.outcomes.push(outcome),
                Err(error) => {
                    tracing::warn!(feed = %source, error = %error, "Feed failed");
                    run.failures.push(FeedFailure { source, error });
                }
            }
        }

        if let Err(source) = self.processor.ledger().flush().await {
            tracing::warn!(error = %source, "Failed to flush seen-state store");
            run.failures.push(FeedFailure {
                source: SEEN_STORE_SOURCE.to_string(),
                error: FeedError::Storage {
                    identifier: None,
                    source,
                },
            });
        }

        tracing::debug!(
            dispatched = run.dispatched(),
            failed = run.failures.len(),
            "Run finished"
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetchError;
    use crate::util::validate_url;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_format() {
        let error = FeedError::Fetch(FetchError::InvalidUrl(
            validate_url("ftp://example.com").unwrap_err(),
        ));
        let run = RunResult {
            outcomes: vec![FeedOutcome {
                source: "https://ok.example.com/feed".into(),
                entries: 3,
                dispatched: 2,
                skipped: 1,
            }],
            failures: vec![FeedFailure {
                source: "ftp://example.com".into(),
                error,
            }],
        };

        let mut out = Vec::new();
        run.report(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "error processing ftp://example.com - Invalid feed URL: Unsupported scheme: ftp (only http/https allowed)\n"
        );
        assert!(!run.is_success());
        assert_eq!(run.dispatched(), 2);
    }

    #[test]
    fn test_empty_run_is_success() {
        let run = RunResult::default();
        assert!(run.is_success());
        assert_eq!(run.dispatched(), 0);
    }
}
