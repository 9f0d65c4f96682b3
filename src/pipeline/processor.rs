use std::sync::Arc;
use thiserror::Error;

use crate::feed::{parse_feed, FeedEntry, FeedFetcher, FetchError, ParseError};
use crate::notify::{DispatchError, NotificationRequest, SinkSet};
use crate::storage::{Claim, SeenLedger, StorageError};

/// Why a single feed stopped before reaching its last entry.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Seen-state lookup or record failed. `identifier` is `None` for
    /// failures not tied to one entry (the end-of-run flush).
    #[error("{}", storage_message(.identifier, .source))]
    Storage {
        identifier: Option<String>,
        #[source]
        source: StorageError,
    },

    /// A sink refused or never received an entry. The entry was not recorded.
    #[error("dispatching '{identifier}' via {sink}: {source}")]
    Dispatch {
        identifier: String,
        sink: &'static str,
        #[source]
        source: DispatchError,
    },
}

fn storage_message(identifier: &Option<String>, source: &StorageError) -> String {
    match identifier {
        Some(id) => format!("seen-state for '{}': {}", id, source),
        None => source.to_string(),
    }
}

/// Where a feed is in its single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Fetching,
    Parsing,
    Iterating,
    Done,
    Failed,
}

impl std::fmt::Display for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FeedState::Fetching => "fetching",
            FeedState::Parsing => "parsing",
            FeedState::Iterating => "iterating",
            FeedState::Done => "done",
            FeedState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a feed that was processed to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedOutcome {
    pub source: String,
    /// Entries the parser produced.
    pub entries: usize,
    /// Entries delivered to every sink and recorded.
    pub dispatched: usize,
    /// Entries already seen, or claimed by another worker.
    pub skipped: usize,
}

/// Runs one feed through fetch, parse and per-entry dispatch.
///
/// Per entry the order is claim, dispatch to every sink, then record.
/// An entry is only recorded after every sink accepted it, and the first
/// failure of any kind stops the feed: later entries are left for the next
/// run. Entries are handled in parser order.
#[derive(Clone)]
pub struct FeedProcessor {
    fetcher: FeedFetcher,
    ledger: Arc<SeenLedger>,
    sinks: SinkSet,
}

impl FeedProcessor {
    pub fn new(fetcher: FeedFetcher, ledger: Arc<SeenLedger>, sinks: SinkSet) -> Self {
        Self {
            fetcher,
            ledger,
            sinks,
        }
    }

    pub fn ledger(&self) -> &Arc<SeenLedger> {
        &self.ledger
    }

    pub async fn process(&self, source: &str) -> Result<FeedOutcome, FeedError> {
        let result = self.run(source).await;
        if let Err(e) = &result {
            tracing::debug!(feed = %source, state = %FeedState::Failed, error = %e, "Feed state");
        }
        result
    }

    async fn run(&self, source: &str) -> Result<FeedOutcome, FeedError> {
        tracing::debug!(feed = %source, state = %FeedState::Fetching, "Feed state");
        let bytes = self.fetcher.fetch(source).await?;

        tracing::debug!(feed = %source, state = %FeedState::Parsing, "Feed state");
        let entries = parse_feed(&bytes)?;

        self.process_entries(source, &entries).await
    }

    /// Dispatches already-parsed entries. `process` minus the network fetch.
    pub async fn process_entries(
        &self,
        source: &str,
        entries: &[FeedEntry],
    ) -> Result<FeedOutcome, FeedError> {
        tracing::debug!(
            feed = %source,
            state = %FeedState::Iterating,
            entries = entries.len(),
            "Feed state"
        );

        let mut outcome = FeedOutcome {
            source: source.to_string(),
            entries: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            let Some(identifier) = entry.identifier.as_deref() else {
                tracing::warn!(
                    feed = %source,
                    title = %entry.title,
                    "Entry has no guid or link, it will be sent on every run"
                );
                self.dispatch(entry, "<no identifier>").await?;
                outcome.dispatched += 1;
                continue;
            };

            let claim = self
                .ledger
                .claim(identifier)
                .await
                .map_err(|source| FeedError::Storage {
                    identifier: Some(identifier.to_string()),
                    source,
                })?;

            match claim {
                Claim::Seen | Claim::InFlight => {
                    tracing::trace!(feed = %source, identifier = %identifier, ?claim, "Skipping entry");
                    outcome.skipped += 1;
                    continue;
                }
                Claim::Claimed => {}
            }

            if let Err(e) = self.dispatch(entry, identifier).await {
                self.ledger.release(identifier).await;
                return Err(e);
            }

            self.ledger
                .complete(identifier)
                .await
                .map_err(|source| FeedError::Storage {
                    identifier: Some(identifier.to_string()),
                    source,
                })?;
            tracing::debug!(feed = %source, identifier = %identifier, "Entry dispatched");
            outcome.dispatched += 1;
        }

        tracing::debug!(
            feed = %source,
            state = %FeedState::Done,
            dispatched = outcome.dispatched,
            skipped = outcome.skipped,
            "Feed state"
        );
        Ok(outcome)
    }

    async fn dispatch(&self, entry: &FeedEntry, identifier: &str) -> Result<(), FeedError> {
        if self.sinks.is_empty() {
            return Ok(());
        }

        let request = NotificationRequest::from_entry(entry);
        for sink in self.sinks.iter() {
            sink.dispatch(&request)
                .await
                .map_err(|source| FeedError::Dispatch {
                    identifier: identifier.to_string(),
                    sink: sink.name(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::DEFAULT_TIMEOUT;
    use crate::notify::NotificationSink;
    use crate::storage::MemorySeenStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        titles: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl NotificationSink for Arc<Recorder> {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn dispatch(&self, request: &NotificationRequest) -> Result<(), DispatchError> {
            if self.fail_on == Some(request.title.as_str()) {
                return Err(DispatchError::Rejected {
                    sink: "recorder",
                    reason: "refused".into(),
                });
            }
            self.titles.lock().unwrap().push(request.title.clone());
            Ok(())
        }
    }

    fn entry(id: Option<&str>, title: &str) -> FeedEntry {
        FeedEntry {
            identifier: id.map(str::to_string),
            title: title.into(),
            ..Default::default()
        }
    }

    fn processor(store: Arc<MemorySeenStore>, recorder: &Arc<Recorder>) -> FeedProcessor {
        FeedProcessor::new(
            FeedFetcher::new(DEFAULT_TIMEOUT).unwrap(),
            Arc::new(SeenLedger::new(store)),
            SinkSet::new().with(Arc::clone(recorder)),
        )
    }

    #[tokio::test]
    async fn test_new_entries_dispatched_then_recorded() {
        let store = Arc::new(MemorySeenStore::with_identifiers(["old"]));
        let recorder = Arc::new(Recorder::default());
        let p = processor(store.clone(), &recorder);

        let entries = [entry(Some("old"), "Old"), entry(Some("new"), "New")];
        let outcome = p.process_entries("feed", &entries).await.unwrap();

        assert_eq!(outcome.entries, 2);
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(*recorder.titles.lock().unwrap(), vec!["New".to_string()]);
        assert_eq!(store.identifiers(), vec!["new".to_string(), "old".to_string()]);
    }

    #[tokio::test]
    async fn test_entry_without_identifier_always_sent_never_recorded() {
        let store = Arc::new(MemorySeenStore::new());
        let recorder = Arc::new(Recorder::default());
        let p = processor(store.clone(), &recorder);

        let entries = [entry(None, "Anonymous")];
        p.process_entries("feed", &entries).await.unwrap();
        p.process_entries("feed", &entries).await.unwrap();

        assert_eq!(recorder.titles.lock().unwrap().len(), 2);
        assert!(store.identifiers().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_halts_feed_without_recording() {
        let store = Arc::new(MemorySeenStore::new());
        let recorder = Arc::new(Recorder {
            fail_on: Some("Second"),
            ..Default::default()
        });
        let p = processor(store.clone(), &recorder);

        let entries = [
            entry(Some("a"), "First"),
            entry(Some("b"), "Second"),
            entry(Some("c"), "Third"),
        ];
        let err = p.process_entries("feed", &entries).await.unwrap_err();

        match err {
            FeedError::Dispatch {
                identifier, sink, ..
            } => {
                assert_eq!(identifier, "b");
                assert_eq!(sink, "recorder");
            }
            other => panic!("Expected Dispatch, got {:?}", other),
        }
        assert_eq!(store.identifiers(), vec!["a".to_string()]);
        assert_eq!(*recorder.titles.lock().unwrap(), vec!["First".to_string()]);
        // The failed claim was released
        assert_eq!(p.ledger().claim("b").await.unwrap(), Claim::Claimed);
    }

    #[tokio::test]
    async fn test_empty_sink_set_still_records() {
        let store = Arc::new(MemorySeenStore::new());
        let p = FeedProcessor::new(
            FeedFetcher::new(DEFAULT_TIMEOUT).unwrap(),
            Arc::new(SeenLedger::new(store.clone())),
            SinkSet::new(),
        );

        let outcome = p
            .process_entries("feed", &[entry(Some("a"), "A")])
            .await
            .unwrap();
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(store.identifiers(), vec!["a".to_string()]);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(FeedState::Iterating.to_string(), "iterating");
        assert_eq!(FeedState::Failed.to_string(), "failed");
    }
}
