//! Notification sinks: where newly-seen entries are delivered.
//!
//! Every sink implements [`NotificationSink`]. The pipeline holds the enabled
//! sinks in a [`SinkSet`] and calls each in order; a sink that is not
//! configured is simply absent from the set.
//!
//! - [`pushover`] - Pushover push notifications
//! - [`sendy`] - Sendy email campaigns, optionally rendered through an [`EmailTemplate`]
//!
//! Sinks do not deduplicate. At-most-once delivery per entry comes from the
//! seen-state ordering in the pipeline.

mod pushover;
mod sendy;
mod template;

pub use pushover::{PushoverSink, PUSHOVER_API_URL};
pub use sendy::{SendySink, CAMPAIGN_PATH};
pub use template::{EmailTemplate, TemplateError};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::content;
use crate::feed::FeedEntry;

/// Errors reported by a sink for a single notification.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request never got a response (DNS, connect, TLS, timeout)
    #[error("{sink} request failed: {source}")]
    Network {
        sink: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The service answered but refused the notification
    #[error("{sink} rejected the notification: {reason}")]
    Rejected { sink: &'static str, reason: String },
}

/// Per-entry rendering handed to every sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationRequest {
    pub title: String,
    /// Best body converted to plain text
    pub plain_text_body: String,
    /// Best body as the feed supplied it (usually HTML)
    pub rich_text_body: String,
    pub link: Option<String>,
}

impl NotificationRequest {
    pub fn from_entry(entry: &FeedEntry) -> Self {
        Self {
            title: entry.title.clone(),
            plain_text_body: content::plain_text(entry),
            rich_text_body: content::best_body(entry).to_string(),
            link: entry.link.clone(),
        }
    }
}

/// An external notification target.
///
/// Each successful `dispatch` is an irreversible external side effect.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    async fn dispatch(&self, request: &NotificationRequest) -> Result<(), DispatchError>;
}

/// The enabled sinks, in dispatch order. Cloning shares the sinks.
#[derive(Clone, Default)]
pub struct SinkSet {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.push(Arc::new(sink));
        self
    }

    pub fn push(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn NotificationSink>> {
        self.sinks.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Returns the text of a non-success response for error messages.
async fn response_reason(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => {
            format!("HTTP {}: {}", status, crate::util::truncate_chars(body.trim(), 200))
        }
        _ => format!("HTTP {}", status),
    }
}
