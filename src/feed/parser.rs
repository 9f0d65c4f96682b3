use chrono::{DateTime, Utc};
use feed_rs::parser;
use thiserror::Error;

/// Feed XML could not be parsed as RSS, Atom or JSON Feed.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct ParseError(#[from] parser::ParseFeedError);

/// One item of a syndication feed, as consumed by the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    /// Dedup key: the feed GUID, else the entry link.
    ///
    /// `None` when the feed supplies neither. Such entries cannot be
    /// deduplicated and are treated as new on every run.
    pub identifier: Option<String>,
    pub title: String,
    pub link: Option<String>,
    /// Full rich-text body. Empty when the feed carries none.
    pub content: String,
    /// Summary rich text, the fallback body.
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Parses raw feed bytes into entries, in the order the feed lists them.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>, ParseError> {
    // Leave missing ids empty: the GUID -> link fallback is ours to apply
    let feed = parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build()
        .parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty());
            let identifier = entry_identifier(&entry.id, link.as_deref());
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default();
            let content = entry
                .content
                .and_then(|c| c.body)
                .unwrap_or_default();
            let description = entry.summary.map(|s| s.content).unwrap_or_default();

            FeedEntry {
                identifier,
                title,
                link,
                content,
                description,
                published_at: entry.published.or(entry.updated),
            }
        })
        .collect();

    Ok(entries)
}

fn entry_identifier(guid: &str, link: Option<&str>) -> Option<String> {
    let guid = guid.trim();
    if !guid.is_empty() {
        return Some(guid.to_string());
    }
    link.map(str::to_string)
}
