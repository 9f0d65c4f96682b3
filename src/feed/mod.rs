//! Feed acquisition: everything between a configured URI and parsed entries.
//!
//! - [`list`] - the plain-text list of feed URIs to poll
//! - [`fetcher`] - single-attempt HTTP retrieval with an identifying User-Agent
//! - [`parser`] - `feed-rs` wrapper producing [`FeedEntry`] values in feed order
//!
//! # Example
//!
//! ```ignore
//! use rss2push::feed::{parse_feed, FeedFetcher, FeedList, DEFAULT_TIMEOUT};
//!
//! let list = FeedList::load(path)?;
//! let fetcher = FeedFetcher::new(DEFAULT_TIMEOUT)?;
//! for uri in list.entries() {
//!     let entries = parse_feed(&fetcher.fetch(uri).await?)?;
//! }
//! ```

mod fetcher;
mod list;
mod parser;

pub use fetcher::{FeedFetcher, FetchError, DEFAULT_TIMEOUT, USER_AGENT};
pub use list::{FeedList, FeedListError};
pub use parser::{parse_feed, FeedEntry, ParseError};
