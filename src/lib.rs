//! Poll syndication feeds and push new entries to Pushover or Sendy.

pub mod config;
pub mod content;
pub mod feed;
pub mod notify;
pub mod pipeline;
pub mod storage;
pub mod util;
