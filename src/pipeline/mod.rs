//! The polling pass: feed list in, notifications and seen-state out.
//!
//! [`Orchestrator`] fans the feed list out over a bounded number of
//! [`FeedProcessor`] tasks and collects a [`RunResult`].

mod orchestrator;
mod processor;

pub use orchestrator::{
    FeedFailure, Orchestrator, RunResult, DEFAULT_CONCURRENCY, SEEN_STORE_SOURCE,
};
pub use processor::{FeedError, FeedOutcome, FeedProcessor, FeedState};
