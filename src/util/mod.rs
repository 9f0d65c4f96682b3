//! Utility functions shared by the fetch and notify layers.
//!
//! - **URL validation**: feed URLs and service endpoints
//! - **Text processing**: character-bounded truncation for size-capped APIs

mod text;
mod url;

pub use self::text::truncate_chars;
pub use self::url::{service_endpoint, validate_url, UrlValidationError};
