//! Body selection and markup-to-text conversion for feed entries.

mod html;

pub use html::{html_to_text, ConversionError};

use crate::feed::FeedEntry;

/// Picks the richest body an entry carries.
///
/// `content` if non-empty, else `description` if non-empty, else `""`.
/// Whitespace-only fields count as empty.
pub fn best_body(entry: &FeedEntry) -> &str {
    if !entry.content.trim().is_empty() {
        &entry.content
    } else if !entry.description.trim().is_empty() {
        &entry.description
    } else {
        ""
    }
}

/// Converts markup to plain text, never failing.
///
/// Markup the converter rejects is returned trimmed but unconverted.
pub fn to_plain_text(markup: &str) -> String {
    match html_to_text(markup) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "Markup conversion failed, using raw text");
            markup.trim().to_string()
        }
    }
}

/// Plain-text rendering of [`best_body`]. Never fails.
pub fn plain_text(entry: &FeedEntry) -> String {
    to_plain_text(best_body(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn entry(content: &str, description: &str) -> FeedEntry {
        FeedEntry {
            identifier: Some("id".into()),
            title: "t".into(),
            content: content.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_content_preferred() {
        let e = entry("<p>full</p>", "summary");
        assert_eq!(best_body(&e), "<p>full</p>");
        assert_eq!(plain_text(&e), "full");
    }

    #[test]
    fn test_description_fallback() {
        let e = entry("", "<b>non-empty</b> summary");
        assert_eq!(best_body(&e), "<b>non-empty</b> summary");
        assert_eq!(plain_text(&e), "non-empty summary");
    }

    #[test]
    fn test_whitespace_content_falls_back() {
        let e = entry("  \n ", "summary");
        assert_eq!(best_body(&e), "summary");
    }

    #[test]
    fn test_both_empty() {
        let e = entry("", "");
        assert_eq!(best_body(&e), "");
        assert_eq!(plain_text(&e), "");
    }

    #[test]
    fn test_stray_angle_bracket_is_converted() {
        let e = entry("<p>price < 10 and <b>cheap</b></p>", "");
        assert_eq!(plain_text(&e), "price < 10 and cheap");
    }

    #[test]
    fn test_unconvertible_markup_falls_back_to_raw() {
        let markup = format!("  {}deep  ", "<div>".repeat(400));
        let e = entry(&markup, "");
        assert_eq!(plain_text(&e), markup.trim());
    }

    proptest! {
        #[test]
        fn prop_plain_text_never_panics(content in "\\PC{0,120}", description in "\\PC{0,120}") {
            let _ = plain_text(&entry(&content, &description));
        }
    }
}
