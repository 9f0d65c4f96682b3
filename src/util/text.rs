use std::borrow::Cow;

/// Ellipsis appended when text is cut
const ELLIPSIS: &str = "...";
/// Length of the ellipsis in characters
const ELLIPSIS_LEN: usize = 3;

/// Truncates a string to at most `max_chars` Unicode scalar values.
///
/// Services such as Pushover cap message length in characters, not bytes,
/// so the cut never lands inside a multi-byte character. When truncation is
/// needed the result ends in `"..."` and still fits within `max_chars`.
///
/// Returns `Cow::Borrowed` when the input already fits.
///
/// # Examples
///
/// ```
/// use rss2push::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 8), "Hello...");
/// assert_eq!(truncate_chars("héllo wörld", 8), "héllo...");
/// assert_eq!(truncate_chars("Test", 2), "Te");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    // Fast path: byte length bounds char count
    if s.len() <= max_chars {
        return Cow::Borrowed(s);
    }

    let mut indices = s.char_indices().map(|(i, _)| i);
    // Byte offset of the first char past the limit, if any
    let Some(overflow) = indices.nth(max_chars) else {
        return Cow::Borrowed(s);
    };

    // Too narrow for text plus ellipsis: hard cut
    if max_chars <= ELLIPSIS_LEN {
        return Cow::Owned(s[..overflow].to_string());
    }

    let keep = max_chars - ELLIPSIS_LEN;
    let cut = s
        .char_indices()
        .nth(keep)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    Cow::Owned(format!("{}{}", s[..cut].trim_end(), ELLIPSIS))
}
