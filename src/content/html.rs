use scraper::{ElementRef, Html, Node};
use thiserror::Error;

/// Elements nested deeper than this are not walked.
const MAX_DEPTH: usize = 256;

/// The markup could not be rendered as text.
#[derive(Debug, Error)]
#[error("Markup nested deeper than {limit} elements")]
pub struct ConversionError {
    pub limit: usize,
}

/// Converts an HTML fragment to readable plain text.
///
/// The fragment is parsed with html5ever, so unclosed and mismatched tags,
/// stray `<` in text and the full set of named entities behave the way a
/// browser would treat them. Block elements become line breaks, list items
/// get a `* ` bullet, links whose text differs from their target get the
/// target appended in parentheses, and `<script>`/`<style>` content is
/// dropped.
///
/// # Errors
///
/// Returns [`ConversionError`] when the element tree is nested deeper than
/// the walker accepts. Callers are expected to fall back to the raw input.
pub fn html_to_text(html: &str) -> Result<String, ConversionError> {
    let fragment = Html::parse_fragment(html);
    let mut out = TextBuilder::default();
    walk(fragment.root_element(), &mut out, 0)?;
    Ok(out.finish())
}

fn walk(
    element: ElementRef<'_>,
    out: &mut TextBuilder,
    depth: usize,
) -> Result<(), ConversionError> {
    if depth > MAX_DEPTH {
        return Err(ConversionError { limit: MAX_DEPTH });
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_text(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child.value().name();
                if is_skipped(name) {
                    continue;
                }

                out.open(name);
                let anchor = (name == "a")
                    .then(|| link_target(&child))
                    .flatten()
                    .map(|href| (href, out.len()));
                walk(child, out, depth + 1)?;
                if let Some((href, start)) = anchor {
                    out.close_anchor(&href, start);
                }
                out.close(name);
            }
            // Comments, doctype, processing instructions
            _ => {}
        }
    }
    Ok(())
}

fn is_skipped(name: &str) -> bool {
    matches!(name, "script" | "style" | "head" | "title" | "noscript" | "template")
}

fn link_target(element: &ElementRef<'_>) -> Option<String> {
    let href = element.value().attr("href")?.trim();
    (href.starts_with("http://") || href.starts_with("https://")).then(|| href.to_string())
}

/// Accumulates text with HTML whitespace rules: runs collapse to one space,
/// block boundaries become newlines.
#[derive(Default)]
struct TextBuilder {
    out: String,
    pending_space: bool,
}

impl TextBuilder {
    fn len(&self) -> usize {
        self.out.len()
    }

    fn push_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_space && !self.out.is_empty() && !self.out.ends_with('\n') {
                self.out.push(' ');
            }
            self.pending_space = false;
            self.out.push(ch);
        }
    }

    fn newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.pending_space = false;
    }

    fn paragraph(&mut self) {
        self.newline();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn open(&mut self, name: &str) {
        match name {
            "br" | "tr" => self.newline(),
            "li" => {
                self.newline();
                self.out.push_str("* ");
            }
            "hr" => {
                self.paragraph();
                self.out.push_str("---");
                self.paragraph();
            }
            name if is_block(name) => self.paragraph(),
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "li" | "tr" => self.newline(),
            name if is_block(name) => self.paragraph(),
            _ => {}
        }
    }

    fn close_anchor(&mut self, href: &str, start: usize) {
        let text = self.out.get(start..).unwrap_or("").trim();
        if text == href {
            return;
        }
        if text.is_empty() {
            self.push_text(href);
        } else {
            self.push_text(&format!(" ({})", href));
        }
    }

    fn finish(self) -> String {
        let lines: Vec<&str> = self.out.lines().map(str::trim_end).collect();
        lines.join("\n").trim().to_string()
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "ul"
            | "ol"
            | "table"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "figure"
            | "figcaption"
    )
}
