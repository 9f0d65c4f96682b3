use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to read email template '{path}': {source}")]
pub struct TemplateError {
    pub path: PathBuf,
    #[source]
    source: std::io::Error,
}

/// Named in the warning for a template that uses neither.
const PLACEHOLDERS: &str = "{{.Title}} or {{.Body}}";

/// HTML email body with `{{.Title}}` and `{{.Body}}` placeholders.
///
/// Placeholder names are case-insensitive, the leading dot is optional and
/// whitespace inside the braces is ignored, so `{{ title }}` works too.
/// Unknown placeholders are left in the output untouched.
#[derive(Debug, Clone)]
pub struct EmailTemplate {
    source: String,
}

impl EmailTemplate {
    /// Reads the template once, at startup.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError {
            path: path.to_path_buf(),
            source,
        })?;
        let template = Self::from_source(source);
        if !template.has_placeholders() {
            tracing::warn!(
                path = %path.display(),
                expected = PLACEHOLDERS,
                "Email template has no placeholder"
            );
        }
        Ok(template)
    }

    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    fn has_placeholders(&self) -> bool {
        self.render("\u{0}", "\u{0}") != self.source
    }

    pub fn render(&self, title: &str, body: &str) -> String {
        let mut out = String::with_capacity(self.source.len() + title.len() + body.len());
        let mut rest = self.source.as_str();

        while let Some(open) = rest.find("{{") {
            let Some(close) = rest[open + 2..].find("}}") else {
                break;
            };
            let inner = &rest[open + 2..open + 2 + close];
            let key = inner.trim().trim_start_matches('.');

            out.push_str(&rest[..open]);
            if key.eq_ignore_ascii_case("title") {
                out.push_str(title);
            } else if key.eq_ignore_ascii_case("body") {
                out.push_str(body);
            } else {
                out.push_str(&rest[open..open + 2 + close + 2]);
            }
            rest = &rest[open + 2 + close + 2..];
        }

        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_go_style_placeholders() {
        let t = EmailTemplate::from_source("<h1>{{.Title}}</h1><div>{{.Body}}</div>");
        assert_eq!(
            t.render("Hello", "<p>World</p>"),
            "<h1>Hello</h1><div><p>World</p></div>"
        );
    }

    #[test]
    fn test_render_relaxed_spelling_and_repeats() {
        let t = EmailTemplate::from_source("{{ title }} / {{TITLE}} / {{ .body }}");
        assert_eq!(t.render("T", "B"), "T / T / B");
    }

    #[test]
    fn test_unknown_and_unterminated_placeholders_kept() {
        let t = EmailTemplate::from_source("{{.Author}} {{.Title}} {{oops");
        assert_eq!(t.render("T", "B"), "{{.Author}} T {{oops");
    }

    #[test]
    fn test_warning_names_real_placeholders() {
        let t = EmailTemplate::from_source(PLACEHOLDERS);
        assert!(t.has_placeholders());
        assert_eq!(t.render("T", "B"), "T or B");
    }

    #[test]
    fn test_values_are_not_re_expanded() {
        let t = EmailTemplate::from_source("{{.Title}}");
        assert_eq!(t.render("{{.Body}}", "B"), "{{.Body}}");
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(EmailTemplate::from_source("x {{.Body}}").has_placeholders());
        assert!(!EmailTemplate::from_source("static").has_placeholders());
    }

    #[test]
    fn test_load_missing_file() {
        let err = EmailTemplate::load(Path::new("/tmp/rss2push_missing_template.html")).unwrap_err();
        assert!(err.to_string().contains("rss2push_missing_template.html"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("rss2push_template_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("email.html");
        std::fs::write(&path, "<b>{{.Title}}</b>").unwrap();

        let t = EmailTemplate::load(&path).unwrap();
        assert_eq!(t.render("Hi", ""), "<b>Hi</b>");

        std::fs::remove_dir_all(&dir).ok();
    }
}
