use std::collections::HashSet;

use ammonia::Builder;

/// Tags a saved document may keep. Everything else is stripped, text kept.
const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "strong", "i", "em", "u", "s", "del", "ins", "mark", "code", "pre",
    "blockquote", "p", "br", "hr", "span", "div", "ul", "ol", "li", "h1", "h2", "h3", "h4",
    "h5", "h6", "table", "thead", "tbody", "tr", "th", "td",
];

const LINK_ATTRIBUTES: &[&str] = &["href", "title", "rel", "target"];

/// Tags whose text content is dropped together with the tag.
const DROPPED_CONTENT_TAGS: &[&str] = &["script", "style"];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Allow-list markup filter applied to every saved document.
pub struct ContentSanitizer {
    builder: Builder<'static>,
}

impl ContentSanitizer {
    pub fn new() -> Self {
        let mut builder = Builder::empty();
        builder
            .add_tags(ALLOWED_TAGS.iter())
            .add_tag_attributes("a", LINK_ATTRIBUTES.iter())
            .clean_content_tags(DROPPED_CONTENT_TAGS.iter().copied().collect::<HashSet<_>>())
            .url_schemes(URL_SCHEMES.iter().copied().collect::<HashSet<_>>())
            .link_rel(None)
            .strip_comments(true);
        Self { builder }
    }

    /// Strip everything outside the allow-list.
    pub fn sanitize(&self, input: &str) -> String {
        self.builder.clean(input).to_string()
    }
}

impl Default for ContentSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSanitizer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        let s = ContentSanitizer::new();
        assert_eq!(s.sanitize("call the venue at 5"), "call the venue at 5");
    }

    #[test]
    fn test_allowed_markup_kept() {
        let s = ContentSanitizer::new();
        let input = "<p>Agenda: <strong>tracks</strong></p><ul><li>one</li></ul>";
        assert_eq!(s.sanitize(input), input);
    }

    #[test]
    fn test_script_removed_with_content() {
        let s = ContentSanitizer::new();
        let out = s.sanitize("<p>hi</p><script>alert(1)</script>");
        assert_eq!(out, "<p>hi</p>");
    }

    #[test]
    fn test_unknown_tags_and_attributes_stripped() {
        let s = ContentSanitizer::new();
        let out = s.sanitize(r#"<p onclick="x()">a<iframe src="y"></iframe><font>b</font></p>"#);
        assert_eq!(out, "<p>ab</p>");
    }

    #[test]
    fn test_link_scheme_filtered() {
        let s = ContentSanitizer::new();
        let out = s.sanitize(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!out.contains("javascript"));
        let out = s.sanitize(r#"<a href="https://example.org" title="t">x</a>"#);
        assert_eq!(out, r#"<a href="https://example.org" title="t">x</a>"#);
    }
}
