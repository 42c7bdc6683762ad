//! Rich-text sanitization for note content.
//!
//! User-supplied HTML is reduced to an allowlist before it ever reaches the
//! store: formatting tags plus links, images and `h1`–`h3` headings survive;
//! everything else — scripts, event handlers, inline styles, `data:` URIs —
//! is stripped. The same cleaner runs on create, update and import, so no
//! persistence path accepts raw markup.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static CLEANER: LazyLock<ammonia::Builder<'static>> = LazyLock::new(|| {
    let mut builder = ammonia::Builder::new();
    builder
        .tags(HashSet::from([
            "a", "b", "blockquote", "br", "code", "div", "em", "h1", "h2", "h3", "hr", "i", "img",
            "li", "ol", "p", "pre", "s", "span", "strong", "u", "ul",
        ]))
        .tag_attributes(HashMap::from([
            ("a", HashSet::from(["href", "name", "target"])),
            ("img", HashSet::from(["src", "alt"])),
        ]))
        // No data: scheme and no inline style — tighter than a typical
        // editor default, on purpose.
        .url_schemes(HashSet::from(["http", "https", "mailto"]))
        .link_rel(Some("noopener noreferrer"));
    builder
});

/// Sanitize one content field. Always returns well-formed HTML.
pub fn clean(html: &str) -> String {
    CLEANER.clean(html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_removed_paragraph_kept() {
        let out = clean("<script>alert(1)</script><p>ok</p>");
        assert!(!out.contains("script"));
        assert!(out.contains("<p>ok</p>"));
    }

    #[test]
    fn event_handlers_are_stripped() {
        let out = clean(r#"<p onclick="steal()">hi</p>"#);
        assert!(!out.contains("onclick"));
        assert!(out.contains("hi"));
    }

    #[test]
    fn headings_images_and_links_survive() {
        let out = clean(r#"<h2>Title</h2><img src="https://x.test/a.png" alt="a"><a href="https://x.test">x</a>"#);
        assert!(out.contains("<h2>Title</h2>"));
        assert!(out.contains(r#"src="https://x.test/a.png""#));
        assert!(out.contains("href="));
    }

    #[test]
    fn data_uri_is_dropped() {
        let out = clean(r#"<img src="data:text/html;base64,PHNjcmlwdD4=" alt="x">"#);
        assert!(!out.contains("data:"));
    }

    #[test]
    fn inline_style_is_dropped() {
        let out = clean(r#"<p style="position:fixed">text</p>"#);
        assert!(!out.contains("style"));
        assert!(out.contains("text"));
    }

    #[test]
    fn links_get_safe_rel() {
        let out = clean(r#"<a href="https://x.test" target="_blank">x</a>"#);
        assert!(out.contains("noopener"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean("middleware and jwt"), "middleware and jwt");
    }
}
