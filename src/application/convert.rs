//! HTML to Markdown conversion of note bodies.

use std::sync::LazyLock;

use regex::Regex;

/// NoteStation wraps inline images in a decorated `<img>` whose real target
/// is the attachment's `ref` token. Rewriting it to a bare `<img src=` keeps
/// the token as the image target after conversion.
static IMAGE_WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<img class=[^>]*syno-notestation-image-object[^>]*src=[^>]*ref=")
        .unwrap_or_else(|e| unreachable!("invalid image wrapper pattern: {e}"))
});

/// Converts a note's HTML body to Markdown.
#[must_use]
pub fn html_to_markdown(html: &str) -> String {
    let cleaned = IMAGE_WRAPPER.replace_all(html, "<img src=");
    html2md::parse_html(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_wrapper_stripped() {
        let html = r#"<p>Look:</p><img class="syno-notestation-image-object" src="webman/3rdparty/NoteStation/images/transparent.gif" ref="MTcwNjg2NDg5OQ==">"#;
        let cleaned = IMAGE_WRAPPER.replace_all(html, "<img src=");
        assert!(cleaned.contains(r#"<img src="MTcwNjg2NDg5OQ==">"#));

        let markdown = html_to_markdown(html);
        assert!(markdown.contains("MTcwNjg2NDg5OQ=="));
        assert!(!markdown.contains("syno-notestation"));
    }

    #[test]
    fn test_plain_html() {
        let markdown = html_to_markdown("<p>Hello <b>world</b></p>");
        assert!(markdown.contains("Hello"));
        assert!(markdown.contains("world"));
        assert!(!markdown.contains("<p>"));
    }
}
