//! HTML escaping at the storage and display boundaries.
//!
//! Stored text is fully entity-escaped. On the way out it is unescaped and
//! re-escaped for an HTML text node, so double escaping never reaches a
//! client and nothing stored can open a tag. Picture URLs are unescaped
//! too, but any character that could end an attribute is percent-encoded.

use domains::ContentSanitizer;

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlSanitizer;

impl ContentSanitizer for HtmlSanitizer {
    fn sanitize(&self, raw: &str) -> String {
        html_escape::encode_quoted_attribute(raw).into_owned()
    }

    fn render_content(&self, stored: &str) -> String {
        let raw = html_escape::decode_html_entities(stored);
        html_escape::encode_text(&raw).into_owned()
    }

    fn render_pic(&self, stored: &str) -> String {
        let raw = html_escape::decode_html_entities(stored);
        let mut shown = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '"' => shown.push_str("%22"),
                '\'' => shown.push_str("%27"),
                '<' => shown.push_str("%3C"),
                '>' => shown.push_str("%3E"),
                '`' => shown.push_str("%60"),
                c => shown.push(c),
            }
        }
        shown
    }
}
