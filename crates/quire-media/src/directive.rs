//! Finds and splices media directives inside a content string (§4.6).
//!
//! Directives are recognized by regex over three shapes: markdown image
//! links (`![alt](url "title")`) and HTML5 `<video src="...">` /
//! `<audio src="...">` tags, matching the djot/markdown passthrough content
//! `quire` otherwise leaves untouched.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

/// One matched directive: its byte span in the source content, the kind,
/// the external URL, and the surrounding text to preserve verbatim when
/// splicing a replacement back in.
#[derive(Debug, Clone)]
pub struct Directive {
    pub start: usize,
    pub end: usize,
    pub kind: MediaKind,
    pub url: String,
    /// The full matched text, reusable as a fallback if the fetch fails.
    pub original: String,
    /// For an image: the alt text and, if present, the `"title"` clause
    /// verbatim (including its leading space and quotes). For video/audio:
    /// the tag's other attributes, pre- and post-`src`, verbatim.
    pub attrs: (String, String),
}

fn image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"!\[([^\]]*)\]\(([^)\s]+)(\s+"[^"]*")?\)"#).expect("valid"))
}

fn video_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<video\b([^>]*?)\bsrc="([^"]+)"([^>]*)>"#).expect("valid"))
}

fn audio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<audio\b([^>]*?)\bsrc="([^"]+)"([^>]*)>"#).expect("valid"))
}

/// Scans `content` once for every directive of every kind, returning them
/// in source order with non-overlapping spans — rebuilding from these spans
/// avoids the reverse-index-scan ambiguity of a naive find-and-replace.
pub fn find_directives(content: &str) -> Vec<Directive> {
    let mut found: Vec<Directive> = Vec::new();

    for m in image_re().captures_iter(content) {
        let whole = m.get(0).expect("group 0 always matches");
        let alt = m.get(1).map(|g| g.as_str()).unwrap_or("").to_string();
        let title = m.get(3).map(|g| g.as_str()).unwrap_or("").to_string();
        found.push(Directive {
            start: whole.start(),
            end: whole.end(),
            kind: MediaKind::Image,
            url: m.get(2).expect("url group").as_str().to_string(),
            original: whole.as_str().to_string(),
            attrs: (alt, title),
        });
    }
    for m in video_re().captures_iter(content) {
        let whole = m.get(0).expect("group 0 always matches");
        let pre = m.get(1).map(|g| g.as_str()).unwrap_or("").to_string();
        let post = m.get(3).map(|g| g.as_str()).unwrap_or("").to_string();
        found.push(Directive {
            start: whole.start(),
            end: whole.end(),
            kind: MediaKind::Video,
            url: m.get(2).expect("url group").as_str().to_string(),
            original: whole.as_str().to_string(),
            attrs: (pre, post),
        });
    }
    for m in audio_re().captures_iter(content) {
        let whole = m.get(0).expect("group 0 always matches");
        let pre = m.get(1).map(|g| g.as_str()).unwrap_or("").to_string();
        let post = m.get(3).map(|g| g.as_str()).unwrap_or("").to_string();
        found.push(Directive {
            start: whole.start(),
            end: whole.end(),
            kind: MediaKind::Audio,
            url: m.get(2).expect("url group").as_str().to_string(),
            original: whole.as_str().to_string(),
            attrs: (pre, post),
        });
    }

    found.sort_by_key(|d| d.start);
    found
}

/// Rebuilds `content`, replacing each directive's span with
/// `replacements[i]` (or leaving its original text if the slot is `None`).
/// Directives must be in ascending, non-overlapping span order — the order
/// [`find_directives`] returns.
pub fn splice(content: &str, directives: &[Directive], replacements: &[Option<String>]) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for (directive, replacement) in directives.iter().zip(replacements) {
        if directive.start < cursor {
            // Overlapping directive spans (e.g. a malformed nested match);
            // skip rather than corrupt the rebuild.
            continue;
        }
        out.push_str(&content[cursor..directive.start]);
        match replacement {
            Some(text) => out.push_str(text),
            None => out.push_str(&directive.original),
        }
        cursor = directive.end;
    }
    out.push_str(&content[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_markdown_image_and_html_video_in_order() {
        let content = r#"look: ![a cat](https://example.com/cat.jpg) and <video src="https://example.com/v.mp4" controls>"#;
        let directives = find_directives(content);
        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].kind, MediaKind::Image);
        assert_eq!(directives[1].kind, MediaKind::Video);
        assert_eq!(directives[1].url, "https://example.com/v.mp4");
    }

    #[test]
    fn splice_leaves_untouched_spans_and_replaces_matched_ones() {
        let content = "before ![x](http://a/1.png) after";
        let directives = find_directives(content);
        let out = splice(content, &directives, &[Some("REPLACED".to_string())]);
        assert_eq!(out, "before REPLACED after");
    }

    #[test]
    fn splice_falls_back_to_original_text_when_replacement_is_none() {
        let content = "![x](http://a/1.png)";
        let directives = find_directives(content);
        let out = splice(content, &directives, &[None]);
        assert_eq!(out, content);
    }

    #[test]
    fn duplicate_urls_across_two_directives_each_get_their_own_span() {
        let content = "![a](http://a/1.png) ![b](http://a/1.png)";
        let directives = find_directives(content);
        assert_eq!(directives.len(), 2);
        let out = splice(
            content,
            &directives,
            &[Some("X".to_string()), Some("Y".to_string())],
        );
        assert_eq!(out, "X Y");
    }
}
