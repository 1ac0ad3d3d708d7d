//! The media embedder (§4.6): walks a content string for image/video/audio
//! directives, fetches each external URL under a budget, optionally
//! recompresses images, and splices the result back as a base-64 data URI.

pub mod directive;
pub mod fetch;
pub mod recompress;

use base64::Engine;
use quire_util_error::FmtCompact;
use tracing::warn;

use directive::{find_directives, splice, Directive, MediaKind};
use fetch::SIZE_CEILING_BYTES;

pub const LOG_TARGET: &str = "quire::media";

async fn resolve_one(client: &reqwest::Client, directive: &Directive, images_only: bool) -> Option<String> {
    if images_only && directive.kind != MediaKind::Image {
        return None;
    }
    let fetched = match fetch::fetch(client, &directive.url, directive.kind).await {
        Ok(fetched) => fetched,
        Err(err) => {
            warn!(target: LOG_TARGET, url = %directive.url, err = %err.fmt_compact(), "media fetch failed, leaving external url");
            return None;
        }
    };

    let (bytes, content_type) = if directive.kind == MediaKind::Image {
        match recompress::recompress(&fetched.bytes, &fetched.content_type) {
            Some((smaller, out_content_type)) => (smaller, out_content_type.to_string()),
            None => (fetched.bytes, fetched.content_type),
        }
    } else {
        (fetched.bytes, fetched.content_type)
    };

    let data_uri = format!(
        "data:{};base64,{}",
        content_type,
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );
    Some(render_directive(directive, &data_uri))
}

fn render_directive(directive: &Directive, data_uri: &str) -> String {
    let (before, after) = &directive.attrs;
    match directive.kind {
        MediaKind::Image => format!("![{before}]({data_uri}{after})"),
        MediaKind::Video => format!("<video{before}src=\"{data_uri}\"{after}>"),
        MediaKind::Audio => format!("<audio{before}src=\"{data_uri}\"{after}>"),
    }
}

/// Embeds every recognized media directive in `content` as an inline data
/// URI (§4.6). If the result exceeds the 50 MiB ceiling, re-runs in
/// images-only mode, leaving video/audio directives as external URLs.
pub async fn embed(client: &reqwest::Client, content: &str) -> String {
    let embedded = embed_pass(client, content, false).await;
    if embedded.len() as u64 <= SIZE_CEILING_BYTES {
        return embedded;
    }
    warn!(target: LOG_TARGET, size = embedded.len(), "embedded document oversize, retrying images-only");
    embed_pass(client, content, true).await
}

async fn embed_pass(client: &reqwest::Client, content: &str, images_only: bool) -> String {
    let directives = find_directives(content);
    let mut replacements = Vec::with_capacity(directives.len());
    for directive in &directives {
        replacements.push(resolve_one(client, directive, images_only).await);
    }
    splice(content, &directives, &replacements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streaming_host_is_left_as_an_external_url() {
        let client = reqwest::Client::new();
        let content = r#"<video src="https://youtube.com/watch?v=x">"#;
        let out = embed(&client, content).await;
        assert_eq!(out, content);
    }

    #[tokio::test]
    async fn unreachable_url_leaves_the_original_directive_in_place() {
        let client = reqwest::Client::new();
        let content = "![alt](http://127.0.0.1:1/nope.png)";
        let out = embed(&client, content).await;
        assert_eq!(out, content);
    }

    #[tokio::test]
    async fn content_with_no_directives_is_unchanged() {
        let client = reqwest::Client::new();
        let content = "just some plain text with no media at all.";
        let out = embed(&client, content).await;
        assert_eq!(out, content);
    }
}
