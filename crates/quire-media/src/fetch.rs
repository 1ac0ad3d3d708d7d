//! Fetches an external media URL under a time and size budget (§4.6).

use std::time::Duration;

use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::directive::MediaKind;
use crate::LOG_TARGET;

pub const SIZE_CEILING_BYTES: u64 = 50 * 1024 * 1024;

const STREAMING_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    "soundcloud.com",
];

/// True if `url` names a streaming-service host the embedder must leave
/// external rather than inline (§4.6).
pub fn is_streaming_host(url: &str) -> bool {
    STREAMING_HOSTS.iter().any(|host| url.contains(host))
}

pub fn budget_for(kind: MediaKind) -> Duration {
    match kind {
        MediaKind::Image => Duration::from_secs(10),
        MediaKind::Video | MediaKind::Audio => Duration::from_secs(30),
    }
}

#[derive(Debug, Snafu)]
pub enum FetchError {
    #[snafu(display("streaming host rejected"))]
    StreamingHost,
    #[snafu(display("response exceeded the 50 MiB ceiling"))]
    Oversize,
    #[snafu(display("fetch timed out"))]
    Timeout,
    #[snafu(display("request failed: {source}"))]
    Request { source: reqwest::Error },
}

pub type FetchResult<T> = Result<T, FetchError>;

/// The fetched bytes plus their detected content type.
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

fn extension_content_type(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or("");
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// Fetches `url`, enforcing `budget` and the 50 MiB absolute ceiling via
/// both the declared content length and the observed byte count (§4.6).
pub async fn fetch(client: &reqwest::Client, url: &str, kind: MediaKind) -> FetchResult<Fetched> {
    if is_streaming_host(url) {
        return Err(FetchError::StreamingHost);
    }

    let budget = budget_for(kind);
    let response = tokio::time::timeout(budget, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .context(RequestSnafu)?;

    if let Some(len) = response.content_length() {
        if len > SIZE_CEILING_BYTES {
            debug!(target: LOG_TARGET, url, len, "oversize by content-length");
            return Err(FetchError::Oversize);
        }
    }

    let header_content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let bytes = tokio::time::timeout(budget, response.bytes())
        .await
        .map_err(|_| FetchError::Timeout)?
        .context(RequestSnafu)?;

    if bytes.len() as u64 > SIZE_CEILING_BYTES {
        debug!(target: LOG_TARGET, url, observed = bytes.len(), "oversize by observed bytes");
        return Err(FetchError::Oversize);
    }

    let content_type = header_content_type.unwrap_or_else(|| extension_content_type(url).to_string());

    Ok(Fetched {
        bytes: bytes.to_vec(),
        content_type,
    })
}
