//! The renderer collaborator (§6): an HTTP POST to a configured external
//! service that turns assembled document content into a downloadable
//! format (epub, pdf, html5, docbook5, mobi, azw3).

use std::time::Duration;

use quire_util_error::FmtCompact;
use serde::Serialize;
use tracing::warn;

use crate::error::{AppError, AppResult};

pub const LOG_TARGET: &str = "quire::web::renderer";

const STANDARD_BUDGET: Duration = Duration::from_secs(60);
const MOBILE_BUDGET: Duration = Duration::from_secs(120);

/// Recognized output formats (§6). "Mobile" formats (`mobi`, `azw3`) get a
/// doubled time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Epub,
    Pdf,
    Html5,
    Docbook5,
    Mobi,
    Azw3,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "epub" => Some(Self::Epub),
            "pdf" => Some(Self::Pdf),
            "html5" => Some(Self::Html5),
            "docbook5" => Some(Self::Docbook5),
            "mobi" => Some(Self::Mobi),
            "azw3" => Some(Self::Azw3),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Pdf => "pdf",
            Self::Html5 => "html5",
            Self::Docbook5 => "docbook5",
            Self::Mobi => "mobi",
            Self::Azw3 => "azw3",
        }
    }

    fn budget(self) -> Duration {
        match self {
            Self::Mobi | Self::Azw3 => MOBILE_BUDGET,
            _ => STANDARD_BUDGET,
        }
    }
}

#[derive(Serialize)]
struct ConvertRequest<'a> {
    content: &'a str,
    title: &'a str,
    author: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

/// The converted document's bytes and the media type to answer the HTTP
/// caller with.
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

fn content_type_for(format: Format) -> &'static str {
    match format {
        Format::Epub => "application/epub+zip",
        Format::Pdf => "application/pdf",
        Format::Html5 => "text/html",
        Format::Docbook5 => "application/docbook+xml",
        Format::Mobi => "application/x-mobipocket-ebook",
        Format::Azw3 => "application/vnd.amazon.ebook",
    }
}

/// POSTs `{content, title, author, image?}` to `{base_url}/convert/{format}`
/// (§6). Non-2xx or a zero-byte body is `render-failed`; budget exhaustion
/// is `upstream-timeout`.
pub async fn convert(
    client: &reqwest::Client,
    base_url: &str,
    format: Format,
    content: &str,
    title: &str,
    author: &str,
    image: Option<&str>,
) -> AppResult<Rendered> {
    let url = format!("{base_url}/convert/{}", format.as_str());
    let body = ConvertRequest {
        content,
        title,
        author,
        image,
    };

    let response = tokio::time::timeout(
        format.budget(),
        client.post(&url).json(&body).send(),
    )
    .await
    .map_err(|_| AppError::UpstreamTimeout)?
    .map_err(|source| {
        warn!(target: LOG_TARGET, %url, source = %source.fmt_compact(), "renderer request failed");
        AppError::RenderFailed {
            reason: source.to_string(),
        }
    })?;

    if !response.status().is_success() {
        return Err(AppError::RenderFailed {
            reason: format!("renderer returned status {}", response.status()),
        });
    }

    let bytes = tokio::time::timeout(format.budget(), response.bytes())
        .await
        .map_err(|_| AppError::UpstreamTimeout)?
        .map_err(|source| AppError::RenderFailed {
            reason: source.to_string(),
        })?;

    if bytes.is_empty() {
        return Err(AppError::RenderFailed {
            reason: "renderer returned an empty body".to_string(),
        });
    }

    Ok(Rendered {
        bytes: bytes.to_vec(),
        content_type: content_type_for(format),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_formats_get_the_doubled_budget() {
        assert_eq!(Format::Mobi.budget(), MOBILE_BUDGET);
        assert_eq!(Format::Azw3.budget(), MOBILE_BUDGET);
        assert_eq!(Format::Epub.budget(), STANDARD_BUDGET);
    }

    #[test]
    fn format_parse_roundtrips_through_as_str() {
        for f in [
            Format::Epub,
            Format::Pdf,
            Format::Html5,
            Format::Docbook5,
            Format::Mobi,
            Format::Azw3,
        ] {
            assert_eq!(Format::parse(f.as_str()), Some(f));
        }
        assert_eq!(Format::parse("bogus"), None);
    }
}
