//! The HTTP surface (§6): one handler per named route, each accepting an
//! optional `relays=` override that becomes part of the cache keys the
//! orchestrator uses underneath.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use maud::Markup;
use sha2::{Digest, Sha256};

use quire_core::{kind, Address};

use crate::error::{AppError, AppResult};
use crate::renderer::{self, Format};
use crate::templates;
use crate::{orchestrator, SharedState};

/// Wraps [`maud::Markup`] as an `text/html` response (mirrors the teacher's
/// `Maud` newtype).
struct Html(Markup);

impl IntoResponse for Html {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
            self.0.into_string(),
        )
            .into_response()
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(detail))
        .route("/books", get(books))
        .route("/articles", get(articles))
        .route("/highlights", get(highlights))
        .route("/view", get(view))
        .route("/view-epub", get(view_epub))
        .route("/download", get(download))
        .route("/status", get(status))
        .route("/clear-cache", post(clear_cache))
        .route("/image-proxy", get(image_proxy))
        .route("/healthz", get(healthz))
        .with_state(state)
}

fn relay_override(params: &HashMap<String, String>) -> Option<Vec<String>> {
    params
        .get("relays")
        .map(|s| s.split(',').map(str::trim).map(String::from).collect())
}

fn parse_limit(params: &HashMap<String, String>, default: u32) -> u32 {
    params
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Decodes the `addr=` query parameter as a replaceable address, resolving
/// the relay set per §4.3's explicit-then-address-hint-then-default rule,
/// honoring this instance's configured defaults.
fn decode_addr(
    state: &SharedState,
    params: &HashMap<String, String>,
) -> AppResult<(quire_core::ReplaceableAddress, Vec<String>)> {
    let raw = params.get("addr").ok_or(AppError::NotFound)?;
    let address = Address::decode(raw).map_err(|source| AppError::BadAddress { source })?;
    let (kind, author, d, addr_relays) = address.expect_naddr().map_err(|source| AppError::BadAddress { source })?;

    let is_publication = kind::is_publication_index(kind) || kind::is_publication_part(kind);
    if !is_publication && !kind::is_article(kind) {
        return Err(AppError::UnsupportedKind { kind });
    }

    let explicit = relay_override(params);
    let relays = if let Some(explicit) = explicit.filter(|r| !r.is_empty()) {
        explicit
    } else if !addr_relays.is_empty() {
        addr_relays
    } else if is_publication {
        state.publication_relays.clone()
    } else {
        state.article_relays.clone()
    };

    Ok((quire_core::ReplaceableAddress { kind, author, d }, relays))
}

async fn lookup(state: &SharedState, params: &HashMap<String, String>) -> AppResult<quire_core::Event> {
    let (addr, relays) = decode_addr(state, params)?;
    if kind::is_article(addr.kind) {
        orchestrator::article(&state.cache, &state.transport, &addr, &relays).await
    } else {
        orchestrator::publication(&state.cache, &state.transport, &addr, &relays).await
    }
}

async fn hierarchy_for(
    state: &SharedState,
    event: &quire_core::Event,
    relays: &[String],
) -> Option<Vec<quire_core::HierarchyNode>> {
    if !kind::is_publication_index(event.kind) {
        return None;
    }
    let key = event.id.to_string();
    if let Some(node) = state.cache.hierarchy.get(&key) {
        return Some(node.children);
    }
    let children = quire_assembler::build(state.transport.clone(), event.clone(), relays.to_vec()).await;
    state.cache.hierarchy.set(
        key,
        quire_core::HierarchyNode {
            event: event.clone(),
            children: children.clone(),
        },
    );
    Some(children)
}

async fn detail(State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>) -> AppResult<Response> {
    let (addr, relays) = decode_addr(&state, &params)?;
    let event = lookup(&state, &params).await?;
    let hierarchy = hierarchy_for(&state, &event, &relays).await;
    let _ = addr;
    Ok(Html(templates::detail_page(&event, hierarchy.as_deref(), &event.content)).into_response())
}

async fn view(State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>) -> AppResult<Response> {
    let (_, relays) = decode_addr(&state, &params)?;
    let event = lookup(&state, &params).await?;
    let hierarchy = hierarchy_for(&state, &event, &relays).await;
    let embedded = quire_media::embed(&state.http, &event.content).await;
    Ok(Html(templates::detail_page(&event, hierarchy.as_deref(), &embedded)).into_response())
}

fn title_and_author(event: &quire_core::Event) -> (String, String) {
    let title = event
        .tags
        .iter()
        .find(|t| t.is_named("title"))
        .and_then(|t| t.value())
        .unwrap_or("untitled")
        .to_string();
    (title, event.author.to_string())
}

async fn render_event(state: &SharedState, event: &quire_core::Event, format: Format) -> AppResult<renderer::Rendered> {
    let embedded = quire_media::embed(&state.http, &event.content).await;
    let (title, author) = title_and_author(event);
    let mut hasher = Sha256::new();
    hasher.update(embedded.as_bytes());
    hasher.update(format.as_str().as_bytes());
    let hash = hasher.finalize();
    let cache_key = format!("{hash:x}:{}", format.as_str());

    if let Some(cached) = state.cache.derived_file.get(&cache_key) {
        return Ok(renderer::Rendered {
            bytes: cached.bytes,
            content_type: cached.content_type,
        });
    }

    let rendered = renderer::convert(
        &state.http,
        &state.renderer_base_url,
        format,
        &embedded,
        &title,
        &author,
        None,
    )
    .await?;

    state.cache.derived_file.set(
        cache_key,
        quire_cache::DerivedFile {
            bytes: rendered.bytes.clone(),
            content_type: rendered.content_type,
        },
    );
    Ok(rendered)
}

async fn view_epub(State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>) -> AppResult<Response> {
    let event = lookup(&state, &params).await?;
    let rendered = render_event(&state, &event, Format::Epub).await?;
    Ok(([(header::CONTENT_TYPE, rendered.content_type)], rendered.bytes).into_response())
}

async fn download(State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>) -> AppResult<Response> {
    let format = params
        .get("format")
        .and_then(|s| Format::parse(s))
        .ok_or(AppError::UnsupportedKind { kind: 0 })?;
    let event = lookup(&state, &params).await?;
    let rendered = render_event(&state, &event, format).await?;
    Ok(([(header::CONTENT_TYPE, rendered.content_type)], rendered.bytes).into_response())
}

async fn books(State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let relays = relay_override(&params).unwrap_or_else(|| state.publication_relays.clone());
    let events = if let Some(q) = params.get("q").filter(|q| !q.is_empty()) {
        let results = orchestrator::search(&state.cache, &state.transport, q, &relays).await;
        results
            .into_iter()
            .filter(|e| quire_core::kind::is_publication_index(e.kind))
            .collect()
    } else {
        let limit = parse_limit(&params, 50);
        orchestrator::list_publications(&state.cache, &state.transport, limit, &relays).await
    };
    Html(templates::list_page("books", &events)).into_response()
}

async fn articles(State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let relays = relay_override(&params).unwrap_or_else(|| state.article_relays.clone());
    let events = if let Some(q) = params.get("q").filter(|q| !q.is_empty()) {
        let results = orchestrator::search(&state.cache, &state.transport, q, &relays).await;
        results
            .into_iter()
            .filter(|e| quire_core::kind::is_article(e.kind))
            .collect()
    } else {
        let limit = parse_limit(&params, 50);
        orchestrator::list_articles(&state.cache, &state.transport, limit, &relays).await
    };
    Html(templates::list_page("articles", &events)).into_response()
}

async fn highlights(State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let relays = relay_override(&params).unwrap_or_else(|| state.article_relays.clone());
    let limit = parse_limit(&params, 50);
    let events = orchestrator::list_highlights(&state.cache, &state.transport, limit, &relays).await;
    Html(templates::list_page("highlights", &events)).into_response()
}

async fn status(State(state): State<SharedState>) -> Response {
    Html(templates::status_page(&state.cache.stats())).into_response()
}

async fn clear_cache(State(state): State<SharedState>) -> Response {
    state.cache.clear_all();
    (StatusCode::OK, "ok").into_response()
}

async fn image_proxy(State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>) -> AppResult<Response> {
    let url = params.get("url").ok_or(AppError::NotFound)?;
    let key = format!("{:x}", Sha256::digest(url.as_bytes()));

    if let Some(cached) = state.cache.media_image.get(&key) {
        return Ok((
            [(header::CONTENT_TYPE, cached.content_type)],
            Bytes::from(cached.bytes),
        )
            .into_response());
    }

    let fetched = quire_media::fetch::fetch(&state.http, url, quire_media::directive::MediaKind::Image)
        .await
        .map_err(|source| AppError::RenderFailed {
            reason: source.to_string(),
        })?;
    let (bytes, content_type) = match quire_media::recompress::recompress(&fetched.bytes, &fetched.content_type) {
        Some((smaller, out_content_type)) => (smaller, out_content_type.to_string()),
        None => (fetched.bytes, fetched.content_type),
    };

    state.cache.media_image.set(
        key,
        quire_cache::CachedMedia {
            bytes: bytes.clone(),
            content_type: content_type.clone(),
        },
    );

    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Bytes::from(bytes),
    )
        .into_response())
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}
