//! The request orchestrator (§4.7): the cache-probe cascade in front of
//! every detail/list/profile lookup, plus the top-level-publication filter
//! applied to list endpoints.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use quire_cache::Cache;
use quire_core::{kind, Event, EventId, ReplaceableAddress};
use quire_relay::{sizing, Filter, RelayTransport};

use crate::error::{AppError, AppResult};

pub const LOG_TARGET: &str = "quire::web::orchestrator";

/// Merges `found` into a cached list, deduping by replaceable address and
/// keeping the greatest `created_at` for each address (§4.7 step 4).
fn merge_into_list(list: &mut Vec<Event>, found: Event) {
    if let Some(addr) = found.replaceable_address() {
        if let Some(existing) = list
            .iter_mut()
            .find(|e| e.replaceable_address().as_ref() == Some(&addr))
        {
            if found.created_at > existing.created_at {
                *existing = found;
            }
            return;
        }
    }
    list.push(found);
}

/// Looks up a single replaceable-address event through the cache cascade
/// described in §4.7: detail cache, then a TTL=∞ probe of the list cache,
/// then the network, writing both caches back on a network hit.
async fn lookup_detail(
    transport: &Arc<dyn RelayTransport>,
    detail: &quire_cache::Namespace<Event>,
    list: &quire_cache::Namespace<Vec<Event>>,
    addr: &ReplaceableAddress,
    relay_set: &[String],
) -> AppResult<Event> {
    let key = addr.to_string();

    if let Some(event) = detail.get(&key) {
        debug!(target: LOG_TARGET, %addr, "detail cache hit");
        return Ok(event);
    }

    if let Some(cached_list) = list.get_with_ttl("list", Duration::MAX) {
        if let Some(event) = cached_list
            .iter()
            .find(|e| e.replaceable_address().as_ref() == Some(addr))
        {
            debug!(target: LOG_TARGET, %addr, "resolved from stale list cache");
            detail.set(key, event.clone());
            return Ok(event.clone());
        }
    }

    let filter = Filter::new()
        .kinds([addr.kind])
        .authors([addr.author])
        .d_tags([addr.d.clone()]);
    let found = quire_relay::fetch(
        transport.clone(),
        vec![filter],
        relay_set,
        sizing::single_item(),
    )
    .await;

    let Some(event) = found.into_iter().next() else {
        return Err(AppError::NotFound);
    };

    detail.set(key, event.clone());
    let mut cached_list = list.get_with_ttl("list", Duration::MAX).unwrap_or_default();
    merge_into_list(&mut cached_list, event.clone());
    list.set("list", cached_list);

    Ok(event)
}

/// Publication-detail lookup (§4.7, steps 1-5), addressed by its canonical
/// `(kind, author, d)` triple.
pub async fn publication(
    cache: &Cache,
    transport: &Arc<dyn RelayTransport>,
    addr: &ReplaceableAddress,
    relay_set: &[String],
) -> AppResult<Event> {
    lookup_detail(
        transport,
        &cache.detail_publication,
        &cache.list_publications,
        addr,
        relay_set,
    )
    .await
}

/// Article-detail lookup, analogous to [`publication`] (§4.7 "Analogous
/// logic for articles").
pub async fn article(
    cache: &Cache,
    transport: &Arc<dyn RelayTransport>,
    addr: &ReplaceableAddress,
    relay_set: &[String],
) -> AppResult<Event> {
    lookup_detail(
        transport,
        &cache.detail_article,
        &cache.list_articles,
        addr,
        relay_set,
    )
    .await
}

/// Resolves a profile's handle by author key via the two-level
/// `profile:handle` / `profile:event` cache (§4.7: "Handle lookup uses
/// two-level cache... then handle extraction, then network"). A cached
/// `None` is a recognized negative entry, not a miss.
pub async fn profile_handle(
    cache: &Cache,
    transport: &Arc<dyn RelayTransport>,
    author: quire_core::AuthorKey,
    relay_set: &[String],
) -> Option<quire_core::ProfileHandle> {
    let key = author.to_string();
    if let Some(handle) = cache.profile_handle.get(&key) {
        return handle;
    }

    let event = if let Some(event) = cache.profile_event.get(&key) {
        Some(event)
    } else {
        let filter = Filter::new().kinds([kind::PROFILE]).authors([author]);
        let found = quire_relay::fetch(
            transport.clone(),
            vec![filter],
            relay_set,
            sizing::profile_lookup(),
        )
        .await;
        found.into_iter().next().inspect(|event| {
            cache.profile_event.set(key.clone(), event.clone());
        })
    };

    let handle = event.and_then(|e| quire_core::ProfileHandle::from_content(&e.content));
    cache.profile_handle.set(key, handle.clone());
    handle
}

/// Whether no other event in `all` references `candidate` by canonical
/// address or by event id (§4.7 "List top-level filter").
fn is_top_level(candidate: &Event, all: &[Event]) -> bool {
    let addr = candidate.replaceable_address();
    !all.iter().any(|other| {
        if other.id == candidate.id {
            return false;
        }
        let by_address = addr
            .as_ref()
            .is_some_and(|a| other.a_tags().any(|t| t.value() == Some(a.to_string().as_str())));
        let by_id = other
            .e_tags()
            .any(|t| t.value().and_then(|v| v.parse::<EventId>().ok()) == Some(candidate.id));
        by_address || by_id
    })
}

/// Fetches a fresh top-level list of the given kind (§4.7's list endpoints),
/// caching the full (unfiltered) result so detail lookups can stale-probe it.
async fn fetch_list(
    transport: &Arc<dyn RelayTransport>,
    list: &quire_cache::Namespace<Vec<Event>>,
    kind: u32,
    limit: u32,
    relay_set: &[String],
) -> Vec<Event> {
    if let Some(cached) = list.get("list") {
        return cached;
    }
    let filter = Filter::new().kinds([kind]).limit(limit);
    let events = quire_relay::fetch(
        transport.clone(),
        vec![filter],
        relay_set,
        sizing::list_fetch(limit),
    )
    .await;
    list.set("list", events.clone());
    events
}

/// `GET /books` (§4.7, §6): top-level publications only.
pub async fn list_publications(
    cache: &Cache,
    transport: &Arc<dyn RelayTransport>,
    limit: u32,
    relay_set: &[String],
) -> Vec<Event> {
    let events = fetch_list(
        transport,
        &cache.list_publications,
        kind::PUBLICATION_INDEX,
        limit,
        relay_set,
    )
    .await;
    events
        .iter()
        .filter(|e| is_top_level(e, &events))
        .cloned()
        .collect()
}

/// `GET /articles`.
pub async fn list_articles(
    cache: &Cache,
    transport: &Arc<dyn RelayTransport>,
    limit: u32,
    relay_set: &[String],
) -> Vec<Event> {
    fetch_list(transport, &cache.list_articles, kind::ARTICLE, limit, relay_set).await
}

/// `GET /highlights`: reader highlight events, newest first. Highlights
/// don't nest, so no top-level filter applies.
pub async fn list_highlights(
    cache: &Cache,
    transport: &Arc<dyn RelayTransport>,
    limit: u32,
    relay_set: &[String],
) -> Vec<Event> {
    fetch_list(
        transport,
        &cache.list_highlights,
        kind::HIGHLIGHT,
        limit,
        relay_set,
    )
    .await
}

/// Free-text search over the cached publication/article lists: an exact
/// pass against `normalize_exact`, falling back to `normalize_fuzzy`
/// (§4.3, §4.7).
pub async fn search(
    cache: &Cache,
    transport: &Arc<dyn RelayTransport>,
    query: &str,
    relay_set: &[String],
) -> Vec<Event> {
    let key = format!("{}|{}", query, relay_set.join(","));
    if let Some(cached) = cache.search.get(&key) {
        return cached;
    }

    let publications = fetch_list(
        transport,
        &cache.list_publications,
        kind::PUBLICATION_INDEX,
        200,
        relay_set,
    )
    .await;
    let articles = fetch_list(transport, &cache.list_articles, kind::ARTICLE, 200, relay_set).await;

    let exact = quire_core::address::normalize_exact(query);
    let fuzzy = quire_core::address::normalize_fuzzy(query);

    let matches_event = |e: &Event| {
        let title = e
            .tags
            .iter()
            .find(|t| t.is_named("title"))
            .and_then(|t| t.value())
            .unwrap_or("");
        let norm_exact = quire_core::address::normalize_exact(title);
        if norm_exact.contains(&exact) {
            return true;
        }
        quire_core::address::normalize_fuzzy(title).contains(&fuzzy)
    };

    let results: Vec<Event> = publications
        .into_iter()
        .chain(articles)
        .filter(matches_event)
        .collect();

    cache.search.set(key, results.clone());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{AuthorKey, Tag};

    fn event(kind: u32, id: u8, tags: Vec<Tag>) -> Event {
        Event {
            id: EventId([id; 32]),
            author: AuthorKey([1; 32]),
            created_at: id as u64,
            kind,
            tags,
            content: String::new(),
        }
    }

    #[test]
    fn merge_into_list_keeps_the_newer_event_for_the_same_address() {
        let mut list = vec![Event {
            created_at: 1,
            ..event(kind::PUBLICATION_INDEX, 1, vec![Tag::new(["d", "book"])])
        }];
        let newer = Event {
            created_at: 2,
            ..event(kind::PUBLICATION_INDEX, 2, vec![Tag::new(["d", "book"])])
        };
        merge_into_list(&mut list, newer.clone());
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].created_at, 2);
    }

    #[test]
    fn merge_into_list_keeps_the_older_event_if_it_has_the_greater_created_at() {
        let mut list = vec![Event {
            created_at: 5,
            ..event(kind::PUBLICATION_INDEX, 1, vec![Tag::new(["d", "book"])])
        }];
        let older = Event {
            created_at: 2,
            ..event(kind::PUBLICATION_INDEX, 2, vec![Tag::new(["d", "book"])])
        };
        merge_into_list(&mut list, older);
        assert_eq!(list[0].created_at, 5);
    }

    #[test]
    fn a_publication_referenced_by_another_is_not_top_level() {
        let part = event(kind::PUBLICATION_INDEX, 1, vec![Tag::new(["d", "part"])]);
        let addr = part.replaceable_address().unwrap().to_string();
        let index = event(
            kind::PUBLICATION_INDEX,
            2,
            vec![Tag::new(["d", "index"]), Tag::new(["a", &addr])],
        );
        let all = vec![part.clone(), index.clone()];
        assert!(is_top_level(&index, &all));
        assert!(!is_top_level(&part, &all));
    }

    #[test]
    fn an_unreferenced_publication_is_top_level() {
        let solo = event(kind::PUBLICATION_INDEX, 1, vec![Tag::new(["d", "solo"])]);
        let all = vec![solo.clone()];
        assert!(is_top_level(&solo, &all));
    }
}
