//! The tiered, namespaced cache (§4.1). Each namespace has an independent
//! TTL and size cap; this crate wires the twelve namespaces the spec names
//! into one façade ([`Cache`]) that the request orchestrator calls through.

mod namespace;

use std::time::Duration;

use quire_core::{Event, HierarchyNode, ProfileHandle, ThreadNode};

pub use namespace::{Namespace, NamespaceStats};

pub const LOG_TARGET: &str = "quire::cache";

/// A single compressed/converted document (e.g. an epub) plus its media
/// type, as produced by the external renderer and cached under
/// `derived:file`.
#[derive(Debug, Clone)]
pub struct DerivedFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Compressed/recompressed media bytes cached under `media:image`.
#[derive(Debug, Clone)]
pub struct CachedMedia {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

pub struct Cache {
    pub list_publications: Namespace<Vec<Event>>,
    pub list_articles: Namespace<Vec<Event>>,
    pub list_highlights: Namespace<Vec<Event>>,
    pub detail_publication: Namespace<Event>,
    pub detail_article: Namespace<Event>,
    pub hierarchy: Namespace<HierarchyNode>,
    pub comments: Namespace<Vec<ThreadNode>>,
    pub profile_handle: Namespace<Option<ProfileHandle>>,
    pub profile_event: Namespace<Event>,
    pub search: Namespace<Vec<Event>>,
    pub derived_file: Namespace<DerivedFile>,
    pub media_image: Namespace<CachedMedia>,
}

/// Overridable TTLs (§6: "every TTL... overridable"), defaulted to the
/// values in §4.1's table.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub list: Duration,
    pub detail: Duration,
    pub hierarchy: Duration,
    pub comments: Duration,
    pub profile: Duration,
    pub search: Duration,
    pub derived_file: Duration,
    pub media_image: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            list: Duration::from_secs(30 * 60),
            detail: Duration::from_secs(60 * 60),
            hierarchy: Duration::from_secs(60 * 60),
            comments: Duration::from_secs(60 * 60),
            profile: Duration::from_secs(60 * 60),
            search: Duration::from_secs(10 * 60),
            derived_file: Duration::from_secs(24 * 60 * 60),
            media_image: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Cache {
    pub fn new(ttls: CacheTtls) -> Self {
        Self {
            list_publications: Namespace::new("list:publications", ttls.list, Some(1)),
            list_articles: Namespace::new("list:articles", ttls.list, Some(1)),
            list_highlights: Namespace::new("list:highlights", ttls.list, Some(50)),
            detail_publication: Namespace::new("detail:publication", ttls.detail, Some(100)),
            detail_article: Namespace::new("detail:article", ttls.detail, Some(100)),
            hierarchy: Namespace::new("hierarchy", ttls.hierarchy, None),
            comments: Namespace::new("comments", ttls.comments, None),
            profile_handle: Namespace::new("profile:handle", ttls.profile, Some(500)),
            profile_event: Namespace::new("profile:event", ttls.profile, Some(1000)),
            search: Namespace::new("search", ttls.search, None),
            derived_file: Namespace::new("derived:file", ttls.derived_file, None),
            media_image: Namespace::new("media:image", ttls.media_image, None),
        }
    }

    /// Returns the store to empty state across every namespace (§4.1
    /// "clear-all").
    pub fn clear_all(&self) {
        self.list_publications.clear();
        self.list_articles.clear();
        self.list_highlights.clear();
        self.detail_publication.clear();
        self.detail_article.clear();
        self.hierarchy.clear();
        self.comments.clear();
        self.profile_handle.clear();
        self.profile_event.clear();
        self.search.clear();
        self.derived_file.clear();
        self.media_image.clear();
    }

    /// Per-namespace counts and last-update timestamps (§4.1 "stats").
    pub fn stats(&self) -> Vec<(&'static str, NamespaceStats)> {
        vec![
            ("list:publications", self.list_publications.stats()),
            ("list:articles", self.list_articles.stats()),
            ("list:highlights", self.list_highlights.stats()),
            ("detail:publication", self.detail_publication.stats()),
            ("detail:article", self.detail_article.stats()),
            ("hierarchy", self.hierarchy.stats()),
            ("comments", self.comments.stats()),
            ("profile:handle", self.profile_handle.stats()),
            ("profile:event", self.profile_event.stats()),
            ("search", self.search.stats()),
            ("derived:file", self.derived_file.stats()),
            ("media:image", self.media_image.stats()),
        ]
    }

    /// Recursive byte estimate per namespace, best-effort (§4.1 "size").
    pub fn size_bytes(&self) -> Vec<(&'static str, usize)> {
        fn event_size(e: &Event) -> usize {
            e.content.len()
                + e.tags
                    .iter()
                    .map(|t| t.0.iter().map(String::len).sum::<usize>())
                    .sum::<usize>()
                + 96
        }
        vec![
            (
                "list:publications",
                self.list_publications
                    .size_bytes(|v| v.iter().map(event_size).sum()),
            ),
            (
                "list:articles",
                self.list_articles
                    .size_bytes(|v| v.iter().map(event_size).sum()),
            ),
            (
                "list:highlights",
                self.list_highlights
                    .size_bytes(|v| v.iter().map(event_size).sum()),
            ),
            (
                "detail:publication",
                self.detail_publication.size_bytes(event_size),
            ),
            ("detail:article", self.detail_article.size_bytes(event_size)),
            ("hierarchy", self.hierarchy.size_bytes(|h| h.len() * 256)),
            ("comments", self.comments.size_bytes(|v| v.len() * 256)),
            ("profile:handle", self.profile_handle.size_bytes(|_| 128)),
            ("profile:event", self.profile_event.size_bytes(event_size)),
            (
                "search",
                self.search.size_bytes(|v| v.iter().map(event_size).sum()),
            ),
            ("derived:file", self.derived_file.size_bytes(|d| d.bytes.len())),
            ("media:image", self.media_image.size_bytes(|m| m.bytes.len())),
        ]
    }
}
