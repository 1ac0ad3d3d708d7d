use serde::{Deserialize, Serialize};

use quire_core::{AuthorKey, EventId};

/// A subscription filter, passed through to relays verbatim (§4.2 "Filter-set
/// semantics are passed through verbatim; the multiplexer does not interpret
/// them"). Field names match the wire protocol named in §6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<AuthorKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<EventId>>,
    #[serde(rename = "#d", skip_serializing_if = "Option::is_none")]
    pub d: Option<Vec<String>>,
    #[serde(rename = "#A", skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u32>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn authors(mut self, authors: impl IntoIterator<Item = AuthorKey>) -> Self {
        self.authors = Some(authors.into_iter().collect());
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = EventId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn d_tags(mut self, ds: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.d = Some(ds.into_iter().map(Into::into).collect());
        self
    }

    pub fn addresses(mut self, addrs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.addresses = Some(addrs.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
