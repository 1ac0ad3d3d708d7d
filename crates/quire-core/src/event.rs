use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::id::{AuthorKey, EventId, HexIdParseError};

/// Unix timestamp in seconds, as carried by [`Event::created_at`].
pub type Timestamp = u64;

/// Recognized event kinds, named by role rather than by any particular
/// relay implementation's internal numbering (§3).
pub mod kind {
    /// Composite publication index. Its tags name ordered children.
    pub const PUBLICATION_INDEX: u32 = 30040;
    /// A publication part: a leaf or intermediate content node.
    pub const PUBLICATION_PART: u32 = 30041;
    /// A standalone long-form article; may double as a publication part.
    pub const ARTICLE: u32 = 30023;
    /// Profile metadata (kind 0 in the wire protocol this models).
    pub const PROFILE: u32 = 0;
    /// Threaded comment event.
    pub const COMMENT: u32 = 1111;
    /// A reader-authored highlight: an excerpt from a publication or
    /// article, tagged back to its source via `a`/`e`.
    pub const HIGHLIGHT: u32 = 9802;

    pub fn is_publication_index(k: u32) -> bool {
        k == PUBLICATION_INDEX
    }

    pub fn is_publication_part(k: u32) -> bool {
        k == PUBLICATION_PART
    }

    pub fn is_article(k: u32) -> bool {
        k == ARTICLE
    }

    pub fn is_highlight(k: u32) -> bool {
        k == HIGHLIGHT
    }

    /// Whether an event of this kind is a "replaceable" record: the
    /// authoritative event for the address is the one with the greatest
    /// `created_at` (§3). This covers the parametrized-replaceable range
    /// used by publications/articles plus the plain-replaceable kind 0.
    pub fn is_replaceable(k: u32) -> bool {
        k == PROFILE || (30000..40000).contains(&k)
    }
}

/// An ordered sequence of short strings, e.g. `["a", "30040:<pk>:my-book"]`
/// (§3: "an ordered list of tags (each tag is an ordered sequence of short
/// strings)").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag(pub Vec<String>);

impl Tag {
    pub fn new(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// The tag's name: its first element (e.g. `"a"`, `"e"`, `"d"`).
    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The tag's first value, after the name.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    pub fn values(&self) -> &[String] {
        if self.0.is_empty() {
            &[]
        } else {
            &self.0[1..]
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name() == Some(name)
    }
}

/// An immutable signed record produced by an external author and delivered
/// by relays (§3). `quire` never signs or verifies events — signature bytes
/// are not modeled, per the Non-goals in §1/§D.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub author: AuthorKey,
    pub created_at: Timestamp,
    pub kind: u32,
    pub tags: Vec<Tag>,
    pub content: String,
}

/// The triple `(kind, author, discriminator)` identifying a replaceable
/// series; the authoritative event for the address is the one with the
/// greatest `created_at` (§3, §GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplaceableAddress {
    pub kind: u32,
    pub author: AuthorKey,
    pub d: String,
}

impl std::fmt::Display for ReplaceableAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.author, self.d)
    }
}

#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceableAddressParseError {
    #[snafu(display("malformed a-tag value, expected kind:author:d"))]
    Malformed,
    #[snafu(display("bad kind in a-tag value"))]
    BadKind,
    #[snafu(transparent)]
    BadAuthor { source: HexIdParseError },
}

impl std::str::FromStr for ReplaceableAddress {
    type Err = ReplaceableAddressParseError;

    /// Parses the `kind:author:d` form found in `a`-tag values (§4.4).
    /// The discriminator may itself contain colons; only the first two
    /// separators are significant.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let kind = parts.next().ok_or(ReplaceableAddressParseError::Malformed)?;
        let author = parts.next().ok_or(ReplaceableAddressParseError::Malformed)?;
        let d = parts.next().ok_or(ReplaceableAddressParseError::Malformed)?;
        let kind: u32 = kind
            .parse()
            .map_err(|_| ReplaceableAddressParseError::BadKind)?;
        let author: AuthorKey = author.parse()?;
        Ok(Self {
            kind,
            author,
            d: d.to_string(),
        })
    }
}

impl Event {
    /// The first value of the first tag named `d` (§3).
    pub fn discriminator(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.is_named("d"))
            .and_then(Tag::value)
    }

    /// This event's canonical address, if it is a replaceable kind.
    pub fn replaceable_address(&self) -> Option<ReplaceableAddress> {
        if !kind::is_replaceable(self.kind) {
            return None;
        }
        Some(ReplaceableAddress {
            kind: self.kind,
            author: self.author,
            d: self.discriminator().unwrap_or("").to_string(),
        })
    }

    pub fn a_tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| t.is_named("a"))
    }

    pub fn e_tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| t.is_named("e"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(byte: u8) -> AuthorKey {
        AuthorKey([byte; 32])
    }

    #[test]
    fn discriminator_reads_first_d_tag() {
        let ev = Event {
            id: EventId::ZERO,
            author: author(1),
            created_at: 0,
            kind: kind::PUBLICATION_INDEX,
            tags: vec![Tag::new(["d", "my-book"]), Tag::new(["d", "ignored"])],
            content: String::new(),
        };
        assert_eq!(ev.discriminator(), Some("my-book"));
    }

    #[test]
    fn replaceable_address_roundtrips_through_display() {
        let ev = Event {
            id: EventId::ZERO,
            author: author(2),
            created_at: 0,
            kind: kind::PUBLICATION_PART,
            tags: vec![Tag::new(["d", "ch1"])],
            content: String::new(),
        };
        let addr = ev.replaceable_address().expect("replaceable");
        assert_eq!(addr.kind, kind::PUBLICATION_PART);
        assert_eq!(addr.d, "ch1");
        assert_eq!(
            addr.to_string(),
            format!("{}:{}:ch1", kind::PUBLICATION_PART, author(2))
        );
    }

    #[test]
    fn non_replaceable_kind_has_no_address() {
        let ev = Event {
            id: EventId::ZERO,
            author: author(3),
            created_at: 0,
            kind: 1,
            tags: vec![],
            content: String::new(),
        };
        assert_eq!(ev.replaceable_address(), None);
    }
}
