//! Address decoding (§4.3): bech32-TLV strings naming an author, event, or
//! replaceable record, plus relay-selection and search-normalization rules.

use bech32::Hrp;
use snafu::{OptionExt as _, Snafu};
use unicode_normalization::UnicodeNormalization as _;

use crate::event::kind;
use crate::id::{AuthorKey, EventId};

const HRP_NPUB: Hrp = Hrp::parse_unchecked("npub");
const HRP_NOTE: Hrp = Hrp::parse_unchecked("note");
const HRP_NEVENT: Hrp = Hrp::parse_unchecked("nevent");
const HRP_NADDR: Hrp = Hrp::parse_unchecked("naddr");

// TLV types shared by `nevent`/`naddr`, in the layout used throughout the
// nostr ecosystem this spec's addresses are modeled on.
const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;
const TLV_KIND: u8 = 3;

/// A decoded address, carrying whichever of event-id / author / kind /
/// relay hints the variant supports (§4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `npub` — author key only.
    Npub { author: AuthorKey },
    /// `note` — event id only.
    Note { event_id: EventId },
    /// `nevent` — event id, optional author, optional relay hints.
    Nevent {
        event_id: EventId,
        author: Option<AuthorKey>,
        relays: Vec<String>,
    },
    /// `naddr` — replaceable address, optional relay hints.
    Naddr {
        kind: u32,
        author: AuthorKey,
        d: String,
        relays: Vec<String>,
    },
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[snafu(transparent)]
    Decode { source: bech32::DecodeError },
    #[snafu(display("bad address: unrecognized prefix"))]
    UnknownPrefix,
    #[snafu(display("bad address: malformed TLV payload"))]
    MalformedTlv,
    #[snafu(display("bad address: wrong length for variant"))]
    WrongLength,
    #[snafu(display("bad address: expected {expected}, got a different variant"))]
    VariantMismatch { expected: &'static str },
    #[snafu(display("unsupported kind {kind} for this endpoint"))]
    UnsupportedKind { kind: u32 },
}

pub type AddressResult<T> = std::result::Result<T, AddressError>;

impl Address {
    pub fn decode(s: &str) -> AddressResult<Self> {
        let (hrp, data) = bech32::decode(s)?;
        if hrp == HRP_NPUB {
            let author = bytes_to_author(&data)?;
            return Ok(Address::Npub { author });
        }
        if hrp == HRP_NOTE {
            let event_id = bytes_to_event_id(&data)?;
            return Ok(Address::Note { event_id });
        }
        if hrp == HRP_NEVENT {
            return decode_nevent(&data);
        }
        if hrp == HRP_NADDR {
            return decode_naddr(&data);
        }
        UnknownPrefixSnafu.fail()
    }

    /// Expect (and unwrap) a `naddr`, failing with `VariantMismatch`
    /// otherwise (§4.3 "fails with bad-address when the decoded variant
    /// does not match the call site's expectation").
    pub fn expect_naddr(self) -> AddressResult<(u32, AuthorKey, String, Vec<String>)> {
        match self {
            Address::Naddr {
                kind,
                author,
                d,
                relays,
            } => Ok((kind, author, d, relays)),
            _ => VariantMismatchSnafu { expected: "naddr" }.fail(),
        }
    }

    pub fn relays(&self) -> &[String] {
        match self {
            Address::Npub { .. } | Address::Note { .. } => &[],
            Address::Nevent { relays, .. } => relays,
            Address::Naddr { relays, .. } => relays,
        }
    }
}

fn bytes_to_author(data: &[u8]) -> AddressResult<AuthorKey> {
    let bytes: [u8; 32] = data.try_into().map_err(|_| AddressError::WrongLength)?;
    Ok(AuthorKey(bytes))
}

fn bytes_to_event_id(data: &[u8]) -> AddressResult<EventId> {
    let bytes: [u8; 32] = data.try_into().map_err(|_| AddressError::WrongLength)?;
    Ok(EventId(bytes))
}

fn iter_tlv(data: &[u8]) -> impl Iterator<Item = AddressResult<(u8, &[u8])>> {
    let mut rest = data;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        if rest.len() < 2 {
            return Some(Err(AddressError::MalformedTlv));
        }
        let t = rest[0];
        let l = rest[1] as usize;
        if rest.len() < 2 + l {
            return Some(Err(AddressError::MalformedTlv));
        }
        let v = &rest[2..2 + l];
        rest = &rest[2 + l..];
        Some(Ok((t, v)))
    })
}

fn decode_nevent(data: &[u8]) -> AddressResult<Address> {
    let mut event_id = None;
    let mut author = None;
    let mut relays = Vec::new();
    for entry in iter_tlv(data) {
        let (t, v) = entry?;
        match t {
            TLV_SPECIAL => event_id = Some(bytes_to_event_id(v)?),
            TLV_AUTHOR => author = Some(bytes_to_author(v)?),
            TLV_RELAY => relays.push(String::from_utf8_lossy(v).into_owned()),
            TLV_KIND => {} // nevent's kind hint is informational only; ignored here
            _ => {}        // forward-compatible: unknown TLV types are skipped
        }
    }
    Ok(Address::Nevent {
        event_id: event_id.context(MalformedTlvSnafu)?,
        author,
        relays,
    })
}

fn decode_naddr(data: &[u8]) -> AddressResult<Address> {
    let mut d = None;
    let mut author = None;
    let mut addr_kind = None;
    let mut relays = Vec::new();
    for entry in iter_tlv(data) {
        let (t, v) = entry?;
        match t {
            TLV_SPECIAL => d = Some(String::from_utf8_lossy(v).into_owned()),
            TLV_AUTHOR => author = Some(bytes_to_author(v)?),
            TLV_RELAY => relays.push(String::from_utf8_lossy(v).into_owned()),
            TLV_KIND => {
                let bytes: [u8; 4] = v.try_into().map_err(|_| AddressError::MalformedTlv)?;
                addr_kind = Some(u32::from_be_bytes(bytes));
            }
            _ => {}
        }
    }
    Ok(Address::Naddr {
        kind: addr_kind.context(MalformedTlvSnafu)?,
        author: author.context(MalformedTlvSnafu)?,
        d: d.context(MalformedTlvSnafu)?,
        relays,
    })
}

/// Encodes a canonical `(kind, author, d)` triple as an `naddr` string,
/// the inverse of [`Address::decode`] + [`Address::expect_naddr`] (§8's
/// decode-encode law).
pub fn encode_naddr(kind: u32, author: &AuthorKey, d: &str, relays: &[String]) -> String {
    let mut data = Vec::new();
    push_tlv(&mut data, TLV_SPECIAL, d.as_bytes());
    for relay in relays {
        push_tlv(&mut data, TLV_RELAY, relay.as_bytes());
    }
    push_tlv(&mut data, TLV_AUTHOR, author.as_slice());
    push_tlv(&mut data, TLV_KIND, &kind.to_be_bytes());
    bech32::encode::<bech32::Bech32>(HRP_NADDR, &data).expect("fixed-size TLV payload")
}

fn push_tlv(out: &mut Vec<u8>, t: u8, v: &[u8]) {
    out.push(t);
    out.push(v.len() as u8);
    out.extend_from_slice(v);
}

/// Default relay sets (§6).
pub fn default_publication_relays() -> Vec<String> {
    [
        "wss://nostr.land",
        "wss://thecitadel.nostr1.com",
        "wss://nostr.wine",
        "wss://orly-relay.imwald.eu",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_article_relays() -> Vec<String> {
    [
        "wss://theforest.nostr1.com",
        "wss://nostr.land",
        "wss://thecitadel.nostr1.com",
        "wss://nostr.wine",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Relay-selection rule (§4.3): explicit caller relays win, then the
/// address's own relay hints, then the kind-appropriate default set.
pub fn select_relays(explicit: Option<&[String]>, address: &Address, kind_hint: u32) -> Vec<String> {
    if let Some(explicit) = explicit {
        if !explicit.is_empty() {
            return explicit.to_vec();
        }
    }
    if !address.relays().is_empty() {
        return address.relays().to_vec();
    }
    if kind::is_publication_index(kind_hint) || kind::is_publication_part(kind_hint) {
        default_publication_relays()
    } else {
        default_article_relays()
    }
}

/// Free-text search normalization (§4.3): an *exact* pass (case-fold,
/// punctuation/dashes collapsed to single spaces) and a *fuzzy* pass (the
/// same, plus NFD decomposition with combining marks stripped).
pub fn normalize_exact(query: &str) -> String {
    collapse_punctuation(&query.to_lowercase())
}

pub fn normalize_fuzzy(query: &str) -> String {
    let folded = collapse_punctuation(&query.to_lowercase());
    folded
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
}

fn collapse_punctuation(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        let is_sep = c.is_whitespace() || c == '-' || c.is_ascii_punctuation();
        if is_sep {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naddr_decode_encode_roundtrips() {
        let author = AuthorKey([0xab; 32]);
        let relays = vec!["wss://example.com".to_string()];
        let encoded = encode_naddr(kind::PUBLICATION_INDEX, &author, "my-book", &relays);
        let decoded = Address::decode(&encoded).expect("decodes");
        let (k, a, d, r) = decoded.expect_naddr().expect("is naddr");
        assert_eq!(k, kind::PUBLICATION_INDEX);
        assert_eq!(a, author);
        assert_eq!(d, "my-book");
        assert_eq!(r, relays);
    }

    #[test]
    fn npub_decodes_author_only() {
        let author = AuthorKey([0x11; 32]);
        let encoded = bech32::encode::<bech32::Bech32>(HRP_NPUB, author.as_slice()).unwrap();
        let decoded = Address::decode(&encoded).unwrap();
        assert_eq!(decoded, Address::Npub { author });
    }

    #[test]
    fn naddr_expected_but_got_npub_is_variant_mismatch() {
        let author = AuthorKey([0x11; 32]);
        let encoded = bech32::encode::<bech32::Bech32>(HRP_NPUB, author.as_slice()).unwrap();
        let decoded = Address::decode(&encoded).unwrap();
        assert!(matches!(
            decoded.expect_naddr(),
            Err(AddressError::VariantMismatch { .. })
        ));
    }

    #[test]
    fn relay_selection_prefers_explicit_over_address_over_default() {
        let addr = Address::Naddr {
            kind: kind::PUBLICATION_INDEX,
            author: AuthorKey([1; 32]),
            d: "d".into(),
            relays: vec!["wss://addr-relay".into()],
        };
        let explicit = vec!["wss://explicit".into()];
        assert_eq!(
            select_relays(Some(&explicit), &addr, kind::PUBLICATION_INDEX),
            explicit
        );
        assert_eq!(
            select_relays(None, &addr, kind::PUBLICATION_INDEX),
            vec!["wss://addr-relay".to_string()]
        );
        let addr_no_relay = Address::Naddr {
            kind: kind::ARTICLE,
            author: AuthorKey([1; 32]),
            d: "d".into(),
            relays: vec![],
        };
        assert_eq!(
            select_relays(None, &addr_no_relay, kind::ARTICLE),
            default_article_relays()
        );
    }

    #[test]
    fn normalize_exact_collapses_punctuation_and_case() {
        assert_eq!(normalize_exact("Hello---World!!"), "hello world");
    }

    #[test]
    fn normalize_fuzzy_strips_combining_marks() {
        assert_eq!(normalize_fuzzy("café"), "cafe");
    }
}
