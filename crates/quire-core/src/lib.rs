//! Data model and address codec for `quire` (§3, §4.3).
//!
//! This crate has no I/O: it defines the [`Event`] shape, canonical
//! replaceable addresses, and the bech32-TLV address variants consumed by
//! the relay multiplexer and publication assembler.

pub mod address;
pub mod event;
pub mod id;
mod macros;
pub mod tree;

pub use address::{Address, AddressError, AddressResult};
pub use event::{kind, Event, ReplaceableAddress, ReplaceableAddressParseError, Tag, Timestamp};
pub use id::{AuthorKey, EventId};
pub use tree::{HierarchyNode, ProfileHandle, ThreadNode};
