//! The two tree shapes shared across `quire`'s cache and assembler layers
//! (§3 "Hierarchy node", "Thread node").

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// A node in the publication hierarchy: an event plus its ordered children,
/// in source-tag order (§3, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub event: Event,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn leaf(event: Event) -> Self {
        Self {
            event,
            children: Vec::new(),
        }
    }

    /// Total node count including this one, depth-first.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A node in a reconstructed reply thread, sorted by ascending
/// `created_at` at every level (§3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadNode {
    pub event: Event,
    pub children: Vec<ThreadNode>,
}

/// The parsed form of a Profile event's content (§3: "a textual record
/// mapping `name`, `display_name`, and verification identifier to string
/// values").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileHandle {
    pub name: Option<String>,
    pub display_name: Option<String>,
    /// Verification identifier (e.g. a NIP-05-style `user@domain` string).
    pub verification: Option<String>,
}

impl ProfileHandle {
    pub fn from_content(content: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(content).ok()?;
        Some(Self {
            name: value.get("name").and_then(|v| v.as_str()).map(String::from),
            display_name: value
                .get("display_name")
                .and_then(|v| v.as_str())
                .map(String::from),
            verification: value
                .get("nip05")
                .and_then(|v| v.as_str())
                .map(String::from),
        })
    }
}
