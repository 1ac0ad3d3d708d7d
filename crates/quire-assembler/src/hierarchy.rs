//! The publication assembler's single operation: `build` (§4.4).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::{join_all, BoxFuture};
use tracing::warn;

use quire_core::{kind, Event, EventId, HierarchyNode, ReplaceableAddress};
use quire_relay::{sizing, Filter, RelayTransport};

pub const LOG_TARGET: &str = "quire::assembler";

enum Ref {
    A(ReplaceableAddress),
    E(EventId),
}

fn parse_refs(event: &Event) -> Vec<Ref> {
    event
        .tags
        .iter()
        .filter_map(|tag| match tag.name() {
            Some("a") => tag.value()?.parse::<ReplaceableAddress>().ok().map(Ref::A),
            Some("e") => tag.value()?.parse::<EventId>().ok().map(Ref::E),
            _ => None,
        })
        .collect()
}

/// Builds the children of `index_event` (§4.4). The returned sequence is
/// the ordered, fully-materialized child list; `index_event` itself is not
/// included (the caller already has it).
pub async fn build(
    transport: Arc<dyn RelayTransport>,
    index_event: Event,
    relay_set: Vec<String>,
) -> Vec<HierarchyNode> {
    let visited = Arc::new(Mutex::new(HashSet::new()));
    build_inner(transport, index_event, Arc::new(relay_set), visited).await
}

fn build_inner(
    transport: Arc<dyn RelayTransport>,
    index_event: Event,
    relay_set: Arc<Vec<String>>,
    visited: Arc<Mutex<HashSet<EventId>>>,
) -> BoxFuture<'static, Vec<HierarchyNode>> {
    Box::pin(async move {
        // Step 1: a node already on this traversal short-circuits here, not
        // at the call site — callers recurse into every P_INDEX child
        // unconditionally and rely on this check to break cycles.
        {
            let mut visited = visited.lock().expect("not poisoned");
            if !visited.insert(index_event.id) {
                return Vec::new();
            }
        }

        let refs = parse_refs(&index_event);

        let a_refs: Vec<&ReplaceableAddress> = refs
            .iter()
            .filter_map(|r| match r {
                Ref::A(addr) => Some(addr),
                Ref::E(_) => None,
            })
            .collect();
        let e_ids: Vec<EventId> = refs
            .iter()
            .filter_map(|r| match r {
                Ref::E(id) if *id != index_event.id => Some(*id),
                _ => None,
            })
            .collect();

        let budget = sizing::assembler_level(a_refs.len() + e_ids.len());

        let a_filters: Vec<Filter> = a_refs
            .iter()
            .filter(|addr| kind::is_publication_index(addr.kind) || kind::is_publication_part(addr.kind))
            .map(|addr| Filter::new().addresses([addr.to_string()]))
            .collect();

        let a_fetch = {
            let transport = Arc::clone(&transport);
            let relay_set = Arc::clone(&relay_set);
            async move {
                if a_filters.is_empty() {
                    Vec::new()
                } else {
                    quire_relay::fetch(transport, a_filters, &relay_set, budget).await
                }
            }
        };
        let e_fetch = {
            let transport = Arc::clone(&transport);
            let relay_set = Arc::clone(&relay_set);
            async move {
                if e_ids.is_empty() {
                    Vec::new()
                } else {
                    quire_relay::fetch(transport, vec![Filter::new().ids(e_ids)], &relay_set, budget)
                        .await
                }
            }
        };

        let (a_events, e_events) = futures::join!(a_fetch, e_fetch);

        // Dedup a-tag results by canonical address, keeping the greatest
        // created_at (§4.4 step 6).
        let mut by_address: HashMap<String, Event> = HashMap::new();
        for ev in a_events {
            let Some(addr) = ev.replaceable_address() else {
                continue;
            };
            let key = addr.to_string();
            match by_address.get(&key) {
                Some(existing) if existing.created_at >= ev.created_at => {}
                _ => {
                    by_address.insert(key, ev);
                }
            }
        }
        let by_id: HashMap<EventId, Event> = e_events.into_iter().map(|ev| (ev.id, ev)).collect();

        let mut nodes: Vec<Option<HierarchyNode>> = Vec::new();
        let mut recurse_slots: Vec<(usize, Event)> = Vec::new();

        for r in &refs {
            let resolved = match r {
                Ref::A(addr) => by_address.get(&addr.to_string()).cloned(),
                Ref::E(id) => {
                    if *id == index_event.id {
                        None
                    } else {
                        by_id.get(id).cloned()
                    }
                }
            };
            let Some(event) = resolved else {
                continue;
            };
            let slot = nodes.len();
            if kind::is_publication_index(event.kind) {
                recurse_slots.push((slot, event.clone()));
            }
            nodes.push(Some(HierarchyNode::leaf(event)));
        }

        if !recurse_slots.is_empty() {
            let futures = recurse_slots.iter().map(|(_, event)| {
                build_inner(
                    Arc::clone(&transport),
                    event.clone(),
                    Arc::clone(&relay_set),
                    Arc::clone(&visited),
                )
            });
            let results = join_all(futures).await;
            for ((slot, _), children) in recurse_slots.into_iter().zip(results) {
                if let Some(node) = nodes[slot].as_mut() {
                    node.children = children;
                }
            }
        }

        let len = nodes.len();
        let out: Vec<HierarchyNode> = nodes.into_iter().flatten().collect();
        if out.len() != len {
            warn!(target: LOG_TARGET, "unexpected empty node slot");
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use quire_core::{AuthorKey, Tag};
    use quire_relay::transport::{
        HandleState, RelayHandle, RelayMsg, RelaySubscription, TransportResult,
    };

    use super::*;

    fn event(id: u8, kind: u32, tags: Vec<Tag>) -> Event {
        Event {
            id: EventId([id; 32]),
            author: AuthorKey::ZERO,
            created_at: id as u64,
            kind,
            tags,
            content: String::new(),
        }
    }

    struct OneShotHandle;
    #[async_trait]
    impl RelayHandle for OneShotHandle {
        fn url(&self) -> &str {
            "fake"
        }
        fn state(&self) -> HandleState {
            HandleState::Connected
        }
    }

    struct OneShotSub {
        events: std::vec::IntoIter<Event>,
        eose_sent: bool,
    }
    #[async_trait]
    impl RelaySubscription for OneShotSub {
        async fn next(&mut self) -> Option<RelayMsg> {
            if let Some(ev) = self.events.next() {
                return Some(RelayMsg::Event(ev));
            }
            if !self.eose_sent {
                self.eose_sent = true;
                return Some(RelayMsg::Eose);
            }
            None
        }
        async fn close(&mut self) {}
    }

    /// Serves the same fixed event set to every subscription, regardless
    /// of the filter asked for — sufficient to exercise tree assembly.
    struct FixedTransport(Vec<Event>);
    #[async_trait]
    impl RelayTransport for FixedTransport {
        async fn ensure_relay(&self, _url: &str) -> TransportResult<Box<dyn RelayHandle>> {
            Ok(Box::new(OneShotHandle))
        }
        async fn subscribe(
            &self,
            _handle: &dyn RelayHandle,
            _filters: &[Filter],
        ) -> TransportResult<Box<dyn RelaySubscription>> {
            Ok(Box::new(OneShotSub {
                events: self.0.clone().into_iter(),
                eose_sent: false,
            }))
        }
    }

    #[tokio::test]
    async fn leaf_children_resolve_in_tag_order() {
        let child1 = event(1, kind::PUBLICATION_PART, vec![]);
        let child2 = event(2, kind::PUBLICATION_PART, vec![]);
        let root = event(
            0,
            kind::PUBLICATION_INDEX,
            vec![
                Tag::new(["e", &EventId([2; 32]).to_string()]),
                Tag::new(["e", &EventId([1; 32]).to_string()]),
            ],
        );
        let transport: Arc<dyn RelayTransport> =
            Arc::new(FixedTransport(vec![child1, child2]));
        let children = build(transport, root, vec!["relay".to_string()]).await;
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].event.id, EventId([2; 32]));
        assert_eq!(children[1].event.id, EventId([1; 32]));
    }

    #[tokio::test]
    async fn self_referencing_e_tag_is_skipped() {
        let root_id = EventId([0; 32]);
        let root = event(
            0,
            kind::PUBLICATION_INDEX,
            vec![Tag::new(["e", &root_id.to_string()])],
        );
        let transport: Arc<dyn RelayTransport> = Arc::new(FixedTransport(vec![]));
        let children = build(transport, root, vec!["relay".to_string()]).await;
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn cycle_between_two_indices_terminates() {
        let author = AuthorKey::ZERO;
        let addr_a = ReplaceableAddress {
            kind: kind::PUBLICATION_INDEX,
            author,
            d: "a".to_string(),
        };
        let addr_b = ReplaceableAddress {
            kind: kind::PUBLICATION_INDEX,
            author,
            d: "b".to_string(),
        };
        let node_a = Event {
            id: EventId([1; 32]),
            author,
            created_at: 1,
            kind: kind::PUBLICATION_INDEX,
            tags: vec![Tag::new(["d", "a"]), Tag::new(["a", &addr_b.to_string()])],
            content: String::new(),
        };
        let node_b = Event {
            id: EventId([2; 32]),
            author,
            created_at: 1,
            kind: kind::PUBLICATION_INDEX,
            tags: vec![Tag::new(["d", "b"]), Tag::new(["a", &addr_a.to_string()])],
            content: String::new(),
        };
        let root = Event {
            id: EventId([0; 32]),
            author,
            created_at: 0,
            kind: kind::PUBLICATION_INDEX,
            tags: vec![Tag::new(["a", &addr_a.to_string()])],
            content: String::new(),
        };
        let transport: Arc<dyn RelayTransport> =
            Arc::new(FixedTransport(vec![node_a.clone(), node_b.clone()]));
        let children = build(transport, root, vec!["relay".to_string()]).await;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].event.id, node_a.id);
        assert_eq!(children[0].children.len(), 1);
        assert_eq!(children[0].children[0].event.id, node_b.id);
        // node_b's own a-tag resolves back to node_a, which is emitted
        // again as a leaf (already on this path, so it does not recurse).
        assert_eq!(children[0].children[0].children.len(), 1);
        assert_eq!(children[0].children[0].children[0].event.id, node_a.id);
        assert!(children[0].children[0].children[0].children.is_empty());
    }
}
