//! The thread builder's single operation: `thread` (§4.5).

use std::collections::HashMap;

use quire_core::{Event, EventId, ReplaceableAddress, ThreadNode};

fn lowercase_tag_value<'e>(event: &'e Event, name: &str) -> Option<&'e str> {
    event
        .tags
        .iter()
        .find(|t| t.is_named(name))
        .and_then(|t| t.value())
}

fn i_tag_value(event: &Event) -> Option<&str> {
    event
        .tags
        .iter()
        .find(|t| t.is_named("i") || t.is_named("I"))
        .and_then(|t| t.value())
}

/// Finds `event`'s parent id by strict priority: `e` > `a` > `i` (§4.5).
fn find_parent(event: &Event, by_id: &HashMap<EventId, &Event>, events: &[Event]) -> Option<EventId> {
    if let Some(e_value) = lowercase_tag_value(event, "e") {
        if let Ok(id) = e_value.parse::<EventId>() {
            if by_id.contains_key(&id) {
                return Some(id);
            }
        }
    }
    if let Some(a_value) = lowercase_tag_value(event, "a") {
        if let Ok(addr) = a_value.parse::<ReplaceableAddress>() {
            if let Some(found) = events.iter().find(|e| e.replaceable_address().as_ref() == Some(&addr)) {
                return Some(found.id);
            }
        }
        if let Ok(id) = a_value.parse::<EventId>() {
            if by_id.contains_key(&id) {
                return Some(id);
            }
        }
    }
    if let Some(i_value) = lowercase_tag_value(event, "i") {
        if let Some(found) = events
            .iter()
            .find(|e| e.id != event.id && i_tag_value(e) == Some(i_value))
        {
            return Some(found.id);
        }
    }
    None
}

fn sort_tree(nodes: &mut [ThreadNode]) {
    for node in nodes.iter_mut() {
        sort_tree(&mut node.children);
    }
    nodes.sort_by_key(|n| n.event.created_at);
}

/// Reconstructs a reply-graph into root-and-children threads (§4.5).
pub fn thread(events: Vec<Event>) -> Vec<ThreadNode> {
    let by_id: HashMap<EventId, &Event> = events.iter().map(|e| (e.id, e)).collect();

    let mut parent_of: HashMap<EventId, EventId> = HashMap::new();
    for event in &events {
        if let Some(parent) = find_parent(event, &by_id, &events) {
            if parent != event.id {
                parent_of.insert(event.id, parent);
            }
        }
    }

    let mut children_of: HashMap<EventId, Vec<EventId>> = HashMap::new();
    for (child, parent) in &parent_of {
        children_of.entry(*parent).or_default().push(*child);
    }

    fn attach(id: EventId, children_of: &HashMap<EventId, Vec<EventId>>, by_id: &HashMap<EventId, &Event>) -> ThreadNode {
        let children = children_of
            .get(&id)
            .into_iter()
            .flatten()
            .map(|cid| attach(*cid, children_of, by_id))
            .collect();
        ThreadNode {
            event: (*by_id[&id]).clone(),
            children,
        }
    }

    let mut roots: Vec<ThreadNode> = events
        .iter()
        .filter(|e| !parent_of.contains_key(&e.id))
        .map(|e| attach(e.id, &children_of, &by_id))
        .collect();

    sort_tree(&mut roots);
    roots
}

#[cfg(test)]
mod tests {
    use quire_core::{kind, AuthorKey, Tag};

    use super::*;

    fn event(id: u8, created_at: u64, tags: Vec<Tag>) -> Event {
        Event {
            id: EventId([id; 32]),
            author: AuthorKey::ZERO,
            created_at,
            kind: kind::COMMENT,
            tags,
            content: String::new(),
        }
    }

    #[test]
    fn e_tag_links_reply_under_parent() {
        let root = event(1, 1, vec![]);
        let reply = event(2, 2, vec![Tag::new(["e", &EventId([1; 32]).to_string()])]);
        let roots = thread(vec![root, reply]);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].event.id, EventId([2; 32]));
    }

    #[test]
    fn e_tag_takes_priority_over_a_tag() {
        let author = AuthorKey::ZERO;
        let addr = ReplaceableAddress {
            kind: kind::PUBLICATION_INDEX,
            author,
            d: "book".to_string(),
        };
        let via_a = event(1, 1, vec![Tag::new(["d", "book"])]);
        let via_e = event(2, 2, vec![]);
        let reply = event(
            3,
            3,
            vec![
                Tag::new(["e", &EventId([2; 32]).to_string()]),
                Tag::new(["a", &addr.to_string()]),
            ],
        );
        let mut via_a = via_a;
        via_a.kind = kind::PUBLICATION_INDEX;
        let roots = thread(vec![via_a, via_e, reply]);
        let reply_parent = roots
            .iter()
            .find(|r| r.event.id == EventId([2; 32]))
            .expect("via_e is a root");
        assert_eq!(reply_parent.children[0].event.id, EventId([3; 32]));
    }

    #[test]
    fn self_referencing_tag_is_discarded_as_a_root() {
        let ev = event(1, 1, vec![Tag::new(["e", &EventId([1; 32]).to_string()])]);
        let roots = thread(vec![ev]);
        assert_eq!(roots.len(), 1);
        assert!(roots[0].children.is_empty());
    }

    #[test]
    fn siblings_sort_by_ascending_created_at() {
        let root = event(1, 1, vec![]);
        let reply_b = event(2, 20, vec![Tag::new(["e", &EventId([1; 32]).to_string()])]);
        let reply_a = event(3, 10, vec![Tag::new(["e", &EventId([1; 32]).to_string()])]);
        let roots = thread(vec![root, reply_b, reply_a]);
        assert_eq!(roots[0].children[0].event.id, EventId([3; 32]));
        assert_eq!(roots[0].children[1].event.id, EventId([2; 32]));
    }
}
