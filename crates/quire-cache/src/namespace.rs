use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::LOG_TARGET;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Insertion order, oldest first, for the "evict oldest-inserted key on
    /// overflow" rule (§4.1).
    order: VecDeque<String>,
    last_update: Option<Instant>,
}

/// A single namespaced TTL/size-capped map (§4.1).
///
/// Cache operations never suspend (§5): all state is guarded by a plain
/// [`std::sync::Mutex`], never held across an `.await`.
pub struct Namespace<V> {
    name: &'static str,
    ttl: Duration,
    cap: Option<usize>,
    inner: Mutex<Inner<V>>,
}

/// Per-namespace introspection for the `stats` operation (§4.1).
#[derive(Debug, Clone, Copy)]
pub struct NamespaceStats {
    pub len: usize,
    pub last_update: Option<Instant>,
}

impl<V: Clone> Namespace<V> {
    pub fn new(name: &'static str, ttl: Duration, cap: Option<usize>) -> Self {
        Self {
            name,
            ttl,
            cap,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                last_update: None,
            }),
        }
    }

    /// Look up `key` using this namespace's configured TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_with_ttl(key, self.ttl)
    }

    /// Look up `key` with a caller-supplied TTL override. Passing
    /// [`Duration::MAX`] implements the "TTL=∞ probe" read-through-coherence
    /// path used by the request orchestrator (§4.1, §4.7).
    pub fn get_with_ttl(&self, key: &str, ttl: Duration) -> Option<V> {
        let inner = self.inner.lock().expect("not poisoned");
        let entry = inner.entries.get(key)?;
        if entry.inserted_at.elapsed() > ttl {
            trace!(target: LOG_TARGET, namespace = self.name, key, "cache stale");
            return None;
        }
        trace!(target: LOG_TARGET, namespace = self.name, key, "cache hit");
        Some(entry.value.clone())
    }

    /// Record `value` under `key`, evicting the oldest-inserted key if the
    /// namespace's size cap is exceeded (§4.1).
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("not poisoned");
        if !inner.entries.contains_key(&key) {
            inner.order.push_back(key.clone());
            if let Some(cap) = self.cap {
                while inner.entries.len() >= cap {
                    let Some(oldest) = inner.order.pop_front() else {
                        break;
                    };
                    inner.entries.remove(&oldest);
                    trace!(target: LOG_TARGET, namespace = self.name, key = oldest, "cache evict");
                }
            }
        }
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
            },
        );
        inner.last_update = Some(now);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("not poisoned");
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> NamespaceStats {
        let inner = self.inner.lock().expect("not poisoned");
        NamespaceStats {
            len: inner.entries.len(),
            last_update: inner.last_update,
        }
    }

    /// Best-effort recursive byte estimate, via a caller-supplied per-value
    /// sizing function (§4.1 "size").
    pub fn size_bytes(&self, size_of: impl Fn(&V) -> usize) -> usize {
        let inner = self.inner.lock().expect("not poisoned");
        inner
            .entries
            .values()
            .map(|e| size_of(&e.value))
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_set_within_ttl() {
        let ns = Namespace::new("test", Duration::from_secs(60), None);
        ns.set("k", 42);
        assert_eq!(ns.get("k"), Some(42));
    }

    #[test]
    fn get_after_ttl_expiry_is_absent() {
        let ns = Namespace::new("test", Duration::from_millis(5), None);
        ns.set("k", 42);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(ns.get("k"), None);
    }

    #[test]
    fn ttl_infinite_probe_reads_stale_entries() {
        let ns = Namespace::new("test", Duration::from_millis(5), None);
        ns.set("k", 42);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(ns.get("k"), None);
        assert_eq!(ns.get_with_ttl("k", Duration::MAX), Some(42));
    }

    #[test]
    fn size_cap_evicts_oldest_inserted() {
        let ns = Namespace::new("test", Duration::from_secs(60), Some(2));
        ns.set("a", 1);
        ns.set("b", 2);
        ns.set("c", 3);
        assert_eq!(ns.stats().len, 2);
        assert_eq!(ns.get("a"), None);
        assert_eq!(ns.get("b"), Some(2));
        assert_eq!(ns.get("c"), Some(3));
    }

    #[test]
    fn overwriting_an_existing_key_does_not_evict() {
        let ns = Namespace::new("test", Duration::from_secs(60), Some(2));
        ns.set("a", 1);
        ns.set("b", 2);
        ns.set("a", 10);
        assert_eq!(ns.stats().len, 2);
        assert_eq!(ns.get("a"), Some(10));
        assert_eq!(ns.get("b"), Some(2));
    }
}
