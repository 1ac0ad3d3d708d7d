//! The relay multiplexer (§4.2): fan a filter-set out across a set of relay
//! URLs in parallel, dedup streamed events by id, and resolve on whichever
//! termination condition fires first.

pub mod filter;
pub mod multiplex;
pub mod pool;
pub mod sizing;
pub mod transport;

pub use filter::Filter;
pub use multiplex::{fetch, FetchPolicy, LOG_TARGET};
pub use pool::RelayPool;
pub use transport::{HandleState, RelayHandle, RelayMsg, RelaySubscription, RelayTransport, WsTransport};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use quire_core::{AuthorKey, Event};

    use crate::filter::Filter;
    use crate::multiplex::{fetch, FetchPolicy};
    use crate::transport::{
        HandleState, RelayHandle, RelayMsg, RelaySubscription, RelayTransport, TransportResult,
    };

    struct FakeHandle {
        url: String,
    }

    #[async_trait]
    impl RelayHandle for FakeHandle {
        fn url(&self) -> &str {
            &self.url
        }
        fn state(&self) -> HandleState {
            HandleState::Connected
        }
    }

    /// One relay's scripted timeline: events, then an optional trailing
    /// eose, with a per-message delay before it's emitted.
    #[derive(Clone)]
    struct Script {
        messages: Vec<(Duration, RelayMsg)>,
    }

    struct FakeSubscription {
        messages: std::vec::IntoIter<(Duration, RelayMsg)>,
    }

    #[async_trait]
    impl RelaySubscription for FakeSubscription {
        async fn next(&mut self) -> Option<RelayMsg> {
            let (delay, msg) = self.messages.next()?;
            tokio::time::sleep(delay).await;
            Some(msg)
        }
        async fn close(&mut self) {}
    }

    struct FakeTransport {
        scripts: Mutex<HashMap<String, Script>>,
    }

    impl FakeTransport {
        fn new(scripts: HashMap<String, Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts),
            }
        }
    }

    #[async_trait]
    impl RelayTransport for FakeTransport {
        async fn ensure_relay(&self, url: &str) -> TransportResult<Box<dyn RelayHandle>> {
            Ok(Box::new(FakeHandle {
                url: url.to_string(),
            }))
        }

        async fn subscribe(
            &self,
            handle: &dyn RelayHandle,
            _filters: &[Filter],
        ) -> TransportResult<Box<dyn RelaySubscription>> {
            let mut scripts = self.scripts.lock().await;
            let script = scripts.remove(handle.url()).unwrap_or(Script { messages: vec![] });
            Ok(Box::new(FakeSubscription {
                messages: script.messages.into_iter(),
            }))
        }
    }

    fn event(id: u8) -> Event {
        Event {
            id: quire_core::EventId([id; 32]),
            author: AuthorKey::ZERO,
            created_at: 0,
            kind: 30040,
            tags: vec![],
            content: String::new(),
        }
    }

    #[tokio::test]
    async fn empty_relay_set_yields_empty_result() {
        let transport = Arc::new(FakeTransport::new(HashMap::new()));
        let got = fetch(
            transport,
            vec![Filter::new()],
            &[],
            FetchPolicy {
                budget: Duration::from_secs(1),
                early_exit: false,
                min_results: 0,
            },
        )
        .await;
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn dedups_the_same_event_seen_on_two_relays() {
        let mut scripts = HashMap::new();
        scripts.insert(
            "relay-a".to_string(),
            Script {
                messages: vec![
                    (Duration::ZERO, RelayMsg::Event(event(1))),
                    (Duration::ZERO, RelayMsg::Eose),
                ],
            },
        );
        scripts.insert(
            "relay-b".to_string(),
            Script {
                messages: vec![
                    (Duration::ZERO, RelayMsg::Event(event(1))),
                    (Duration::ZERO, RelayMsg::Eose),
                ],
            },
        );
        let transport = Arc::new(FakeTransport::new(scripts));
        let got = fetch(
            transport,
            vec![Filter::new()],
            &["relay-a".to_string(), "relay-b".to_string()],
            FetchPolicy {
                budget: Duration::from_secs(1),
                early_exit: false,
                min_results: 0,
            },
        )
        .await;
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn early_exit_resolves_before_the_slow_relay_finishes() {
        let mut scripts = HashMap::new();
        scripts.insert(
            "fast".to_string(),
            Script {
                messages: vec![
                    (Duration::ZERO, RelayMsg::Event(event(1))),
                    (Duration::ZERO, RelayMsg::Eose),
                ],
            },
        );
        scripts.insert(
            "slow".to_string(),
            Script {
                messages: vec![(Duration::from_secs(10), RelayMsg::Eose)],
            },
        );
        let transport = Arc::new(FakeTransport::new(scripts));
        let start = tokio::time::Instant::now();
        let got = fetch(
            transport,
            vec![Filter::new()],
            &["fast".to_string(), "slow".to_string()],
            FetchPolicy {
                budget: Duration::from_secs(10),
                early_exit: true,
                min_results: 1,
            },
        )
        .await;
        assert_eq!(got.len(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn budget_exhausted_returns_whatever_was_admitted_so_far() {
        let mut scripts = HashMap::new();
        scripts.insert(
            "stuck".to_string(),
            Script {
                messages: vec![
                    (Duration::ZERO, RelayMsg::Event(event(1))),
                    (Duration::from_secs(10), RelayMsg::Eose),
                ],
            },
        );
        let transport = Arc::new(FakeTransport::new(scripts));
        let got = fetch(
            transport,
            vec![Filter::new()],
            &["stuck".to_string()],
            FetchPolicy {
                budget: Duration::from_millis(50),
                early_exit: false,
                min_results: 0,
            },
        )
        .await;
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn a_failed_relay_counts_as_eose_for_early_exit() {
        struct MixedTransport {
            slow: Script,
        }
        #[async_trait]
        impl RelayTransport for MixedTransport {
            async fn ensure_relay(&self, url: &str) -> TransportResult<Box<dyn RelayHandle>> {
                if url == "broken" {
                    let err = tokio_tungstenite::connect_async("ws://127.0.0.1:0")
                        .await
                        .unwrap_err();
                    return Err(crate::transport::TransportError::Connect {
                        url: url.to_string(),
                        source: err,
                    });
                }
                Ok(Box::new(FakeHandle { url: url.to_string() }))
            }
            async fn subscribe(
                &self,
                _handle: &dyn RelayHandle,
                _filters: &[Filter],
            ) -> TransportResult<Box<dyn RelaySubscription>> {
                Ok(Box::new(FakeSubscription {
                    messages: self.slow.messages.clone().into_iter(),
                }))
            }
        }
        let transport = Arc::new(MixedTransport {
            slow: Script {
                messages: vec![(Duration::from_secs(10), RelayMsg::Eose)],
            },
        });
        let start = tokio::time::Instant::now();
        let got = fetch(
            transport,
            vec![Filter::new()],
            &["broken".to_string(), "slow".to_string()],
            FetchPolicy {
                budget: Duration::from_secs(10),
                early_exit: true,
                min_results: 0,
            },
        )
        .await;
        assert!(got.is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn connect_failure_on_every_relay_yields_empty_set_not_an_error() {
        struct AlwaysFails;
        #[async_trait]
        impl RelayTransport for AlwaysFails {
            async fn ensure_relay(&self, url: &str) -> TransportResult<Box<dyn RelayHandle>> {
                let err = tokio_tungstenite::connect_async(format!("ws://{url}"))
                    .await
                    .unwrap_err();
                Err(crate::transport::TransportError::Connect {
                    url: url.to_string(),
                    source: err,
                })
            }
            async fn subscribe(
                &self,
                _handle: &dyn RelayHandle,
                _filters: &[Filter],
            ) -> TransportResult<Box<dyn RelaySubscription>> {
                unreachable!()
            }
        }
        let got = fetch(
            Arc::new(AlwaysFails),
            vec![Filter::new()],
            &["127.0.0.1:0".to_string()],
            FetchPolicy {
                budget: Duration::from_secs(1),
                early_exit: false,
                min_results: 0,
            },
        )
        .await;
        assert!(got.is_empty());
    }
}
