//! The multiplexer's single operation: `fetch` (§4.2).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use quire_core::{Event, EventId};
use quire_util_error::FmtCompact;

use crate::filter::Filter;
use crate::transport::{RelayMsg, RelayTransport};

pub const LOG_TARGET: &str = "quire::relay";

/// Parameters for a single `fetch` call, per §4.2's sizing-policy table.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub budget: Duration,
    pub early_exit: bool,
    pub min_results: usize,
}

enum Signal {
    Msg(usize, RelayMsg),
    Done(usize),
    /// A relay never produced an EOSE of its own because connecting or
    /// subscribing to it failed outright (§7: "relay-subscribe … treated
    /// as instant EOSE").
    Failed(usize),
}

/// Opens one subscription per relay in `relay_set` in parallel, dedupes
/// streamed events by id, and resolves at the earliest of all-eose,
/// early-exit, or budget-exhausted (§4.2).
pub async fn fetch(
    transport: Arc<dyn RelayTransport>,
    filters: Vec<Filter>,
    relay_set: &[String],
    policy: FetchPolicy,
) -> Vec<Event> {
    if relay_set.is_empty() {
        return Vec::new();
    }

    let (tx, mut rx) = mpsc::channel::<Signal>(1024);

    for (idx, url) in relay_set.iter().cloned().enumerate() {
        let transport = Arc::clone(&transport);
        let filters = filters.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let handle = match transport.ensure_relay(&url).await {
                Ok(h) => h,
                Err(err) => {
                    warn!(target: LOG_TARGET, relay = %url, err = %err.fmt_compact(), "connect failed");
                    let _ = tx.send(Signal::Failed(idx)).await;
                    return;
                }
            };
            let mut sub = match transport.subscribe(handle.as_ref(), &filters).await {
                Ok(s) => s,
                Err(err) => {
                    warn!(target: LOG_TARGET, relay = %url, err = %err.fmt_compact(), "subscribe failed");
                    let _ = tx.send(Signal::Failed(idx)).await;
                    return;
                }
            };
            while let Some(msg) = sub.next().await {
                let is_eose = matches!(msg, RelayMsg::Eose);
                if tx.send(Signal::Msg(idx, msg)).await.is_err() {
                    break;
                }
                if is_eose {
                    break;
                }
            }
            sub.close().await;
            let _ = tx.send(Signal::Done(idx)).await;
        });
    }
    drop(tx);

    let mut admitted_ids: HashSet<EventId> = HashSet::new();
    let mut admitted: Vec<Event> = Vec::new();
    let mut relay_done = vec![false; relay_set.len()];
    let mut any_eose = false;

    let deadline = Instant::now() + policy.budget;

    loop {
        if relay_done.iter().all(|d| *d) {
            debug!(target: LOG_TARGET, "all relays done");
            break;
        }
        if policy.early_exit && any_eose && admitted.len() >= policy.min_results {
            debug!(target: LOG_TARGET, admitted = admitted.len(), "early exit");
            break;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!(target: LOG_TARGET, "budget exhausted");
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(remaining) => {
                debug!(target: LOG_TARGET, "budget exhausted");
                break;
            }
            signal = rx.recv() => {
                match signal {
                    None => break,
                    Some(Signal::Done(idx)) => {
                        relay_done[idx] = true;
                    }
                    Some(Signal::Failed(idx)) => {
                        relay_done[idx] = true;
                        any_eose = true;
                    }
                    Some(Signal::Msg(idx, RelayMsg::Eose)) => {
                        relay_done[idx] = true;
                        any_eose = true;
                    }
                    Some(Signal::Msg(_, RelayMsg::Event(event))) => {
                        if admitted_ids.insert(event.id) {
                            admitted.push(event);
                        }
                    }
                }
            }
        }
    }

    admitted
}
