//! Per-URL relay handle bookkeeping, so repeated `fetch` calls against the
//! same relay set don't redo `ensure_relay` more than necessary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::filter::Filter;
use crate::transport::{HandleState, RelayHandle, RelaySubscription, RelayTransport, TransportResult};

/// Tracks one [`RelayHandle`] per URL behind a transport, recording
/// connected/pending/closed state (§4.2). Implements [`RelayTransport`]
/// itself, so it can be handed to the multiplexer in place of a bare
/// transport: `ensure_relay` reuses a pooled handle when one is live, and
/// `close_pool` is the process-wide "closed exactly once on shutdown" hook
/// (§5).
pub struct RelayPool {
    transport: Arc<dyn RelayTransport>,
    handles: Mutex<HashMap<String, Arc<dyn RelayHandle>>>,
}

/// Lets a pooled `Arc<dyn RelayHandle>` be returned as the `Box<dyn
/// RelayHandle>` the transport trait expects.
struct PooledHandle(Arc<dyn RelayHandle>);

#[async_trait]
impl RelayHandle for PooledHandle {
    fn url(&self) -> &str {
        self.0.url()
    }

    fn state(&self) -> HandleState {
        self.0.state()
    }
}

impl RelayPool {
    pub fn new(transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            transport,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub async fn ensure(&self, url: &str) -> TransportResult<Arc<dyn RelayHandle>> {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.get(url) {
            if handle.state() != HandleState::Closed {
                return Ok(Arc::clone(handle));
            }
        }
        let handle: Arc<dyn RelayHandle> = Arc::from(self.transport.ensure_relay(url).await?);
        handles.insert(url.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    pub async fn close_pool(&self) {
        self.handles.lock().await.clear();
    }
}

#[async_trait]
impl RelayTransport for RelayPool {
    async fn ensure_relay(&self, url: &str) -> TransportResult<Box<dyn RelayHandle>> {
        Ok(Box::new(PooledHandle(self.ensure(url).await?)))
    }

    async fn subscribe(
        &self,
        handle: &dyn RelayHandle,
        filters: &[Filter],
    ) -> TransportResult<Box<dyn RelaySubscription>> {
        let real = self.ensure(handle.url()).await?;
        self.transport.subscribe(real.as_ref(), filters).await
    }
}
