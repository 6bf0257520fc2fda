//! Location provider abstraction and the network-helper bridge.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{LocationFix, ProviderKind, SessionId};

/// Uniform interface over the two physical location sources.
///
/// Requests are asynchronous: answers come back through the driver's
/// [`FixDelivery`](crate::service::FixDelivery) handle tagged with the
/// session they belong to. Cancellation is idempotent.
pub trait ProviderClient: Send + Sync {
    /// Whether the provider is enabled in device settings.
    fn is_enabled(&self, kind: ProviderKind) -> bool;

    /// Request one fix from the given provider.
    fn request_single_fix(&self, kind: ProviderKind, session: SessionId);

    /// Request continuous updates from the given provider.
    fn request_continuous_updates(&self, kind: ProviderKind, session: SessionId);

    /// Cancel all outstanding requests for a session. Cancelling a finished
    /// session is a no-op.
    fn cancel_requests(&self, session: SessionId);

    /// Read the provider's cached last-known fix, if any.
    fn last_known(&self, kind: ProviderKind) -> Option<LocationFix>;
}

/// The companion network-location helper, which may not be bound yet when
/// the orchestrator wants to talk to it.
pub trait NetworkLocationClient: Send + Sync {
    /// Start a network location update, optionally seeded with a last-known
    /// fix the helper may refine.
    fn start_location_update(&self, seed: Option<LocationFix>);
}

#[derive(Debug, Clone)]
enum BridgeAction {
    StartLocationUpdate(Option<LocationFix>),
}

struct BridgeInner {
    client: Option<Arc<dyn NetworkLocationClient>>,
    queued: VecDeque<BridgeAction>,
}

/// Buffers actions toward the network-location helper while it is unbound
/// and flushes them in FIFO order once it connects.
pub struct NetworkProviderBridge {
    inner: Mutex<BridgeInner>,
}

impl Default for NetworkProviderBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkProviderBridge {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BridgeInner { client: None, queued: VecDeque::new() }),
        }
    }

    /// Issue a start-location-update action; queued if the helper is not
    /// connected yet.
    pub fn start_location_update(&self, seed: Option<LocationFix>) {
        let mut inner = self.inner.lock();
        match &inner.client {
            Some(client) => client.start_location_update(seed),
            None => {
                tracing::debug!("network helper not bound, queuing location update");
                inner.queued.push_back(BridgeAction::StartLocationUpdate(seed));
            }
        }
    }

    /// Attach the helper and flush queued actions in order.
    pub fn connect(&self, client: Arc<dyn NetworkLocationClient>) {
        let mut inner = self.inner.lock();
        while let Some(action) = inner.queued.pop_front() {
            match action {
                BridgeAction::StartLocationUpdate(seed) => client.start_location_update(seed),
            }
        }
        inner.client = Some(client);
    }

    /// Detach the helper; subsequent actions are queued again.
    pub fn disconnect(&self) {
        self.inner.lock().client = None;
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().client.is_some()
    }
}
