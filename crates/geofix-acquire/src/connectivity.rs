//! Connectivity probing.

/// Reports whether network connectivity is currently usable.
///
/// The orchestrator polls this at acquisition entry and again before issuing
/// a network-location request; implementations should answer cheaply.
pub trait ConnectivityProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Probe backed by a shared flag; useful where connectivity state is pushed
/// in from the platform rather than queried.
#[derive(Debug, Default)]
pub struct SharedFlagProbe {
    connected: std::sync::atomic::AtomicBool,
}

impl SharedFlagProbe {
    pub fn new(connected: bool) -> Self {
        Self { connected: std::sync::atomic::AtomicBool::new(connected) }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected
            .store(connected, std::sync::atomic::Ordering::Relaxed);
    }
}

impl ConnectivityProbe for SharedFlagProbe {
    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::Relaxed)
    }
}
