//! Value types shared across the acquisition pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical source of a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Precise, GPS-like provider.
    Gps,
    /// Coarse, network-assisted provider.
    Network,
}

/// A single reported observation from a location provider.
///
/// Immutable once produced. `time_ms` is monotonic-corrected epoch millis as
/// reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
    pub time_ms: i64,
    pub provider: ProviderKind,
    /// Network provenance: cell towers contributed to the fix.
    #[serde(default)]
    pub cells: bool,
    /// Network provenance: wifi access points contributed to the fix.
    #[serde(default)]
    pub wifis: bool,
    /// Address already resolved by the provider, if any.
    #[serde(default)]
    pub address: Option<String>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, accuracy: f32, time_ms: i64, provider: ProviderKind) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            time_ms,
            provider,
            cells: false,
            wifis: false,
            address: None,
        }
    }
}

/// Identifier of one in-flight acquisition session. Callbacks carry it so
/// that answers racing with cancellation can be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Inbound commands, abstracted from the two external triggers plus the
/// retry resumption entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Begin a full acquisition followed by a weather fetch. A `"MAIN"`
    /// source tag additionally requests the foreground busy affordance.
    StartLocationAndWeatherUpdate { source_tag: String, force_update: bool },
    /// Begin acquisition without a subsequent weather fetch.
    StartLocationOnlyUpdate { by_last_location_only: bool },
    /// Resumption entry point invoked by the deferred-execution facility.
    LocationUpdateRetry { by_last_location_only: bool, attempts: u32 },
}
