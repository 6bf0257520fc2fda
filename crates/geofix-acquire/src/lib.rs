//! Location acquisition orchestration.
//!
//! Coordinates GPS, network-assisted and last-known location sources into a
//! single acquisition session with bounded waits, connectivity-aware retry
//! and reverse-geocoded address enrichment. The decision logic lives in
//! [`machine`] as a pure state machine; [`service`] runs it on one tokio
//! task and owns the timers, the store and the provider adapters.

pub mod connectivity;
pub mod distance;
pub mod geocode;
pub mod machine;
pub mod provider;
pub mod retry;
pub mod service;
pub mod types;

pub use connectivity::{ConnectivityProbe, SharedFlagProbe};
pub use geocode::{AddressResolver, NominatimResolver};
pub use machine::{AcquisitionMachine, Effect, Event, Outcome, State};
pub use provider::{NetworkLocationClient, NetworkProviderBridge, ProviderClient};
pub use retry::{DeferredScheduler, RetryRequest, TokioRetryScheduler};
pub use service::{
    acquisition_channel, AcquisitionHandle, AcquisitionService, AlwaysPermitted, Collaborators,
    FixDelivery, Msg, PermissionGate, WeatherCheck,
};
pub use types::{Command, LocationFix, ProviderKind, SessionId};
