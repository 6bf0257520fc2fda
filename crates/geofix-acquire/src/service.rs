//! Driver around [`AcquisitionMachine`]: owns the collaborators and runs the
//! single-task message loop.
//!
//! All machine transitions happen on one tokio task, so no transition races
//! another. Timers, provider callbacks and address resolutions re-enter
//! through the same [`Msg`] channel. The only state readable from outside
//! the loop is the busy flag, exposed through [`AcquisitionHandle`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use geofix_core::config::{LocationConfig, UpdateDetail};
use geofix_store::{LocationStore, SourceStatus};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::connectivity::ConnectivityProbe;
use crate::distance::{distance_km, WEATHER_INVALIDATION_DISTANCE_KM};
use crate::geocode::AddressResolver;
use crate::machine::{
    AcquisitionMachine, Effect, Env, Event, Outcome, StartKind, StartRequest, TimerKind,
    NO_LOCATION_GRACE_MS,
};
use crate::provider::{NetworkProviderBridge, ProviderClient};
use crate::retry::{DeferredScheduler, RetryRequest};
use crate::types::{Command, LocationFix, ProviderKind, SessionId};

/// Everything flowing into the acquisition loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    Command(Command),
    Event(Event),
    /// A geocoder answer for an earlier commit. Applied only while the
    /// committing session is still the latest one.
    Address {
        session: SessionId,
        location_id: i64,
        address: String,
    },
}

/// Weather refresh request emitted when a session completes (or degrades to
/// a weather-only update). Consumed by the weather pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherCheck {
    /// Stored location the weather belongs to.
    pub location_id: i64,
    pub source_tag: String,
    pub force_update: bool,
}

/// Whether the platform currently lets us read location at all.
pub trait PermissionGate: Send + Sync {
    fn location_permitted(&self) -> bool;
}

/// Gate for platforms without a runtime permission model.
pub struct AlwaysPermitted;

impl PermissionGate for AlwaysPermitted {
    fn location_permitted(&self) -> bool {
        true
    }
}

/// External pieces the loop drives. All are shared handles so callers can
/// keep feeding the provider side.
pub struct Collaborators {
    pub store: Arc<LocationStore>,
    pub provider: Arc<dyn ProviderClient>,
    pub bridge: Arc<NetworkProviderBridge>,
    pub connectivity: Arc<dyn ConnectivityProbe>,
    pub resolver: Arc<dyn AddressResolver>,
    pub scheduler: Arc<dyn DeferredScheduler>,
    pub permissions: Arc<dyn PermissionGate>,
    pub weather: UnboundedSender<WeatherCheck>,
    pub config: LocationConfig,
}

/// Cheap handle for submitting work to a running [`AcquisitionService`].
#[derive(Clone)]
pub struct AcquisitionHandle {
    tx: UnboundedSender<Msg>,
    in_process: Arc<AtomicBool>,
}

impl AcquisitionHandle {
    /// Full acquisition followed by a weather refresh.
    pub fn start_location_and_weather_update(&self, source_tag: &str, force_update: bool) {
        let _ = self.tx.send(Msg::Command(Command::StartLocationAndWeatherUpdate {
            source_tag: source_tag.to_string(),
            force_update,
        }));
    }

    /// Acquisition without the weather follow-up.
    pub fn start_location_only_update(&self, by_last_location_only: bool) {
        let _ = self
            .tx
            .send(Msg::Command(Command::StartLocationOnlyUpdate { by_last_location_only }));
    }

    /// Supersede whatever session is in flight.
    pub fn cancel(&self) {
        let _ = self.tx.send(Msg::Event(Event::Cancel));
    }

    /// Busy flag, readable from any thread.
    pub fn is_in_process(&self) -> bool {
        self.in_process.load(Ordering::SeqCst)
    }

    /// Raw sender, for the retry scheduler and provider adapters.
    pub fn sender(&self) -> UnboundedSender<Msg> {
        self.tx.clone()
    }

    pub fn fix_delivery(&self) -> FixDelivery {
        FixDelivery { tx: self.tx.clone() }
    }
}

/// Callback handle given to provider adapters; answers re-enter the loop
/// tagged with their session.
#[derive(Clone)]
pub struct FixDelivery {
    tx: UnboundedSender<Msg>,
}

impl FixDelivery {
    /// Deliver a provider answer. `None` reports an explicit empty answer,
    /// which is distinct from a timeout.
    pub fn deliver(&self, session: SessionId, fix: Option<LocationFix>) {
        let _ = self.tx.send(Msg::Event(Event::Fix { session, fix }));
    }
}

/// Create the message channel shared by the service, its handle and the
/// retry scheduler. Built outside [`AcquisitionService::new`] so the
/// scheduler can be wired into [`Collaborators`] first.
pub fn acquisition_channel() -> (UnboundedSender<Msg>, UnboundedReceiver<Msg>) {
    mpsc::unbounded_channel()
}

/// The acquisition loop. Create with [`AcquisitionService::new`], then drive
/// with [`AcquisitionService::run`] on its own task.
pub struct AcquisitionService {
    machine: AcquisitionMachine,
    collab: Collaborators,
    rx: UnboundedReceiver<Msg>,
    tx: UnboundedSender<Msg>,
    timers: HashMap<TimerKind, JoinHandle<()>>,
    in_process: Arc<AtomicBool>,
    /// Session id used for cancellation effects emitted while the machine
    /// has already dropped its session.
    last_session: SessionId,
    /// Latest committed (session, location) pair; late address answers for
    /// anything else are dropped.
    last_commit: Option<(SessionId, i64)>,
}

impl AcquisitionService {
    pub fn new(
        collab: Collaborators,
        tx: UnboundedSender<Msg>,
        rx: UnboundedReceiver<Msg>,
    ) -> (Self, AcquisitionHandle) {
        let in_process = Arc::new(AtomicBool::new(false));
        let handle = AcquisitionHandle { tx: tx.clone(), in_process: in_process.clone() };
        let service = Self {
            machine: AcquisitionMachine::new(collab.config.geocoder),
            collab,
            rx,
            tx,
            timers: HashMap::new(),
            in_process,
            last_session: SessionId(0),
            last_commit: None,
        };
        (service, handle)
    }

    pub async fn run(mut self) {
        tracing::info!("acquisition service started");
        while let Some(msg) = self.rx.recv().await {
            self.handle_msg(msg);
        }
        self.cancel_timers();
        tracing::info!("acquisition service stopped");
    }

    fn handle_msg(&mut self, msg: Msg) {
        match msg {
            Msg::Command(command) => self.dispatch(Event::Start(self.start_request(command))),
            Msg::Event(event) => self.dispatch(event),
            Msg::Address { session, location_id, address } => {
                self.apply_address(session, location_id, &address);
            }
        }
    }

    /// Sample collaborator state into the request the machine decides on.
    fn start_request(&self, command: Command) -> StartRequest {
        let config = &self.collab.config;
        let env = Env {
            permitted: self.collab.permissions.location_permitted(),
            gps_available: config.gps_enabled
                && self.collab.provider.is_enabled(ProviderKind::Gps),
            gps_by_preference: config.gps_enabled,
            network_available: self.collab.provider.is_enabled(ProviderKind::Network),
            update_location_enabled: config.update_location_enabled,
            stored_last_update_ms: self.collab.store.last_update_location_time().unwrap_or_else(
                |e| {
                    tracing::warn!("failed to read last update time: {e:#}");
                    0
                },
            ),
        };
        match command {
            Command::StartLocationAndWeatherUpdate { source_tag, force_update } => StartRequest {
                kind: StartKind::FullUpdate,
                source_tag,
                force_update,
                by_last_location_only: false,
                attempts: 0,
                env,
            },
            Command::StartLocationOnlyUpdate { by_last_location_only } => StartRequest {
                kind: StartKind::LocationOnly,
                source_tag: String::new(),
                force_update: false,
                by_last_location_only,
                attempts: 0,
                env,
            },
            Command::LocationUpdateRetry { by_last_location_only, attempts } => StartRequest {
                kind: StartKind::Retry,
                source_tag: String::new(),
                force_update: false,
                by_last_location_only,
                attempts,
                env,
            },
        }
    }

    /// Feed an event through the machine and execute the resulting effects.
    /// Effects with immediate replies re-enter the queue so that the whole
    /// chain runs before the next inbound message.
    fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let effects = self.machine.handle(event, Utc::now().timestamp_millis());
            let session = self.machine.session_id().unwrap_or(self.last_session);
            self.last_session = session;
            for effect in effects {
                if let Some(reply) = self.execute(effect, session) {
                    queue.push_back(reply);
                }
            }
        }
    }

    fn execute(&mut self, effect: Effect, session: SessionId) -> Option<Event> {
        match effect {
            Effect::SetBusy(busy) => {
                self.in_process.store(busy, Ordering::SeqCst);
                None
            }
            Effect::MarkUpdateStarted => {
                self.mark_status(SourceStatus::update_started());
                None
            }
            Effect::MarkStatus(status) => {
                self.mark_status(status);
                None
            }
            Effect::MarkNoLocationFound => {
                self.mark_no_location_found();
                None
            }
            Effect::RequestSingleFix(kind) => {
                self.collab.provider.request_single_fix(kind, session);
                None
            }
            Effect::RequestContinuousGps => {
                self.collab.provider.request_continuous_updates(ProviderKind::Gps, session);
                None
            }
            Effect::CancelProviderRequests => {
                self.collab.provider.cancel_requests(session);
                None
            }
            Effect::StartNetworkUpdate { seed } => {
                self.collab.bridge.start_location_update(seed);
                None
            }
            Effect::StartTimer { timer, after } => {
                self.arm_timer(timer, after, session);
                None
            }
            Effect::CancelTimers => {
                self.cancel_timers();
                None
            }
            Effect::CommitFix { fix, from_last_location } => {
                match self.commit_fix(session, &fix, from_last_location) {
                    Ok(location_id) => Some(Event::Committed { session, location_id }),
                    Err(e) => {
                        tracing::error!("failed to persist acquired fix: {e:#}");
                        Some(Event::Cancel)
                    }
                }
            }
            Effect::ScheduleRetry { by_last_location_only, attempts } => {
                self.collab
                    .scheduler
                    .schedule(RetryRequest { by_last_location_only, attempts });
                None
            }
            Effect::ClearRetryState => {
                if let Err(e) = self.collab.store.clear_retry_state() {
                    tracing::warn!("failed to clear retry state: {e:#}");
                }
                None
            }
            Effect::ProbeConnectivity => Some(Event::Connectivity {
                session,
                connected: self.collab.connectivity.is_connected(),
            }),
            Effect::ReadLastKnown => Some(Event::LastKnown {
                session,
                gps: self.collab.provider.last_known(ProviderKind::Gps),
                network: self.collab.provider.last_known(ProviderKind::Network),
            }),
            Effect::EmitWeatherCheck { source_tag, force_update } => {
                match self.collab.store.auto_location() {
                    Ok(record) => {
                        let check =
                            WeatherCheck { location_id: record.id, source_tag, force_update };
                        if self.collab.weather.send(check).is_err() {
                            tracing::debug!("weather pipeline closed, dropping refresh request");
                        }
                    }
                    Err(e) => tracing::warn!("cannot address weather refresh: {e:#}"),
                }
                None
            }
            Effect::SessionEnded(outcome) => {
                tracing::info!(%session, ?outcome, "acquisition session ended");
                if matches!(outcome, Outcome::Abandoned | Outcome::Failed(_)) {
                    self.cancel_timers();
                }
                None
            }
        }
    }

    fn mark_status(&self, status: SourceStatus) {
        let result = self
            .collab
            .store
            .auto_location()
            .and_then(|record| self.collab.store.update_location_source(record.id, status));
        if let Err(e) = result {
            tracing::warn!("failed to update location source: {e:#}");
        }
    }

    /// Tag the stored record unreachable, unless a recent update already
    /// covered it.
    fn mark_no_location_found(&self) {
        let now_ms = Utc::now().timestamp_millis();
        match self.collab.store.last_update_location_time() {
            Ok(last) if last > now_ms - NO_LOCATION_GRACE_MS => {}
            Ok(_) => self.mark_status(SourceStatus::not_reachable()),
            Err(e) => tracing::warn!("failed to read last update time: {e:#}"),
        }
    }

    /// Persist the fix: status composition, weather-cache invalidation past
    /// the movement radius, then asynchronous address enrichment.
    fn commit_fix(
        &mut self,
        session: SessionId,
        fix: &LocationFix,
        from_last_location: bool,
    ) -> anyhow::Result<i64> {
        let current = self.collab.store.auto_location()?;

        let status = match fix.provider {
            ProviderKind::Gps => SourceStatus::gps(),
            ProviderKind::Network => match self.collab.config.update_detail {
                UpdateDetail::LocationSource => SourceStatus::network_with(fix.cells, fix.wifis),
                UpdateDetail::Nothing => SourceStatus::network(),
            },
        };
        let status = if from_last_location { status.with_last_location() } else { status };

        let moved_km =
            distance_km(current.latitude, current.longitude, fix.latitude, fix.longitude);
        if moved_km > WEATHER_INVALIDATION_DISTANCE_KM {
            tracing::info!(moved_km, "moved past weather cache radius, dropping stored records");
            self.collab.store.delete_weather_records_for(current.id)?;
        }

        self.collab.store.update_auto_location_geo(
            fix.latitude,
            fix.longitude,
            status,
            fix.accuracy,
            fix.time_ms,
        )?;
        self.last_commit = Some((session, current.id));

        if let Some(address) = &fix.address {
            self.collab.store.update_auto_location_address(current.id, address)?;
        } else {
            self.spawn_geocode(session, current.id, fix.latitude, fix.longitude);
        }
        Ok(current.id)
    }

    fn spawn_geocode(&self, session: SessionId, location_id: i64, latitude: f64, longitude: f64) {
        let future = self
            .collab
            .resolver
            .resolve(latitude, longitude, &self.collab.config.language);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Some(address) = future.await {
                let _ = tx.send(Msg::Address { session, location_id, address });
            }
        });
    }

    fn apply_address(&self, session: SessionId, location_id: i64, address: &str) {
        if self.last_commit != Some((session, location_id)) {
            tracing::debug!(%session, "dropping address answer for a superseded commit");
            return;
        }
        tracing::debug!(location_id, address, "attaching resolved address");
        if let Err(e) = self.collab.store.update_auto_location_address(location_id, address) {
            tracing::warn!("failed to store resolved address: {e:#}");
        }
    }

    fn arm_timer(&mut self, timer: TimerKind, after: Duration, session: SessionId) {
        if let Some(previous) = self.timers.remove(&timer) {
            previous.abort();
        }
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Msg::Event(Event::Timer { session, timer }));
        });
        self.timers.insert(timer, handle);
    }

    fn cancel_timers(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_fix_delivery_tags_the_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let delivery = FixDelivery { tx };
        let fix = LocationFix::new(52.0, 21.0, 25.0, 1, ProviderKind::Network);
        delivery.deliver(SessionId(3), Some(fix.clone()));

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg, Msg::Event(Event::Fix { session: SessionId(3), fix: Some(fix) }));
    }

    #[tokio::test]
    async fn test_handle_commands_map_to_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = AcquisitionHandle { tx, in_process: Arc::new(AtomicBool::new(false)) };

        handle.start_location_and_weather_update("MAIN", true);
        handle.start_location_only_update(true);
        handle.cancel();

        assert_eq!(
            rx.recv().await.unwrap(),
            Msg::Command(Command::StartLocationAndWeatherUpdate {
                source_tag: "MAIN".to_string(),
                force_update: true
            })
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            Msg::Command(Command::StartLocationOnlyUpdate { by_last_location_only: true })
        );
        assert_eq!(rx.recv().await.unwrap(), Msg::Event(Event::Cancel));
    }
}
