//! The acquisition state machine.
//!
//! Pure `(state, event) -> effects` logic: timers, provider requests and
//! store writes are returned as [`Effect`] values and executed by the driver
//! in [`crate::service`]. This keeps the multi-level GPS/network fallback a
//! transition table instead of nested timer callbacks, and makes the timeout
//! races testable without real timers.
//!
//! Invariants:
//! - at most one session is in flight; a start request while one is active
//!   is ignored (an explicit [`Event::Cancel`] supersedes);
//! - every inbound callback carries a [`SessionId`]; events tagged with a
//!   stale id are discarded, regardless of timer cancellation;
//! - every exit path cancels the session's timers and provider requests.

use std::time::Duration;

use geofix_core::config::GeocoderPolicy;
use geofix_core::error::AcquireError;
use geofix_store::SourceStatus;

use crate::retry::MAX_RETRY_ATTEMPTS;
use crate::types::{LocationFix, ProviderKind, SessionId};

/// Wait for one coarse fix in the OS-mediated probe.
pub const COARSE_FIX_TIMEOUT: Duration = Duration::from_secs(30);
/// Wait for one precise fix.
pub const GPS_FIX_TIMEOUT: Duration = Duration::from_secs(60);
/// Wait on the last-known-location probe before falling back to a pure
/// network acquisition.
pub const LAST_KNOWN_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
/// Wait before re-polling connectivity lost mid-session.
pub const CONNECTIVITY_RECHECK_TIMEOUT: Duration = Duration::from_secs(30);
/// Wait on the network helper before degrading to a weather-only refresh.
pub const WEATHER_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);
/// Extra continuous-GPS window in the fallback probe.
pub const GPS_FALLBACK_TIMEOUT: Duration = Duration::from_secs(30);
/// A last-known GPS fix older than this is ignored.
pub const GPS_MAX_FIX_AGE_MS: i64 = 350_000;
/// A stale stored record is only re-tagged as unreachable after this long
/// without a successful update.
pub const NO_LOCATION_GRACE_MS: i64 = 5 * 60 * 1000;

/// Observable states of the machine. `Resolved`/`Failed` are reported as
/// [`Effect::SessionEnded`] outcomes; the machine itself returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    AwaitingGps,
    AwaitingNetwork,
    AwaitingLastKnown,
    AwaitingConnectivity,
    AwaitingAddress,
}

/// One-shot timers armed by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    GpsFix,
    CoarseFix,
    LastKnownProbe,
    Connectivity,
    WeatherConfirm,
    GpsFallback,
}

/// What kind of trigger started the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    FullUpdate,
    LocationOnly,
    Retry,
}

/// Collaborator state sampled by the driver when a session starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Env {
    pub permitted: bool,
    /// GPS enabled by user preference AND device settings.
    pub gps_available: bool,
    /// GPS enabled by user preference alone.
    pub gps_by_preference: bool,
    /// Network provider enabled by device settings.
    pub network_available: bool,
    pub update_location_enabled: bool,
    /// Last successful update of the stored auto record, epoch millis.
    pub stored_last_update_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub kind: StartKind,
    pub source_tag: String,
    pub force_update: bool,
    pub by_last_location_only: bool,
    pub attempts: u32,
    pub env: Env,
}

/// Everything that can happen to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start(StartRequest),
    /// Supersede the current session, cancelling its timers and requests.
    Cancel,
    /// A provider answered; `None` means the request was answered empty.
    Fix { session: SessionId, fix: Option<LocationFix> },
    /// Reply to [`Effect::ReadLastKnown`].
    LastKnown {
        session: SessionId,
        gps: Option<LocationFix>,
        network: Option<LocationFix>,
    },
    /// Reply to [`Effect::ProbeConnectivity`].
    Connectivity { session: SessionId, connected: bool },
    Timer { session: SessionId, timer: TimerKind },
    /// Reply to [`Effect::CommitFix`]: the record was persisted.
    Committed { session: SessionId, location_id: i64 },
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved { location_id: i64 },
    /// No provider usable; only the weather check was requested.
    WeatherOnly,
    RetryScheduled { attempts: u32 },
    /// Ended without an update (stale last-known in by-last-location mode,
    /// or explicit cancellation).
    Abandoned,
    Failed(AcquireError),
}

/// Side effects requested by a transition, executed by the driver.
/// Effects that produce an immediate reply event (`ProbeConnectivity`,
/// `ReadLastKnown`) are always last in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetBusy(bool),
    MarkUpdateStarted,
    MarkStatus(SourceStatus),
    /// Tag the record unreachable unless it was updated within the grace
    /// period.
    MarkNoLocationFound,
    RequestSingleFix(ProviderKind),
    RequestContinuousGps,
    CancelProviderRequests,
    /// Hand a request to the network helper through the FIFO bridge.
    StartNetworkUpdate { seed: Option<LocationFix> },
    StartTimer { timer: TimerKind, after: Duration },
    CancelTimers,
    /// Persist the fix: status computation, >10 km cache invalidation and
    /// address enrichment happen in the driver, which replies `Committed`.
    CommitFix { fix: LocationFix, from_last_location: bool },
    ScheduleRetry { by_last_location_only: bool, attempts: u32 },
    ClearRetryState,
    ProbeConnectivity,
    ReadLastKnown,
    EmitWeatherCheck { source_tag: String, force_update: bool },
    SessionEnded(Outcome),
}

/// Which connectivity probe a reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnStage {
    /// At acquisition entry: failure goes to the durable retry scheduler.
    Entry,
    /// Mid-session, before the network request: failure arms one recheck.
    Mid,
    /// After the recheck timer: failure is terminal.
    MidRecheck,
}

/// Why a last-known read was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastKnownContext {
    /// Seeding the network path with a fresh GPS fix.
    NetworkPath,
    /// The coarse single-fix probe timed out.
    DetectFallback,
    /// The extra continuous-GPS window expired.
    GpsFallbackEnd,
}

#[derive(Debug)]
struct Session {
    id: SessionId,
    source_tag: String,
    force_update: bool,
    with_weather: bool,
    by_last_location_only: bool,
    attempts: u32,
    env: Env,
    /// The one-shot GPS retry after an empty network answer was spent.
    gps_retry_done: bool,
    conn_stage: ConnStage,
    lk_context: LastKnownContext,
    seed: Option<LocationFix>,
}

/// The orchestrator's decision core. Owns no I/O.
pub struct AcquisitionMachine {
    policy: GeocoderPolicy,
    state: State,
    session: Option<Session>,
    next_session: u64,
}

impl AcquisitionMachine {
    pub fn new(policy: GeocoderPolicy) -> Self {
        Self { policy, state: State::Idle, session: None, next_session: 0 }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn in_process(&self) -> bool {
        self.session.is_some()
    }

    /// Feed one event; returns the effects to execute, in order.
    pub fn handle(&mut self, event: Event, now_ms: i64) -> Vec<Effect> {
        let mut effects = Vec::new();
        let next = match event {
            Event::Start(req) => self.on_start(req, &mut effects),
            Event::Cancel => self.on_cancel(&mut effects),
            Event::Fix { session, fix } => {
                self.guarded(session, &mut effects, |m, fx| m.on_fix(fix, fx))
            }
            Event::LastKnown { session, gps, network } => {
                self.guarded(session, &mut effects, |m, fx| m.on_last_known(gps, network, now_ms, fx))
            }
            Event::Connectivity { session, connected } => {
                self.guarded(session, &mut effects, |m, fx| m.on_connectivity(connected, fx))
            }
            Event::Timer { session, timer } => {
                self.guarded(session, &mut effects, |m, fx| m.on_timer(timer, fx))
            }
            Event::Committed { session, location_id } => {
                self.guarded(session, &mut effects, |m, fx| m.on_committed(location_id, fx))
            }
        };
        self.state = next;
        if effects.iter().any(|e| matches!(e, Effect::SessionEnded(_))) {
            self.session = None;
            self.state = State::Idle;
        }
        effects
    }

    /// Run a handler only if the event belongs to the active session.
    /// Discarding stale callbacks here is a hard invariant: cancellation of
    /// the underlying timers and requests is only best-effort.
    fn guarded(
        &mut self,
        session: SessionId,
        effects: &mut Vec<Effect>,
        f: impl FnOnce(&mut Self, &mut Vec<Effect>) -> State,
    ) -> State {
        let active = self.session.as_ref().map(|s| s.id);
        if active == Some(session) {
            f(self, effects)
        } else {
            tracing::debug!(%session, "discarding event for stale session");
            self.state
        }
    }

    fn on_start(&mut self, req: StartRequest, effects: &mut Vec<Effect>) -> State {
        if self.session.is_some() {
            tracing::debug!("acquisition already in process, ignoring start request");
            return self.state;
        }

        self.next_session += 1;
        let id = SessionId(self.next_session);

        if !req.env.permitted {
            tracing::info!(%id, "location permission or settings missing");
            effects.push(Effect::SetBusy(false));
            effects.push(Effect::SessionEnded(Outcome::Failed(AcquireError::PermissionDenied)));
            return State::Idle;
        }

        let with_weather = match req.kind {
            StartKind::FullUpdate | StartKind::Retry => true,
            StartKind::LocationOnly => false,
        };
        let session = Session {
            id,
            source_tag: req.source_tag,
            force_update: req.force_update,
            with_weather,
            by_last_location_only: req.by_last_location_only,
            attempts: req.attempts,
            env: req.env,
            gps_retry_done: false,
            conn_stage: ConnStage::Entry,
            lk_context: LastKnownContext::NetworkPath,
            seed: None,
        };
        tracing::info!(
            %id,
            kind = ?req.kind,
            gps = session.env.gps_available,
            network = session.env.network_available,
            policy = ?self.policy,
            "starting acquisition"
        );
        self.session = Some(session);

        effects.push(Effect::SetBusy(true));
        effects.push(Effect::MarkUpdateStarted);

        if req.kind == StartKind::FullUpdate {
            let no_provider = !req.env.gps_available
                && !req.env.network_available
                && self.policy == GeocoderPolicy::System;
            if !req.env.update_location_enabled || no_provider {
                // Nothing can move the stored position; refresh weather only.
                return self.finish_weather_only(effects);
            }
            if self.policy != GeocoderPolicy::Local {
                return self.detect_location(effects);
            }
        }
        self.enter_network_path(effects)
    }

    fn on_cancel(&mut self, effects: &mut Vec<Effect>) -> State {
        if self.session.is_none() {
            return State::Idle;
        }
        effects.push(Effect::CancelTimers);
        effects.push(Effect::CancelProviderRequests);
        effects.push(Effect::SetBusy(false));
        effects.push(Effect::SessionEnded(Outcome::Abandoned));
        State::Idle
    }

    /// The raw network path: optional GPS shortcut, then connectivity gate,
    /// then last-known probe.
    fn enter_network_path(&mut self, effects: &mut Vec<Effect>) -> State {
        let policy = self.policy;
        let s = self.session_mut();
        let network_not_enabled = !s.env.network_available && policy != GeocoderPolicy::Hybrid;
        if network_not_enabled && s.env.gps_available && !s.by_last_location_only {
            tracing::debug!("network provider not usable, requesting a GPS fix instead");
            effects.push(Effect::RequestSingleFix(ProviderKind::Gps));
            effects.push(Effect::StartTimer { timer: TimerKind::GpsFix, after: GPS_FIX_TIMEOUT });
            return State::AwaitingGps;
        }

        s.conn_stage = ConnStage::Entry;
        effects.push(Effect::ProbeConnectivity);
        State::AwaitingConnectivity
    }

    fn on_connectivity(&mut self, connected: bool, effects: &mut Vec<Effect>) -> State {
        if self.state != State::AwaitingConnectivity {
            tracing::debug!("unexpected connectivity reply in {:?}", self.state);
            return self.state;
        }
        let stage = self.session_ref().conn_stage;
        match (stage, connected) {
            (ConnStage::Entry, true) => {
                let s = self.session_mut();
                s.lk_context = LastKnownContext::NetworkPath;
                effects.push(Effect::ClearRetryState);
                effects.push(Effect::StartTimer {
                    timer: TimerKind::LastKnownProbe,
                    after: LAST_KNOWN_PROBE_TIMEOUT,
                });
                effects.push(Effect::ReadLastKnown);
                State::AwaitingLastKnown
            }
            (ConnStage::Entry, false) => {
                let s = self.session_ref();
                if s.attempts > MAX_RETRY_ATTEMPTS {
                    tracing::warn!(attempts = s.attempts, "retries exhausted, location not reachable");
                    // Consume the persisted request so a restart does not
                    // replay an already-surrendered acquisition.
                    effects.push(Effect::ClearRetryState);
                    effects.push(Effect::MarkStatus(SourceStatus::not_reachable()));
                    effects.push(Effect::SetBusy(false));
                    effects.push(Effect::SessionEnded(Outcome::Failed(
                        AcquireError::RetriesExhausted,
                    )));
                } else {
                    let next = s.attempts + 1;
                    tracing::info!(attempt = next, "no connectivity, scheduling deferred retry");
                    effects.push(Effect::ScheduleRetry {
                        by_last_location_only: s.by_last_location_only,
                        attempts: next,
                    });
                    effects.push(Effect::SetBusy(false));
                    effects.push(Effect::SessionEnded(Outcome::RetryScheduled { attempts: next }));
                }
                State::Idle
            }
            (ConnStage::Mid, true) | (ConnStage::MidRecheck, true) => {
                self.proceed_network_request(effects)
            }
            (ConnStage::Mid, false) => {
                self.session_mut().conn_stage = ConnStage::MidRecheck;
                effects.push(Effect::StartTimer {
                    timer: TimerKind::Connectivity,
                    after: CONNECTIVITY_RECHECK_TIMEOUT,
                });
                State::AwaitingConnectivity
            }
            (ConnStage::MidRecheck, false) => {
                tracing::warn!("connectivity did not return, location not reachable");
                effects.push(Effect::MarkStatus(SourceStatus::not_reachable()));
                effects.push(Effect::SetBusy(false));
                effects.push(Effect::SessionEnded(Outcome::Failed(AcquireError::NoConnectivity)));
                State::Idle
            }
        }
    }

    fn on_last_known(
        &mut self,
        gps: Option<LocationFix>,
        network: Option<LocationFix>,
        now_ms: i64,
        effects: &mut Vec<Effect>,
    ) -> State {
        if self.state != State::AwaitingLastKnown {
            tracing::debug!("unexpected last-known reply in {:?}", self.state);
            return self.state;
        }
        effects.push(Effect::CancelTimers);
        let context = self.session_ref().lk_context;
        match context {
            LastKnownContext::NetworkPath => {
                let s = self.session_mut();
                let fresh = gps.filter(|f| {
                    f.time_ms > now_ms - GPS_MAX_FIX_AGE_MS && f.time_ms > s.env.stored_last_update_ms
                });
                if let Some(ref fix) = fresh {
                    tracing::debug!(time_ms = fix.time_ms, "seeding with fresh last-known GPS fix");
                    effects.push(Effect::MarkStatus(SourceStatus::gps().with_last_location()));
                } else if s.by_last_location_only {
                    // Nothing fresh to apply and the caller asked for the
                    // last location only.
                    effects.push(Effect::SetBusy(false));
                    effects.push(Effect::SessionEnded(Outcome::Abandoned));
                    return State::Idle;
                }
                s.seed = fresh;
                s.conn_stage = ConnStage::Mid;
                effects.push(Effect::ProbeConnectivity);
                State::AwaitingConnectivity
            }
            LastKnownContext::DetectFallback => match (gps, network) {
                (None, Some(net)) => {
                    tracing::debug!("coarse probe timed out, using last-known network fix");
                    self.resolve(net, true, effects)
                }
                (Some(gps_fix), None) => {
                    tracing::debug!("coarse probe timed out, using last-known GPS fix");
                    self.resolve(gps_fix, true, effects)
                }
                _ => {
                    if self.session_ref().env.gps_by_preference {
                        effects.push(Effect::RequestContinuousGps);
                        effects.push(Effect::StartTimer {
                            timer: TimerKind::GpsFallback,
                            after: GPS_FALLBACK_TIMEOUT,
                        });
                        State::AwaitingGps
                    } else {
                        self.fail_no_location(effects)
                    }
                }
            },
            LastKnownContext::GpsFallbackEnd => match gps {
                Some(gps_fix) => self.resolve(gps_fix, true, effects),
                None => self.fail_no_location(effects),
            },
        }
    }

    fn on_timer(&mut self, timer: TimerKind, effects: &mut Vec<Effect>) -> State {
        match (timer, self.state) {
            (TimerKind::GpsFix, State::AwaitingGps) => {
                tracing::info!("timeout getting location from GPS");
                effects.push(Effect::CancelProviderRequests);
                effects.push(Effect::MarkNoLocationFound);
                effects.push(Effect::SetBusy(false));
                effects.push(Effect::SessionEnded(Outcome::Failed(AcquireError::Timeout)));
                State::Idle
            }
            (TimerKind::GpsFallback, State::AwaitingGps) => {
                // Use whatever last-known GPS fix exists by now.
                effects.push(Effect::CancelProviderRequests);
                self.session_mut().lk_context = LastKnownContext::GpsFallbackEnd;
                effects.push(Effect::ReadLastKnown);
                State::AwaitingLastKnown
            }
            (TimerKind::CoarseFix, State::AwaitingNetwork) => {
                tracing::debug!("coarse single-fix probe timed out, comparing last-known fixes");
                effects.push(Effect::CancelProviderRequests);
                self.session_mut().lk_context = LastKnownContext::DetectFallback;
                effects.push(Effect::ReadLastKnown);
                State::AwaitingLastKnown
            }
            (TimerKind::WeatherConfirm, State::AwaitingNetwork) => {
                tracing::info!("network helper silent, falling back to weather-only refresh");
                effects.push(Effect::CancelProviderRequests);
                let s = self.session_ref();
                if s.with_weather {
                    effects.push(Effect::EmitWeatherCheck {
                        source_tag: s.source_tag.clone(),
                        force_update: s.force_update,
                    });
                    effects.push(Effect::SetBusy(false));
                    effects.push(Effect::SessionEnded(Outcome::WeatherOnly));
                } else {
                    effects.push(Effect::SetBusy(false));
                    effects.push(Effect::SessionEnded(Outcome::Failed(AcquireError::Timeout)));
                }
                State::Idle
            }
            (TimerKind::LastKnownProbe, State::AwaitingLastKnown) => {
                // The last-known read never answered; fall back to a pure
                // network acquisition with no seed.
                let s = self.session_mut();
                s.seed = None;
                s.conn_stage = ConnStage::Mid;
                effects.push(Effect::ProbeConnectivity);
                State::AwaitingConnectivity
            }
            (TimerKind::Connectivity, State::AwaitingConnectivity) => {
                effects.push(Effect::ProbeConnectivity);
                self.state
            }
            _ => {
                tracing::debug!(?timer, state = ?self.state, "ignoring timer outside its state");
                self.state
            }
        }
    }

    fn on_fix(&mut self, fix: Option<LocationFix>, effects: &mut Vec<Effect>) -> State {
        match self.state {
            State::AwaitingGps => match fix {
                Some(f) => self.resolve(f, false, effects),
                None => {
                    tracing::debug!("empty GPS answer ignored");
                    self.state
                }
            },
            State::AwaitingNetwork => match fix {
                Some(f) => self.resolve(f, false, effects),
                None => {
                    let s = self.session_mut();
                    if s.env.gps_available && !s.gps_retry_done {
                        tracing::info!("empty network answer, retrying once via GPS");
                        s.gps_retry_done = true;
                        effects.push(Effect::CancelTimers);
                        effects.push(Effect::RequestSingleFix(ProviderKind::Gps));
                        effects.push(Effect::StartTimer {
                            timer: TimerKind::GpsFix,
                            after: GPS_FIX_TIMEOUT,
                        });
                        State::AwaitingGps
                    } else {
                        tracing::warn!("no location found after provider fallbacks");
                        effects.push(Effect::CancelTimers);
                        effects.push(Effect::MarkStatus(SourceStatus::not_reachable()));
                        let s = self.session_ref();
                        if s.with_weather {
                            // Still refresh weather for the stored position.
                            effects.push(Effect::EmitWeatherCheck {
                                source_tag: s.source_tag.clone(),
                                force_update: s.force_update,
                            });
                        }
                        effects.push(Effect::SetBusy(false));
                        effects.push(Effect::SessionEnded(Outcome::Failed(
                            AcquireError::NoLocationFound,
                        )));
                        State::Idle
                    }
                }
            },
            _ => {
                tracing::debug!(state = ?self.state, "ignoring fix outside provider wait");
                self.state
            }
        }
    }

    fn on_committed(&mut self, location_id: i64, effects: &mut Vec<Effect>) -> State {
        if self.state != State::AwaitingAddress {
            tracing::debug!("unexpected commit acknowledgement in {:?}", self.state);
            return self.state;
        }
        let s = self.session_ref();
        if s.with_weather {
            effects.push(Effect::EmitWeatherCheck {
                source_tag: s.source_tag.clone(),
                force_update: s.force_update,
            });
        }
        effects.push(Effect::SetBusy(false));
        effects.push(Effect::SessionEnded(Outcome::Resolved { location_id }));
        State::Idle
    }

    /// After the last-known probe and mid-session connectivity gate: issue
    /// the actual network request, per policy.
    fn proceed_network_request(&mut self, effects: &mut Vec<Effect>) -> State {
        if self.policy == GeocoderPolicy::System {
            return self.detect_location(effects);
        }
        let s = self.session_mut();
        effects.push(Effect::StartNetworkUpdate { seed: s.seed.take() });
        effects.push(Effect::StartTimer {
            timer: TimerKind::WeatherConfirm,
            after: WEATHER_CONFIRM_TIMEOUT,
        });
        State::AwaitingNetwork
    }

    /// OS-mediated fallback probe: one coarse fix with a bounded wait, then
    /// last-known comparison, then an extra continuous-GPS window.
    fn detect_location(&mut self, effects: &mut Vec<Effect>) -> State {
        let s = self.session_mut();
        if s.env.network_available {
            effects.push(Effect::RequestSingleFix(ProviderKind::Network));
            effects.push(Effect::StartTimer {
                timer: TimerKind::CoarseFix,
                after: COARSE_FIX_TIMEOUT,
            });
            State::AwaitingNetwork
        } else {
            // Coarse provider unusable; skip straight to the last-known
            // comparison.
            s.lk_context = LastKnownContext::DetectFallback;
            effects.push(Effect::ReadLastKnown);
            State::AwaitingLastKnown
        }
    }

    fn resolve(
        &mut self,
        fix: LocationFix,
        from_last_location: bool,
        effects: &mut Vec<Effect>,
    ) -> State {
        tracing::info!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            provider = ?fix.provider,
            from_last_location,
            "fix acquired"
        );
        effects.push(Effect::CancelTimers);
        effects.push(Effect::CancelProviderRequests);
        effects.push(Effect::CommitFix { fix, from_last_location });
        State::AwaitingAddress
    }

    fn fail_no_location(&mut self, effects: &mut Vec<Effect>) -> State {
        tracing::warn!("no location could be determined");
        effects.push(Effect::MarkNoLocationFound);
        effects.push(Effect::SetBusy(false));
        effects.push(Effect::SessionEnded(Outcome::Failed(AcquireError::NoLocationFound)));
        State::Idle
    }

    fn finish_weather_only(&mut self, effects: &mut Vec<Effect>) -> State {
        let s = self.session_ref();
        tracing::info!("location update disabled or no provider usable, weather check only");
        if s.with_weather {
            effects.push(Effect::EmitWeatherCheck {
                source_tag: s.source_tag.clone(),
                force_update: s.force_update,
            });
        }
        effects.push(Effect::SetBusy(false));
        effects.push(Effect::SessionEnded(Outcome::WeatherOnly));
        State::Idle
    }

    /// Only called on paths where a session is guaranteed to exist.
    fn session_ref(&self) -> &Session {
        match &self.session {
            Some(s) => s,
            None => unreachable!("session accessed outside an active acquisition"),
        }
    }

    fn session_mut(&mut self) -> &mut Session {
        match &mut self.session {
            Some(s) => s,
            None => unreachable!("session accessed outside an active acquisition"),
        }
    }
}
