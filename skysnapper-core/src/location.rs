//! Device location behind a one-request-at-a-time async API.
//!
//! Platforms report permission changes and position fixes as push
//! notifications ([`LocationEvent`]) through a [`LocationEventSink`]. The
//! [`LocationProvider`] turns those notifications into a single awaited
//! [`Coordinate`], holding at most one pending request at a time.

use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::{oneshot, watch};

use crate::{error::WeatherError, model::Coordinate};

/// Mirror of the platform's location permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationAuthorization {
    NotDetermined,
    Denied,
    Restricted,
    Authorized,
    Unknown,
}

impl LocationAuthorization {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationAuthorization::NotDetermined => "not_determined",
            LocationAuthorization::Denied => "denied",
            LocationAuthorization::Restricted => "restricted",
            LocationAuthorization::Authorized => "authorized",
            LocationAuthorization::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for LocationAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification pushed by a platform.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    AuthorizationChanged(LocationAuthorization),
    LocationUpdated(Coordinate),
    LocationFailed(String),
    /// Location services are switched off or have no position source.
    ServicesDisabled,
}

/// The platform's permission and location-update API.
///
/// Methods must not block waiting for the user or the hardware: results are
/// delivered later (or synchronously, if already known) through `events`.
pub trait LocationPlatform: Send + Sync + Debug {
    /// Current permission state, read once when the provider is created.
    fn authorization_status(&self) -> LocationAuthorization;

    /// Ask the user for permission. Answer with `AuthorizationChanged`.
    fn request_authorization(&self, events: LocationEventSink);

    /// Begin delivering `LocationUpdated`, `LocationFailed` or `ServicesDisabled`.
    fn start_updating_location(&self, events: LocationEventSink);

    fn stop_updating_location(&self);
}

/// Handle a platform uses to push [`LocationEvent`]s back to its provider.
///
/// Holds only a weak reference; events sent after the provider is gone are dropped.
#[derive(Clone)]
pub struct LocationEventSink {
    inner: Weak<Inner>,
}

impl LocationEventSink {
    pub fn send(&self, event: LocationEvent) {
        match self.inner.upgrade() {
            Some(inner) => LocationProvider { inner }.handle(event),
            None => tracing::debug!(?event, "Location provider gone, dropping event"),
        }
    }
}

impl Debug for LocationEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationEventSink")
            .field("connected", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitingAuthorization,
    AwaitingLocation,
}

#[derive(Debug)]
struct PendingRequest {
    id: u64,
    stage: Stage,
    reply: oneshot::Sender<Result<Coordinate, WeatherError>>,
}

impl PendingRequest {
    fn resolve(self, result: Result<Coordinate, WeatherError>) {
        // The caller may have stopped waiting.
        let _ = self.reply.send(result);
    }
}

#[derive(Debug)]
struct Inner {
    platform: Arc<dyn LocationPlatform>,
    authorization: watch::Sender<LocationAuthorization>,
    pending: Mutex<Option<PendingRequest>>,
    next_id: AtomicU64,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Option<PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-slot async front end for a [`LocationPlatform`].
#[derive(Debug, Clone)]
pub struct LocationProvider {
    inner: Arc<Inner>,
}

impl LocationProvider {
    pub fn new(platform: Arc<dyn LocationPlatform>) -> Self {
        let initial = platform.authorization_status();
        tracing::debug!(authorization = %initial, "Location provider created");

        let (authorization, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                platform,
                authorization,
                pending: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Latest permission state reported by the platform.
    pub fn authorization(&self) -> LocationAuthorization {
        *self.inner.authorization.borrow()
    }

    pub fn subscribe_authorization(&self) -> watch::Receiver<LocationAuthorization> {
        self.inner.authorization.subscribe()
    }

    /// Sink for delivering platform notifications to this provider.
    pub fn event_sink(&self) -> LocationEventSink {
        LocationEventSink { inner: Arc::downgrade(&self.inner) }
    }

    /// Resolve the device's current position, prompting for permission first
    /// if it has never been decided.
    ///
    /// Only one request may be outstanding; a concurrent second call fails with
    /// [`WeatherError::LocationRequestInProgress`]. Dropping the returned future
    /// abandons the request and frees the slot.
    pub async fn request_current_location(&self) -> Result<Coordinate, WeatherError> {
        let (id, reply) = self.begin()?;
        let _guard = SlotGuard { inner: &self.inner, id };

        reply.await.unwrap_or(Err(WeatherError::LocationUnavailable))
    }

    fn begin(
        &self,
    ) -> Result<(u64, oneshot::Receiver<Result<Coordinate, WeatherError>>), WeatherError> {
        let mut slot = self.inner.slot();
        if slot.is_some() {
            tracing::warn!("Rejecting location request: another one is pending");
            return Err(WeatherError::LocationRequestInProgress);
        }

        let stage = match self.authorization() {
            LocationAuthorization::Denied | LocationAuthorization::Restricted => {
                return Err(WeatherError::PermissionDenied);
            }
            LocationAuthorization::Unknown => return Err(WeatherError::UnknownAuthorizationState),
            LocationAuthorization::NotDetermined => Stage::AwaitingAuthorization,
            LocationAuthorization::Authorized => Stage::AwaitingLocation,
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        *slot = Some(PendingRequest { id, stage, reply: tx });
        drop(slot);

        // The platform may answer synchronously, so the slot must be unlocked here.
        match stage {
            Stage::AwaitingAuthorization => {
                tracing::info!("Requesting location permission");
                self.inner.platform.request_authorization(self.event_sink());
            }
            Stage::AwaitingLocation => {
                tracing::debug!("Starting location updates");
                self.inner.platform.start_updating_location(self.event_sink());
            }
        }

        Ok((id, rx))
    }

    fn handle(&self, event: LocationEvent) {
        match event {
            LocationEvent::AuthorizationChanged(status) => self.on_authorization(status),
            LocationEvent::LocationUpdated(coordinate) => {
                let Some(pending) = self.take_pending(|p| p.stage == Stage::AwaitingLocation)
                else {
                    tracing::debug!(%coordinate, "Ignoring unsolicited location update");
                    return;
                };

                self.inner.platform.stop_updating_location();
                tracing::debug!(%coordinate, "Location resolved");
                pending.resolve(Ok(coordinate));
            }
            LocationEvent::LocationFailed(cause) => {
                tracing::warn!(%cause, "Location request failed");
                self.fail_pending(WeatherError::LocationError(cause));
            }
            LocationEvent::ServicesDisabled => {
                tracing::warn!("Location services are disabled");
                self.fail_pending(WeatherError::LocationUnavailable);
            }
        }
    }

    fn fail_pending(&self, err: WeatherError) {
        let Some(pending) = self.take_pending(|_| true) else {
            tracing::debug!(error = %err, "No pending location request to fail");
            return;
        };

        if pending.stage == Stage::AwaitingLocation {
            self.inner.platform.stop_updating_location();
        }
        pending.resolve(Err(err));
    }

    fn on_authorization(&self, status: LocationAuthorization) {
        self.inner.authorization.send_replace(status);
        tracing::debug!(authorization = %status, "Location authorization changed");

        let mut slot = self.inner.slot();
        let Some(stage) = slot.as_ref().map(|p| p.stage) else {
            return;
        };

        match (stage, status) {
            (Stage::AwaitingAuthorization, LocationAuthorization::Authorized) => {
                if let Some(pending) = slot.as_mut() {
                    pending.stage = Stage::AwaitingLocation;
                }
                drop(slot);
                self.inner.platform.start_updating_location(self.event_sink());
            }
            (_, LocationAuthorization::Denied | LocationAuthorization::Restricted) => {
                let pending = slot.take();
                drop(slot);
                if stage == Stage::AwaitingLocation {
                    self.inner.platform.stop_updating_location();
                }
                if let Some(pending) = pending {
                    pending.resolve(Err(WeatherError::PermissionDenied));
                }
            }
            (Stage::AwaitingAuthorization, LocationAuthorization::Unknown) => {
                if let Some(pending) = slot.take() {
                    pending.resolve(Err(WeatherError::LocationError(
                        "unknown authorization status".to_string(),
                    )));
                }
            }
            // Still waiting for the user, or already past the prompt.
            _ => {}
        }
    }

    fn take_pending(&self, matches: impl Fn(&PendingRequest) -> bool) -> Option<PendingRequest> {
        let mut slot = self.inner.slot();
        if slot.as_ref().is_some_and(matches) { slot.take() } else { None }
    }
}

/// Frees the slot if the request future is dropped before it resolves.
struct SlotGuard<'a> {
    inner: &'a Inner,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.inner.slot();
        if !slot.as_ref().is_some_and(|p| p.id == self.id) {
            return;
        }

        let abandoned = slot.take();
        drop(slot);
        if abandoned.is_some_and(|p| p.stage == Stage::AwaitingLocation) {
            self.inner.platform.stop_updating_location();
        }
        tracing::debug!(request = self.id, "Location request abandoned");
    }
}
