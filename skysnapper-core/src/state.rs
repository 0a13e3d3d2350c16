use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

use crate::error::WeatherError;

/// Observable state of one session. Exactly one variant holds at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState<T> {
    Idle,
    Loading,
    Loaded(T),
    Failed(WeatherError),
}

impl<T> Default for SessionState<T> {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl<T> SessionState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            SessionState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&WeatherError> {
        match self {
            SessionState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Which result wins when requests overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupersedePolicy {
    /// Only the most recently started request may publish its result.
    #[default]
    LatestInitiated,
    /// Every result is published as it arrives; the last to complete wins.
    LatestCompleted,
}

/// Session state plus the request sequence numbers that guard it.
///
/// Starting a request and publishing a result both happen inside the watch
/// channel's write lock, so subscribers never see a half-applied transition.
#[derive(Debug)]
pub(crate) struct StateCell<T> {
    state: watch::Sender<SessionState<T>>,
    issued: AtomicU64,
    policy: SupersedePolicy,
}

impl<T: Clone> StateCell<T> {
    pub(crate) fn new(policy: SupersedePolicy) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self { state, issued: AtomicU64::new(0), policy }
    }

    pub(crate) fn get(&self) -> SessionState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState<T>> {
        self.state.subscribe()
    }

    /// Move to `Loading` and return the new request's sequence number.
    pub(crate) fn begin(&self) -> u64 {
        let mut seq = 0;
        self.state.send_modify(|state| {
            seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            *state = SessionState::Loading;
        });
        seq
    }

    /// Return to `Idle`, superseding anything in flight.
    pub(crate) fn reset(&self) {
        self.state.send_modify(|state| {
            self.issued.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::Idle;
        });
    }

    /// Whether a result for request `seq` would still be published.
    pub(crate) fn is_current(&self, seq: u64) -> bool {
        self.policy == SupersedePolicy::LatestCompleted
            || self.issued.load(Ordering::SeqCst) == seq
    }

    /// Publish the outcome of request `seq` unless the policy says it is stale.
    pub(crate) fn finish(&self, seq: u64, result: Result<T, WeatherError>) -> bool {
        self.state.send_if_modified(|state| {
            let latest = self.issued.load(Ordering::SeqCst);
            if self.policy == SupersedePolicy::LatestInitiated && seq != latest {
                tracing::debug!(request = seq, latest, "Discarding superseded result");
                return false;
            }

            *state = match result {
                Ok(value) => SessionState::Loaded(value),
                Err(err) => {
                    tracing::warn!(request = seq, error = %err, "Request failed");
                    SessionState::Failed(err)
                }
            };
            true
        })
    }
}
