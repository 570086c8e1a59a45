use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::observer::{ObserverId, ObserverRegistry};

use super::navigation::{derive_state, NavigationSessionState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum HistoryRecordingSessionState {
    Idle,
    FreeDrive,
    /// `session_id` is generated on entry and stays fixed until the state is left.
    #[serde(rename_all = "camelCase")]
    ActiveGuidance {
        session_id: String,
        started_at: DateTime<Utc>,
    },
}

impl HistoryRecordingSessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, HistoryRecordingSessionState::Idle)
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            HistoryRecordingSessionState::ActiveGuidance { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// The payload-free class of this state.
    pub fn phase(&self) -> NavigationSessionState {
        match self {
            HistoryRecordingSessionState::Idle => NavigationSessionState::Idle,
            HistoryRecordingSessionState::FreeDrive => NavigationSessionState::FreeDrive,
            HistoryRecordingSessionState::ActiveGuidance { .. } => {
                NavigationSessionState::ActiveGuidance
            }
        }
    }

    fn enter(phase: NavigationSessionState) -> Self {
        match phase {
            NavigationSessionState::Idle => HistoryRecordingSessionState::Idle,
            NavigationSessionState::FreeDrive => HistoryRecordingSessionState::FreeDrive,
            NavigationSessionState::ActiveGuidance => HistoryRecordingSessionState::ActiveGuidance {
                session_id: Uuid::new_v4().to_string(),
                started_at: Utc::now(),
            },
        }
    }
}

/// Receives recording brackets. A recording that is stopped should be kept;
/// one that is cancelled belonged to a route attempt that never took effect.
pub trait HistoryRecordingStateChangeObserver: Send + Sync {
    fn on_should_start_recording(&self, state: &HistoryRecordingSessionState);
    fn on_should_stop_recording(&self, state: &HistoryRecordingSessionState);
    fn on_should_cancel_recording(&self, state: &HistoryRecordingSessionState);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Stop,
    Cancel,
}

struct HistoryRecordingInner {
    is_driving: bool,
    has_routes: bool,
    /// `has_routes` before the route update currently in flight.
    pre_attempt_has_routes: Option<bool>,
    state: HistoryRecordingSessionState,
    observers: ObserverRegistry<dyn HistoryRecordingStateChangeObserver>,
}

pub struct HistoryRecordingStateMachine {
    inner: Mutex<HistoryRecordingInner>,
}

impl Default for HistoryRecordingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryRecordingStateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HistoryRecordingInner {
                is_driving: false,
                has_routes: false,
                pre_attempt_has_routes: None,
                state: HistoryRecordingSessionState::Idle,
                observers: ObserverRegistry::new(),
            }),
        }
    }

    pub fn state(&self) -> HistoryRecordingSessionState {
        self.lock().state.clone()
    }

    pub fn set_driving(&self, is_driving: bool) {
        let mut guard = self.lock();
        guard.is_driving = is_driving;
        Self::transition(&mut guard, Ending::Stop);
    }

    /// Records the outcome a route update is about to produce, before the
    /// engine has accepted it.
    pub fn on_routes_update_started(&self, has_routes: bool) {
        let mut guard = self.lock();
        guard.pre_attempt_has_routes = Some(guard.has_routes);
        guard.has_routes = has_routes;
        Self::transition(&mut guard, Ending::Stop);
    }

    pub fn on_routes_update_applied(&self) {
        self.lock().pre_attempt_has_routes = None;
    }

    /// Rolls back the speculative value recorded by `on_routes_update_started`.
    pub fn on_routes_update_failed(&self) {
        let mut guard = self.lock();
        let Some(previous) = guard.pre_attempt_has_routes.take() else {
            return;
        };
        log_debug!("route update failed, restoring has_routes={}", previous);
        guard.has_routes = previous;
        Self::transition(&mut guard, Ending::Cancel);
    }

    /// Registers `observer`; a non-idle current state is replayed as a start.
    pub fn register_observer(
        &self,
        observer: Arc<dyn HistoryRecordingStateChangeObserver>,
    ) -> ObserverId {
        let mut guard = self.lock();
        if !guard.state.is_idle() {
            observer.on_should_start_recording(&guard.state);
        }
        guard.observers.register(observer)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.lock().observers.unregister(id)
    }

    fn transition(inner: &mut HistoryRecordingInner, ending: Ending) {
        let phase = derive_state(inner.is_driving, inner.has_routes);
        if phase == inner.state.phase() {
            return;
        }

        let next = HistoryRecordingSessionState::enter(phase);
        let previous = std::mem::replace(&mut inner.state, next);
        log_info!(
            "history recording {:?} -> {:?} ({:?})",
            previous.phase(),
            phase,
            ending
        );

        if !previous.is_idle() {
            for observer in inner.observers.iter() {
                match ending {
                    Ending::Stop => observer.on_should_stop_recording(&previous),
                    Ending::Cancel => observer.on_should_cancel_recording(&previous),
                }
            }
        }
        if !inner.state.is_idle() {
            for observer in inner.observers.iter() {
                observer.on_should_start_recording(&inner.state);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryRecordingInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
