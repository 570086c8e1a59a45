use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::observer::{Observer, ObserverId, Subject};

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationSessionState {
    #[default]
    Idle,
    FreeDrive,
    ActiveGuidance,
}

/// Session phase for a pair of inputs. Not driving is always `Idle`.
pub fn derive_state(is_driving: bool, has_routes: bool) -> NavigationSessionState {
    match (is_driving, has_routes) {
        (false, _) => NavigationSessionState::Idle,
        (true, false) => NavigationSessionState::FreeDrive,
        (true, true) => NavigationSessionState::ActiveGuidance,
    }
}

struct NavigationSessionInner {
    is_driving: bool,
    has_routes: bool,
    subject: Subject<NavigationSessionState>,
}

/// Tracks the navigation session phase and notifies observers on transitions.
pub struct NavigationSessionStateMachine {
    inner: Mutex<NavigationSessionInner>,
}

impl Default for NavigationSessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationSessionStateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(NavigationSessionInner {
                is_driving: false,
                has_routes: false,
                subject: Subject::new(NavigationSessionState::Idle),
            }),
        }
    }

    pub fn state(&self) -> NavigationSessionState {
        *self.lock().subject.value()
    }

    pub fn set_driving(&self, is_driving: bool) {
        let mut guard = self.lock();
        guard.is_driving = is_driving;
        Self::recompute(&mut guard);
    }

    pub fn set_has_routes(&self, has_routes: bool) {
        let mut guard = self.lock();
        guard.has_routes = has_routes;
        Self::recompute(&mut guard);
    }

    /// Registers `observer` and immediately delivers the current state to it.
    pub fn register_observer(
        &self,
        observer: Arc<dyn Observer<NavigationSessionState>>,
    ) -> ObserverId {
        self.lock().subject.subscribe(observer)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.lock().subject.unsubscribe(id)
    }

    fn recompute(inner: &mut NavigationSessionInner) {
        let next = derive_state(inner.is_driving, inner.has_routes);
        let previous = *inner.subject.value();
        if inner.subject.publish_if_changed(next) {
            log_info!("navigation session {:?} -> {:?}", previous, next);
        }
    }

    fn lock(&self) -> MutexGuard<'_, NavigationSessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
