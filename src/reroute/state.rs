use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::error::{RerouteFailure, RouteSetError};
use crate::observer::{Observer, ObserverId, Subject};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RerouteState {
    Idle,
    FetchingRoute,
    /// A fetched route is being handed to the route update pipeline.
    Applied,
    Failed(RerouteFailure),
    Interrupted,
}

/// Identifies one reroute attempt. Cancelled when the attempt is interrupted.
#[derive(Debug, Clone)]
pub struct RerouteTicket {
    id: u64,
    token: CancellationToken,
}

impl RerouteTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

struct ActiveReroute {
    ticket_id: u64,
    token: CancellationToken,
    /// Set once the pipeline has started applying the result; an interrupt
    /// can no longer stop it after that.
    committed: bool,
}

struct RerouteInner {
    subject: Subject<RerouteState>,
    active: Option<ActiveReroute>,
    next_ticket_id: u64,
}

impl RerouteInner {
    fn is_current(&self, ticket: &RerouteTicket) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.ticket_id == ticket.id && !active.token.is_cancelled())
    }

    /// Publishes a terminal state followed by the return to `Idle`.
    fn finish(&mut self, terminal: RerouteState) {
        self.active = None;
        self.subject.publish(terminal);
        self.subject.publish(RerouteState::Idle);
    }
}

/// Owner of [`RerouteState`]; the only place it is transitioned.
pub struct RerouteStateMachine {
    inner: Mutex<RerouteInner>,
}

impl Default for RerouteStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RerouteStateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RerouteInner {
                subject: Subject::new(RerouteState::Idle),
                active: None,
                next_ticket_id: 1,
            }),
        }
    }

    pub fn state(&self) -> RerouteState {
        self.lock().subject.value().clone()
    }

    pub fn register_observer(&self, observer: Arc<dyn Observer<RerouteState>>) -> ObserverId {
        self.lock().subject.subscribe(observer)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.lock().subject.unsubscribe(id)
    }

    /// Starts an attempt, or returns `None` while another one is unresolved.
    pub(crate) fn begin_fetch(&self) -> Option<RerouteTicket> {
        let mut guard = self.lock();
        if *guard.subject.value() != RerouteState::Idle {
            log_debug!("reroute already in progress, ignoring trigger");
            return None;
        }

        let ticket = RerouteTicket {
            id: guard.next_ticket_id,
            token: CancellationToken::new(),
        };
        guard.next_ticket_id += 1;
        guard.active = Some(ActiveReroute {
            ticket_id: ticket.id,
            token: ticket.token.clone(),
            committed: false,
        });
        guard.subject.publish(RerouteState::FetchingRoute);
        Some(ticket)
    }

    /// Moves to `Applied` unless the attempt was interrupted meanwhile.
    pub(crate) fn fetch_succeeded(&self, ticket: &RerouteTicket) -> bool {
        let mut guard = self.lock();
        if !guard.is_current(ticket) || *guard.subject.value() != RerouteState::FetchingRoute {
            log_info!("discarding result of interrupted reroute #{}", ticket.id);
            return false;
        }
        guard.subject.publish(RerouteState::Applied);
        true
    }

    pub(crate) fn fetch_failed(&self, ticket: &RerouteTicket, failure: RerouteFailure) {
        let mut guard = self.lock();
        if !guard.is_current(ticket) {
            return;
        }
        log_warn!("reroute #{} failed: {}", ticket.id, failure);
        guard.finish(RerouteState::Failed(failure));
    }

    /// Called by the pipeline right before it applies a reroute result.
    /// Returns `false` if the attempt was interrupted and must be dropped.
    pub(crate) fn commit(&self, ticket: &RerouteTicket) -> bool {
        let mut guard = self.lock();
        if !guard.is_current(ticket) || *guard.subject.value() != RerouteState::Applied {
            return false;
        }
        if let Some(active) = guard.active.as_mut() {
            active.committed = true;
        }
        true
    }

    pub(crate) fn apply_finished(&self, ticket: &RerouteTicket, result: Result<(), RouteSetError>) {
        let mut guard = self.lock();
        let owns_attempt = guard
            .active
            .as_ref()
            .is_some_and(|active| active.ticket_id == ticket.id);
        if !owns_attempt {
            return;
        }
        match result {
            Ok(()) => {
                guard.active = None;
                guard.subject.publish(RerouteState::Idle);
            }
            Err(err) => guard.finish(RerouteState::Failed(RerouteFailure::Rejected(err))),
        }
    }

    /// Cancels the unresolved attempt, if any. Returns whether one was cancelled.
    pub fn interrupt(&self) -> bool {
        let mut guard = self.lock();
        let Some(active) = guard.active.as_ref() else {
            return false;
        };
        if active.committed {
            return false;
        }
        active.token.cancel();
        log_info!("reroute #{} interrupted", active.ticket_id);
        guard.finish(RerouteState::Interrupted);
        true
    }

    fn lock(&self) -> MutexGuard<'_, RerouteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
