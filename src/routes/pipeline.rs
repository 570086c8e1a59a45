//! Single-writer route update pipeline.
//!
//! Every route mutation travels through one worker task that drains a FIFO
//! queue. A request is enqueued when [`RouteUpdatePipeline::submit`] is
//! called, and the worker does not look at the next request until the engine
//! has answered and every routes observer has returned for the current one.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};

use crate::engine::{EngineRoutesRequest, NativeEngine, RouteRejection};
use crate::error::{EngineError, RouteSetError};
use crate::models::{Route, RouteId, RouteSet, RouteUpdateReason};
use crate::observer::{Observer, ObserverId, ObserverRegistry};
use crate::reroute::{RerouteStateMachine, RerouteTicket};
use crate::session::{HistoryRecordingStateMachine, NavigationSessionStateMachine};

use super::store::{RouteStore, RouteStoreReader, RouteStoreSnapshot};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// What routes observers receive after each applied update.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutesUpdate {
    pub routes: RouteSet,
    pub ignored: Vec<RouteRejection>,
    pub reason: RouteUpdateReason,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteSetOutcome {
    /// The route set now in the store.
    pub routes: RouteSet,
    /// Candidates the engine refused individually.
    pub rejected: Vec<RouteRejection>,
}

type SubmitReply = oneshot::Sender<Result<RouteSetOutcome, RouteSetError>>;

/// Where the worker takes the routes of a request from.
enum Candidates {
    Routes(Vec<Route>),
    /// The active set, as it is when the request is reached.
    Reapply,
    /// The active set with this route moved to the front.
    Promote(RouteId),
}

enum PipelineCommand {
    Submit {
        candidates: Candidates,
        reason: RouteUpdateReason,
        ticket: Option<RerouteTicket>,
        reply: SubmitReply,
    },
    RegisterObserver {
        observer: Arc<dyn Observer<RoutesUpdate>>,
        reply: oneshot::Sender<ObserverId>,
    },
    UnregisterObserver {
        id: ObserverId,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staleness {
    Alternatives,
    Refresh,
}

impl Staleness {
    fn error(self, submitted: Option<RouteId>, current: Option<RouteId>) -> RouteSetError {
        match self {
            Staleness::Alternatives => RouteSetError::StaleAlternatives { submitted, current },
            Staleness::Refresh => RouteSetError::StaleRefresh { submitted, current },
        }
    }
}

/// What has to hold, or happen, before a request reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// The primary is changing; a reroute fetched for the old one is stale.
    InterruptReroute,
    /// The candidates were derived from the current primary and are only
    /// valid while it is still current.
    RequireSamePrimary(Staleness),
}

fn admission(reason: &RouteUpdateReason) -> Admission {
    match reason {
        RouteUpdateReason::CleanUp
        | RouteUpdateReason::NewRoutes { .. }
        | RouteUpdateReason::Reroute { .. }
        | RouteUpdateReason::Reorder { .. } => Admission::InterruptReroute,
        RouteUpdateReason::Alternatives { .. } => {
            Admission::RequireSamePrimary(Staleness::Alternatives)
        }
        RouteUpdateReason::RefreshRoutes { .. } => {
            Admission::RequireSamePrimary(Staleness::Refresh)
        }
    }
}

/// Collaborators the worker drives while applying an update.
pub struct PipelineContext {
    pub engine: Arc<dyn NativeEngine>,
    pub navigation: Arc<NavigationSessionStateMachine>,
    pub history: Arc<HistoryRecordingStateMachine>,
    pub reroute: Arc<RerouteStateMachine>,
}

/// Handle to the route update worker. Clones share the same worker.
#[derive(Clone)]
pub struct RouteUpdatePipeline {
    tx: mpsc::UnboundedSender<PipelineCommand>,
    reader: RouteStoreReader,
    leg_index: Arc<AtomicUsize>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RouteUpdatePipeline {
    /// Spawns the worker task. Must be called from within a Tokio runtime.
    pub fn spawn(context: PipelineContext) -> Self {
        let store = RouteStore::new();
        let reader = store.reader();
        let leg_index = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = PipelineWorker {
            store,
            context,
            observers: ObserverRegistry::new(),
            last_update: None,
            leg_index: Arc::clone(&leg_index),
        };
        let handle = tokio::spawn(worker.run(rx));

        Self {
            tx,
            reader,
            leg_index,
            worker: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Queues `routes` for activation. The request is enqueued before this
    /// returns; the future resolves once it has been applied or refused.
    pub fn submit(
        &self,
        routes: Vec<Route>,
        reason: RouteUpdateReason,
    ) -> impl Future<Output = Result<RouteSetOutcome, RouteSetError>> + Send + 'static {
        self.enqueue(Candidates::Routes(routes), reason, None)
    }

    /// Hands the active routes to the engine again. The set is read by the
    /// worker, so requests queued earlier are applied first and re-applied.
    /// Fails with [`RouteSetError::NoActiveRoutes`] when there is nothing to
    /// re-apply.
    pub fn reapply_active(
        &self,
        reason: RouteUpdateReason,
    ) -> impl Future<Output = Result<RouteSetOutcome, RouteSetError>> + Send + 'static {
        self.enqueue(Candidates::Reapply, reason, None)
    }

    /// Moves `route_id` to the front of the active set as it is when the
    /// request is reached. Fails with [`RouteSetError::UnknownRoute`] if the
    /// route is no longer active by then.
    pub fn promote_primary(
        &self,
        route_id: RouteId,
        reason: RouteUpdateReason,
    ) -> impl Future<Output = Result<RouteSetOutcome, RouteSetError>> + Send + 'static {
        self.enqueue(Candidates::Promote(route_id), reason, None)
    }

    pub(crate) fn submit_reroute(
        &self,
        routes: Vec<Route>,
        reason: RouteUpdateReason,
        ticket: RerouteTicket,
    ) -> impl Future<Output = Result<RouteSetOutcome, RouteSetError>> + Send + 'static {
        self.enqueue(Candidates::Routes(routes), reason, Some(ticket))
    }

    fn enqueue(
        &self,
        candidates: Candidates,
        reason: RouteUpdateReason,
        ticket: Option<RerouteTicket>,
    ) -> impl Future<Output = Result<RouteSetOutcome, RouteSetError>> + Send + 'static {
        let (reply, response) = oneshot::channel();
        let queued = self
            .tx
            .send(PipelineCommand::Submit {
                candidates,
                reason,
                ticket,
                reply,
            })
            .is_ok();

        async move {
            if !queued {
                return Err(RouteSetError::PipelineClosed);
            }
            response.await.unwrap_or(Err(RouteSetError::PipelineClosed))
        }
    }

    /// Adds a routes observer between two updates. A non-empty current route
    /// set is replayed to it before this resolves.
    pub async fn register_observer(
        &self,
        observer: Arc<dyn Observer<RoutesUpdate>>,
    ) -> Result<ObserverId, RouteSetError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(PipelineCommand::RegisterObserver { observer, reply })
            .map_err(|_| RouteSetError::PipelineClosed)?;
        response.await.map_err(|_| RouteSetError::PipelineClosed)
    }

    pub async fn unregister_observer(&self, id: ObserverId) -> bool {
        let (reply, response) = oneshot::channel();
        if self
            .tx
            .send(PipelineCommand::UnregisterObserver { id, reply })
            .is_err()
        {
            return false;
        }
        response.await.unwrap_or(false)
    }

    pub fn routes(&self) -> RouteSet {
        self.reader.routes()
    }

    pub fn snapshot(&self) -> RouteStoreSnapshot {
        self.reader.snapshot()
    }

    pub fn reader(&self) -> RouteStoreReader {
        self.reader.clone()
    }

    pub fn current_leg_index(&self) -> usize {
        self.leg_index.load(Ordering::SeqCst)
    }

    /// Progress-driven leg changes.
    pub fn set_current_leg_index(&self, leg_index: usize) {
        self.leg_index.store(leg_index, Ordering::SeqCst);
    }

    /// Stops the worker after the requests queued so far. Later submits
    /// resolve with [`RouteSetError::PipelineClosed`].
    pub async fn shutdown(&self) {
        let _ = self.tx.send(PipelineCommand::Shutdown);
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(err) = handle.await {
                log_error!("route update worker failed to join: {err}");
            }
        }
    }
}

struct PipelineWorker {
    store: RouteStore,
    context: PipelineContext,
    observers: ObserverRegistry<dyn Observer<RoutesUpdate>>,
    last_update: Option<RoutesUpdate>,
    leg_index: Arc<AtomicUsize>,
}

impl PipelineWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PipelineCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                PipelineCommand::Submit {
                    candidates,
                    reason,
                    ticket,
                    reply,
                } => {
                    let result = match self.resolve(candidates) {
                        Ok(routes) => self.apply(routes, reason, ticket).await,
                        Err(err) => Err(err),
                    };
                    if reply.send(result).is_err() {
                        log_debug!("submitter of {} went away before completion", reason);
                    }
                }
                PipelineCommand::RegisterObserver { observer, reply } => {
                    if let Some(update) = self.last_update.as_ref() {
                        if !update.routes.is_empty() {
                            observer.on_change(update);
                        }
                    }
                    let id = self.observers.register(observer);
                    let _ = reply.send(id);
                }
                PipelineCommand::UnregisterObserver { id, reply } => {
                    let _ = reply.send(self.observers.unregister(id));
                }
                PipelineCommand::Shutdown => break,
            }
        }
        log_info!("route update pipeline shutting down");
    }

    fn resolve(&self, candidates: Candidates) -> Result<Vec<Route>, RouteSetError> {
        match candidates {
            Candidates::Routes(routes) => Ok(routes),
            Candidates::Reapply => {
                let current = self.store.routes();
                if current.is_empty() {
                    return Err(RouteSetError::NoActiveRoutes);
                }
                Ok(current.to_vec())
            }
            Candidates::Promote(route_id) => {
                let current = self.store.routes();
                let selected = current
                    .get(&route_id)
                    .cloned()
                    .ok_or_else(|| RouteSetError::UnknownRoute(route_id.clone()))?;
                let mut reordered = Vec::with_capacity(current.len());
                reordered.push(selected);
                reordered.extend(
                    current
                        .routes()
                        .iter()
                        .filter(|route| *route.id() != route_id)
                        .cloned(),
                );
                Ok(reordered)
            }
        }
    }

    async fn apply(
        &mut self,
        routes: Vec<Route>,
        reason: RouteUpdateReason,
        ticket: Option<RerouteTicket>,
    ) -> Result<RouteSetOutcome, RouteSetError> {
        log_debug!("applying {} with {} candidate routes", reason, routes.len());

        match admission(&reason) {
            Admission::RequireSamePrimary(staleness) => {
                let submitted = routes.first().map(|route| route.id().clone());
                let current = self.store.primary_id();
                let outdated = match staleness {
                    Staleness::Alternatives => false,
                    // Refreshed routes replace the whole set, so the set has
                    // to be the one the deltas were fetched for.
                    Staleness::Refresh => {
                        let active = self.store.routes().ids();
                        routes.iter().map(Route::id).ne(active.iter())
                    }
                };
                let mismatched = submitted.is_none() || current.is_none() || submitted != current;
                if mismatched || outdated {
                    log_warn!(
                        "dropping {}: computed for {:?}, current primary is {:?}",
                        reason,
                        submitted,
                        current
                    );
                    return Err(staleness.error(submitted, current));
                }
            }
            Admission::InterruptReroute => {
                if ticket.is_none() && self.context.reroute.interrupt() {
                    log_info!("{} interrupted the in-flight reroute", reason);
                }
            }
        }

        if let Some(ticket) = ticket.as_ref() {
            if !self.context.reroute.commit(ticket) {
                return Err(RouteSetError::RerouteInterrupted);
            }
        }

        self.context
            .history
            .on_routes_update_started(!routes.is_empty());

        let request = EngineRoutesRequest::new(&routes, reason);
        let response = match self.context.engine.set_routes(request).await {
            Ok(response) => response,
            Err(err) => {
                log_error!("engine failed to apply {}: {}", reason, err);
                self.context.history.on_routes_update_failed();
                return Err(err.into());
            }
        };

        if let Some(primary) = routes.first() {
            if let Some(rejection) = response
                .rejected
                .iter()
                .find(|rejection| rejection.route_id == *primary.id())
            {
                log_error!("engine rejected primary {}: {}", primary.id(), rejection.reason);
                self.context.history.on_routes_update_failed();
                return Err(EngineError::PrimaryRejected {
                    route_id: primary.id().clone(),
                    reason: rejection.reason.clone(),
                }
                .into());
            }
        }

        let accepted: Vec<Route> = routes
            .into_iter()
            .filter(|route| {
                !response
                    .rejected
                    .iter()
                    .any(|rejection| rejection.route_id == *route.id())
            })
            .collect();
        for rejection in &response.rejected {
            log_warn!("route {} ignored: {}", rejection.route_id, rejection.reason);
        }

        let route_set = RouteSet::new(accepted);
        self.store
            .replace(route_set.clone(), response.rejected.clone(), reason);
        self.track_leg_index(&reason);
        self.context.navigation.set_has_routes(!route_set.is_empty());
        self.context.history.on_routes_update_applied();

        let update = RoutesUpdate {
            routes: route_set.clone(),
            ignored: response.rejected.clone(),
            reason,
            updated_at: Utc::now(),
        };
        for observer in self.observers.iter() {
            observer.on_change(&update);
        }
        self.last_update = Some(update);

        log_info!("{} applied, {} routes active", reason, route_set.len());
        Ok(RouteSetOutcome {
            routes: route_set,
            rejected: response.rejected,
        })
    }

    fn track_leg_index(&self, reason: &RouteUpdateReason) {
        let leg_index = match *reason {
            RouteUpdateReason::CleanUp => 0,
            RouteUpdateReason::NewRoutes { initial_leg_index } => initial_leg_index,
            RouteUpdateReason::Reroute { leg_index } => leg_index,
            _ => return,
        };
        self.leg_index.store(leg_index, Ordering::SeqCst);
    }
}
