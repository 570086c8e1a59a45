use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::engine::{RerouteOrigin, RerouteRequest, RouteFetcher};
use crate::error::RerouteFailure;
use crate::models::RouteUpdateReason;
use crate::routes::RouteUpdatePipeline;

use super::state::{RerouteState, RerouteStateMachine, RerouteTicket};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Fetches a replacement route when the device leaves the primary and hands
/// the result to the route update pipeline.
#[derive(Clone)]
pub struct RerouteCoordinator {
    machine: Arc<RerouteStateMachine>,
    fetcher: Arc<dyn RouteFetcher>,
    pipeline: RouteUpdatePipeline,
}

impl RerouteCoordinator {
    pub fn new(
        machine: Arc<RerouteStateMachine>,
        fetcher: Arc<dyn RouteFetcher>,
        pipeline: RouteUpdatePipeline,
    ) -> Self {
        Self {
            machine,
            fetcher,
            pipeline,
        }
    }

    pub fn state(&self) -> RerouteState {
        self.machine.state()
    }

    /// Starts a reroute unless one is already unresolved. The returned handle
    /// completes once the attempt reached a terminal state.
    pub fn trigger(&self, origin: RerouteOrigin) -> Option<JoinHandle<()>> {
        let ticket = self.machine.begin_fetch()?;
        log_info!("reroute started ({:?})", origin);
        let coordinator = self.clone();
        Some(tokio::spawn(async move {
            coordinator.run(ticket, origin).await;
        }))
    }

    pub fn interrupt(&self) -> bool {
        self.machine.interrupt()
    }

    async fn run(&self, ticket: RerouteTicket, origin: RerouteOrigin) {
        let Some(primary) = self.pipeline.routes().primary().cloned() else {
            self.machine
                .fetch_failed(&ticket, RerouteFailure::NoPrimaryRoute);
            return;
        };

        let request = RerouteRequest {
            primary,
            leg_index: self.pipeline.current_leg_index(),
            origin,
        };

        let fetched = tokio::select! {
            biased;
            _ = ticket.token().cancelled() => {
                log_info!("reroute fetch dropped after interrupt");
                return;
            }
            result = self.fetcher.fetch_reroute(request) => result,
        };

        let response = match fetched {
            Ok(response) if response.routes.is_empty() => {
                self.machine
                    .fetch_failed(&ticket, RerouteFailure::NoRoutesReturned);
                return;
            }
            Ok(response) => response,
            Err(err) => {
                self.machine.fetch_failed(&ticket, err.into());
                return;
            }
        };

        if !self.machine.fetch_succeeded(&ticket) {
            return;
        }

        let reason = RouteUpdateReason::Reroute {
            leg_index: response.leg_index,
        };
        let result = self
            .pipeline
            .submit_reroute(response.routes, reason, ticket.clone())
            .await;

        match result {
            Ok(outcome) => {
                log_info!(
                    "reroute applied, new primary {:?}",
                    outcome.routes.primary_id()
                );
                self.machine.apply_finished(&ticket, Ok(()));
            }
            Err(err) => {
                log_warn!("reroute result not applied: {}", err);
                self.machine.apply_finished(&ticket, Err(err));
            }
        }
    }
}
