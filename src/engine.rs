//! Boundaries to the collaborators this core drives: the native
//! routing/map-matching engine and the directions/refresh fetcher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, FetchError};
use crate::models::{Route, RouteId, RouteUpdateReason};
use crate::refresh::AnnotationRefreshDelta;

/// Routes handed to the engine for validation and activation.
#[derive(Debug, Clone)]
pub struct EngineRoutesRequest {
    pub primary: Option<Route>,
    pub alternatives: Vec<Route>,
    pub starting_leg_index: usize,
    pub reason: RouteUpdateReason,
}

impl EngineRoutesRequest {
    pub(crate) fn new(routes: &[Route], reason: RouteUpdateReason) -> Self {
        let (primary, alternatives) = match routes.split_first() {
            Some((primary, alternatives)) => (Some(primary.clone()), alternatives.to_vec()),
            None => (None, Vec::new()),
        };
        Self {
            primary,
            alternatives,
            starting_leg_index: reason.starting_leg_index(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineRoutesResponse {
    /// Routes the engine refused individually; the rest were activated.
    pub rejected: Vec<RouteRejection>,
}

/// A single route the engine refused while accepting the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRejection {
    pub route_id: RouteId,
    pub reason: String,
}

#[async_trait]
pub trait NativeEngine: Send + Sync {
    /// Activates `request.primary` with its alternatives. An `Err` means
    /// nothing was activated.
    async fn set_routes(
        &self,
        request: EngineRoutesRequest,
    ) -> Result<EngineRoutesResponse, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RerouteOrigin {
    OffRoute,
    Explicit,
}

#[derive(Debug, Clone)]
pub struct RerouteRequest {
    pub primary: Route,
    pub leg_index: usize,
    pub origin: RerouteOrigin,
}

#[derive(Debug, Clone)]
pub struct RerouteResponse {
    pub routes: Vec<Route>,
    /// Leg of the new primary the device is on.
    pub leg_index: usize,
}

#[async_trait]
pub trait RouteFetcher: Send + Sync {
    async fn fetch_reroute(&self, request: RerouteRequest) -> Result<RerouteResponse, FetchError>;

    /// Fresh annotations for the legs of `route` from `leg_index` on.
    async fn fetch_refresh(
        &self,
        route: &Route,
        leg_index: usize,
    ) -> Result<AnnotationRefreshDelta, FetchError>;
}

/// An alternative as reported by the engine, before fork-point bookkeeping.
#[derive(Debug, Clone)]
pub struct NativeAlternative {
    pub alternative_id: u32,
    pub route: Route,
    /// Primary the engine compared against.
    pub primary_route_id: RouteId,
    /// Fork position in the primary's full geometry.
    pub fork_index_in_primary: usize,
    /// Fork position in the alternative's full geometry.
    pub fork_index_in_alternative: usize,
}
