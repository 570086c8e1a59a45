//! Error types for the navigation core.

use thiserror::Error;

use crate::models::RouteId;

/// The native engine could not process a route update at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("native engine rejected the primary route {route_id}: {reason}")]
    PrimaryRejected { route_id: RouteId, reason: String },

    #[error("native engine failure: {0}")]
    Native(String),
}

/// Directions/refresh request failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request cancelled")]
    Cancelled,
}

/// Terminal error of a route set submission.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteSetError {
    #[error("alternatives were computed for primary {submitted:?} but the current primary is {current:?}")]
    StaleAlternatives {
        submitted: Option<RouteId>,
        current: Option<RouteId>,
    },

    #[error("refresh was computed for primary {submitted:?} but the current primary is {current:?}")]
    StaleRefresh {
        submitted: Option<RouteId>,
        current: Option<RouteId>,
    },

    #[error(transparent)]
    EngineFailure(#[from] EngineError),

    #[error("reroute result was superseded by a newer route update")]
    RerouteInterrupted,

    #[error("route {0} is not part of the active route set")]
    UnknownRoute(RouteId),

    #[error("there is no active route set")]
    NoActiveRoutes,

    #[error("route update pipeline is closed")]
    PipelineClosed,
}

/// Fork-point data reported by the engine is inconsistent for one alternative.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlternativeMetadataError {
    #[error("route {route_id} has no distance annotations to locate a fork in")]
    EmptyDistanceTable { route_id: RouteId },

    #[error("fork index {fork_index} is outside the {table_len} point geometry of route {route_id}")]
    ForkIndexOutOfBounds {
        route_id: RouteId,
        fork_index: usize,
        table_len: usize,
    },

    #[error("distance remaining at the fork ({remaining:.1} m) exceeds the length of route {route_id} ({total:.1} m)")]
    DistanceExceedsTotal {
        route_id: RouteId,
        remaining: f64,
        total: f64,
    },
}

/// Why a reroute ended in `Failed`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RerouteFailure {
    #[error("no primary route to reroute from")]
    NoPrimaryRoute,

    #[error("directions returned no routes")]
    NoRoutesReturned,

    #[error("reroute request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("reroute could not be applied: {0}")]
    Rejected(RouteSetError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("a navigation core instance already exists; destroy it first")]
    AlreadyCreated,

    #[error("no navigation core instance to destroy")]
    NotCreated,
}
