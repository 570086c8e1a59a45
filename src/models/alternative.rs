use serde::{Deserialize, Serialize};

use super::route::{GeoPoint, RouteId};

/// The fork point expressed in one route's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkIntersection {
    pub location: GeoPoint,
    pub geometry_index_in_route: usize,
    pub geometry_index_in_leg: usize,
    pub leg_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlternativeRouteInfo {
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
}

/// Fork-point bookkeeping for one alternative, valid only while
/// `primary_route_id` is the current primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeRouteMetadata {
    pub route_id: RouteId,
    pub alternative_id: u32,
    pub primary_route_id: RouteId,
    pub fork_in_primary: ForkIntersection,
    pub fork_in_alternative: ForkIntersection,
    /// From the fork to the end of the alternative.
    pub info_from_fork: AlternativeRouteInfo,
    /// From the start of the primary to the fork.
    pub info_from_start_of_primary: AlternativeRouteInfo,
}
