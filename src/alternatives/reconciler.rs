//! Fork-point bookkeeping for engine-reported alternatives.
//!
//! A route's full geometry is the concatenation of its legs' geometries with
//! each shared boundary point counted once, so point `g` of the route maps to
//! exactly one `(leg, index in leg)` pair. A boundary point belongs to the
//! later leg, except for the final point of the route.

use crate::engine::NativeAlternative;
use crate::error::AlternativeMetadataError;
use crate::models::{
    AlternativeRouteInfo, AlternativeRouteMetadata, ForkIntersection, Route, RouteId,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Tolerance for floating point drift when comparing summed distances.
const DISTANCE_EPSILON: f64 = 1e-6;

/// Distance and duration from the start of a route to each geometry point.
#[derive(Debug, Clone, PartialEq)]
struct CumulativeTable {
    distance: Vec<f64>,
    duration: Vec<f64>,
}

impl CumulativeTable {
    fn for_route(route: &Route) -> Self {
        let mut distance = Vec::new();
        let mut duration = Vec::new();
        let (mut travelled, mut elapsed) = (0.0, 0.0);

        for annotation in route.legs().iter().filter_map(|leg| leg.annotation()) {
            for (segment, meters) in annotation.distance.iter().enumerate() {
                if distance.is_empty() {
                    distance.push(0.0);
                    duration.push(0.0);
                }
                travelled += meters;
                elapsed += annotation.duration.get(segment).copied().unwrap_or(0.0);
                distance.push(travelled);
                duration.push(elapsed);
            }
        }

        Self { distance, duration }
    }

    fn len(&self) -> usize {
        self.distance.len()
    }

    fn total_distance(&self) -> f64 {
        self.distance.last().copied().unwrap_or(0.0)
    }

    fn total_duration(&self) -> f64 {
        self.duration.last().copied().unwrap_or(0.0)
    }

    fn checked(route: &Route, fork_index: usize) -> Result<Self, AlternativeMetadataError> {
        let table = Self::for_route(route);
        if table.distance.is_empty() {
            return Err(AlternativeMetadataError::EmptyDistanceTable {
                route_id: route.id().clone(),
            });
        }
        if fork_index >= table.len() {
            return Err(AlternativeMetadataError::ForkIndexOutOfBounds {
                route_id: route.id().clone(),
                fork_index,
                table_len: table.len(),
            });
        }
        Ok(table)
    }
}

/// Locates global geometry point `index` of `route` in its legs.
fn locate(route: &Route, index: usize) -> Option<ForkIntersection> {
    let last_leg = route.legs().len().checked_sub(1)?;
    let mut leg_start = 0;

    for (leg_index, leg) in route.legs().iter().enumerate() {
        let segments = leg.segment_count();
        let in_leg = index.checked_sub(leg_start)?;
        if in_leg < segments || (leg_index == last_leg && in_leg == segments) {
            let location = *leg.geometry().get(in_leg)?;
            return Some(ForkIntersection {
                location,
                geometry_index_in_route: index,
                geometry_index_in_leg: in_leg,
                leg_index,
            });
        }
        leg_start += segments;
    }
    None
}

fn fork_in(route: &Route, index: usize) -> Result<ForkIntersection, AlternativeMetadataError> {
    locate(route, index).ok_or_else(|| AlternativeMetadataError::ForkIndexOutOfBounds {
        route_id: route.id().clone(),
        fork_index: index,
        table_len: route
            .legs()
            .iter()
            .map(|leg| leg.segment_count())
            .sum::<usize>()
            + 1,
    })
}

/// Computes the metadata of one alternative against `primary`.
pub fn metadata_for(
    alternative: &NativeAlternative,
    primary: &Route,
) -> Result<AlternativeRouteMetadata, AlternativeMetadataError> {
    let route = &alternative.route;

    let primary_table = CumulativeTable::checked(primary, alternative.fork_index_in_primary)?;
    let alternative_table =
        CumulativeTable::checked(route, alternative.fork_index_in_alternative)?;

    let fork_in_primary = fork_in(primary, alternative.fork_index_in_primary)?;
    let fork_in_alternative = fork_in(route, alternative.fork_index_in_alternative)?;

    let to_fork = AlternativeRouteInfo {
        distance: primary_table.distance[alternative.fork_index_in_primary],
        duration: primary_table.duration[alternative.fork_index_in_primary],
    };
    let primary_total = primary_table.total_distance();
    if to_fork.distance < -DISTANCE_EPSILON || to_fork.distance > primary_total + DISTANCE_EPSILON {
        return Err(AlternativeMetadataError::DistanceExceedsTotal {
            route_id: primary.id().clone(),
            remaining: primary_total - to_fork.distance,
            total: primary_total,
        });
    }

    let fork = alternative.fork_index_in_alternative;
    let total = alternative_table.total_distance();
    let remaining = total - alternative_table.distance[fork];
    if remaining > total + DISTANCE_EPSILON || remaining < -DISTANCE_EPSILON {
        return Err(AlternativeMetadataError::DistanceExceedsTotal {
            route_id: route.id().clone(),
            remaining,
            total,
        });
    }

    Ok(AlternativeRouteMetadata {
        route_id: route.id().clone(),
        alternative_id: alternative.alternative_id,
        primary_route_id: primary.id().clone(),
        fork_in_primary,
        fork_in_alternative,
        info_from_fork: AlternativeRouteInfo {
            distance: remaining,
            duration: alternative_table.total_duration() - alternative_table.duration[fork],
        },
        info_from_start_of_primary: to_fork,
    })
}

/// Metadata for every alternative that was computed against `primary`.
///
/// Alternatives reported for another primary are skipped as stale. An
/// alternative with inconsistent fork data is dropped with a diagnostic and
/// does not affect the others.
pub fn reconcile(alternatives: &[NativeAlternative], primary: &Route) -> Vec<AlternativeRouteMetadata> {
    alternatives
        .iter()
        .filter(|alternative| {
            let current = alternative.primary_route_id == *primary.id();
            if !current {
                log_debug!(
                    "skipping alternative {} computed for stale primary {}",
                    alternative.route.id(),
                    alternative.primary_route_id
                );
            }
            current
        })
        .filter_map(|alternative| match metadata_for(alternative, primary) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                log_warn!(
                    "dropping metadata for alternative {}: {}",
                    alternative.route.id(),
                    err
                );
                None
            }
        })
        .collect()
}

/// Ids of the alternatives in `alternatives` that were computed for `primary_id`.
pub fn current_alternative_ids<'a>(
    alternatives: &'a [NativeAlternative],
    primary_id: &'a RouteId,
) -> impl Iterator<Item = &'a RouteId> + 'a {
    alternatives
        .iter()
        .filter(move |alternative| alternative.primary_route_id == *primary_id)
        .map(|alternative| alternative.route.id())
}
