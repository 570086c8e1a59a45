use serde::{Deserialize, Serialize};

use crate::models::{LegAnnotation, Route};

/// Fresh annotations for the legs of a route from `starting_leg_index` on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRefreshDelta {
    pub starting_leg_index: usize,
    pub legs: Vec<LegAnnotation>,
}

/// Replaces the annotation of every leg `i >= starting_leg_index` that has an
/// entry at `refreshed_legs[i - starting_leg_index]`.
///
/// Legs before `starting_leg_index` were already traveled and are copied as
/// they are, as are legs past the end of `refreshed_legs`. Steps, geometry and
/// leg boundaries are never touched.
pub fn merge(old: &Route, refreshed_legs: &[LegAnnotation], starting_leg_index: usize) -> Route {
    if old.legs().is_empty() || refreshed_legs.is_empty() {
        return old.clone();
    }

    let legs = old
        .legs()
        .iter()
        .enumerate()
        .map(|(index, leg)| {
            match index
                .checked_sub(starting_leg_index)
                .and_then(|offset| refreshed_legs.get(offset))
            {
                Some(annotation) => leg.with_annotation(annotation.clone()),
                None => leg.clone(),
            }
        })
        .collect();

    Route::new(old.id().clone(), legs)
}

pub fn apply_delta(old: &Route, delta: &AnnotationRefreshDelta) -> Route {
    merge(old, &delta.legs, delta.starting_leg_index)
}
