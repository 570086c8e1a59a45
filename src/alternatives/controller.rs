use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::engine::NativeAlternative;
use crate::error::RouteSetError;
use crate::models::{AlternativeRouteMetadata, Route, RouteId, RouteUpdateReason};
use crate::routes::{RouteSetOutcome, RouteUpdatePipeline, RoutesUpdate};

use super::reconciler::{current_alternative_ids, reconcile};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Default)]
struct MetadataCache {
    primary_id: Option<RouteId>,
    entries: HashMap<RouteId, AlternativeRouteMetadata>,
}

impl MetadataCache {
    fn clear_unless(&mut self, primary_id: Option<&RouteId>) {
        if self.primary_id.as_ref() != primary_id {
            if !self.entries.is_empty() {
                log_debug!("primary changed, dropping {} alternative metadata entries", self.entries.len());
            }
            self.entries.clear();
            self.primary_id = primary_id.cloned();
        }
    }
}

/// Turns engine-reported alternatives into an `Alternatives` route update and
/// keeps their fork metadata for as long as the primary they refer to stays
/// current.
pub struct AlternativesController {
    pipeline: RouteUpdatePipeline,
    cache: Mutex<MetadataCache>,
}

impl AlternativesController {
    pub fn new(pipeline: RouteUpdatePipeline) -> Self {
        Self {
            pipeline,
            cache: Mutex::new(MetadataCache::default()),
        }
    }

    pub async fn on_alternatives_changed(
        &self,
        alternatives: Vec<NativeAlternative>,
    ) -> Result<RouteSetOutcome, RouteSetError> {
        let Some(primary) = self.pipeline.routes().primary().cloned() else {
            let submitted = alternatives
                .first()
                .map(|alternative| alternative.primary_route_id.clone());
            log_warn!("alternatives reported without an active primary");
            return Err(RouteSetError::StaleAlternatives {
                submitted,
                current: None,
            });
        };

        let metadata = reconcile(&alternatives, &primary);
        let wanted: Vec<RouteId> = current_alternative_ids(&alternatives, primary.id())
            .cloned()
            .collect();
        let mut candidates: Vec<Route> = Vec::with_capacity(wanted.len() + 1);
        candidates.push(primary);
        candidates.extend(
            alternatives
                .into_iter()
                .filter(|alternative| wanted.contains(alternative.route.id()))
                .map(|alternative| alternative.route),
        );

        let reason = RouteUpdateReason::Alternatives {
            leg_index: self.pipeline.current_leg_index(),
        };
        let outcome = self.pipeline.submit(candidates, reason).await?;

        let current = self.pipeline.routes();
        let mut cache = self.lock();
        cache.clear_unless(current.primary_id());
        for entry in metadata {
            if Some(&entry.primary_route_id) == current.primary_id()
                && current.get(&entry.route_id).is_some()
            {
                cache.entries.insert(entry.route_id.clone(), entry);
            }
        }
        log_info!(
            "{} alternatives active, {} with fork metadata",
            outcome.routes.alternatives().len(),
            cache.entries.len()
        );
        Ok(outcome)
    }

    /// Routes observer hook.
    pub fn on_routes_update(&self, update: &RoutesUpdate) {
        let mut cache = self.lock();
        cache.clear_unless(update.routes.primary_id());
        cache
            .entries
            .retain(|route_id, _| update.routes.get(route_id).is_some());
    }

    pub fn metadata(&self, route_id: &RouteId) -> Option<AlternativeRouteMetadata> {
        let primary_id = self.pipeline.reader().primary_id();
        let cache = self.lock();
        if cache.primary_id != primary_id {
            return None;
        }
        cache.entries.get(route_id).cloned()
    }

    pub fn all_metadata(&self) -> Vec<AlternativeRouteMetadata> {
        let routes = self.pipeline.routes();
        let cache = self.lock();
        if cache.primary_id.as_ref() != routes.primary_id() {
            return Vec::new();
        }
        routes
            .alternatives()
            .iter()
            .filter_map(|route| cache.entries.get(route.id()).cloned())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MetadataCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
