//! Fixtures and scripted collaborators shared by the unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::engine::{
    EngineRoutesRequest, EngineRoutesResponse, NativeEngine, RerouteRequest, RerouteResponse,
    RouteFetcher, RouteRejection,
};
use crate::error::{EngineError, FetchError};
use crate::models::{Congestion, GeoPoint, LegAnnotation, LegStep, Route, RouteId, RouteLeg};
use crate::refresh::AnnotationRefreshDelta;

/// Leg with three points, two 100 m segments of 10 s each.
pub fn leg(offset: f64) -> RouteLeg {
    RouteLeg::new(
        vec![LegStep {
            instruction: "Continue".into(),
            distance: 200.0,
            duration: 20.0,
        }],
        vec![
            GeoPoint::new(offset, 0.0),
            GeoPoint::new(offset + 0.001, 0.0),
            GeoPoint::new(offset + 0.002, 0.0),
        ],
        Some(LegAnnotation {
            distance: vec![100.0, 100.0],
            duration: vec![10.0, 10.0],
            congestion: vec![Congestion::Low, Congestion::Low],
        }),
    )
}

pub fn route(id: &str, legs: usize) -> Route {
    Route::new(id, (0..legs).map(|i| leg(i as f64)).collect())
}

#[derive(Default)]
struct EngineScript {
    calls: Vec<EngineRoutesRequest>,
    failures: VecDeque<EngineError>,
    rejected: Vec<RouteRejection>,
}

/// Records every request and answers as scripted. A gated engine holds each
/// call until [`MockEngine::release`] hands out a permit.
pub struct MockEngine {
    script: Mutex<EngineScript>,
    gate: Option<Arc<Semaphore>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(EngineScript::default()),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            script: Mutex::new(EngineScript::default()),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn fail_next(&self, error: EngineError) {
        self.script.lock().unwrap().failures.push_back(error);
    }

    pub fn reject(&self, route_id: &str, reason: &str) {
        self.script.lock().unwrap().rejected.push(RouteRejection {
            route_id: RouteId::new(route_id),
            reason: reason.into(),
        });
    }

    pub fn calls(&self) -> Vec<EngineRoutesRequest> {
        self.script.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl NativeEngine for MockEngine {
    async fn set_routes(
        &self,
        request: EngineRoutesRequest,
    ) -> Result<EngineRoutesResponse, EngineError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let mut script = self.script.lock().unwrap();
        let offered: Vec<RouteId> = request
            .primary
            .iter()
            .chain(request.alternatives.iter())
            .map(|route| route.id().clone())
            .collect();
        script.calls.push(request);
        if let Some(error) = script.failures.pop_front() {
            return Err(error);
        }
        let rejected = script
            .rejected
            .iter()
            .filter(|rejection| offered.contains(&rejection.route_id))
            .cloned()
            .collect();
        Ok(EngineRoutesResponse { rejected })
    }
}

#[derive(Default)]
struct FetcherScript {
    reroutes: VecDeque<Result<RerouteResponse, FetchError>>,
    refreshes: VecDeque<Result<AnnotationRefreshDelta, FetchError>>,
    reroute_requests: Vec<RerouteRequest>,
    refresh_requests: Vec<(RouteId, usize)>,
}

/// Answers fetches from queued responses. A gated fetcher records each
/// request and then holds it until [`MockFetcher::release`].
pub struct MockFetcher {
    script: Mutex<FetcherScript>,
    gate: Option<Arc<Semaphore>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(FetcherScript::default()),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            script: Mutex::new(FetcherScript::default()),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn push_reroute(&self, response: Result<RerouteResponse, FetchError>) {
        self.script.lock().unwrap().reroutes.push_back(response);
    }

    pub fn push_refresh(&self, response: Result<AnnotationRefreshDelta, FetchError>) {
        self.script.lock().unwrap().refreshes.push_back(response);
    }

    pub fn reroute_requests(&self) -> Vec<RerouteRequest> {
        self.script.lock().unwrap().reroute_requests.clone()
    }

    pub fn refresh_requests(&self) -> Vec<(RouteId, usize)> {
        self.script.lock().unwrap().refresh_requests.clone()
    }
}

#[async_trait]
impl RouteFetcher for MockFetcher {
    async fn fetch_reroute(&self, request: RerouteRequest) -> Result<RerouteResponse, FetchError> {
        self.script
            .lock()
            .unwrap()
            .reroute_requests
            .push(request);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.script
            .lock()
            .unwrap()
            .reroutes
            .pop_front()
            .unwrap_or(Err(FetchError::Request("no scripted reroute".into())))
    }

    async fn fetch_refresh(
        &self,
        route: &Route,
        leg_index: usize,
    ) -> Result<AnnotationRefreshDelta, FetchError> {
        self.script
            .lock()
            .unwrap()
            .refresh_requests
            .push((route.id().clone(), leg_index));
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.script
            .lock()
            .unwrap()
            .refreshes
            .pop_front()
            .unwrap_or(Err(FetchError::Request("no scripted refresh".into())))
    }
}
