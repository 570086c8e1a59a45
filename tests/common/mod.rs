#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use navcore::{
    AnnotationRefreshDelta, Congestion, CoreSettings, EngineError, EngineRoutesRequest,
    EngineRoutesResponse, FetchError, GeoPoint, HistoryRecordingSessionState,
    HistoryRecordingStateChangeObserver, LegAnnotation, LegStep, NativeEngine, NavigationCore,
    NavigationSessionState, RerouteRequest, RerouteResponse, Route, RouteFetcher, RouteLeg,
};

pub fn leg(offset: f64, congestion: Congestion) -> RouteLeg {
    RouteLeg::new(
        vec![LegStep {
            instruction: "Drive".into(),
            distance: 300.0,
            duration: 30.0,
        }],
        vec![
            GeoPoint::new(offset, 0.0),
            GeoPoint::new(offset + 0.001, 0.0),
            GeoPoint::new(offset + 0.002, 0.0),
            GeoPoint::new(offset + 0.003, 0.0),
        ],
        Some(LegAnnotation {
            distance: vec![100.0, 100.0, 100.0],
            duration: vec![10.0, 10.0, 10.0],
            congestion: vec![congestion; 3],
        }),
    )
}

pub fn route(id: &str, legs: usize) -> Route {
    Route::new(
        id,
        (0..legs).map(|i| leg(i as f64, Congestion::Low)).collect(),
    )
}

pub fn heavy_traffic() -> LegAnnotation {
    LegAnnotation {
        distance: vec![100.0, 100.0, 100.0],
        duration: vec![40.0, 40.0, 40.0],
        congestion: vec![Congestion::Heavy; 3],
    }
}

pub fn settings() -> CoreSettings {
    let mut settings = CoreSettings::default();
    settings.route_refresh.enabled = false;
    settings
}

#[derive(Default)]
pub struct ScriptedEngine {
    failures: Mutex<VecDeque<EngineError>>,
    calls: Mutex<Vec<EngineRoutesRequest>>,
}

impl ScriptedEngine {
    pub fn fail_next(&self, error: EngineError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> Vec<EngineRoutesRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NativeEngine for ScriptedEngine {
    async fn set_routes(
        &self,
        request: EngineRoutesRequest,
    ) -> Result<EngineRoutesResponse, EngineError> {
        self.calls.lock().unwrap().push(request);
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(EngineRoutesResponse::default()),
        }
    }
}

/// Reroute fetches wait for a permit; refreshes answer immediately.
pub struct ScriptedFetcher {
    gate: Semaphore,
    reroutes: Mutex<VecDeque<RerouteResponse>>,
    refreshes: Mutex<VecDeque<AnnotationRefreshDelta>>,
}

impl ScriptedFetcher {
    pub fn open() -> Self {
        Self {
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
            reroutes: Mutex::default(),
            refreshes: Mutex::default(),
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Semaphore::new(0),
            reroutes: Mutex::default(),
            refreshes: Mutex::default(),
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn push_reroute(&self, routes: Vec<Route>, leg_index: usize) {
        self.reroutes
            .lock()
            .unwrap()
            .push_back(RerouteResponse { routes, leg_index });
    }

    pub fn push_refresh(&self, delta: AnnotationRefreshDelta) {
        self.refreshes.lock().unwrap().push_back(delta);
    }
}

#[async_trait]
impl RouteFetcher for ScriptedFetcher {
    async fn fetch_reroute(&self, _request: RerouteRequest) -> Result<RerouteResponse, FetchError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| FetchError::Cancelled)?;
        self.reroutes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FetchError::Request("no route found".into()))
    }

    async fn fetch_refresh(
        &self,
        _route: &Route,
        _leg_index: usize,
    ) -> Result<AnnotationRefreshDelta, FetchError> {
        self.refreshes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FetchError::Request("refresh unavailable".into()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recording {
    Start(NavigationSessionState),
    Stop(NavigationSessionState),
    Cancel(NavigationSessionState),
}

#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<Recording>>,
}

impl RecordingLog {
    pub fn take(&self) -> Vec<Recording> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }
}

impl HistoryRecordingStateChangeObserver for RecordingLog {
    fn on_should_start_recording(&self, state: &HistoryRecordingSessionState) {
        self.entries.lock().unwrap().push(Recording::Start(state.phase()));
    }

    fn on_should_stop_recording(&self, state: &HistoryRecordingSessionState) {
        self.entries.lock().unwrap().push(Recording::Stop(state.phase()));
    }

    fn on_should_cancel_recording(&self, state: &HistoryRecordingSessionState) {
        self.entries.lock().unwrap().push(Recording::Cancel(state.phase()));
    }
}

pub async fn start_core(
    engine: Arc<ScriptedEngine>,
    fetcher: Arc<ScriptedFetcher>,
) -> NavigationCore {
    NavigationCore::start(engine, fetcher, settings()).await
}
