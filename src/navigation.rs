//! Public entry point: wires the pipeline, the session machines, reroute,
//! alternatives and refresh together and routes inbound engine events to them.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::alternatives::AlternativesController;
use crate::engine::{NativeAlternative, NativeEngine, RerouteOrigin, RouteFetcher};
use crate::error::{CoreError, RouteSetError};
use crate::models::{AlternativeRouteMetadata, Route, RouteId, RouteSet, RouteUpdateReason};
use crate::observer::{Observer, ObserverId};
use crate::refresh::RouteRefreshController;
use crate::reroute::{RerouteCoordinator, RerouteState, RerouteStateMachine};
use crate::routes::{
    PipelineContext, RouteSetOutcome, RouteStoreSnapshot, RouteUpdatePipeline, RoutesUpdate,
};
use crate::session::{
    HistoryRecordingSessionState, HistoryRecordingStateChangeObserver,
    HistoryRecordingStateMachine, NavigationSessionState, NavigationSessionStateMachine,
};
use crate::settings::{CoreSettings, SettingsStore};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Clone)]
pub struct NavigationCore {
    settings: CoreSettings,
    pipeline: RouteUpdatePipeline,
    navigation: Arc<NavigationSessionStateMachine>,
    history: Arc<HistoryRecordingStateMachine>,
    reroute: RerouteCoordinator,
    reroute_state: Arc<RerouteStateMachine>,
    alternatives: Arc<AlternativesController>,
    refresh: RouteRefreshController,
}

impl NavigationCore {
    /// Builds the core and starts its background tasks. Must be called from
    /// within a Tokio runtime.
    pub async fn start(
        engine: Arc<dyn NativeEngine>,
        fetcher: Arc<dyn RouteFetcher>,
        settings: CoreSettings,
    ) -> Self {
        let navigation = Arc::new(NavigationSessionStateMachine::new());
        let history = Arc::new(HistoryRecordingStateMachine::new());
        let reroute_state = Arc::new(RerouteStateMachine::new());

        let pipeline = RouteUpdatePipeline::spawn(PipelineContext {
            engine,
            navigation: Arc::clone(&navigation),
            history: Arc::clone(&history),
            reroute: Arc::clone(&reroute_state),
        });

        let reroute = RerouteCoordinator::new(
            Arc::clone(&reroute_state),
            Arc::clone(&fetcher),
            pipeline.clone(),
        );
        let alternatives = Arc::new(AlternativesController::new(pipeline.clone()));
        let refresh =
            RouteRefreshController::new(pipeline.clone(), fetcher, settings.refresh_interval());

        let hook = Arc::clone(&alternatives);
        if let Err(err) = pipeline
            .register_observer(Arc::new(move |update: &RoutesUpdate| {
                hook.on_routes_update(update)
            }))
            .await
        {
            log_warn!("alternatives cache not attached to route updates: {}", err);
        }

        if settings.route_refresh.enabled {
            refresh.start().await;
        }

        log_info!(
            "navigation core started (reroute: {}, alternatives: {}, refresh: {})",
            settings.reroute_enabled,
            settings.alternatives_enabled,
            settings.route_refresh.enabled
        );

        Self {
            settings,
            pipeline,
            navigation,
            history,
            reroute,
            reroute_state,
            alternatives,
            refresh,
        }
    }

    /// Starts a core with the settings currently held by `store`.
    pub async fn from_store(
        engine: Arc<dyn NativeEngine>,
        fetcher: Arc<dyn RouteFetcher>,
        store: &SettingsStore,
    ) -> Self {
        Self::start(engine, fetcher, store.settings()).await
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    // Route set

    pub async fn set_routes(
        &self,
        routes: Vec<Route>,
        initial_leg_index: usize,
    ) -> Result<RouteSetOutcome, RouteSetError> {
        self.pipeline
            .submit(routes, RouteUpdateReason::NewRoutes { initial_leg_index })
            .await
    }

    pub async fn clear_routes(&self) -> Result<RouteSetOutcome, RouteSetError> {
        self.pipeline
            .submit(Vec::new(), RouteUpdateReason::CleanUp)
            .await
    }

    /// Promotes an active alternative to primary. The route has to be in the
    /// set that is active when the request reaches the pipeline.
    pub async fn select_primary_route(
        &self,
        route_id: &RouteId,
    ) -> Result<RouteSetOutcome, RouteSetError> {
        let reason = RouteUpdateReason::Reorder {
            leg_index: self.pipeline.current_leg_index(),
        };
        self.pipeline
            .promote_primary(route_id.clone(), reason)
            .await
    }

    pub fn routes(&self) -> RouteSet {
        self.pipeline.routes()
    }

    pub fn route_snapshot(&self) -> RouteStoreSnapshot {
        self.pipeline.snapshot()
    }

    pub fn current_leg_index(&self) -> usize {
        self.pipeline.current_leg_index()
    }

    // Driving state

    pub fn set_driving(&self, is_driving: bool) {
        self.navigation.set_driving(is_driving);
        self.history.set_driving(is_driving);
    }

    pub fn navigation_state(&self) -> NavigationSessionState {
        self.navigation.state()
    }

    pub fn history_state(&self) -> HistoryRecordingSessionState {
        self.history.state()
    }

    // Inbound engine events

    /// Off-route detection. Ignored when rerouting is disabled.
    pub fn on_off_route(&self) -> Option<JoinHandle<()>> {
        if !self.settings.reroute_enabled {
            log_info!("off-route ignored, rerouting disabled");
            return None;
        }
        self.reroute.trigger(RerouteOrigin::OffRoute)
    }

    /// Explicit replan requested by the user or the host app.
    pub fn request_reroute(&self) -> Option<JoinHandle<()>> {
        self.reroute.trigger(RerouteOrigin::Explicit)
    }

    pub fn interrupt_reroute(&self) -> bool {
        self.reroute.interrupt()
    }

    pub fn reroute_state(&self) -> RerouteState {
        self.reroute.state()
    }

    /// Returns `Ok(None)` when alternatives are disabled.
    pub async fn on_alternatives_changed(
        &self,
        alternatives: Vec<NativeAlternative>,
    ) -> Result<Option<RouteSetOutcome>, RouteSetError> {
        if !self.settings.alternatives_enabled {
            return Ok(None);
        }
        self.alternatives
            .on_alternatives_changed(alternatives)
            .await
            .map(Some)
    }

    pub fn alternative_metadata(&self, route_id: &RouteId) -> Option<AlternativeRouteMetadata> {
        self.alternatives.metadata(route_id)
    }

    pub fn alternatives_metadata(&self) -> Vec<AlternativeRouteMetadata> {
        self.alternatives.all_metadata()
    }

    /// The engine switched to a fallback tile version; the active routes are
    /// handed to it again from the current leg.
    pub async fn on_tiles_version_switched(
        &self,
        version: &str,
    ) -> Result<Option<RouteSetOutcome>, RouteSetError> {
        log_info!("tiles switched to {}, re-applying active routes", version);
        let reason = RouteUpdateReason::NewRoutes {
            initial_leg_index: self.pipeline.current_leg_index(),
        };
        match self.pipeline.reapply_active(reason).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(RouteSetError::NoActiveRoutes) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn on_leg_index_changed(&self, leg_index: usize) {
        self.pipeline.set_current_leg_index(leg_index);
    }

    pub async fn refresh_routes_now(&self) -> Result<Option<RouteSetOutcome>, RouteSetError> {
        self.refresh.refresh_now().await
    }

    // Observers

    pub async fn register_routes_observer(
        &self,
        observer: Arc<dyn Observer<RoutesUpdate>>,
    ) -> Result<ObserverId, RouteSetError> {
        self.pipeline.register_observer(observer).await
    }

    pub async fn unregister_routes_observer(&self, id: ObserverId) -> bool {
        self.pipeline.unregister_observer(id).await
    }

    pub fn register_navigation_state_observer(
        &self,
        observer: Arc<dyn Observer<NavigationSessionState>>,
    ) -> ObserverId {
        self.navigation.register_observer(observer)
    }

    pub fn unregister_navigation_state_observer(&self, id: ObserverId) -> bool {
        self.navigation.unregister_observer(id)
    }

    pub fn register_history_observer(
        &self,
        observer: Arc<dyn HistoryRecordingStateChangeObserver>,
    ) -> ObserverId {
        self.history.register_observer(observer)
    }

    pub fn unregister_history_observer(&self, id: ObserverId) -> bool {
        self.history.unregister_observer(id)
    }

    pub fn register_reroute_observer(&self, observer: Arc<dyn Observer<RerouteState>>) -> ObserverId {
        self.reroute_state.register_observer(observer)
    }

    pub fn unregister_reroute_observer(&self, id: ObserverId) -> bool {
        self.reroute_state.unregister_observer(id)
    }

    /// Clears the routes and stops every background task. Later calls on any
    /// clone fail with [`RouteSetError::PipelineClosed`].
    pub async fn shutdown(&self) {
        self.refresh.stop().await;
        self.reroute.interrupt();
        if let Err(err) = self.clear_routes().await {
            log_warn!("final clean-up not applied: {}", err);
        }
        self.pipeline.shutdown().await;
        log_info!("navigation core shut down");
    }
}

/// Allows at most one live [`NavigationCore`] at a time.
#[derive(Default)]
pub struct CoreLifecycle {
    current: Option<NavigationCore>,
}

impl CoreLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(
        &mut self,
        engine: Arc<dyn NativeEngine>,
        fetcher: Arc<dyn RouteFetcher>,
        settings: CoreSettings,
    ) -> Result<NavigationCore, CoreError> {
        if self.current.is_some() {
            return Err(CoreError::AlreadyCreated);
        }
        let core = NavigationCore::start(engine, fetcher, settings).await;
        self.current = Some(core.clone());
        Ok(core)
    }

    pub async fn create_from_store(
        &mut self,
        engine: Arc<dyn NativeEngine>,
        fetcher: Arc<dyn RouteFetcher>,
        store: &SettingsStore,
    ) -> Result<NavigationCore, CoreError> {
        self.create(engine, fetcher, store.settings()).await
    }

    pub fn current(&self) -> Option<&NavigationCore> {
        self.current.as_ref()
    }

    pub async fn destroy(&mut self) -> Result<(), CoreError> {
        let core = self.current.take().ok_or(CoreError::NotCreated)?;
        core.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{route, MockEngine, MockFetcher};

    fn quiet_settings() -> CoreSettings {
        let mut settings = CoreSettings::default();
        settings.route_refresh.enabled = false;
        settings
    }

    async fn started() -> (NavigationCore, Arc<MockEngine>) {
        let engine = Arc::new(MockEngine::new());
        let core = NavigationCore::start(
            engine.clone(),
            Arc::new(MockFetcher::new()),
            quiet_settings(),
        )
        .await;
        (core, engine)
    }

    #[tokio::test]
    async fn select_primary_moves_alternative_to_front() {
        let (core, _engine) = started().await;
        core.set_routes(vec![route("a", 1), route("b", 1), route("c", 1)], 0)
            .await
            .unwrap();

        let outcome = core.select_primary_route(&RouteId::new("c")).await.unwrap();
        assert_eq!(
            outcome.routes.ids(),
            vec![RouteId::new("c"), RouteId::new("a"), RouteId::new("b")]
        );
        assert_eq!(core.route_snapshot().last_reason, Some(RouteUpdateReason::Reorder { leg_index: 0 }));

        assert_eq!(
            core.select_primary_route(&RouteId::new("zzz")).await,
            Err(RouteSetError::UnknownRoute(RouteId::new("zzz")))
        );
    }

    #[tokio::test]
    async fn tile_switch_reapplies_routes_from_current_leg() {
        let (core, engine) = started().await;
        assert_eq!(core.on_tiles_version_switched("2024_01").await, Ok(None));

        core.set_routes(vec![route("a", 3)], 0).await.unwrap();
        core.on_leg_index_changed(2);
        core.on_tiles_version_switched("2024_02").await.unwrap();

        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].starting_leg_index, 2);
        assert_eq!(core.routes().primary_id(), Some(&RouteId::new("a")));
    }

    #[tokio::test]
    async fn tile_switch_reapplies_the_set_queued_before_it() {
        let engine = Arc::new(MockEngine::gated());
        let core = NavigationCore::start(
            engine.clone(),
            Arc::new(MockFetcher::new()),
            quiet_settings(),
        )
        .await;
        engine.release(1);
        core.set_routes(vec![route("a", 1)], 0).await.unwrap();

        let pending = core.pipeline.submit(
            vec![route("b", 1)],
            RouteUpdateReason::NewRoutes {
                initial_leg_index: 0,
            },
        );
        let switched = {
            let core = core.clone();
            tokio::spawn(async move { core.on_tiles_version_switched("2024_03").await })
        };
        tokio::task::yield_now().await;
        engine.release(2);

        pending.await.unwrap();
        let outcome = switched.await.unwrap().unwrap().unwrap();
        assert_eq!(outcome.routes.ids(), vec![RouteId::new("b")]);
        assert_eq!(core.routes().primary_id(), Some(&RouteId::new("b")));
        assert_eq!(
            engine.calls()[2].primary.as_ref().map(Route::id),
            Some(&RouteId::new("b"))
        );
    }

    #[tokio::test]
    async fn select_primary_checks_the_set_active_when_applied() {
        let engine = Arc::new(MockEngine::gated());
        let core = NavigationCore::start(
            engine.clone(),
            Arc::new(MockFetcher::new()),
            quiet_settings(),
        )
        .await;
        engine.release(1);
        core.set_routes(vec![route("a", 1), route("b", 1)], 0)
            .await
            .unwrap();

        let replaced = core.pipeline.submit(
            vec![route("x", 1)],
            RouteUpdateReason::NewRoutes {
                initial_leg_index: 0,
            },
        );
        let selection = {
            let core = core.clone();
            tokio::spawn(async move { core.select_primary_route(&RouteId::new("b")).await })
        };
        tokio::task::yield_now().await;
        engine.release(2);

        replaced.await.unwrap();
        assert_eq!(
            selection.await.unwrap(),
            Err(RouteSetError::UnknownRoute(RouteId::new("b")))
        );
        assert_eq!(core.routes().ids(), vec![RouteId::new("x")]);
        assert_eq!(engine.calls().len(), 2);
    }

    #[tokio::test]
    async fn stored_settings_drive_the_started_core() {
        let path =
            std::env::temp_dir().join(format!("navcore-core-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{ "rerouteEnabled": false, "routeRefresh": { "enabled": false } }"#,
        )
        .unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();

        let core = NavigationCore::from_store(
            Arc::new(MockEngine::new()),
            Arc::new(MockFetcher::new()),
            &store,
        )
        .await;
        core.set_routes(vec![route("a", 1)], 0).await.unwrap();

        assert!(!core.settings().reroute_enabled);
        assert!(core.on_off_route().is_none());
        assert!(!core.refresh.is_running().await);

        let mut lifecycle = CoreLifecycle::new();
        let created = lifecycle
            .create_from_store(
                Arc::new(MockEngine::new()),
                Arc::new(MockFetcher::new()),
                &store,
            )
            .await
            .unwrap();
        assert_eq!(created.settings(), &store.settings());
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn disabled_features_ignore_their_triggers() {
        let mut settings = quiet_settings();
        settings.reroute_enabled = false;
        settings.alternatives_enabled = false;
        let core = NavigationCore::start(
            Arc::new(MockEngine::new()),
            Arc::new(MockFetcher::new()),
            settings,
        )
        .await;
        core.set_routes(vec![route("a", 1)], 0).await.unwrap();

        assert!(core.on_off_route().is_none());
        assert_eq!(core.on_alternatives_changed(Vec::new()).await, Ok(None));
    }

    #[tokio::test]
    async fn lifecycle_allows_one_instance_at_a_time() {
        let mut lifecycle = CoreLifecycle::new();
        let engine: Arc<dyn NativeEngine> = Arc::new(MockEngine::new());
        let fetcher: Arc<dyn RouteFetcher> = Arc::new(MockFetcher::new());

        let first = lifecycle
            .create(engine.clone(), fetcher.clone(), quiet_settings())
            .await
            .unwrap();
        assert!(matches!(
            lifecycle.create(engine.clone(), fetcher.clone(), quiet_settings()).await,
            Err(CoreError::AlreadyCreated)
        ));

        lifecycle.destroy().await.unwrap();
        assert_eq!(
            first.set_routes(vec![route("a", 1)], 0).await,
            Err(RouteSetError::PipelineClosed)
        );
        assert_eq!(lifecycle.destroy().await, Err(CoreError::NotCreated));
        assert!(lifecycle.create(engine, fetcher, quiet_settings()).await.is_ok());
    }
}
