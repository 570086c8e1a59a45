//! Route-set orchestration and session state for turn-by-turn navigation.
//!
//! Every change to the active routes goes through one [`RouteUpdatePipeline`]
//! so that observers see updates one at a time and in submission order. The
//! navigation session, history recording and reroute states are derived from
//! what the pipeline applies.

pub mod alternatives;
pub mod engine;
pub mod error;
pub mod models;
pub mod navigation;
pub mod observer;
pub mod refresh;
pub mod reroute;
pub mod routes;
pub mod session;
pub mod settings;
mod utils;

#[cfg(test)]
mod testing;

pub use engine::{
    EngineRoutesRequest, EngineRoutesResponse, NativeAlternative, NativeEngine, RerouteOrigin,
    RerouteRequest, RerouteResponse, RouteFetcher, RouteRejection,
};
pub use error::{
    AlternativeMetadataError, CoreError, EngineError, FetchError, RerouteFailure, RouteSetError,
};
pub use models::{
    AlternativeRouteInfo, AlternativeRouteMetadata, Congestion, ForkIntersection, GeoPoint,
    LegAnnotation, LegStep, RefreshOrigin, Route, RouteId, RouteLeg, RouteSet, RouteUpdateReason,
};
pub use navigation::{CoreLifecycle, NavigationCore};
pub use observer::{Observer, ObserverId};
pub use refresh::AnnotationRefreshDelta;
pub use reroute::RerouteState;
pub use routes::{RouteSetOutcome, RouteStoreSnapshot, RouteUpdatePipeline, RoutesUpdate};
pub use session::{
    HistoryRecordingSessionState, HistoryRecordingStateChangeObserver, NavigationSessionState,
};
pub use settings::{CoreSettings, RouteRefreshSettings, SettingsStore};

/// Installs the `env_logger` backend at Info level, overridable with
/// `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
