use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::RouteFetcher;
use crate::error::RouteSetError;
use crate::models::{RefreshOrigin, Route, RouteUpdateReason};
use crate::routes::{RouteSetOutcome, RouteUpdatePipeline};

use super::merge::apply_delta;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Keeps traffic annotations of the active routes current, either on a fixed
/// interval or on demand.
#[derive(Clone)]
pub struct RouteRefreshController {
    pipeline: RouteUpdatePipeline,
    fetcher: Arc<dyn RouteFetcher>,
    interval: Duration,
    ticker: Arc<Mutex<Option<Ticker>>>,
}

impl RouteRefreshController {
    pub fn new(pipeline: RouteUpdatePipeline, fetcher: Arc<dyn RouteFetcher>, interval: Duration) -> Self {
        Self {
            pipeline,
            fetcher,
            interval,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the periodic refresh, replacing a running one.
    pub async fn start(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel_token.cancel();
            previous.handle.abort();
        }

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let controller = self.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match controller.refresh(RefreshOrigin::Controller).await {
                            Ok(Some(outcome)) => log_debug!("periodic refresh applied to {} routes", outcome.routes.len()),
                            Ok(None) => {}
                            Err(err) => log_warn!("periodic refresh not applied: {}", err),
                        }
                    }
                    _ = token.cancelled() => {
                        log_info!("route refresh ticker shutting down");
                        break;
                    }
                }
            }
        });

        log_info!("route refresh every {:?}", period);
        *ticker_guard = Some(Ticker {
            handle,
            cancel_token,
        });
    }

    pub async fn stop(&self) {
        let Some(ticker) = self.ticker.lock().await.take() else {
            return;
        };
        ticker.cancel_token.cancel();
        if let Err(err) = ticker.handle.await {
            log_error!("route refresh ticker failed to join: {err}");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Manual refresh of the active routes.
    pub async fn refresh_now(&self) -> Result<Option<RouteSetOutcome>, RouteSetError> {
        self.refresh(RefreshOrigin::Manual).await
    }

    /// Fetches fresh annotations for every active route and submits the
    /// merged set. Returns `Ok(None)` when there was nothing to refresh.
    pub async fn refresh(
        &self,
        origin: RefreshOrigin,
    ) -> Result<Option<RouteSetOutcome>, RouteSetError> {
        let routes = self.pipeline.routes();
        if routes.is_empty() {
            return Ok(None);
        }
        let leg_index = self.pipeline.current_leg_index();

        let mut refreshed: Vec<Route> = Vec::with_capacity(routes.len());
        let mut updated = 0;
        for (position, route) in routes.routes().iter().enumerate() {
            // Alternatives fork from the primary, so their progress restarts at 0.
            let from_leg = if position == 0 { leg_index } else { 0 };
            match self.fetcher.fetch_refresh(route, from_leg).await {
                Ok(delta) => {
                    refreshed.push(apply_delta(route, &delta));
                    updated += 1;
                }
                Err(err) => {
                    log_warn!("refresh of route {} failed, keeping it: {}", route.id(), err);
                    refreshed.push(route.clone());
                }
            }
        }

        if updated == 0 {
            return Ok(None);
        }

        let reason = RouteUpdateReason::RefreshRoutes { origin, leg_index };
        self.pipeline.submit(refreshed, reason).await.map(Some)
    }
}
