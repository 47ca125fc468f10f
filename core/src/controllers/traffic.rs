use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::api::{
    Analytics, ApiResult, CongestionSummary, DashboardApi, ForecastPoint, Zone, ZoneId,
};
use crate::config::ClientConfig;
use crate::controllers::generation::{Generation, Stamped};
use crate::telemetry::{LogManager, Metrics, MetricsRecorder};

/// Result of one fetch inside a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer request already wrote this field group.
    Stale,
    /// The request failed; previously displayed data was kept.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub zones: FetchOutcome,
    pub congestion: FetchOutcome,
    pub analytics: FetchOutcome,
    pub forecast: Option<FetchOutcome>,
}

impl RefreshReport {
    /// True when at least one polled field group took this cycle's response.
    pub fn applied_any(&self) -> bool {
        [self.zones, self.congestion, self.analytics].contains(&FetchOutcome::Applied)
    }
}

/// Snapshot rendered by the Traffic view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficState {
    pub zones: Vec<Zone>,
    pub congestion: Option<CongestionSummary>,
    pub analytics: Analytics,
    pub selected_zone: Option<ZoneId>,
    pub forecast: Vec<ForecastPoint>,
    pub forecast_zone: Option<ZoneId>,
    pub last_refresh: Option<Instant>,
    pub refresh_count: u64,
    pub loading: bool,
}

impl TrafficState {
    pub fn selected(&self) -> Option<&Zone> {
        let id = self.selected_zone?;
        self.zones.iter().find(|zone| zone.id == id)
    }
}

#[derive(Default)]
struct TrafficStore {
    zones: Stamped<Vec<Zone>>,
    congestion: Stamped<Option<CongestionSummary>>,
    analytics: Stamped<Analytics>,
    forecast: Stamped<Vec<ForecastPoint>>,
    selected_zone: Option<ZoneId>,
    forecast_zone: Option<ZoneId>,
    last_refresh: Option<Instant>,
    refresh_count: u64,
    in_flight: usize,
}

impl TrafficStore {
    fn snapshot(&self) -> TrafficState {
        TrafficState {
            zones: self.zones.get().clone(),
            congestion: self.congestion.get().clone(),
            analytics: self.analytics.get().clone(),
            selected_zone: self.selected_zone,
            forecast: self.forecast.get().clone(),
            forecast_zone: self.forecast_zone,
            last_refresh: self.last_refresh,
            refresh_count: self.refresh_count,
            loading: self.in_flight > 0,
        }
    }
}

#[derive(Default)]
struct Generations {
    refresh: Generation,
    forecast: Generation,
}

/// Polls zone, congestion and analytics data for the Traffic view.
pub struct TrafficController<A: DashboardApi> {
    api: Arc<A>,
    config: Arc<ClientConfig>,
    store: Arc<Mutex<TrafficStore>>,
    generations: Arc<Generations>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<A: DashboardApi> Clone for TrafficController<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            generations: self.generations.clone(),
            metrics: self.metrics.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<A: DashboardApi> TrafficController<A> {
    pub fn new(api: Arc<A>, config: Arc<ClientConfig>) -> Self {
        Self {
            api,
            config,
            store: Arc::new(Mutex::new(TrafficStore::default())),
            generations: Arc::new(Generations::default()),
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new("traffic"),
        }
    }

    /// Starts the polling loop: one fetch set now, then one per refresh
    /// interval until the returned handle is dropped.
    pub fn mount(&self) -> TrafficMount {
        let controller = self.clone();
        let period = self.config.refresh_interval();
        let auto_refresh = self.config.auto_refresh;
        self.logger.record(&format!(
            "mounted, auto refresh {}",
            if auto_refresh {
                format!("every {}s", period.as_secs())
            } else {
                "off".to_string()
            }
        ));

        let handle = tokio::spawn(async move {
            if !auto_refresh {
                controller.refresh().await;
                return;
            }
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                controller.refresh().await;
            }
        });

        TrafficMount {
            handle,
            logger: self.logger.clone(),
        }
    }

    /// Runs the full fetch set once. Each fetch is independent: a failure is
    /// logged and leaves the previously displayed data in place.
    pub async fn refresh(&self) -> RefreshReport {
        let generation = self.generations.refresh.next();
        let _loading = self.begin_loading();

        let zones = self.fetch("zones", self.api.zones()).await;
        let first_zone = zones
            .as_ref()
            .and_then(|zones| zones.first())
            .map(|zone| zone.id);
        let zones_outcome =
            self.apply(generation, zones, |store, zones| store.zones.apply(generation, zones));

        let congestion = self.fetch("congestion", self.api.congestion()).await;
        let congestion_outcome = self.apply(generation, congestion, |store, summary| {
            store.congestion.apply(generation, Some(summary))
        });

        let analytics = self.fetch("analytics", self.api.analytics()).await;
        let analytics_outcome = self.apply(generation, analytics, |store, analytics| {
            store.analytics.apply(generation, analytics)
        });

        let needs_selection = self.with_store(|store| store.selected_zone.is_none());
        let forecast = match first_zone {
            Some(zone_id) if needs_selection => Some(self.select_zone(zone_id).await),
            _ => None,
        };

        let report = RefreshReport {
            zones: zones_outcome,
            congestion: congestion_outcome,
            analytics: analytics_outcome,
            forecast,
        };
        if report.applied_any() {
            self.with_store(|store| {
                store.last_refresh = Some(Instant::now());
                store.refresh_count += 1;
            });
        }
        self.logger
            .trace(&format!("refresh #{} finished: {:?}", generation, report));
        report
    }

    /// Selects a zone and fetches its forecast. A response arriving after a
    /// newer selection has been issued is discarded.
    pub async fn select_zone(&self, zone_id: ZoneId) -> FetchOutcome {
        let generation = self.generations.forecast.next();
        self.with_store(|store| store.selected_zone = Some(zone_id));

        let hours = self.config.forecast_hours;
        let Some(points) = self
            .fetch("forecast", self.api.zone_forecast(zone_id, hours))
            .await
        else {
            return FetchOutcome::Failed;
        };

        if !self.generations.forecast.is_latest(generation) {
            self.metrics.record_discarded();
            self.logger.trace(&format!(
                "dropping forecast for zone {} superseded by a newer selection",
                zone_id
            ));
            return FetchOutcome::Stale;
        }

        self.with_store(|store| {
            store.forecast.apply(generation, points);
            store.forecast_zone = Some(zone_id);
        });
        FetchOutcome::Applied
    }

    pub fn snapshot(&self) -> TrafficState {
        self.with_store(|store| store.snapshot())
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    async fn fetch<T>(&self, what: &str, request: impl Future<Output = ApiResult<T>>) -> Option<T> {
        self.metrics.record_request();
        match request.await {
            Ok(value) => Some(value),
            Err(err) => {
                self.metrics.record_failure();
                self.logger.warn(&format!("{} fetch failed: {}", what, err));
                None
            }
        }
    }

    fn apply<T>(
        &self,
        generation: u64,
        value: Option<T>,
        write: impl FnOnce(&mut TrafficStore, T) -> bool,
    ) -> FetchOutcome {
        let Some(value) = value else {
            return FetchOutcome::Failed;
        };
        if self.with_store(|store| write(store, value)) {
            FetchOutcome::Applied
        } else {
            self.metrics.record_discarded();
            self.logger
                .trace(&format!("dropping stale response from refresh #{}", generation));
            FetchOutcome::Stale
        }
    }

    fn begin_loading(&self) -> LoadingGuard {
        self.with_store(|store| store.in_flight += 1);
        LoadingGuard {
            store: self.store.clone(),
        }
    }

    fn with_store<R>(&self, f: impl FnOnce(&mut TrafficStore) -> R) -> R {
        let mut guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}

/// Counts one in-flight refresh; released on drop so an aborted poll task
/// cannot leave the view stuck in its loading state.
struct LoadingGuard {
    store: Arc<Mutex<TrafficStore>>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.in_flight = store.in_flight.saturating_sub(1);
    }
}

/// Lifetime of a mounted Traffic view; dropping it stops the polling timer.
pub struct TrafficMount {
    handle: JoinHandle<()>,
    logger: LogManager,
}

impl TrafficMount {
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn unmount(self) {}
}

impl Drop for TrafficMount {
    fn drop(&mut self) {
        self.handle.abort();
        self.logger.record("unmounted, polling stopped");
    }
}
