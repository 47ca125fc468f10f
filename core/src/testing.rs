//! Scripted in-memory [`DashboardApi`] used by the controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{
    Analytics, ApiError, ApiResult, Congestion, CongestionCounts, CongestionLevel,
    CongestionSummary, DashboardApi, DetectionResult, ForecastPoint, GalleryImage, ImageUpload,
    Zone, ZoneId,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallLog {
    pub detect: Vec<String>,
    pub recent: usize,
    pub zones: usize,
    pub congestion: usize,
    pub analytics: usize,
    pub forecasts: Vec<(ZoneId, u32)>,
}

impl CallLog {
    pub fn total(&self) -> usize {
        self.detect.len()
            + self.recent
            + self.zones
            + self.congestion
            + self.analytics
            + self.forecasts.len()
    }
}

struct Script {
    calls: CallLog,
    detect: VecDeque<ApiResult<DetectionResult>>,
    recent: VecDeque<ApiResult<Vec<GalleryImage>>>,
    zones: ApiResult<Vec<Zone>>,
    zones_delays: VecDeque<Duration>,
    congestion: ApiResult<CongestionSummary>,
    analytics: ApiResult<Analytics>,
    forecast_delays: HashMap<ZoneId, Duration>,
    forecast_error: Option<ApiError>,
}

pub struct FakeApi {
    script: Mutex<Script>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                calls: CallLog::default(),
                detect: VecDeque::new(),
                recent: VecDeque::new(),
                zones: Ok(sample_zones()),
                zones_delays: VecDeque::new(),
                congestion: Ok(sample_congestion()),
                analytics: Ok(Analytics::default()),
                forecast_delays: HashMap::new(),
                forecast_error: None,
            }),
        }
    }

    pub fn calls(&self) -> CallLog {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn push_detect(&self, reply: ApiResult<DetectionResult>) {
        self.script.lock().unwrap().detect.push_back(reply);
    }

    pub fn push_recent(&self, reply: ApiResult<Vec<GalleryImage>>) {
        self.script.lock().unwrap().recent.push_back(reply);
    }

    pub fn set_zones(&self, reply: ApiResult<Vec<Zone>>) {
        self.script.lock().unwrap().zones = reply;
    }

    /// Delays the next zones reply; the reply itself is taken when the call starts.
    pub fn push_zones_delay(&self, delay: Duration) {
        self.script.lock().unwrap().zones_delays.push_back(delay);
    }

    pub fn set_congestion(&self, reply: ApiResult<CongestionSummary>) {
        self.script.lock().unwrap().congestion = reply;
    }

    pub fn set_analytics(&self, reply: ApiResult<Analytics>) {
        self.script.lock().unwrap().analytics = reply;
    }

    pub fn set_forecast_delay(&self, zone_id: ZoneId, delay: Duration) {
        self.script
            .lock()
            .unwrap()
            .forecast_delays
            .insert(zone_id, delay);
    }

    pub fn fail_forecasts(&self, err: ApiError) {
        self.script.lock().unwrap().forecast_error = Some(err);
    }
}

impl DashboardApi for FakeApi {
    async fn detect(&self, upload: ImageUpload) -> ApiResult<DetectionResult> {
        let mut script = self.script.lock().unwrap();
        script.calls.detect.push(upload.file_name.clone());
        script
            .detect
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted detect reply".into())))
    }

    async fn recent_detections(&self) -> ApiResult<Vec<GalleryImage>> {
        let mut script = self.script.lock().unwrap();
        script.calls.recent += 1;
        script.recent.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn zones(&self) -> ApiResult<Vec<Zone>> {
        let (delay, reply) = {
            let mut script = self.script.lock().unwrap();
            script.calls.zones += 1;
            let delay = script.zones_delays.pop_front().unwrap_or_default();
            (delay, script.zones.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }

    async fn zone_forecast(&self, zone_id: ZoneId, hours: u32) -> ApiResult<Vec<ForecastPoint>> {
        let (delay, error) = {
            let mut script = self.script.lock().unwrap();
            script.calls.forecasts.push((zone_id, hours));
            (
                script
                    .forecast_delays
                    .get(&zone_id)
                    .copied()
                    .unwrap_or_default(),
                script.forecast_error.clone(),
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(err) => Err(err),
            None => Ok(sample_forecast(zone_id, hours)),
        }
    }

    async fn congestion(&self) -> ApiResult<CongestionSummary> {
        let mut script = self.script.lock().unwrap();
        script.calls.congestion += 1;
        script.congestion.clone()
    }

    async fn analytics(&self) -> ApiResult<Analytics> {
        let mut script = self.script.lock().unwrap();
        script.calls.analytics += 1;
        script.analytics.clone()
    }
}

pub fn sample_zone(id: ZoneId, name: &str, level: CongestionLevel) -> Zone {
    Zone {
        id,
        name: name.into(),
        occupancy_rate: 62.5,
        congestion: Congestion {
            level,
            color: None,
            score: None,
        },
        available_slots: 40,
        avg_wait_time: 11,
        peak_hour: "18:00".into(),
        total_slots: 150,
        occupied_slots: 110,
        traffic_flow: 120,
    }
}

pub fn sample_zones() -> Vec<Zone> {
    vec![
        sample_zone(1, "Downtown", CongestionLevel::High),
        sample_zone(2, "Airport", CongestionLevel::Moderate),
    ]
}

pub fn sample_congestion() -> CongestionSummary {
    CongestionSummary {
        overall_congestion: CongestionCounts {
            high: 1,
            moderate: 1,
            ..Default::default()
        },
        avg_wait_time: 11.0,
        total_traffic_flow: 240,
    }
}

/// Demand encodes the zone id so tests can tell forecasts apart.
pub fn sample_forecast(zone_id: ZoneId, hours: u32) -> Vec<ForecastPoint> {
    (0..hours)
        .map(|hour| ForecastPoint {
            time: format!("{:02}:00", hour),
            demand: zone_id * 10,
            hour: Some(hour),
            occupancy_rate: None,
            confidence: None,
        })
        .collect()
}

pub fn detection(
    free: u32,
    occupied: u32,
    per_spot: Vec<bool>,
    confidence: Vec<f32>,
) -> DetectionResult {
    DetectionResult {
        free_count: free,
        occupied_count: occupied,
        per_spot,
        confidence,
        annotated_image: Some("aGVsbG8=".into()),
    }
}

/// Lets spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
