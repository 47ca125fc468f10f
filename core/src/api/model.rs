use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::math::stats::StatsHelper;

pub type ZoneId = u32;

/// Occupancy inference returned by the detection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DetectionResult {
    pub free_count: u32,
    pub occupied_count: u32,
    #[serde(default)]
    pub per_spot: Vec<bool>,
    #[serde(default)]
    pub confidence: Vec<f32>,
    #[serde(
        rename = "annotated_image_b64",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub annotated_image: Option<String>,
}

impl DetectionResult {
    /// Checks the count and alignment invariants of a detection.
    pub fn is_consistent(&self) -> bool {
        if self.per_spot.is_empty() {
            return true;
        }
        let aligned = self.confidence.is_empty() || self.confidence.len() == self.per_spot.len();
        let counted =
            (self.free_count as usize + self.occupied_count as usize) == self.per_spot.len();
        aligned && counted
    }

    pub fn annotated_image_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.annotated_image.as_ref().map(|encoded| {
            let payload = encoded
                .split_once(',')
                .map(|(_, data)| data)
                .unwrap_or(encoded);
            base64::engine::general_purpose::STANDARD.decode(payload)
        })
    }

    pub fn summarize(&self, policy: ConfidencePolicy) -> DetectionSummary {
        let slots = self
            .per_spot
            .iter()
            .enumerate()
            .map(|(index, &occupied)| SlotCell {
                index,
                occupied,
                confidence: self.confidence.get(index).copied(),
            })
            .collect();

        DetectionSummary {
            available: self.free_count,
            occupied: self.occupied_count,
            accuracy: policy.aggregate(&self.confidence),
            slots,
            has_annotated_image: self.annotated_image.is_some(),
        }
    }
}

/// How the per-slot confidences collapse into the single displayed accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfidencePolicy {
    /// Best-case reporting: the highest confidence in the sequence.
    #[default]
    Max,
    Mean,
}

impl ConfidencePolicy {
    pub fn aggregate(self, confidence: &[f32]) -> Option<f32> {
        match self {
            ConfidencePolicy::Max => StatsHelper::max(confidence),
            ConfidencePolicy::Mean => StatsHelper::mean(confidence),
        }
    }
}

/// Render-ready view of a detection.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSummary {
    pub available: u32,
    pub occupied: u32,
    pub accuracy: Option<f32>,
    pub slots: Vec<SlotCell>,
    pub has_annotated_image: bool,
}

impl DetectionSummary {
    pub fn accuracy_label(&self) -> String {
        self.accuracy
            .map(format_accuracy)
            .unwrap_or_else(|| "n/a".into())
    }

    pub fn availability_percent(&self) -> Option<u32> {
        let total = self.available + self.occupied;
        if total == 0 {
            None
        } else {
            Some(((self.available as f32 / total as f32) * 100.0).round() as u32)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotCell {
    pub index: usize,
    pub occupied: bool,
    pub confidence: Option<f32>,
}

pub fn format_accuracy(value: f32) -> String {
    format!("{:.1}%", value * 100.0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CongestionLevel {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
    #[serde(other)]
    Unknown,
}

/// Badge styles available to the presentational layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeVariant {
    Default,
    Secondary,
    Success,
    Warning,
    Destructive,
}

impl CongestionLevel {
    pub fn badge(self) -> BadgeVariant {
        match self {
            CongestionLevel::Critical => BadgeVariant::Destructive,
            CongestionLevel::High => BadgeVariant::Warning,
            CongestionLevel::Moderate => BadgeVariant::Default,
            CongestionLevel::Low => BadgeVariant::Success,
            CongestionLevel::Minimal => BadgeVariant::Secondary,
            CongestionLevel::Unknown => {
                log::warn!("unknown congestion level, using default badge");
                BadgeVariant::Default
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CongestionLevel::Minimal => "Minimal",
            CongestionLevel::Low => "Low",
            CongestionLevel::Moderate => "Moderate",
            CongestionLevel::High => "High",
            CongestionLevel::Critical => "Critical",
            CongestionLevel::Unknown => "Unknown",
        }
    }

    /// Classifies an occupancy fraction (0.0..=1.0) into a level.
    pub fn from_occupancy(rate: f32) -> Self {
        if rate >= 0.90 {
            CongestionLevel::Critical
        } else if rate >= 0.75 {
            CongestionLevel::High
        } else if rate >= 0.50 {
            CongestionLevel::Moderate
        } else if rate >= 0.25 {
            CongestionLevel::Low
        } else {
            CongestionLevel::Minimal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Congestion {
    pub level: CongestionLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub occupancy_rate: f32,
    pub congestion: Congestion,
    pub available_slots: u32,
    pub avg_wait_time: u32,
    pub peak_hour: String,
    #[serde(default)]
    pub total_slots: u32,
    #[serde(default)]
    pub occupied_slots: u32,
    #[serde(default)]
    pub traffic_flow: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CongestionCounts {
    pub critical: u32,
    pub high: u32,
    pub moderate: u32,
    pub low: u32,
    pub minimal: u32,
}

impl CongestionCounts {
    pub fn get(&self, level: CongestionLevel) -> u32 {
        match level {
            CongestionLevel::Critical => self.critical,
            CongestionLevel::High => self.high,
            CongestionLevel::Moderate => self.moderate,
            CongestionLevel::Low => self.low,
            CongestionLevel::Minimal => self.minimal,
            CongestionLevel::Unknown => 0,
        }
    }

    pub fn tally<'a>(levels: impl IntoIterator<Item = &'a CongestionLevel>) -> Self {
        levels
            .into_iter()
            .fold(CongestionCounts::default(), |mut counts, level| {
                match level {
                    CongestionLevel::Critical => counts.critical += 1,
                    CongestionLevel::High => counts.high += 1,
                    CongestionLevel::Moderate => counts.moderate += 1,
                    CongestionLevel::Low => counts.low += 1,
                    CongestionLevel::Minimal => counts.minimal += 1,
                    CongestionLevel::Unknown => {}
                }
                counts
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionSummary {
    #[serde(default)]
    pub overall_congestion: CongestionCounts,
    #[serde(default)]
    pub avg_wait_time: f32,
    #[serde(default)]
    pub total_traffic_flow: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: String,
    pub demand: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy_rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyTrend {
    pub time: String,
    pub hour: u32,
    pub total_demand: u32,
    pub total_capacity: u32,
    pub avg_occupancy: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyForecast {
    pub day: String,
    pub avg_demand: u32,
    pub peak_demand: u32,
    pub occupancy_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Analytics {
    #[serde(default)]
    pub hourly_trends: Vec<HourlyTrend>,
    #[serde(default)]
    pub weekly_forecast: Vec<WeeklyForecast>,
    #[serde(default)]
    pub total_capacity: u32,
    #[serde(default)]
    pub total_zones: u32,
}

/// Envelope of `POST /detect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub result: Option<DetectionResult>,
}

/// Envelope of `GET /detections/recent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentDetectionsResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub images: Vec<GalleryImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesResponse {
    #[serde(default)]
    pub zones: Vec<Zone>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    #[serde(default)]
    pub forecast: Vec<ForecastPoint>,
}

/// Body shape shared by every error reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}
