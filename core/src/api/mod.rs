//! Wire types and the HTTP seam to the remote detection/analytics service.

pub mod client;
pub mod model;
pub mod upload;

pub use client::{ApiError, ApiResult, DashboardApi, HttpApi};
pub use model::{
    Analytics, BadgeVariant, ConfidencePolicy, Congestion, CongestionCounts, CongestionLevel,
    CongestionSummary, DetectionResult, DetectionSummary, ForecastPoint, GalleryImage,
    HourlyTrend, SlotCell, WeeklyForecast, Zone, ZoneId,
};
pub use upload::{ImagePreview, ImageUpload};
