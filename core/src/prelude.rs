pub use crate::api::{
    Analytics, ApiError, ApiResult, CongestionLevel, CongestionSummary, DashboardApi,
    DetectionResult, DetectionSummary, ForecastPoint, GalleryImage, HttpApi, ImageUpload, Zone,
    ZoneId,
};
pub use crate::config::ClientConfig;
pub use crate::controllers::{GalleryController, TrafficController, UploadController};

/// User-facing failures of the dashboard controllers.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    #[error("Please select an image file (got {0})")]
    InvalidFileType(String),
    #[error("File size must be less than {} MB", .limit / (1024 * 1024))]
    FileTooLarge { size: u64, limit: u64 },
    #[error("{0}")]
    DetectionFailed(String),
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    #[error("a detection is already in progress")]
    Busy,
    #[error("could not read {0}")]
    Unreadable(String),
}

impl DashboardError {
    /// Whether the error was raised before any request left the client.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            DashboardError::InvalidFileType(_)
                | DashboardError::FileTooLarge { .. }
                | DashboardError::Busy
                | DashboardError::Unreadable(_)
        )
    }
}

impl From<ApiError> for DashboardError {
    fn from(err: ApiError) -> Self {
        DashboardError::FetchFailed(err.to_string())
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
