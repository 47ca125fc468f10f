use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::future::Future;

use crate::api::model::{
    Analytics, CongestionSummary, DetectResponse, DetectionResult, ErrorBody, ForecastPoint,
    ForecastResponse, GalleryImage, RecentDetectionsResponse, Zone, ZoneId, ZonesResponse,
};
use crate::api::upload::ImageUpload;
use crate::config::ClientConfig;

pub const DETECT_PATH: &str = "/detect";
pub const RECENT_DETECTIONS_PATH: &str = "/detections/recent";
pub const ZONES_PATH: &str = "/api/zones";
pub const CONGESTION_PATH: &str = "/api/traffic/congestion";
pub const ANALYTICS_PATH: &str = "/api/analytics";

/// Errors produced while talking to the remote service.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection error: {0}")]
    Transport(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("{0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Remote endpoints consumed by the dashboard controllers.
pub trait DashboardApi: Send + Sync + 'static {
    fn detect(&self, upload: ImageUpload)
        -> impl Future<Output = ApiResult<DetectionResult>> + Send;

    fn recent_detections(&self) -> impl Future<Output = ApiResult<Vec<GalleryImage>>> + Send;

    fn zones(&self) -> impl Future<Output = ApiResult<Vec<Zone>>> + Send;

    fn zone_forecast(
        &self,
        zone_id: ZoneId,
        hours: u32,
    ) -> impl Future<Output = ApiResult<Vec<ForecastPoint>>> + Send;

    fn congestion(&self) -> impl Future<Output = ApiResult<CongestionSummary>> + Send;

    fn analytics(&self) -> impl Future<Output = ApiResult<Analytics>> + Send;
}

/// reqwest-backed implementation of [`DashboardApi`].
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    config: ClientConfig,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.config.endpoint(path);
        log::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        decode_response(response).await
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.error)
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

impl DashboardApi for HttpApi {
    async fn detect(&self, upload: ImageUpload) -> ApiResult<DetectionResult> {
        let url = self.config.endpoint(DETECT_PATH);
        let part = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.media_type)?;
        let form = Form::new().part("image", part);

        log::debug!("POST {} ({} bytes)", url, upload.size());
        let response = self.client.post(&url).multipart(form).send().await?;
        let parsed: DetectResponse = decode_response(response).await?;
        if !parsed.success {
            return Err(ApiError::Rejected(
                parsed.error.unwrap_or_else(|| "Detection failed".into()),
            ));
        }
        parsed
            .result
            .ok_or_else(|| ApiError::Decode("detection payload missing counts".into()))
    }

    async fn recent_detections(&self) -> ApiResult<Vec<GalleryImage>> {
        let parsed: RecentDetectionsResponse = self.get_json(RECENT_DETECTIONS_PATH).await?;
        if !parsed.success {
            return Err(ApiError::Rejected(
                parsed
                    .error
                    .unwrap_or_else(|| "recent detections unavailable".into()),
            ));
        }
        Ok(parsed.images)
    }

    async fn zones(&self) -> ApiResult<Vec<Zone>> {
        let parsed: ZonesResponse = self.get_json(ZONES_PATH).await?;
        Ok(parsed.zones)
    }

    async fn zone_forecast(&self, zone_id: ZoneId, hours: u32) -> ApiResult<Vec<ForecastPoint>> {
        let path = format!("{}/{}/forecast?hours={}", ZONES_PATH, zone_id, hours);
        let parsed: ForecastResponse = self.get_json(&path).await?;
        Ok(parsed.forecast)
    }

    async fn congestion(&self) -> ApiResult<CongestionSummary> {
        self.get_json(CONGESTION_PATH).await
    }

    async fn analytics(&self) -> ApiResult<Analytics> {
        self.get_json(ANALYTICS_PATH).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_api_builds_from_default_config() {
        let api = HttpApi::new(&ClientConfig::default()).unwrap();
        assert_eq!(api.base_url(), "http://localhost:5001");
    }

    #[test]
    fn status_error_displays_server_message() {
        let err = ApiError::Status {
            status: 503,
            message: "Model not loaded".into(),
        };
        assert_eq!(err.to_string(), "Model not loaded");
    }
}
