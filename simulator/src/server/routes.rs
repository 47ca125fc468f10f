use crate::config::ServerConfig;
use crate::generator::detector::{DetectorError, FakeDetector};
use crate::generator::zones::{current_hour, ParkingDataGenerator};
use crate::server::history::DetectionHistory;
use anyhow::Context;
use bytes::BufMut;
use futures_util::TryStreamExt;
use parkcore::api::model::{
    DetectResponse, ErrorBody, ForecastResponse, RecentDetectionsResponse, ZonesResponse,
};
use parkcore::api::{GalleryImage, ZoneId};
use serde::Deserialize;
use serde_json::json;
use std::{
    convert::Infallible,
    future::Future,
    net::SocketAddr,
    sync::{Arc, PoisonError, RwLock},
};
use warp::{
    http::StatusCode,
    multipart::{FormData, Part},
    Filter, Rejection, Reply,
};

const DEFAULT_FORECAST_HOURS: u32 = 6;
const MAX_FORECAST_HOURS: u32 = 48;

/// Everything the mock backend needs to answer a request.
pub struct BackendState {
    generator: ParkingDataGenerator,
    detector: FakeDetector,
    history: RwLock<DetectionHistory>,
    fixed_hour: Option<u32>,
}

impl BackendState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            generator: ParkingDataGenerator::new(config.seed),
            detector: FakeDetector::new(config.slot_count, config.model_loaded),
            history: RwLock::new(DetectionHistory::new(config.history_len)),
            fixed_hour: config.fixed_hour,
        }
    }

    fn hour(&self) -> u32 {
        self.fixed_hour.unwrap_or_else(current_hour)
    }
}

#[derive(Debug)]
struct MalformedUpload(String);

impl warp::reject::Reject for MalformedUpload {}

#[derive(Debug, Deserialize)]
struct ForecastQuery {
    hours: Option<u32>,
}

fn with_state(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (Arc<BackendState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn error_reply(status: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorBody {
            success: Some(false),
            error: Some(message.to_string()),
        }),
        status,
    )
}

/// Full route tree of the mock backend, CORS and request logging included.
pub fn routes(
    state: Arc<BackendState>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("api" / "health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<BackendState>| {
            warp::reply::json(&json!({
                "status": "healthy",
                "model_loaded": state.detector.is_loaded(),
            }))
        });

    let detect = warp::path!("detect")
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(with_state(state.clone()))
        .and_then(handle_detect);

    let recent = warp::path!("detections" / "recent")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<BackendState>| {
            let history = state.history.read().unwrap_or_else(PoisonError::into_inner);
            if history.is_empty() {
                log::debug!("no detections stored yet");
            }
            warp::reply::json(&RecentDetectionsResponse {
                success: true,
                images: history
                    .recent_urls()
                    .into_iter()
                    .map(|url| GalleryImage { url })
                    .collect(),
                error: None,
            })
        });

    let stored = warp::path!("detections" / u64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|id: u64, state: Arc<BackendState>| {
            let history = state.history.read().unwrap_or_else(PoisonError::into_inner);
            match history.get(id) {
                Some(entry) => warp::reply::with_header(
                    entry.bytes.clone(),
                    "content-type",
                    entry.media_type.clone(),
                )
                .into_response(),
                None => error_reply(StatusCode::NOT_FOUND, "Detection not found").into_response(),
            }
        });

    let zones = warp::path!("api" / "zones")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<BackendState>| {
            warp::reply::json(&ZonesResponse {
                zones: state.generator.zone_data(state.hour()),
            })
        });

    let forecast = warp::path!("api" / "zones" / ZoneId / "forecast")
        .and(warp::get())
        .and(warp::query::<ForecastQuery>())
        .and(with_state(state.clone()))
        .map(|zone_id: ZoneId, query: ForecastQuery, state: Arc<BackendState>| {
            let hours = query
                .hours
                .unwrap_or(DEFAULT_FORECAST_HOURS)
                .clamp(1, MAX_FORECAST_HOURS);
            match state.generator.forecast(zone_id, hours, state.hour()) {
                Some(points) => warp::reply::json(&ForecastResponse {
                    zone_id: Some(zone_id),
                    forecast: points,
                })
                .into_response(),
                None => error_reply(StatusCode::NOT_FOUND, "Zone not found").into_response(),
            }
        });

    let congestion = warp::path!("api" / "traffic" / "congestion")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<BackendState>| {
            warp::reply::json(&state.generator.congestion_summary(state.hour()))
        });

    let analytics = warp::path!("api" / "analytics")
        .and(warp::get())
        .and(with_state(state))
        .map(|state: Arc<BackendState>| warp::reply::json(&state.generator.analytics()));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["content-type"]);

    health
        .or(detect)
        .or(recent)
        .or(stored)
        .or(zones)
        .or(forecast)
        .or(congestion)
        .or(analytics)
        .with(cors)
        .recover(handle_rejection)
        .with(warp::log("parksim"))
}

async fn handle_detect(
    form: FormData,
    state: Arc<BackendState>,
) -> Result<warp::reply::Response, Rejection> {
    if !state.detector.is_loaded() {
        return Ok(error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            &DetectorError::ModelNotLoaded.to_string(),
        )
        .into_response());
    }

    let upload = read_image_part(form)
        .await
        .map_err(|err| warp::reject::custom(MalformedUpload(err.to_string())))?;
    let Some((media_type, bytes)) = upload else {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            &DetectorError::EmptyImage.to_string(),
        )
        .into_response());
    };

    match state.detector.detect(&bytes) {
        Ok(result) => {
            let (id, stored) = {
                let mut history = state.history.write().unwrap_or_else(PoisonError::into_inner);
                (history.push(media_type, bytes), history.len())
            };
            log::info!(
                "detection #{}: {} free / {} occupied ({} stored)",
                id,
                result.free_count,
                result.occupied_count,
                stored
            );
            Ok(warp::reply::json(&DetectResponse {
                success: true,
                error: None,
                result: Some(result),
            })
            .into_response())
        }
        Err(err) => {
            log::warn!("detection refused: {}", err);
            Ok(error_reply(StatusCode::BAD_REQUEST, &err.to_string()).into_response())
        }
    }
}

/// Pulls the `image` field out of a multipart body.
async fn read_image_part(form: FormData) -> Result<Option<(String, Vec<u8>)>, warp::Error> {
    let mut form = Box::pin(form);
    while let Some(part) = form.try_next().await? {
        if part.name() != "image" {
            continue;
        }
        let media_type = part
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = collect_part(part).await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some((media_type, bytes)));
    }
    Ok(None)
}

async fn collect_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    let mut data = Vec::new();
    let mut stream = Box::pin(part.stream());
    while let Some(chunk) = stream.try_next().await? {
        data.put(chunk);
    }
    Ok(data)
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "File too large".to_string())
    } else if let Some(MalformedUpload(reason)) = err.find::<MalformedUpload>() {
        (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", reason))
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        log::error!("unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };
    Ok(error_reply(status, &message))
}

/// Binds the backend and serves until `shutdown` resolves.
pub async fn serve(
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(BackendState::new(config));
    let filter = routes(state, config.max_upload_bytes);
    let (addr, server): (SocketAddr, _) = warp::serve(filter)
        .try_bind_with_graceful_shutdown(config.bind, shutdown)
        .with_context(|| format!("binding mock backend to {}", config.bind))?;
    log::info!(
        "ParkSight mock backend listening on http://{} (model loaded: {})",
        addr,
        config.model_loaded
    );
    server.await;
    log::info!("mock backend stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkcore::api::{CongestionSummary, ImageUpload};
    use parkcore::controllers::{FetchOutcome, GallerySource};
    use parkcore::{ClientConfig, Dashboard, DashboardError};

    fn test_config() -> ServerConfig {
        ServerConfig {
            fixed_hour: Some(18),
            ..ServerConfig::default()
        }
    }

    fn filter(
        config: &ServerConfig,
    ) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        routes(Arc::new(BackendState::new(config)), config.max_upload_bytes)
    }

    fn spawn_backend(config: &ServerConfig) -> SocketAddr {
        let (addr, server) = warp::serve(filter(config)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn dashboard(addr: SocketAddr) -> Dashboard<parkcore::HttpApi> {
        Dashboard::connect(ClientConfig::with_base_url(format!("http://{}", addr))).unwrap()
    }

    #[tokio::test]
    async fn health_reports_model_state() {
        let config = ServerConfig {
            model_loaded: false,
            ..test_config()
        };
        let response = warp::test::request()
            .method("GET")
            .path("/api/health")
            .reply(&filter(&config))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["model_loaded"], json!(false));
    }

    #[tokio::test]
    async fn unknown_zone_forecast_is_not_found() {
        let response = warp::test::request()
            .path("/api/zones/99/forecast?hours=4")
            .reply(&filter(&test_config()))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body.error.as_deref(), Some("Zone not found"));
    }

    #[tokio::test]
    async fn forecast_defaults_to_six_hours() {
        let response = warp::test::request()
            .path("/api/zones/3/forecast")
            .reply(&filter(&test_config()))
            .await;
        let body: ForecastResponse = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body.zone_id, Some(3));
        assert_eq!(body.forecast.len(), 6);
        assert_eq!(body.forecast[0].time, "18:00");
    }

    #[tokio::test]
    async fn congestion_summary_decodes_on_client_side() {
        let response = warp::test::request()
            .path("/api/traffic/congestion")
            .reply(&filter(&test_config()))
            .await;
        let summary: CongestionSummary = serde_json::from_slice(response.body()).unwrap();
        assert!(summary.total_traffic_flow > 0);
    }

    #[tokio::test]
    async fn unknown_route_replies_with_json_error() {
        let response = warp::test::request()
            .path("/api/nowhere")
            .reply(&filter(&test_config()))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body.success, Some(false));
    }

    #[tokio::test]
    async fn detection_feeds_the_gallery() {
        let addr = spawn_backend(&test_config());
        let dashboard = dashboard(addr);

        let upload = ImageUpload::new("lot.png", "image/png", vec![7u8; 2048]);
        let summary = dashboard.upload.submit(upload).await.unwrap();
        assert_eq!(summary.available + summary.occupied, 12);
        assert_eq!(summary.slots.len(), 12);
        assert!(summary.has_annotated_image);

        let gallery = dashboard.gallery().snapshot();
        assert_eq!(gallery.source(), GallerySource::Remote);
        assert_eq!(gallery.current(), format!("http://{}/detections/1", addr));
    }

    #[tokio::test]
    async fn unloaded_model_message_reaches_the_dashboard() {
        let addr = spawn_backend(&ServerConfig {
            model_loaded: false,
            ..test_config()
        });
        let dashboard = dashboard(addr);

        let upload = ImageUpload::new("lot.jpg", "image/jpeg", vec![1u8; 64]);
        let err = dashboard.upload.submit(upload).await.unwrap_err();
        assert_eq!(err, DashboardError::DetectionFailed("Model not loaded".into()));
        assert_eq!(
            dashboard.upload.snapshot().error.as_deref(),
            Some("Model not loaded")
        );
        assert_eq!(dashboard.gallery().snapshot().source(), GallerySource::Placeholder);
    }

    #[tokio::test]
    async fn traffic_refresh_selects_first_zone() {
        let addr = spawn_backend(&test_config());
        let dashboard = dashboard(addr);

        let report = dashboard.traffic.refresh().await;
        assert_eq!(report.zones, FetchOutcome::Applied);
        assert_eq!(report.congestion, FetchOutcome::Applied);
        assert_eq!(report.analytics, FetchOutcome::Applied);
        assert_eq!(report.forecast, Some(FetchOutcome::Applied));

        let state = dashboard.traffic.snapshot();
        assert_eq!(state.zones.len(), 8);
        assert_eq!(state.selected_zone, Some(1));
        assert_eq!(state.forecast.len(), 12);
        assert_eq!(state.analytics.total_capacity, 1350);
    }
}
