use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::api::upload::describe_path;
use crate::api::{DashboardApi, DetectionResult, DetectionSummary, ImagePreview, ImageUpload};
use crate::config::ClientConfig;
use crate::controllers::busy::BusyFlag;
use crate::controllers::gallery::GalleryController;
use crate::prelude::{DashboardError, DashboardResult};
use crate::telemetry::{LogManager, Metrics, MetricsRecorder};

/// What the upload widget renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    pub preview: Option<ImagePreview>,
    pub result: Option<DetectionResult>,
    pub summary: Option<DetectionSummary>,
    pub error: Option<String>,
    pub busy: bool,
}

/// Validates a selected image, submits it for detection, and binds the result.
pub struct UploadController<A: DashboardApi> {
    api: Arc<A>,
    gallery: GalleryController<A>,
    config: Arc<ClientConfig>,
    state: Arc<Mutex<UploadState>>,
    busy: BusyFlag,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<A: DashboardApi> Clone for UploadController<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            gallery: self.gallery.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
            busy: self.busy.clone(),
            metrics: self.metrics.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<A: DashboardApi> UploadController<A> {
    pub fn new(api: Arc<A>, gallery: GalleryController<A>, config: Arc<ClientConfig>) -> Self {
        Self {
            api,
            gallery,
            config,
            state: Arc::new(Mutex::new(UploadState::default())),
            busy: BusyFlag::new(),
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new("upload"),
        }
    }

    /// Local checks run before anything touches the network.
    pub fn validate(&self, upload: &ImageUpload) -> DashboardResult<()> {
        self.check(&upload.media_type, upload.size())
    }

    fn check(&self, media_type: &str, size: u64) -> DashboardResult<()> {
        if !media_type.starts_with("image/") {
            return Err(DashboardError::InvalidFileType(media_type.to_string()));
        }
        if size > self.config.max_upload_bytes {
            return Err(DashboardError::FileTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Submits a file from disk. Type and size are checked against the file
    /// metadata so an oversized file is never read into memory.
    pub async fn submit_path(&self, path: impl AsRef<Path>) -> DashboardResult<DetectionSummary> {
        if self.busy.is_busy() {
            return Err(DashboardError::Busy);
        }
        let path = path.as_ref();
        let (file_name, media_type) = describe_path(path);

        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                let err = DashboardError::Unreadable(format!("{}: {}", file_name, err));
                return Err(self.reject(&file_name, err));
            }
        };
        if let Err(err) = self.check(media_type, size) {
            return Err(self.reject(&file_name, err));
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let err = DashboardError::Unreadable(format!("{}: {}", file_name, err));
                return Err(self.reject(&file_name, err));
            }
        };
        self.submit(ImageUpload::new(file_name, media_type, bytes)).await
    }

    /// Runs one upload → detect → gallery refresh cycle.
    ///
    /// Exactly one detection request is made for a valid file, and the
    /// gallery is refreshed once only when detection succeeds. The busy flag
    /// is held for the whole cycle and released on every exit path.
    pub async fn submit(&self, upload: ImageUpload) -> DashboardResult<DetectionSummary> {
        let _guard = self.busy.try_acquire().ok_or(DashboardError::Busy)?;

        if let Err(err) = self.validate(&upload) {
            return Err(self.reject(&upload.file_name, err));
        }

        let preview = upload.preview();
        self.with_state(|state| {
            state.error = None;
            state.result = None;
            state.summary = None;
            state.preview = Some(preview);
        });

        let file_name = upload.file_name.clone();
        self.metrics.record_request();
        self.logger
            .record(&format!("submitting {} ({} bytes)", file_name, upload.size()));

        let result = match self.api.detect(upload).await {
            Ok(result) => result,
            Err(err) => {
                self.metrics.record_failure();
                let message = err.to_string();
                self.logger
                    .warn(&format!("detection failed for {}: {}", file_name, message));
                self.with_state(|state| state.error = Some(message.clone()));
                return Err(DashboardError::DetectionFailed(message));
            }
        };

        if !result.is_consistent() {
            self.logger.warn(&format!(
                "inconsistent detection: {} free + {} occupied vs {} spots / {} confidences",
                result.free_count,
                result.occupied_count,
                result.per_spot.len(),
                result.confidence.len()
            ));
        }

        let summary = result.summarize(self.config.confidence_policy);
        self.logger.record(&format!(
            "{}: {} available / {} occupied, accuracy {}",
            file_name,
            summary.available,
            summary.occupied,
            summary.accuracy_label()
        ));
        self.with_state(|state| {
            state.result = Some(result);
            state.summary = Some(summary.clone());
        });

        self.gallery.refresh().await;
        Ok(summary)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn snapshot(&self) -> UploadState {
        let mut state = self.with_state(|state| state.clone());
        state.busy = self.busy.is_busy();
        state
    }

    pub fn gallery(&self) -> &GalleryController<A> {
        &self.gallery
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    fn reject(&self, file_name: &str, err: DashboardError) -> DashboardError {
        self.logger.warn(&format!("rejected {}: {}", file_name, err));
        self.with_state(|state| state.error = Some(err.to_string()));
        err
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut UploadState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}
