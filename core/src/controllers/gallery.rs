use std::sync::{Arc, Mutex, PoisonError};

use crate::api::DashboardApi;
use crate::config::ClientConfig;
use crate::controllers::generation::Generation;
use crate::telemetry::{LogManager, Metrics, MetricsRecorder};

/// Where the currently displayed gallery came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GallerySource {
    Placeholder,
    Remote,
}

/// Carousel over recent detection images. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryState {
    images: Vec<String>,
    cursor: usize,
    source: GallerySource,
}

impl GalleryState {
    pub fn placeholder(url: String) -> Self {
        Self {
            images: vec![url],
            cursor: 0,
            source: GallerySource::Placeholder,
        }
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn source(&self) -> GallerySource {
        self.source
    }

    pub fn current(&self) -> &str {
        &self.images[self.cursor]
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn next(&mut self) -> usize {
        self.cursor = (self.cursor + 1) % self.images.len();
        self.cursor
    }

    pub fn previous(&mut self) -> usize {
        self.cursor = if self.cursor == 0 {
            self.images.len() - 1
        } else {
            self.cursor - 1
        };
        self.cursor
    }

    /// Jumps to `index`; out-of-range indicators are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.images.len() {
            self.cursor = index;
            true
        } else {
            false
        }
    }

    fn replace(&mut self, images: Vec<String>) {
        self.images = images;
        self.cursor = 0;
        self.source = GallerySource::Remote;
    }
}

/// Keeps the recent-detections carousel in sync with the server.
pub struct GalleryController<A: DashboardApi> {
    api: Arc<A>,
    config: Arc<ClientConfig>,
    state: Arc<Mutex<GalleryState>>,
    generation: Arc<Generation>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<A: DashboardApi> Clone for GalleryController<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
            generation: self.generation.clone(),
            metrics: self.metrics.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<A: DashboardApi> GalleryController<A> {
    pub fn new(api: Arc<A>, config: Arc<ClientConfig>) -> Self {
        let state = GalleryState::placeholder(config.resolve_media_url(&config.placeholder_image));
        Self {
            api,
            config,
            state: Arc::new(Mutex::new(state)),
            generation: Arc::new(Generation::new()),
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new("gallery"),
        }
    }

    /// Fetches recent detections, falling back to the placeholder on empty
    /// lists or failures. Never surfaces an error.
    pub async fn refresh(&self) -> GallerySource {
        let generation = self.generation.next();
        self.metrics.record_request();

        let images = match self.api.recent_detections().await {
            Ok(images) if !images.is_empty() => Some(
                images
                    .iter()
                    .map(|image| self.config.resolve_media_url(&image.url))
                    .collect::<Vec<_>>(),
            ),
            Ok(_) => {
                self.logger
                    .record("no recent detections, showing placeholder");
                None
            }
            Err(err) => {
                self.metrics.record_failure();
                self.logger
                    .warn(&format!("recent detections fetch failed: {}", err));
                None
            }
        };

        if !self.generation.is_latest(generation) {
            self.metrics.record_discarded();
            self.logger
                .trace(&format!("dropping superseded gallery refresh #{}", generation));
            return self.snapshot().source();
        }

        let placeholder = self.config.resolve_media_url(&self.config.placeholder_image);
        self.with_state(|state| {
            match images {
                Some(urls) => state.replace(urls),
                None => *state = GalleryState::placeholder(placeholder),
            }
            state.source()
        })
    }

    pub fn next(&self) -> usize {
        self.with_state(GalleryState::next)
    }

    pub fn previous(&self) -> usize {
        self.with_state(GalleryState::previous)
    }

    pub fn select(&self, index: usize) -> bool {
        self.with_state(|state| state.select(index))
    }

    pub fn snapshot(&self) -> GalleryState {
        self.with_state(|state| state.clone())
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut GalleryState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, GalleryImage};
    use crate::testing::FakeApi;

    fn controller(api: &Arc<FakeApi>) -> GalleryController<FakeApi> {
        let config = ClientConfig::with_base_url("http://lot.local:5001");
        GalleryController::new(api.clone(), Arc::new(config))
    }

    fn images(urls: &[&str]) -> Vec<GalleryImage> {
        urls.iter()
            .map(|url| GalleryImage {
                url: url.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn refresh_replaces_list_and_resets_cursor() {
        let api = Arc::new(FakeApi::new());
        api.push_recent(Ok(images(&["/detections/2", "/detections/1"])));
        api.push_recent(Ok(images(&[
            "/detections/3",
            "https://cdn.example.com/2.png",
            "/detections/1",
        ])));
        let gallery = controller(&api);

        assert_eq!(gallery.refresh().await, GallerySource::Remote);
        gallery.next();
        assert_eq!(gallery.snapshot().cursor(), 1);

        gallery.refresh().await;
        let state = gallery.snapshot();
        assert_eq!(state.cursor(), 0);
        assert_eq!(
            state.images(),
            &[
                "http://lot.local:5001/detections/3".to_string(),
                "https://cdn.example.com/2.png".to_string(),
                "http://lot.local:5001/detections/1".to_string(),
            ]
        );
        assert_eq!(api.calls().recent, 2);
    }

    #[tokio::test]
    async fn empty_list_falls_back_to_single_placeholder() {
        let api = Arc::new(FakeApi::new());
        api.push_recent(Ok(images(&["/detections/1", "/detections/0"])));
        api.push_recent(Ok(Vec::new()));
        let gallery = controller(&api);
        gallery.refresh().await;

        assert_eq!(gallery.refresh().await, GallerySource::Placeholder);
        let state = gallery.snapshot();
        assert_eq!(state.len(), 1);
        assert_eq!(state.current(), "http://lot.local:5001/placeholder-detection.png");
    }

    #[tokio::test]
    async fn failed_fetch_is_swallowed() {
        let api = Arc::new(FakeApi::new());
        api.push_recent(Err(ApiError::Transport("connection refused".into())));
        let gallery = controller(&api);

        assert_eq!(gallery.refresh().await, GallerySource::Placeholder);
        assert_eq!(gallery.snapshot().len(), 1);
        assert_eq!(gallery.metrics().failures, 1);
    }

    #[test]
    fn carousel_wraps_in_both_directions() {
        let mut state = GalleryState::placeholder("p".into());
        state.replace(vec!["a".into(), "b".into(), "c".into()]);

        assert_eq!(state.previous(), 2);
        assert_eq!(state.next(), 0);
        state.select(2);
        assert_eq!(state.next(), 0);
        assert_eq!(state.current(), "a");
    }

    #[test]
    fn indicator_selection_ignores_out_of_range() {
        let mut state = GalleryState::placeholder("p".into());
        state.replace(vec!["a".into(), "b".into()]);
        assert!(state.select(1));
        assert!(!state.select(5));
        assert_eq!(state.cursor(), 1);
    }

    #[test]
    fn single_image_carousel_stays_put() {
        let mut state = GalleryState::placeholder("p".into());
        assert_eq!(state.next(), 0);
        assert_eq!(state.previous(), 0);
    }
}
