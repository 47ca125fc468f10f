//! Client-side controllers for the ParkSight parking dashboard.
//!
//! The crate wraps the remote detection and analytics service behind the
//! [`DashboardApi`] trait and drives three view-facing controllers: image
//! upload and detection, the recent-detections gallery, and the polling
//! Traffic view.

pub mod api;
pub mod config;
pub mod controllers;
pub mod math;
pub mod prelude;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, DashboardApi, HttpApi};
pub use config::{ClientConfig, ConfigError};
pub use prelude::{DashboardError, DashboardResult};

use std::sync::Arc;

/// The three controllers wired to one shared API client and configuration.
pub struct Dashboard<A: DashboardApi> {
    pub upload: controllers::UploadController<A>,
    pub traffic: controllers::TrafficController<A>,
}

impl<A: DashboardApi> Clone for Dashboard<A> {
    fn clone(&self) -> Self {
        Self {
            upload: self.upload.clone(),
            traffic: self.traffic.clone(),
        }
    }
}

impl<A: DashboardApi> Dashboard<A> {
    pub fn new(api: A, config: ClientConfig) -> Self {
        let api = Arc::new(api);
        let config = Arc::new(config);
        let gallery = controllers::GalleryController::new(api.clone(), config.clone());
        Self {
            upload: controllers::UploadController::new(api.clone(), gallery, config.clone()),
            traffic: controllers::TrafficController::new(api, config),
        }
    }

    pub fn gallery(&self) -> &controllers::GalleryController<A> {
        self.upload.gallery()
    }
}

impl Dashboard<HttpApi> {
    /// Builds the reqwest-backed dashboard for `config`.
    pub fn connect(config: ClientConfig) -> Result<Self, ApiError> {
        let api = HttpApi::new(&config)?;
        Ok(Self::new(api, config))
    }
}
