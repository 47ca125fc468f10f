use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::api::ConfidencePolicy;

pub const API_BASE_ENV: &str = "PARKSIGHT_API_BASE";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "/placeholder-detection.png";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime settings shared by every controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub refresh_interval_secs: u64,
    pub auto_refresh: bool,
    pub forecast_hours: u32,
    pub max_upload_bytes: u64,
    pub placeholder_image: String,
    pub confidence_policy: ConfidencePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".into(),
            request_timeout_secs: 10,
            refresh_interval_secs: 30,
            auto_refresh: true,
            forecast_hours: 12,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.into(),
            confidence_policy: ConfidencePolicy::Max,
        }
    }
}

impl ClientConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Applies the `PARKSIGHT_API_BASE` override when present.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                self.base_url = base.trim().to_string();
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url {}: {}", self.base_url, e)))?;
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs must be positive".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.placeholder_image.trim().is_empty() {
            return Err(ConfigError::Invalid("placeholder_image is empty".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Turns a server-relative media path into a fully-qualified URL.
    pub fn resolve_media_url(&self, path: &str) -> String {
        if Url::parse(path).is_ok() {
            path.to_string()
        } else {
            self.endpoint(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_dashboard_behaviour() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(30));
        assert_eq!(cfg.forecast_hours, 12);
        assert_eq!(cfg.max_upload_bytes, 10_485_760);
        assert_eq!(cfg.confidence_policy, ConfidencePolicy::Max);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"base_url: http://10.0.0.2:5000\nrefresh_interval_secs: 5\nconfidence_policy: mean\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = ClientConfig::load(&path).unwrap();
        assert_eq!(cfg.base_url, "http://10.0.0.2:5000");
        assert_eq!(cfg.refresh_interval_secs, 5);
        assert_eq!(cfg.confidence_policy, ConfidencePolicy::Mean);
        assert_eq!(cfg.forecast_hours, 12);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ClientConfig::from_yaml("base_url: not a url\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(ClientConfig::from_yaml("refresh_interval_secs: 0\n").is_err());
    }

    #[test]
    fn media_urls_resolve_against_base() {
        let cfg = ClientConfig::with_base_url("http://localhost:5001/");
        assert_eq!(
            cfg.resolve_media_url("/detections/3"),
            "http://localhost:5001/detections/3"
        );
        assert_eq!(
            cfg.resolve_media_url("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(cfg.endpoint("api/zones"), "http://localhost:5001/api/zones");
    }
}
