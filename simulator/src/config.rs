use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub seed: u64,
    pub slot_count: usize,
    pub model_loaded: bool,
    pub history_len: usize,
    pub max_upload_bytes: u64,
    /// Pins the simulated clock hour; the wall clock is used when unset.
    pub fixed_hour: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5001)),
            seed: 7,
            slot_count: 12,
            model_loaded: true,
            history_len: 9,
            max_upload_bytes: 16 * 1024 * 1024,
            fixed_hour: None,
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading server config {}", path_ref.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing server config {}", path_ref.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.slot_count == 0 {
            anyhow::bail!("slot_count must be positive");
        }
        if self.history_len == 0 {
            anyhow::bail!("history_len must be positive");
        }
        if let Some(hour) = self.fixed_hour {
            if hour > 23 {
                anyhow::bail!("fixed_hour must be within 0..=23, got {}", hour);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_listen_on_dashboard_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind.port(), 5001);
        assert!(cfg.model_loaded);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"bind: 0.0.0.0:8080\nslot_count: 41\nmodel_loaded: false\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = ServerConfig::load(&path).unwrap();
        assert_eq!(cfg.slot_count, 41);
        assert!(!cfg.model_loaded);
        assert_eq!(cfg.history_len, 9);
    }

    #[test]
    fn out_of_range_hour_is_rejected() {
        let cfg = ServerConfig {
            fixed_hour: Some(24),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
