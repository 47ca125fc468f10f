use log::{debug, info, warn};

/// Component-scoped logger used by the controllers.
#[derive(Debug, Clone)]
pub struct LogManager {
    scope: &'static str,
}

impl LogManager {
    pub fn new(scope: &'static str) -> Self {
        Self { scope }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.scope, message);
    }

    pub fn trace(&self, message: &str) {
        debug!("[{}] {}", self.scope, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.scope, message);
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("parkcore")
    }
}
