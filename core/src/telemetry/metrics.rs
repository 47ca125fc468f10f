use std::sync::Mutex;

/// Request counters kept per controller.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub requests: usize,
    pub failures: usize,
    pub discarded: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_request(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.requests += 1;
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failures += 1;
        }
    }

    /// Counts a response dropped because a newer request superseded it.
    pub fn record_discarded(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.discarded += 1;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            Metrics::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let recorder = MetricsRecorder::new();
        recorder.record_request();
        recorder.record_request();
        recorder.record_failure();
        recorder.record_discarded();
        assert_eq!(
            recorder.snapshot(),
            Metrics {
                requests: 2,
                failures: 1,
                discarded: 1
            }
        );
    }
}
