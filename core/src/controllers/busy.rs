use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared in-flight marker; at most one guard exists at a time.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    inner: Arc<AtomicBool>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the flag busy, or returns `None` if it already is.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.inner
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                inner: self.inner.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

/// Clears the flag when dropped, whatever path the holder exits through.
#[derive(Debug)]
pub struct BusyGuard {
    inner: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.inner.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let flag = BusyFlag::new();
        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_busy());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn guard_releases_on_unwind() {
        let flag = BusyFlag::new();
        let cloned = flag.clone();
        let outcome = std::panic::catch_unwind(move || {
            let _guard = cloned.try_acquire().unwrap();
            panic!("detector exploded");
        });
        assert!(outcome.is_err());
        assert!(!flag.is_busy());
    }
}
