use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request tags, issued when a request starts.
#[derive(Debug, Default)]
pub struct Generation {
    issued: AtomicU64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    pub fn is_latest(&self, generation: u64) -> bool {
        self.latest() == generation
    }
}

/// A value together with the generation of the request that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stamped<T> {
    value: T,
    generation: u64,
}

impl<T> Stamped<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            generation: 0,
        }
    }

    /// Stores `value` unless a newer generation has already been applied.
    pub fn apply(&mut self, generation: u64, value: T) -> bool {
        if generation < self.generation {
            return false;
        }
        self.generation = generation;
        self.value = value;
        true
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
