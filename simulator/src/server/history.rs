use std::collections::VecDeque;

/// Annotated image kept for the recent-detections gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDetection {
    pub id: u64,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Bounded store of annotated images, newest first.
#[derive(Debug)]
pub struct DetectionHistory {
    capacity: usize,
    next_id: u64,
    entries: VecDeque<StoredDetection>,
}

impl DetectionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            next_id: 1,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, media_type: impl Into<String>, bytes: Vec<u8>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_front(StoredDetection {
            id,
            media_type: media_type.into(),
            bytes,
        });
        self.entries.truncate(self.capacity);
        id
    }

    pub fn get(&self, id: u64) -> Option<&StoredDetection> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Relative URLs the gallery resolves against the service base.
    pub fn recent_urls(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| format!("/detections/{}", entry.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_detection_comes_first() {
        let mut history = DetectionHistory::new(3);
        history.push("image/png", vec![1]);
        history.push("image/png", vec![2]);
        assert_eq!(history.recent_urls(), vec!["/detections/2", "/detections/1"]);
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let mut history = DetectionHistory::new(2);
        for byte in 0..4u8 {
            history.push("image/jpeg", vec![byte]);
        }
        assert_eq!(history.len(), 2);
        assert!(history.get(1).is_none());
        assert_eq!(history.get(4).map(|entry| entry.bytes.clone()), Some(vec![3]));
    }

    #[test]
    fn empty_history_has_no_urls() {
        let history = DetectionHistory::new(5);
        assert!(history.is_empty());
        assert!(history.recent_urls().is_empty());
    }
}
