use base64::Engine;
use parkcore::api::DetectionResult;
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("No image provided")]
    EmptyImage,
}

/// Stand-in for the occupancy model: a deterministic grid derived from the
/// image bytes, so the same upload always yields the same answer.
#[derive(Debug, Clone)]
pub struct FakeDetector {
    slot_count: usize,
    model_loaded: bool,
}

impl FakeDetector {
    pub fn new(slot_count: usize, model_loaded: bool) -> Self {
        Self {
            slot_count: slot_count.max(1),
            model_loaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model_loaded
    }

    pub fn detect(&self, image: &[u8]) -> Result<DetectionResult, DetectorError> {
        if !self.model_loaded {
            return Err(DetectorError::ModelNotLoaded);
        }
        if image.is_empty() {
            return Err(DetectorError::EmptyImage);
        }

        let mut rng = StdRng::seed_from_u64(fingerprint(image));
        let per_spot: Vec<bool> = (0..self.slot_count).map(|_| rng.gen_bool(0.4)).collect();
        let confidence: Vec<f32> = (0..self.slot_count)
            .map(|_| (rng.gen_range(0.80f32..0.99) * 100.0).round() / 100.0)
            .collect();
        let occupied = per_spot.iter().filter(|&&taken| taken).count() as u32;

        Ok(DetectionResult {
            free_count: self.slot_count as u32 - occupied,
            occupied_count: occupied,
            per_spot,
            confidence,
            annotated_image: Some(base64::engine::general_purpose::STANDARD.encode(image)),
        })
    }
}

/// FNV-1a over the image bytes.
fn fingerprint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_image_gives_same_grid() {
        let detector = FakeDetector::new(8, true);
        let first = detector.detect(b"lot-a").unwrap();
        let second = detector.detect(b"lot-a").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.per_spot.len(), 8);
        assert!(first.is_consistent());
    }

    #[test]
    fn confidences_stay_in_range() {
        let detector = FakeDetector::new(41, true);
        let result = detector.detect(&[3u8; 512]).unwrap();
        assert!(result
            .confidence
            .iter()
            .all(|&value| (0.8..=0.99).contains(&value)));
    }

    #[test]
    fn unloaded_model_refuses() {
        let detector = FakeDetector::new(8, false);
        assert_eq!(detector.detect(b"x"), Err(DetectorError::ModelNotLoaded));
        assert_eq!(DetectorError::ModelNotLoaded.to_string(), "Model not loaded");
    }

    #[test]
    fn empty_image_is_rejected() {
        let detector = FakeDetector::new(8, true);
        assert_eq!(detector.detect(&[]), Err(DetectorError::EmptyImage));
    }
}
