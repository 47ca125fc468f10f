pub struct StatsHelper;

impl StatsHelper {
    pub fn max(samples: &[f32]) -> Option<f32> {
        samples
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |best, v| match best {
                Some(current) if current >= v => Some(current),
                _ => Some(v),
            })
    }

    pub fn mean(samples: &[f32]) -> Option<f32> {
        let (sum, count) = samples
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0f32, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            return None;
        }
        Some(sum / count as f32)
    }
}
