use chrono::Timelike;
use parkcore::api::{
    Analytics, Congestion, CongestionCounts, CongestionLevel, CongestionSummary, ForecastPoint,
    HourlyTrend, WeeklyForecast, Zone, ZoneId,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Mutex;

/// Static description of a monitored parking zone.
#[derive(Debug, Clone, Copy)]
pub struct ZoneProfile {
    pub id: ZoneId,
    pub name: &'static str,
    pub total_slots: u32,
    pub base_occupancy: f32,
    pub peak_hour: &'static str,
}

pub const ZONES: [ZoneProfile; 8] = [
    ZoneProfile {
        id: 1,
        name: "Downtown",
        total_slots: 150,
        base_occupancy: 0.80,
        peak_hour: "18:00",
    },
    ZoneProfile {
        id: 2,
        name: "Business District",
        total_slots: 200,
        base_occupancy: 0.75,
        peak_hour: "09:00",
    },
    ZoneProfile {
        id: 3,
        name: "Shopping Mall",
        total_slots: 180,
        base_occupancy: 0.65,
        peak_hour: "14:00",
    },
    ZoneProfile {
        id: 4,
        name: "Residential Area",
        total_slots: 120,
        base_occupancy: 0.45,
        peak_hour: "19:00",
    },
    ZoneProfile {
        id: 5,
        name: "Airport",
        total_slots: 300,
        base_occupancy: 0.70,
        peak_hour: "08:00",
    },
    ZoneProfile {
        id: 6,
        name: "University",
        total_slots: 160,
        base_occupancy: 0.60,
        peak_hour: "10:00",
    },
    ZoneProfile {
        id: 7,
        name: "Hospital",
        total_slots: 100,
        base_occupancy: 0.85,
        peak_hour: "11:00",
    },
    ZoneProfile {
        id: 8,
        name: "Entertainment",
        total_slots: 140,
        base_occupancy: 0.55,
        peak_hour: "20:00",
    },
];

const OCCUPANCY_CAP: f32 = 0.95;
const WEEK_DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Occupancy multiplier for the live snapshot at `hour`.
pub fn time_factor(hour: u32) -> f32 {
    match hour {
        6..=8 => 1.3,
        9..=11 => 1.1,
        12..=13 => 1.2,
        14..=16 => 1.0,
        17..=19 => 1.4,
        20..=22 => 0.8,
        _ => 0.4,
    }
}

/// Occupancy multiplier used for forecasts and daily trends.
pub fn demand_factor(hour: u32) -> f32 {
    match hour {
        6..=8 | 17..=19 => 1.3,
        9..=16 => 1.0,
        20..=22 => 0.7,
        _ => 0.3,
    }
}

pub fn congestion_for(rate: f32) -> Congestion {
    let level = CongestionLevel::from_occupancy(rate);
    let (color, score) = match level {
        CongestionLevel::Critical => ("red", 95),
        CongestionLevel::High => ("orange", 80),
        CongestionLevel::Moderate => ("yellow", 60),
        CongestionLevel::Low => ("green", 35),
        _ => ("blue", 15),
    };
    Congestion {
        level,
        color: Some(color.into()),
        score: Some(score),
    }
}

/// Hour of day on the local clock.
pub fn current_hour() -> u32 {
    chrono::Local::now().hour()
}

fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Synthetic zone occupancy, congestion and demand data.
pub struct ParkingDataGenerator {
    rng: Mutex<StdRng>,
}

impl ParkingDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn jitter(&self, low: f32, high: f32) -> f32 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(low..high),
            Err(_) => 1.0,
        }
    }

    pub fn total_capacity(&self) -> u32 {
        ZONES.iter().map(|zone| zone.total_slots).sum()
    }

    pub fn zone_data(&self, hour: u32) -> Vec<Zone> {
        let factor = time_factor(hour);
        ZONES
            .iter()
            .map(|profile| {
                let rate =
                    (profile.base_occupancy * factor * self.jitter(0.9, 1.1)).min(OCCUPANCY_CAP);
                let occupied = (profile.total_slots as f32 * rate) as u32;
                let traffic_flow = (profile.total_slots as f32 * self.jitter(0.5, 1.5)) as u32;
                Zone {
                    id: profile.id,
                    name: profile.name.into(),
                    occupancy_rate: round1(rate * 100.0),
                    congestion: congestion_for(rate),
                    available_slots: profile.total_slots - occupied,
                    avg_wait_time: (rate * rate * 30.0) as u32,
                    peak_hour: profile.peak_hour.into(),
                    total_slots: profile.total_slots,
                    occupied_slots: occupied,
                    traffic_flow,
                }
            })
            .collect()
    }

    /// Hour-by-hour demand for one zone, or `None` for an unknown zone.
    pub fn forecast(
        &self,
        zone_id: ZoneId,
        hours: u32,
        start_hour: u32,
    ) -> Option<Vec<ForecastPoint>> {
        let profile = ZONES.iter().find(|zone| zone.id == zone_id)?;
        let points = (0..hours)
            .map(|offset| {
                let hour = (start_hour + offset) % 24;
                let rate = (profile.base_occupancy * demand_factor(hour) * self.jitter(0.95, 1.05))
                    .min(OCCUPANCY_CAP);
                ForecastPoint {
                    time: format!("{:02}:00", hour),
                    demand: (profile.total_slots as f32 * rate) as u32,
                    hour: Some(hour),
                    occupancy_rate: Some(round1(rate * 100.0)),
                    confidence: Some(round1(self.jitter(85.0, 98.0))),
                }
            })
            .collect();
        Some(points)
    }

    pub fn hourly_trends(&self) -> Vec<HourlyTrend> {
        let capacity = self.total_capacity();
        (0..24)
            .map(|hour| {
                let demand: u32 = ZONES
                    .iter()
                    .map(|zone| {
                        let rate = (zone.base_occupancy * demand_factor(hour)).min(OCCUPANCY_CAP);
                        (zone.total_slots as f32 * rate) as u32
                    })
                    .sum();
                HourlyTrend {
                    time: format!("{:02}:00", hour),
                    hour,
                    total_demand: demand,
                    total_capacity: capacity,
                    avg_occupancy: round1(demand as f32 / capacity as f32 * 100.0),
                }
            })
            .collect()
    }

    pub fn weekly_forecast(&self) -> Vec<WeeklyForecast> {
        let capacity = self.total_capacity() as f32;
        WEEK_DAYS
            .iter()
            .enumerate()
            .map(|(index, day)| {
                let weekend = if index >= 5 { 0.6 } else { 1.0 };
                let avg_demand = (capacity * 0.65 * weekend * self.jitter(0.9, 1.1)) as u32;
                let peak_demand = (capacity * 0.85 * weekend * self.jitter(0.9, 1.1)) as u32;
                WeeklyForecast {
                    day: (*day).into(),
                    avg_demand,
                    peak_demand,
                    occupancy_rate: round1(avg_demand as f32 / capacity * 100.0),
                }
            })
            .collect()
    }

    pub fn analytics(&self) -> Analytics {
        Analytics {
            hourly_trends: self.hourly_trends(),
            weekly_forecast: self.weekly_forecast(),
            total_capacity: self.total_capacity(),
            total_zones: ZONES.len() as u32,
        }
    }

    pub fn congestion_summary(&self, hour: u32) -> CongestionSummary {
        let zones = self.zone_data(hour);
        let counts = CongestionCounts::tally(zones.iter().map(|zone| &zone.congestion.level));
        let wait_total: u32 = zones.iter().map(|zone| zone.avg_wait_time).sum();
        CongestionSummary {
            overall_congestion: counts,
            avg_wait_time: round1(wait_total as f32 / zones.len() as f32),
            total_traffic_flow: zones.iter().map(|zone| zone.traffic_flow as u64).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_snapshot_covers_every_zone() {
        let generator = ParkingDataGenerator::new(7);
        let zones = generator.zone_data(18);
        assert_eq!(zones.len(), 8);
        for zone in &zones {
            assert!(zone.occupancy_rate <= 95.0);
            assert_eq!(zone.available_slots + zone.occupied_slots, zone.total_slots);
        }
        assert_eq!(zones[0].peak_hour, "18:00");
    }

    #[test]
    fn evening_rush_saturates_hospital() {
        let generator = ParkingDataGenerator::new(1);
        let hospital = generator
            .zone_data(18)
            .into_iter()
            .find(|zone| zone.id == 7)
            .unwrap();
        assert_eq!(hospital.occupancy_rate, 95.0);
        assert_eq!(hospital.congestion.level, CongestionLevel::Critical);
        assert_eq!(hospital.congestion.score, Some(95));
    }

    #[test]
    fn forecast_wraps_around_midnight() {
        let generator = ParkingDataGenerator::new(3);
        let forecast = generator.forecast(2, 12, 20).unwrap();
        assert_eq!(forecast.len(), 12);
        assert_eq!(forecast[0].time, "20:00");
        assert_eq!(forecast[4].time, "00:00");
        assert!(generator.forecast(42, 6, 0).is_none());
    }

    #[test]
    fn hourly_trends_share_capacity() {
        let generator = ParkingDataGenerator::new(3);
        let trends = generator.hourly_trends();
        assert_eq!(trends.len(), 24);
        assert!(trends.iter().all(|trend| trend.total_capacity == 1350));
        assert!(trends[18].total_demand > trends[3].total_demand);
    }

    #[test]
    fn weekends_see_lower_demand() {
        let generator = ParkingDataGenerator::new(11);
        let week = generator.weekly_forecast();
        assert_eq!(week.len(), 7);
        assert!(week[6].avg_demand < week[0].avg_demand);
    }

    #[test]
    fn congestion_summary_counts_all_zones() {
        let generator = ParkingDataGenerator::new(5);
        let summary = generator.congestion_summary(12);
        let counts = summary.overall_congestion;
        assert_eq!(
            counts.critical + counts.high + counts.moderate + counts.low + counts.minimal,
            8
        );
        assert!(summary.total_traffic_flow > 0);
    }

    #[test]
    fn current_hour_is_a_clock_hour() {
        assert!(current_hour() < 24);
    }

    #[test]
    fn factors_follow_daily_pattern() {
        assert_eq!(time_factor(7), 1.3);
        assert_eq!(time_factor(18), 1.4);
        assert_eq!(time_factor(2), 0.4);
        assert_eq!(demand_factor(12), 1.0);
        assert_eq!(demand_factor(23), 0.3);
    }
}
