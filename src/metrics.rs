//! Per-tick metric aggregation and MET-based calorie estimation.
//!
//! The aggregator derives every value from the position history plus
//! elapsed active time; nothing is kept in hidden mutable state. Running
//! maxima (max speed, max heart rate) and the calorie figure are carried
//! through the prior snapshot and never decrease within a session.

use serde::{Deserialize, Serialize};

use crate::history::PositionHistory;
use crate::physio::PhysioSample;
use crate::speed::current_speed_ms;
use crate::ActivityKind;

/// One per-tick view of the session's metrics. All fields are always
/// present; absent signals are `None` or zero, never missing keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Strictly increasing tick counter within the session.
    pub tick: u64,
    /// Whole seconds of active (non-paused) time since start.
    pub duration_secs: u64,
    /// Cumulative distance in kilometers.
    pub distance_km: f64,
    /// Session-average speed in m/s (distance over active time).
    pub avg_speed_ms: f64,
    /// Highest smoothed speed observed so far, m/s. Never decreases.
    pub max_speed_ms: f64,
    /// Current window-smoothed speed in m/s.
    pub current_speed_ms: f64,
    /// Current pace in seconds per km; 0 when speed is 0.
    pub pace_s_per_km: f64,
    /// Session-average pace in seconds per km; 0 when average speed is 0.
    pub avg_pace_s_per_km: f64,
    /// Cumulative elevation gain in meters (descents never subtract).
    pub elevation_gain_m: f64,
    /// Direction of travel in degrees from north, when known.
    pub heading_deg: Option<f64>,
    /// Heart rate estimate in bpm.
    pub heart_rate_bpm: u16,
    /// Highest heart rate observed so far. Never decreases.
    pub max_heart_rate_bpm: u16,
    /// Cadence estimate (steps or crank revolutions per minute).
    pub cadence: Option<u16>,
    /// Power estimate in watts.
    pub power_w: Option<u16>,
    /// Estimated calories burned. Never decreases.
    pub calories: u32,
    /// True when the newest accepted fix is older than the staleness
    /// threshold; distance and speed freeze until a fresh fix arrives.
    pub gps_stale: bool,
    /// True when the physiological signals come from the simulator rather
    /// than a real sensor.
    pub physio_simulated: bool,
}

/// Pace in seconds per kilometer; 0 when speed is 0 (never divides by zero).
pub fn pace_s_per_km(speed_ms: f64) -> f64 {
    if speed_ms > 0.0 {
        1000.0 / speed_ms
    } else {
        0.0
    }
}

// MET bands per activity, keyed by average speed in km/h.
// Empirical compendium values; treat as defaults, not validated constants.
const RUNNING_MET_BANDS: &[(f64, f64)] = &[(8.0, 8.3), (10.0, 9.8), (12.0, 11.0), (14.0, 12.3)];
const RUNNING_MET_TOP: f64 = 14.5;
const CYCLING_MET_BANDS: &[(f64, f64)] = &[(16.0, 4.0), (19.0, 6.8), (22.0, 8.0), (25.0, 10.0)];
const CYCLING_MET_TOP: f64 = 12.0;
const WALKING_MET_BANDS: &[(f64, f64)] = &[(4.0, 2.8), (5.5, 3.5), (6.5, 4.3), (8.0, 5.0)];
const WALKING_MET_TOP: f64 = 6.3;

/// MET coefficient for an activity at a given average speed.
pub fn met_coefficient(kind: ActivityKind, avg_speed_ms: f64) -> f64 {
    let kmh = avg_speed_ms * 3.6;
    let (bands, top) = match kind {
        ActivityKind::Running => (RUNNING_MET_BANDS, RUNNING_MET_TOP),
        ActivityKind::Cycling => (CYCLING_MET_BANDS, CYCLING_MET_TOP),
        ActivityKind::Walking => (WALKING_MET_BANDS, WALKING_MET_TOP),
    };
    for &(ceiling_kmh, met) in bands {
        if kmh < ceiling_kmh {
            return met;
        }
    }
    top
}

/// Combines distance, speed, elevation, physiological signal, and elapsed
/// active time into one snapshot per tick.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    activity: ActivityKind,
    body_mass_kg: f64,
    speed_window: usize,
}

impl MetricsAggregator {
    pub fn new(activity: ActivityKind, body_mass_kg: f64, speed_window: usize) -> Self {
        Self {
            activity,
            body_mass_kg,
            speed_window,
        }
    }

    /// Produce the snapshot for one tick.
    pub fn tick(
        &self,
        history: &PositionHistory,
        elapsed_active_secs: u64,
        physio: PhysioSample,
        gps_stale: bool,
        prior: Option<&MetricsSnapshot>,
    ) -> MetricsSnapshot {
        let distance_km = history.distance_km();
        let avg_speed_ms = if elapsed_active_secs > 0 {
            history.distance_m() / elapsed_active_secs as f64
        } else {
            0.0
        };
        let speed_ms = current_speed_ms(&history.window(self.speed_window));

        let max_speed_ms = prior.map_or(speed_ms, |p| p.max_speed_ms.max(speed_ms));
        let max_heart_rate_bpm =
            prior.map_or(physio.heart_rate_bpm, |p| p.max_heart_rate_bpm.max(physio.heart_rate_bpm));

        let met = met_coefficient(self.activity, avg_speed_ms);
        let calories = (met * self.body_mass_kg * (elapsed_active_secs as f64 / 3600.0)).round()
            as u32;
        // A falling MET band could briefly lower the product; the reported
        // figure must never decrease
        let calories = prior.map_or(calories, |p| p.calories.max(calories));

        MetricsSnapshot {
            tick: prior.map_or(0, |p| p.tick + 1),
            duration_secs: elapsed_active_secs,
            distance_km,
            avg_speed_ms,
            max_speed_ms,
            current_speed_ms: speed_ms,
            pace_s_per_km: pace_s_per_km(speed_ms),
            avg_pace_s_per_km: pace_s_per_km(avg_speed_ms),
            elevation_gain_m: history.elevation_gain_m(),
            heading_deg: history.heading_deg(),
            heart_rate_bpm: physio.heart_rate_bpm,
            max_heart_rate_bpm,
            cadence: physio.cadence,
            power_w: physio.power_w,
            calories,
            gps_stale,
            physio_simulated: physio.simulated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fix;

    fn sample() -> PhysioSample {
        PhysioSample {
            heart_rate_bpm: 120,
            cadence: Some(170),
            power_w: None,
            simulated: true,
        }
    }

    fn history_with_steps(steps: usize, step_deg: f64) -> PositionHistory {
        let mut h = PositionHistory::new(1000, 3.0, 50.0);
        for i in 0..steps {
            h.append(Fix::new(0.0, 10.0 + i as f64 * step_deg, i as i64 * 1000).with_accuracy(10.0));
        }
        h
    }

    #[test]
    fn test_pace_speed_duality() {
        assert_eq!(pace_s_per_km(0.0), 0.0);
        assert_eq!(pace_s_per_km(2.0), 500.0);
        // 10 km/h running pace is 6 min/km
        let pace = pace_s_per_km(10.0 / 3.6);
        assert!((pace - 360.0).abs() < 0.01);
    }

    #[test]
    fn test_met_bands() {
        // Running bands from the compendium defaults
        assert_eq!(met_coefficient(ActivityKind::Running, 7.0 / 3.6), 8.3);
        assert_eq!(met_coefficient(ActivityKind::Running, 9.0 / 3.6), 9.8);
        assert_eq!(met_coefficient(ActivityKind::Running, 11.0 / 3.6), 11.0);
        assert_eq!(met_coefficient(ActivityKind::Running, 13.0 / 3.6), 12.3);
        assert_eq!(met_coefficient(ActivityKind::Running, 16.0 / 3.6), 14.5);
        // Cycling and walking have distinct tables
        assert_eq!(met_coefficient(ActivityKind::Cycling, 20.0 / 3.6), 8.0);
        assert_eq!(met_coefficient(ActivityKind::Walking, 5.0 / 3.6), 3.5);
    }

    #[test]
    fn test_calories_from_met_formula() {
        let aggregator = MetricsAggregator::new(ActivityKind::Running, 70.0, 5);
        // ~90 m in 9 s: ~10 m/s average lands in the top running band
        let history = history_with_steps(10, 0.00009);
        let snapshot = aggregator.tick(&history, 9, sample(), false, None);
        // 14.5 MET * 70 kg * (9/3600) h = 2.54 kcal, rounded
        assert_eq!(snapshot.calories, 3);

        // The same distance over an hour is nearly stationary: bottom band
        let snapshot = aggregator.tick(&history, 3600, sample(), false, None);
        // 8.3 MET * 70 kg * 1 h = 581 kcal
        assert_eq!(snapshot.calories, 581);
    }

    #[test]
    fn test_zero_elapsed_yields_zero_rates() {
        let aggregator = MetricsAggregator::new(ActivityKind::Running, 70.0, 5);
        let history = PositionHistory::new(1000, 3.0, 50.0);
        let snapshot = aggregator.tick(&history, 0, sample(), false, None);
        assert_eq!(snapshot.avg_speed_ms, 0.0);
        assert_eq!(snapshot.avg_pace_s_per_km, 0.0);
        assert_eq!(snapshot.pace_s_per_km, 0.0);
        assert_eq!(snapshot.distance_km, 0.0);
    }

    #[test]
    fn test_running_maxima_never_decrease() {
        let aggregator = MetricsAggregator::new(ActivityKind::Running, 70.0, 5);
        let fast = history_with_steps(10, 0.00009);
        let first = aggregator.tick(&fast, 9, sample(), false, None);
        assert!(first.max_speed_ms > 9.0);

        // Second tick with a slower window and lower heart rate
        let mut slow_sample = sample();
        slow_sample.heart_rate_bpm = 90;
        let second = aggregator.tick(&fast, 120, slow_sample, false, Some(&first));
        assert!(second.max_speed_ms >= first.max_speed_ms);
        assert_eq!(second.max_heart_rate_bpm, 120);
        assert!(second.calories >= first.calories);
        assert_eq!(second.tick, first.tick + 1);
    }

    #[test]
    fn test_calories_clamped_when_met_band_drops() {
        let aggregator = MetricsAggregator::new(ActivityKind::Running, 70.0, 5);
        let history = history_with_steps(10, 0.00009);
        // High speed for an hour, then the same distance spread over much
        // longer: the average speed collapses and so does the MET product
        let fast = aggregator.tick(&history, 3600, sample(), false, None);
        let slow = aggregator.tick(&history, 3700, sample(), false, Some(&fast));
        assert!(slow.calories >= fast.calories);
    }

    #[test]
    fn test_snapshot_serializes() {
        let aggregator = MetricsAggregator::new(ActivityKind::Running, 70.0, 5);
        let history = history_with_steps(3, 0.00009);
        let snapshot = aggregator.tick(&history, 2, sample(), false, None);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"distance_km\""));
        assert!(json.contains("\"gps_stale\":false"));
    }
}
