//! Append-only buffer of accepted fixes for one session.
//!
//! Source of truth for all derived metrics. Insertion order is temporal
//! order; memory is bounded by a rolling cap with FIFO eviction. Distance,
//! elevation, and accuracy statistics are accumulated incrementally at
//! append so they survive eviction of old fixes.
//!
//! The stationary-jitter filter lives here: once a previous fix exists, a
//! new fix that barely moved while reporting good accuracy is dropped
//! before being appended. Genuine movement (or a poor-accuracy fix) is
//! always retained.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::geodesic;
use crate::Fix;

/// Outcome of offering a fix to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The fix was retained and the accumulators updated.
    Appended,
    /// The fix moved less than the jitter threshold with good accuracy and
    /// was dropped as stationary GPS noise.
    DroppedJitter,
}

/// Ordered sequence of accepted fixes with incremental accumulators.
///
/// Owned exclusively by the active session; read-only projections are
/// copies, never live references into the buffer.
#[derive(Debug)]
pub struct PositionHistory {
    fixes: VecDeque<Fix>,
    cap: usize,
    jitter_threshold_m: f64,
    jitter_accuracy_gate_m: f64,

    /// Number of fixes evicted from the front; the sequence number of
    /// `fixes[0]` is exactly this value.
    evicted: u64,

    // Accumulators over every appended fix, including evicted ones
    distance_m: f64,
    elevation_gain_m: f64,
    elevation_loss_m: f64,
    accuracy_sum_m: f64,
    accuracy_count: u64,
    total_appended: u64,
}

impl PositionHistory {
    pub fn new(cap: usize, jitter_threshold_m: f64, jitter_accuracy_gate_m: f64) -> Self {
        Self {
            fixes: VecDeque::with_capacity(cap.min(1024)),
            cap: cap.max(1),
            jitter_threshold_m,
            jitter_accuracy_gate_m,
            evicted: 0,
            distance_m: 0.0,
            elevation_gain_m: 0.0,
            elevation_loss_m: 0.0,
            accuracy_sum_m: 0.0,
            accuracy_count: 0,
            total_appended: 0,
        }
    }

    /// Offer an accepted fix for appending.
    ///
    /// Applies the jitter filter, updates the distance/elevation/accuracy
    /// accumulators, and evicts the oldest fix once the cap is exceeded.
    /// Non-monotonic timestamps are kept in arrival order (warning
    /// condition, not a correction).
    pub fn append(&mut self, fix: Fix) -> AppendOutcome {
        if let Some(last) = self.fixes.back() {
            let step_m = geodesic::haversine_m(last, &fix);

            let good_accuracy = fix
                .accuracy_m
                .map_or(false, |a| a < self.jitter_accuracy_gate_m);
            if step_m < self.jitter_threshold_m && good_accuracy {
                debug!("dropping jitter fix: moved {step_m:.1} m");
                return AppendOutcome::DroppedJitter;
            }

            if fix.timestamp_ms < last.timestamp_ms {
                warn!(
                    "non-monotonic fix timestamp: {} after {}",
                    fix.timestamp_ms, last.timestamp_ms
                );
            }

            self.distance_m += step_m;
            if let (Some(prev_alt), Some(alt)) = (last.altitude_m, fix.altitude_m) {
                let delta = alt - prev_alt;
                if delta > 0.0 {
                    self.elevation_gain_m += delta;
                } else {
                    self.elevation_loss_m -= delta;
                }
            }
        }

        if let Some(accuracy) = fix.accuracy_m {
            self.accuracy_sum_m += accuracy;
            self.accuracy_count += 1;
        }
        self.total_appended += 1;

        self.fixes.push_back(fix);
        if self.fixes.len() > self.cap {
            self.fixes.pop_front();
            self.evicted += 1;
        }

        AppendOutcome::Appended
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn last(&self) -> Option<&Fix> {
        self.fixes.back()
    }

    /// Sequence number of the most recent fix, if any. Sequence numbers are
    /// stable across eviction.
    pub fn last_seq(&self) -> Option<u64> {
        if self.fixes.is_empty() {
            None
        } else {
            Some(self.evicted + self.fixes.len() as u64 - 1)
        }
    }

    /// Total fixes ever appended, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    /// Cumulative path distance in meters over every appended fix.
    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    /// Cumulative elevation gain in meters (positive deltas only; descents
    /// never subtract).
    pub fn elevation_gain_m(&self) -> f64 {
        self.elevation_gain_m
    }

    /// Cumulative elevation loss in meters (as a positive number).
    pub fn elevation_loss_m(&self) -> f64 {
        self.elevation_loss_m
    }

    /// Mean reported accuracy over fixes that carried one.
    pub fn avg_accuracy_m(&self) -> Option<f64> {
        if self.accuracy_count == 0 {
            None
        } else {
            Some(self.accuracy_sum_m / self.accuracy_count as f64)
        }
    }

    /// The last `n` fixes in temporal order (fewer if the buffer is shorter).
    pub fn window(&self, n: usize) -> Vec<Fix> {
        let skip = self.fixes.len().saturating_sub(n);
        self.fixes.iter().skip(skip).copied().collect()
    }

    /// Direction of travel: the last fix's reported heading, or the bearing
    /// between the last two distinct fixes.
    pub fn heading_deg(&self) -> Option<f64> {
        let last = self.fixes.back()?;
        if let Some(heading) = last.heading_deg {
            return Some(heading);
        }
        let prev = self.fixes.iter().rev().nth(1)?;
        if prev.latitude == last.latitude && prev.longitude == last.longitude {
            return None;
        }
        Some(geodesic::initial_bearing_deg(prev, last))
    }

    /// Immutable copy of the retained fixes, for read-only projections.
    pub fn snapshot(&self) -> Vec<Fix> {
        self.fixes.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> PositionHistory {
        PositionHistory::new(1000, 3.0, 50.0)
    }

    /// ~10 m east of the previous point per step at the equator.
    fn step_fix(i: i64) -> Fix {
        Fix::new(0.0, 10.0 + i as f64 * 0.00009, i * 1000).with_accuracy(10.0)
    }

    #[test]
    fn test_jitter_suppression() {
        let mut h = history();
        // ~1 m apart, accuracy 10 m: second is jitter
        h.append(Fix::new(0.0, 10.0, 0).with_accuracy(10.0));
        let outcome = h.append(Fix::new(0.0, 10.000009, 1000).with_accuracy(10.0));
        assert_eq!(outcome, AppendOutcome::DroppedJitter);
        assert_eq!(h.len(), 1);

        // ~10 m apart, accuracy 10 m: both retained
        let outcome = h.append(Fix::new(0.0, 10.00009, 2000).with_accuracy(10.0));
        assert_eq!(outcome, AppendOutcome::Appended);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_small_step_with_poor_accuracy_retained() {
        let mut h = history();
        h.append(Fix::new(0.0, 10.0, 0).with_accuracy(10.0));
        // 1 m step but accuracy 80 m: could be real movement, keep it
        let outcome = h.append(Fix::new(0.0, 10.000009, 1000).with_accuracy(80.0));
        assert_eq!(outcome, AppendOutcome::Appended);
    }

    #[test]
    fn test_incremental_distance_matches_recompute() {
        let mut h = history();
        for i in 0..50 {
            h.append(step_fix(i));
        }
        let recomputed = geodesic::path_distance_m(&h.snapshot());
        assert!((h.distance_m() - recomputed).abs() < 1e-9);
        assert!(h.distance_m() > 0.0);
    }

    #[test]
    fn test_distance_survives_eviction() {
        let mut h = PositionHistory::new(10, 3.0, 50.0);
        for i in 0..30 {
            h.append(step_fix(i));
        }
        assert_eq!(h.len(), 10);
        assert_eq!(h.total_appended(), 30);
        // 29 steps of ~10 m each, none lost to eviction
        assert!((h.distance_m() - 290.0).abs() < 5.0, "got {}", h.distance_m());
        assert_eq!(h.last_seq(), Some(29));
    }

    #[test]
    fn test_elevation_gain_ignores_descents() {
        let mut h = history();
        let altitudes = [100.0, 110.0, 105.0, 120.0, 90.0];
        let mut gain_before = 0.0;
        for (i, alt) in altitudes.iter().enumerate() {
            h.append(step_fix(i as i64).with_altitude(*alt));
            assert!(h.elevation_gain_m() >= gain_before);
            gain_before = h.elevation_gain_m();
        }
        // +10 and +15 climb; the descents contribute nothing
        assert!((h.elevation_gain_m() - 25.0).abs() < 1e-9);
        assert!((h.elevation_loss_m() - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_monotonic_timestamps_kept_in_arrival_order() {
        let mut h = history();
        h.append(Fix::new(0.0, 10.0, 5000).with_accuracy(10.0));
        h.append(Fix::new(0.0, 10.001, 4000).with_accuracy(10.0));
        let fixes = h.snapshot();
        assert_eq!(fixes[0].timestamp_ms, 5000);
        assert_eq!(fixes[1].timestamp_ms, 4000);
    }

    #[test]
    fn test_window_and_accuracy_stats() {
        let mut h = history();
        for i in 0..8 {
            h.append(step_fix(i));
        }
        assert_eq!(h.window(5).len(), 5);
        assert_eq!(h.window(20).len(), 8);
        assert_eq!(h.window(5)[4].timestamp_ms, 7000);
        assert_eq!(h.avg_accuracy_m(), Some(10.0));
    }

    #[test]
    fn test_heading_from_bearing() {
        let mut h = history();
        h.append(Fix::new(0.0, 10.0, 0).with_accuracy(10.0));
        h.append(Fix::new(0.0, 10.001, 1000).with_accuracy(10.0));
        let heading = h.heading_deg().unwrap();
        assert!((heading - 90.0).abs() < 0.1);

        // Reported heading wins over computed bearing
        h.append(Fix::new(0.0, 10.002, 2000).with_accuracy(10.0).with_heading(45.0));
        assert_eq!(h.heading_deg(), Some(45.0));
    }
}
