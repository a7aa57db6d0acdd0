//! Segment classification and boundary detection.
//!
//! A trailing window of fixes is classified into one of five segment types
//! (rest, climb, descent, sprint, normal) once per tick. A [`Segment`]
//! record is emitted only when the classification changes from the most
//! recently recorded segment's type; this is an edge detector, not a
//! per-tick log.
//!
//! The thresholds are empirically chosen defaults and deliberately
//! configurable; nothing here is a physiologically validated constant.

use serde::{Deserialize, Serialize};

use crate::history::PositionHistory;
use crate::speed::current_speed_ms;
use crate::Fix;

/// Classified type of a contiguous portion of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Rest,
    Climb,
    Descent,
    Sprint,
    Normal,
}

/// Thresholds for segment classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Number of trailing fixes required to classify. Default: 10.
    pub window: usize,

    /// Average speed below which the window is `rest`. Default: 0.5 m/s.
    pub rest_speed_ms: f64,

    /// Absolute altitude delta across the window above which it is a
    /// `climb` (positive) or `descent` (negative). Default: 10.0 meters.
    pub elevation_delta_m: f64,

    /// Average speed above which the window is a `sprint`. Default: 5.0 m/s.
    pub sprint_speed_ms: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            window: 10,
            rest_speed_ms: 0.5,
            elevation_delta_m: 10.0,
            sprint_speed_ms: 5.0,
        }
    }
}

/// A classified contiguous sub-range of the session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentType,
    /// Sequence number of the first fix in the segment (stable across
    /// history eviction).
    pub start_seq: u64,
    /// Sequence number of the last fix in the segment.
    pub end_seq: u64,
    /// Session clock at the segment boundary, milliseconds.
    pub start_ms: i64,
    pub end_ms: i64,
    pub distance_km: f64,
    pub duration_secs: u64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub avg_speed_ms: f64,
    pub max_speed_ms: f64,
}

/// Classify a full trailing window of fixes.
///
/// Returns `None` when fewer than `config.window` fixes are available.
/// Priority order is exactly rest, climb, descent, sprint, normal: a
/// fast-moving climb is reported as `climb`, not `sprint`.
pub fn classify(window: &[Fix], config: &SegmentConfig) -> Option<SegmentType> {
    if window.len() < config.window {
        return None;
    }
    classify_slice(window, config)
}

/// Classify an arbitrary slice of at least 2 fixes.
///
/// Same priority order as [`classify`] without the window-size requirement;
/// used once at session stop so short sessions still finalize a segment.
pub fn classify_slice(fixes: &[Fix], config: &SegmentConfig) -> Option<SegmentType> {
    if fixes.len() < 2 {
        return None;
    }

    let avg_speed = current_speed_ms(fixes);
    if avg_speed < config.rest_speed_ms {
        return Some(SegmentType::Rest);
    }

    if let (Some(first_alt), Some(last_alt)) = (
        fixes.first().and_then(|f| f.altitude_m),
        fixes.last().and_then(|f| f.altitude_m),
    ) {
        let delta = last_alt - first_alt;
        if delta > config.elevation_delta_m {
            return Some(SegmentType::Climb);
        }
        if delta < -config.elevation_delta_m {
            return Some(SegmentType::Descent);
        }
    }

    if avg_speed > config.sprint_speed_ms {
        return Some(SegmentType::Sprint);
    }

    Some(SegmentType::Normal)
}

/// Accumulator state for the segment currently being recorded.
#[derive(Debug, Clone)]
struct OpenSegment {
    kind: SegmentType,
    start_seq: u64,
    start_ms: i64,
    start_distance_m: f64,
    start_gain_m: f64,
    start_loss_m: f64,
    max_speed_ms: f64,
}

/// Stateful boundary detector: classifies once per tick and emits a
/// [`Segment`] record only at classification changes.
#[derive(Debug)]
pub struct SegmentDetector {
    config: SegmentConfig,
    open: Option<OpenSegment>,
}

impl SegmentDetector {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config, open: None }
    }

    /// Type of the segment currently being recorded, if any.
    pub fn current_kind(&self) -> Option<SegmentType> {
        self.open.as_ref().map(|o| o.kind)
    }

    /// Observe one tick. Returns the previous segment's finalized record
    /// when the classification changed, otherwise `None`.
    pub fn observe(
        &mut self,
        history: &PositionHistory,
        now_ms: i64,
        current_speed_ms: f64,
    ) -> Option<Segment> {
        if let Some(open) = self.open.as_mut() {
            open.max_speed_ms = open.max_speed_ms.max(current_speed_ms);
        }

        let window = history.window(self.config.window);
        let kind = classify(&window, &self.config)?;

        match self.open.as_ref() {
            Some(open) if open.kind == kind => None,
            Some(_) => {
                let closed = self.close(history, now_ms);
                self.open_segment(kind, history, now_ms, current_speed_ms);
                closed
            }
            None => {
                self.open_segment(kind, history, now_ms, current_speed_ms);
                None
            }
        }
    }

    /// Finalize at session stop.
    ///
    /// Closes the open segment, or, when the session was too short to ever
    /// reach the classification window, synthesizes a single whole-history
    /// segment from the relaxed classifier.
    pub fn finalize(&mut self, history: &PositionHistory, now_ms: i64) -> Option<Segment> {
        if self.open.is_some() {
            return self.close(history, now_ms);
        }

        let fixes = history.snapshot();
        let kind = classify_slice(&fixes, &self.config)?;
        let start_ms = fixes.first().map(|f| f.timestamp_ms).unwrap_or(0);
        let duration_secs = duration_secs(start_ms, now_ms);
        let distance_m = history.distance_m();
        Some(Segment {
            kind,
            start_seq: 0,
            end_seq: history.last_seq().unwrap_or(0),
            start_ms,
            end_ms: now_ms,
            distance_km: distance_m / 1000.0,
            duration_secs,
            elevation_gain_m: history.elevation_gain_m(),
            elevation_loss_m: history.elevation_loss_m(),
            avg_speed_ms: avg_speed(distance_m, duration_secs),
            max_speed_ms: current_speed_ms(&fixes),
        })
    }

    fn open_segment(
        &mut self,
        kind: SegmentType,
        history: &PositionHistory,
        now_ms: i64,
        speed_ms: f64,
    ) {
        self.open = Some(OpenSegment {
            kind,
            start_seq: history.last_seq().unwrap_or(0),
            start_ms: now_ms,
            start_distance_m: history.distance_m(),
            start_gain_m: history.elevation_gain_m(),
            start_loss_m: history.elevation_loss_m(),
            max_speed_ms: speed_ms,
        });
    }

    fn close(&mut self, history: &PositionHistory, now_ms: i64) -> Option<Segment> {
        let open = self.open.take()?;
        let distance_m = history.distance_m() - open.start_distance_m;
        let secs = duration_secs(open.start_ms, now_ms);
        Some(Segment {
            kind: open.kind,
            start_seq: open.start_seq,
            end_seq: history.last_seq().unwrap_or(open.start_seq),
            start_ms: open.start_ms,
            end_ms: now_ms,
            distance_km: distance_m / 1000.0,
            duration_secs: secs,
            elevation_gain_m: history.elevation_gain_m() - open.start_gain_m,
            elevation_loss_m: history.elevation_loss_m() - open.start_loss_m,
            avg_speed_ms: avg_speed(distance_m, secs),
            max_speed_ms: open.max_speed_ms,
        })
    }
}

fn duration_secs(start_ms: i64, end_ms: i64) -> u64 {
    ((end_ms - start_ms).max(0) as u64) / 1000
}

fn avg_speed(distance_m: f64, duration_secs: u64) -> f64 {
    if duration_secs == 0 {
        0.0
    } else {
        distance_m / duration_secs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SegmentConfig {
        SegmentConfig::default()
    }

    /// Window of 10 fixes moving at `speed_ms` with a linear altitude ramp
    /// totalling `alt_delta_m` across the window.
    fn window(speed_ms: f64, alt_delta_m: f64) -> Vec<Fix> {
        let deg_per_step = speed_ms * 0.00000899; // ~1 m = 0.00000899 deg at the equator
        (0..10)
            .map(|i| {
                Fix::new(0.0, 10.0 + i as f64 * deg_per_step, i * 1000)
                    .with_altitude(100.0 + alt_delta_m * i as f64 / 9.0)
            })
            .collect()
    }

    #[test]
    fn test_too_few_fixes_is_unclassified() {
        let fixes = window(3.0, 0.0);
        assert_eq!(classify(&fixes[..9], &config()), None);
        assert!(classify(&fixes, &config()).is_some());
    }

    #[test]
    fn test_rest_outranks_climb() {
        // Average speed 0.3 m/s with +20 m altitude delta: rest wins
        let fixes = window(0.3, 20.0);
        assert_eq!(classify(&fixes, &config()), Some(SegmentType::Rest));
    }

    #[test]
    fn test_climb_outranks_sprint() {
        let fixes = window(6.0, 15.0);
        assert_eq!(classify(&fixes, &config()), Some(SegmentType::Climb));
    }

    #[test]
    fn test_descent() {
        let fixes = window(2.0, -15.0);
        assert_eq!(classify(&fixes, &config()), Some(SegmentType::Descent));
    }

    #[test]
    fn test_sprint_and_normal() {
        assert_eq!(classify(&window(6.0, 0.0), &config()), Some(SegmentType::Sprint));
        assert_eq!(classify(&window(2.0, 0.0), &config()), Some(SegmentType::Normal));
    }

    #[test]
    fn test_missing_altitude_skips_elevation_bands() {
        let fixes: Vec<Fix> = (0..10)
            .map(|i| Fix::new(0.0, 10.0 + i as f64 * 0.00002, i * 1000))
            .collect();
        assert_eq!(classify(&fixes, &config()), Some(SegmentType::Normal));
    }

    #[test]
    fn test_detector_emits_only_on_change() {
        let mut history = crate::PositionHistory::new(1000, 3.0, 50.0);
        let mut detector = SegmentDetector::new(config());
        let mut emitted = Vec::new();

        // 15 ticks at normal pace (~4 m steps once per second)
        for i in 0..15 {
            history.append(Fix::new(0.0, 10.0 + i as f64 * 0.000036, i * 1000).with_accuracy(10.0));
            if let Some(seg) = detector.observe(&history, i * 1000, 4.0) {
                emitted.push(seg);
            }
        }
        assert!(emitted.is_empty());
        assert_eq!(detector.current_kind(), Some(SegmentType::Normal));

        // Stop moving: the stationary window eventually classifies as rest,
        // which closes the normal segment
        let last_lng = 10.0 + 14.0 * 0.000036;
        for i in 15..30 {
            history.append(Fix::new(0.0, last_lng, i * 1000).with_accuracy(80.0));
            if let Some(seg) = detector.observe(&history, i * 1000, 0.0) {
                emitted.push(seg);
            }
        }
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].kind, SegmentType::Normal);
        assert!(emitted[0].distance_km > 0.0);
        assert_eq!(detector.current_kind(), Some(SegmentType::Rest));
    }

    #[test]
    fn test_finalize_closes_open_segment() {
        let mut history = crate::PositionHistory::new(1000, 3.0, 50.0);
        let mut detector = SegmentDetector::new(config());
        for i in 0..12 {
            history.append(Fix::new(0.0, 10.0 + i as f64 * 0.000036, i * 1000).with_accuracy(10.0));
            detector.observe(&history, i * 1000, 4.0);
        }
        let seg = detector.finalize(&history, 12_000).unwrap();
        assert_eq!(seg.kind, SegmentType::Normal);
        assert!(seg.max_speed_ms >= 4.0);
        assert_eq!(detector.current_kind(), None);
    }

    #[test]
    fn test_finalize_synthesizes_segment_for_short_session() {
        let mut history = crate::PositionHistory::new(1000, 3.0, 50.0);
        let mut detector = SegmentDetector::new(config());
        // Only 3 fixes: below the classification window
        for i in 0..3 {
            history.append(Fix::new(0.0, 10.0 + i as f64 * 0.0009, i * 1000).with_accuracy(10.0));
            assert!(detector.observe(&history, i * 1000, 100.0).is_none());
        }
        let seg = detector.finalize(&history, 3000).unwrap();
        // ~100 m/s is comfortably in the sprint band
        assert_eq!(seg.kind, SegmentType::Sprint);
        assert!((seg.distance_km - 0.2).abs() < 0.01);
    }

    #[test]
    fn test_finalize_empty_history_yields_nothing() {
        let history = crate::PositionHistory::new(1000, 3.0, 50.0);
        let mut detector = SegmentDetector::new(config());
        assert!(detector.finalize(&history, 1000).is_none());
    }
}
