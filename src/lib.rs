//! # Livetrack
//!
//! Live GPS activity-tracking engine: consumes a raw, noisy, intermittent
//! stream of geographic fixes and produces a trustworthy, monotonically
//! updated set of activity metrics (distance, speed, pace, elevation gain,
//! calories) plus a best-effort segmentation of the session.
//!
//! This library provides:
//! - Two-phase fix validation and GPS jitter suppression
//! - Incremental haversine distance and elevation accumulation
//! - Window-smoothed speed estimation and segment classification
//! - Per-tick metric snapshots with MET-based calorie estimation
//! - A session lifecycle state machine (start/tick/pause/resume/stop)
//! - A tokio driver that serializes fix ingestion and metric ticking
//!
//! ## Quick Start
//!
//! ```rust
//! use livetrack::{ActivitySession, Fix, TrackerConfig};
//!
//! let mut session = ActivitySession::new(TrackerConfig::default());
//!
//! // First geometrically valid fix starts the recording.
//! session.begin(Fix::new(51.5074, -0.1278, 0), 0).unwrap();
//! session.ingest(Fix::new(51.5078, -0.1278, 1000).with_accuracy(10.0), 1000);
//!
//! let snapshot = session.tick(1000).expect("session is recording");
//! assert!(snapshot.distance_km > 0.0);
//!
//! let summary = session.stop(2000).unwrap();
//! assert_eq!(summary.segments.len(), 1);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackError};

// Pure geodesic math (haversine distance, bearing, path length)
pub mod geodesic;

// Fix quality gating (two-phase accuracy policy)
pub mod validator;
pub use validator::FixCheck;

// Accepted-fix buffer with jitter filter and incremental accumulators
pub mod history;
pub use history::{AppendOutcome, PositionHistory};

// Window-smoothed speed estimation
pub mod speed;

// Segment classification and boundary detection
pub mod segments;
pub use segments::{Segment, SegmentConfig, SegmentDetector, SegmentType};

// Per-tick metric aggregation and calorie estimation
pub mod metrics;
pub use metrics::{MetricsAggregator, MetricsSnapshot};

// Physiological signal capability (simulated fallback behind a trait)
pub mod physio;
pub use physio::{PhysioSample, PhysioSource, SimulatedPhysio};

// Session lifecycle state machine and collaborator traits
pub mod session;
pub use session::{
    ActivitySession, IngestOutcome, SessionObserver, SessionSink, SessionState, SessionSummary,
};

// Tokio-driven session loop (fix channel + tick interval, single writer)
pub mod driver;
pub use driver::{Command, SessionDriver, SourceEvent};

// ============================================================================
// Core Types
// ============================================================================

/// A single raw geographic sample from the location provider.
///
/// Latitude/longitude are degrees; a fix with both coordinates exactly zero
/// is the provider's "no fix" sentinel and is never accepted.
///
/// # Example
/// ```
/// use livetrack::Fix;
/// let fix = Fix::new(51.5074, -0.1278, 0).with_accuracy(12.0);
/// assert!(fix.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude above sea level in meters, if the provider reported one.
    pub altitude_m: Option<f64>,
    /// Horizontal accuracy radius in meters (smaller is better).
    pub accuracy_m: Option<f64>,
    /// Instantaneous speed reported by the provider in m/s.
    pub speed_ms: Option<f64>,
    /// Heading in degrees clockwise from north.
    pub heading_deg: Option<f64>,
    /// Capture timestamp in monotonic milliseconds.
    pub timestamp_ms: i64,
}

impl Fix {
    /// Create a new fix with only coordinates and a capture timestamp.
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: None,
            accuracy_m: None,
            speed_ms: None,
            heading_deg: None,
            timestamp_ms,
        }
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn with_speed(mut self, speed_ms: f64) -> Self {
        self.speed_ms = Some(speed_ms);
        self
    }

    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }

    /// Check if the fix has geometrically valid coordinates.
    ///
    /// `(0, 0)` is rejected as the "no fix" placeholder.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
            && !(self.latitude == 0.0 && self.longitude == 0.0)
    }
}

/// Activity type being recorded.
///
/// Selects the MET table for calorie estimation and the coefficients of the
/// physiological simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Running,
    Cycling,
    Walking,
}

/// Configuration for a tracking session.
///
/// The thresholds are empirically chosen defaults, not physiologically
/// validated constants; override them per deployment as needed.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Activity being recorded. Default: running.
    pub activity: ActivityKind,

    /// Body mass in kg for calorie estimation. Default: 70.0.
    pub body_mass_kg: f64,

    /// Reject fixes with worse horizontal accuracy than this once an initial
    /// fix is established. Default: 100.0 meters.
    pub accuracy_ceiling_m: f64,

    /// Drop a fix closer than this to the previous one when its accuracy is
    /// good (stationary GPS jitter). Default: 3.0 meters.
    pub jitter_threshold_m: f64,

    /// Only treat a small step as jitter when accuracy is better than this;
    /// a poor-accuracy fix that barely moved may still be real movement.
    /// Default: 50.0 meters.
    pub jitter_accuracy_gate_m: f64,

    /// Rolling cap on retained fixes (oldest evicted first). Default: 1000.
    pub history_cap: usize,

    /// Number of trailing fixes used for smoothed speed. Default: 5.
    pub speed_window: usize,

    /// Metric tick interval for the driver. Default: 1 second.
    pub tick_interval: Duration,

    /// Bounded wait for the first valid fix during start. Default: 25 seconds.
    pub initial_fix_timeout: Duration,

    /// Flag snapshots as stale when the newest accepted fix is older than
    /// this. Default: 10 seconds.
    pub stale_after: Duration,

    /// Segment classification thresholds.
    pub segment: SegmentConfig,

    /// Seed for the physiological simulator; `None` seeds from entropy.
    /// Fix a seed for reproducible simulated heart-rate traces.
    pub physio_seed: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            activity: ActivityKind::Running,
            body_mass_kg: 70.0,
            accuracy_ceiling_m: 100.0,
            jitter_threshold_m: 3.0,
            jitter_accuracy_gate_m: 50.0,
            history_cap: 1000,
            speed_window: speed::DEFAULT_SPEED_WINDOW,
            tick_interval: Duration::from_secs(1),
            initial_fix_timeout: Duration::from_secs(25),
            stale_after: Duration::from_secs(10),
            segment: SegmentConfig::default(),
            physio_seed: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
