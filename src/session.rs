//! Activity session lifecycle.
//!
//! One [`ActivitySession`] is instantiated per recording and exclusively
//! owns the position history and segment list; there is no cross-session
//! shared state. Lifecycle: `Idle --begin--> Recording --tick*-->` with
//! `pause`/`resume` in between and a terminal `stop` that finalizes the
//! last segment and hands the summary to the persistence collaborator.
//!
//! All operations take an explicit `now_ms` in the same monotonic
//! millisecond timebase as fix timestamps; the driver supplies real clock
//! values, tests supply literals. Paused wall-clock time is excluded from
//! duration and every rate computation.

use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::history::{AppendOutcome, PositionHistory};
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::physio::{PhysioSource, SimulatedPhysio};
use crate::segments::{Segment, SegmentDetector};
use crate::speed::current_speed_ms;
use crate::validator::{self, FixCheck};
use crate::{Fix, TrackerConfig};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Outcome of offering a raw fix to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    /// Geometrically invalid or placeholder fix (expected, frequent).
    DroppedInvalid,
    /// Accuracy above the ceiling after the initial fix was established.
    DroppedLowAccuracy,
    /// Stationary GPS jitter suppressed by the history filter.
    DroppedJitter,
    /// The session is not recording; events from an inactive phase must
    /// not mutate state.
    DroppedInactive,
}

/// Receives a read-only snapshot (and the latest fix) on each tick; never
/// mutates engine state. Rendering/chart collaborator.
pub trait SessionObserver: Send {
    fn on_snapshot(&mut self, snapshot: &MetricsSnapshot, latest_fix: Option<Fix>);
}

/// No-op observer.
impl SessionObserver for () {
    fn on_snapshot(&mut self, _snapshot: &MetricsSnapshot, _latest_fix: Option<Fix>) {}
}

/// Receives the finalized session record at stop. Persistence collaborator;
/// the engine does not know or care about storage format.
pub trait SessionSink: Send {
    fn persist(&mut self, summary: &SessionSummary);
}

/// No-op sink.
impl SessionSink for () {
    fn persist(&mut self, _summary: &SessionSummary) {}
}

/// Finalized record of a stopped session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Snapshot computed at the moment of stop.
    pub final_snapshot: MetricsSnapshot,
    /// Every per-tick snapshot, in strictly increasing tick order.
    pub snapshots: Vec<MetricsSnapshot>,
    /// Every finalized segment, in emission order.
    pub segments: Vec<Segment>,
    /// Fixes accepted over the whole session, including evicted ones.
    pub point_count: u64,
    /// Mean reported horizontal accuracy over fixes that carried one.
    pub avg_accuracy_m: Option<f64>,
    pub avg_speed_ms: f64,
    pub max_speed_ms: f64,
}

/// Orchestrates validation, history, metrics, and segmentation across the
/// session lifecycle.
pub struct ActivitySession {
    config: TrackerConfig,
    state: SessionState,
    history: PositionHistory,
    detector: SegmentDetector,
    aggregator: MetricsAggregator,
    physio: Box<dyn PhysioSource>,
    segments: Vec<Segment>,
    snapshots: Vec<MetricsSnapshot>,

    has_initial_fix: bool,
    /// Accumulated active milliseconds over completed recording stretches.
    active_ms: i64,
    /// Session clock at the start of the current recording stretch.
    resumed_at_ms: Option<i64>,
    started_at: Option<DateTime<Utc>>,
    /// Session clock when the last fix was accepted.
    last_accept_ms: Option<i64>,
    /// Set by the driver on a source timeout; cleared on the next accept.
    signal_lost: bool,
}

impl ActivitySession {
    /// Create an idle session with the simulated physiological source.
    pub fn new(config: TrackerConfig) -> Self {
        let physio = Box::new(SimulatedPhysio::new(config.activity, config.physio_seed));
        Self::with_physio(config, physio)
    }

    /// Create an idle session with an explicit physiological source (e.g. a
    /// real sensor adapter).
    pub fn with_physio(config: TrackerConfig, physio: Box<dyn PhysioSource>) -> Self {
        let history = PositionHistory::new(
            config.history_cap,
            config.jitter_threshold_m,
            config.jitter_accuracy_gate_m,
        );
        let detector = SegmentDetector::new(config.segment.clone());
        let aggregator =
            MetricsAggregator::new(config.activity, config.body_mass_kg, config.speed_window);
        Self {
            config,
            state: SessionState::Idle,
            history,
            detector,
            aggregator,
            physio,
            segments: Vec::new(),
            snapshots: Vec::new(),
            has_initial_fix: false,
            active_ms: 0,
            resumed_at_ms: None,
            started_at: None,
            last_accept_ms: None,
            signal_lost: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Segments finalized so far.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Per-tick snapshots so far.
    pub fn snapshots(&self) -> &[MetricsSnapshot] {
        &self.snapshots
    }

    /// Latest accepted fix, if any.
    pub fn last_fix(&self) -> Option<Fix> {
        self.history.last().copied()
    }

    /// Immutable copy of the retained history for read-only projections
    /// (e.g. a live track polyline); never a live reference.
    pub fn history_snapshot(&self) -> Vec<Fix> {
        self.history.snapshot()
    }

    /// Start recording from the first valid fix.
    ///
    /// The accuracy ceiling is deliberately not applied here: the first
    /// geometrically valid fix is accepted regardless of quality.
    pub fn begin(&mut self, fix: Fix, now_ms: i64) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(TrackError::InvalidTransition {
                state: self.state,
                operation: "start",
            });
        }
        if validator::check(&fix, false, self.config.accuracy_ceiling_m) != FixCheck::Accepted {
            return Err(TrackError::InvalidFix);
        }

        self.history.append(fix);
        self.has_initial_fix = true;
        self.last_accept_ms = Some(now_ms);
        self.resumed_at_ms = Some(now_ms);
        self.started_at = Some(Utc::now());
        self.state = SessionState::Recording;
        info!("session started at ({:.5}, {:.5})", fix.latitude, fix.longitude);
        Ok(())
    }

    /// Offer a raw fix from the location provider.
    pub fn ingest(&mut self, fix: Fix, now_ms: i64) -> IngestOutcome {
        if self.state != SessionState::Recording {
            debug!("dropping fix while {}", self.state);
            return IngestOutcome::DroppedInactive;
        }

        match validator::check(&fix, self.has_initial_fix, self.config.accuracy_ceiling_m) {
            FixCheck::Invalid => return IngestOutcome::DroppedInvalid,
            FixCheck::LowAccuracy => return IngestOutcome::DroppedLowAccuracy,
            FixCheck::Accepted => {}
        }

        match self.history.append(fix) {
            AppendOutcome::DroppedJitter => IngestOutcome::DroppedJitter,
            AppendOutcome::Appended => {
                self.last_accept_ms = Some(now_ms);
                self.signal_lost = false;
                IngestOutcome::Accepted
            }
        }
    }

    /// Flag a non-fatal source timeout. The session continues with the last
    /// known position; only staleness is reported.
    pub fn mark_signal_lost(&mut self) {
        if self.state == SessionState::Recording && !self.signal_lost {
            warn!("GPS signal lost; continuing with last known position");
            self.signal_lost = true;
        }
    }

    /// Produce the snapshot for one tick. Returns `None` when the session
    /// is not recording (a paused or stopped session accepts no ticks).
    pub fn tick(&mut self, now_ms: i64) -> Option<MetricsSnapshot> {
        if self.state != SessionState::Recording {
            return None;
        }

        let elapsed_secs = self.elapsed_active_ms(now_ms) / 1000;
        let speed_ms = current_speed_ms(&self.history.window(self.config.speed_window));
        let physio = self.physio.sample(speed_ms, elapsed_secs as u64);
        let stale = self.is_stale(now_ms);

        let snapshot = self.aggregator.tick(
            &self.history,
            elapsed_secs as u64,
            physio,
            stale,
            self.snapshots.last(),
        );

        if let Some(closed) = self.detector.observe(&self.history, now_ms, speed_ms) {
            debug!("segment boundary: {:?} closed", closed.kind);
            self.segments.push(closed);
        }

        self.snapshots.push(snapshot.clone());
        Some(snapshot)
    }

    /// Freeze active-time accumulation and stop ticking.
    pub fn pause(&mut self, now_ms: i64) -> Result<()> {
        if self.state != SessionState::Recording {
            return Err(TrackError::InvalidTransition {
                state: self.state,
                operation: "pause",
            });
        }
        if let Some(resumed) = self.resumed_at_ms.take() {
            self.active_ms += (now_ms - resumed).max(0);
        }
        self.state = SessionState::Paused;
        info!("session paused");
        Ok(())
    }

    /// Resume active-time accumulation from where it left off.
    pub fn resume(&mut self, now_ms: i64) -> Result<()> {
        if self.state != SessionState::Paused {
            return Err(TrackError::InvalidTransition {
                state: self.state,
                operation: "resume",
            });
        }
        self.resumed_at_ms = Some(now_ms);
        self.state = SessionState::Recording;
        info!("session resumed");
        Ok(())
    }

    /// Finalize the session: close the last segment, compute the final
    /// snapshot, and hand everything over as a [`SessionSummary`].
    ///
    /// Legal from `Recording` or `Paused`; `Stopped` is terminal.
    pub fn stop(&mut self, now_ms: i64) -> Result<SessionSummary> {
        match self.state {
            SessionState::Recording | SessionState::Paused => {}
            _ => {
                return Err(TrackError::InvalidTransition {
                    state: self.state,
                    operation: "stop",
                })
            }
        }

        if let Some(resumed) = self.resumed_at_ms.take() {
            self.active_ms += (now_ms - resumed).max(0);
        }
        self.state = SessionState::Stopped;

        if let Some(last) = self.detector.finalize(&self.history, now_ms) {
            self.segments.push(last);
        }

        let elapsed_secs = (self.active_ms / 1000) as u64;
        let speed_ms = current_speed_ms(&self.history.window(self.config.speed_window));
        let physio = self.physio.sample(speed_ms, elapsed_secs);
        let final_snapshot = self.aggregator.tick(
            &self.history,
            elapsed_secs,
            physio,
            self.is_stale(now_ms),
            self.snapshots.last(),
        );

        info!(
            "session stopped: {:.2} km in {} s, {} segments",
            final_snapshot.distance_km,
            elapsed_secs,
            self.segments.len()
        );

        Ok(SessionSummary {
            started_at: self.started_at.unwrap_or_else(Utc::now),
            ended_at: Utc::now(),
            avg_speed_ms: final_snapshot.avg_speed_ms,
            max_speed_ms: final_snapshot.max_speed_ms,
            final_snapshot,
            snapshots: std::mem::take(&mut self.snapshots),
            segments: std::mem::take(&mut self.segments),
            point_count: self.history.total_appended(),
            avg_accuracy_m: self.history.avg_accuracy_m(),
        })
    }

    fn elapsed_active_ms(&self, now_ms: i64) -> i64 {
        let current = self
            .resumed_at_ms
            .map_or(0, |resumed| (now_ms - resumed).max(0));
        self.active_ms + current
    }

    fn is_stale(&self, now_ms: i64) -> bool {
        if self.signal_lost {
            return true;
        }
        let stale_ms = self.config.stale_after.as_millis() as i64;
        self.last_accept_ms
            .map_or(false, |last| now_ms - last > stale_ms)
    }
}
