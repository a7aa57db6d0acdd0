//! Tokio-driven session loop.
//!
//! Fix ingestion and metric ticking are two producers into one consumer;
//! the driver serializes both through a single `select!` loop so nothing
//! ever mutates the history concurrently. The location provider pushes
//! [`SourceEvent`]s into one channel, the caller pushes lifecycle
//! [`Command`]s into another, and a `tokio::time` interval drives the
//! once-per-second tick.
//!
//! Start semantics: the driver waits (bounded, cancellable by dropping the
//! future) for the first valid fix before the session leaves `Idle`. A
//! timeout surfaces as the distinct "no GPS signal" error rather than
//! silently starting with synthetic data. Source unavailability or a
//! permission denial is fatal during start but only degrades an already
//! recording session to stale.

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{Result, TrackError};
use crate::session::{ActivitySession, SessionObserver, SessionSink, SessionSummary};
use crate::{Fix, TrackerConfig};

/// Event pushed by the location provider.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Fix(Fix),
    /// Non-fatal watch timeout; the session continues with the last known
    /// position and flags staleness.
    SignalLost,
    /// The provider reported itself unavailable.
    Unavailable(String),
    /// Location permission was denied.
    PermissionDenied,
}

/// Lifecycle command from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Stop,
}

/// Owns an [`ActivitySession`] and drives it from a fix channel, a command
/// channel, and a periodic tick.
pub struct SessionDriver {
    session: ActivitySession,
    events: mpsc::Receiver<SourceEvent>,
    commands: mpsc::Receiver<Command>,
    observer: Box<dyn SessionObserver>,
    sink: Box<dyn SessionSink>,
    epoch: Instant,
    source_open: bool,
}

impl SessionDriver {
    pub fn new(
        config: TrackerConfig,
        events: mpsc::Receiver<SourceEvent>,
        commands: mpsc::Receiver<Command>,
        observer: Box<dyn SessionObserver>,
        sink: Box<dyn SessionSink>,
    ) -> Self {
        Self {
            session: ActivitySession::new(config),
            events,
            commands,
            observer,
            sink,
            epoch: Instant::now(),
            source_open: true,
        }
    }

    /// Same as [`SessionDriver::new`] with a pre-built session (custom
    /// physiological source).
    pub fn with_session(
        session: ActivitySession,
        events: mpsc::Receiver<SourceEvent>,
        commands: mpsc::Receiver<Command>,
        observer: Box<dyn SessionObserver>,
        sink: Box<dyn SessionSink>,
    ) -> Self {
        Self {
            session,
            events,
            commands,
            observer,
            sink,
            epoch: Instant::now(),
            source_open: true,
        }
    }

    fn now_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    /// Run the session to completion.
    ///
    /// Waits for an initial fix, then ticks once per configured interval
    /// until a `Stop` command arrives (or the command channel is dropped),
    /// finally persisting the summary through the sink.
    pub async fn run(mut self) -> Result<SessionSummary> {
        self.await_initial_fix().await?;

        let SessionDriver {
            mut session,
            mut events,
            mut commands,
            mut observer,
            mut sink,
            epoch,
            mut source_open,
        } = self;
        let now_ms = move || epoch.elapsed().as_millis() as i64;

        let mut ticker = time::interval(session.config().tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick fires immediately; skip past it so ticks
        // land one interval after start
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(snapshot) = session.tick(now_ms()) {
                        let latest = session.last_fix();
                        observer.on_snapshot(&snapshot, latest);
                    }
                }
                event = events.recv(), if source_open => {
                    match event {
                        Some(SourceEvent::Fix(fix)) => {
                            session.ingest(fix, now_ms());
                        }
                        Some(SourceEvent::SignalLost) => session.mark_signal_lost(),
                        Some(SourceEvent::Unavailable(message)) => {
                            warn!("location source unavailable mid-session: {message}");
                            session.mark_signal_lost();
                        }
                        Some(SourceEvent::PermissionDenied) => {
                            warn!("location permission revoked mid-session");
                            session.mark_signal_lost();
                        }
                        None => {
                            warn!("fix source closed; continuing until stopped");
                            session.mark_signal_lost();
                            source_open = false;
                        }
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(Command::Pause) => {
                            if let Err(err) = session.pause(now_ms()) {
                                debug!("ignoring pause: {err}");
                            }
                        }
                        Some(Command::Resume) => {
                            if let Err(err) = session.resume(now_ms()) {
                                debug!("ignoring resume: {err}");
                            }
                        }
                        Some(Command::Stop) | None => break,
                    }
                }
            }
        }

        let summary = session.stop(now_ms())?;
        sink.persist(&summary);
        Ok(summary)
    }

    /// Bounded wait for the first valid fix.
    async fn await_initial_fix(&mut self) -> Result<()> {
        let timeout = self.session.config().initial_fix_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TrackError::SignalTimeout {
                    waited_secs: timeout.as_secs(),
                });
            }

            let event = match time::timeout(remaining, self.events.recv()).await {
                Err(_) => {
                    return Err(TrackError::SignalTimeout {
                        waited_secs: timeout.as_secs(),
                    })
                }
                Ok(None) => return Err(TrackError::SourceClosed),
                Ok(Some(event)) => event,
            };

            match event {
                SourceEvent::Fix(fix) => {
                    let now = self.now_ms();
                    match self.session.begin(fix, now) {
                        Ok(()) => return Ok(()),
                        // Invalid first fix: keep waiting for a usable one
                        Err(TrackError::InvalidFix) => continue,
                        Err(err) => return Err(err),
                    }
                }
                SourceEvent::SignalLost => {
                    debug!("signal timeout while waiting for initial fix");
                }
                SourceEvent::Unavailable(message) => {
                    return Err(TrackError::SignalUnavailable { message })
                }
                SourceEvent::PermissionDenied => return Err(TrackError::PermissionDenied),
            }
        }
    }
}
