//! Unified error handling for the livetrack engine.
//!
//! Calculator-level functions are pure and total over validated fixes and
//! never return errors; only ingestion and session-lifecycle operations can
//! fail, and they fail explicitly through [`TrackError`]. Invalid or
//! low-accuracy fixes are dropped, not surfaced as errors (expected,
//! frequent).

use thiserror::Error;

use crate::session::SessionState;

/// Unified error type for session-lifecycle operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// No valid fix arrived within the bounded wait during start.
    /// User-actionable "no GPS signal" condition; the session stays idle.
    #[error("no GPS signal: no valid fix within {waited_secs} s")]
    SignalTimeout { waited_secs: u64 },

    /// The location source reported itself unavailable. Fatal for start;
    /// never retried automatically.
    #[error("location source unavailable: {message}")]
    SignalUnavailable { message: String },

    /// Location permission was denied. Fatal for start; never retried
    /// automatically.
    #[error("location permission denied")]
    PermissionDenied,

    /// A fix offered as the initial fix was geometrically invalid.
    #[error("fix rejected: invalid coordinates")]
    InvalidFix,

    /// The requested lifecycle operation is not legal in the current state.
    #[error("cannot {operation} while session is {state}")]
    InvalidTransition {
        state: SessionState,
        operation: &'static str,
    },

    /// The fix source channel closed before the session could start.
    #[error("fix source closed before the session started")]
    SourceClosed,
}

/// Result type alias for livetrack operations.
pub type Result<T> = std::result::Result<T, TrackError>;
