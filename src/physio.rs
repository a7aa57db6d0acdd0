//! Physiological signal capability.
//!
//! Heart rate, cadence, and power come from a [`PhysioSource`]. When no
//! real sensor is present the engine falls back to [`SimulatedPhysio`], a
//! deterministic-seeded simulator whose samples are explicitly flagged
//! `simulated` so they remain distinguishable from sensor data if and when
//! sensors are integrated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ActivityKind;

/// Physiological band the simulator clamps heart rate into.
pub const HR_MIN_BPM: f64 = 60.0;
pub const HR_MAX_BPM: f64 = 200.0;

/// One sample of physiological signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysioSample {
    pub heart_rate_bpm: u16,
    /// Steps per minute (running/walking) or crank rpm (cycling).
    pub cadence: Option<u16>,
    pub power_w: Option<u16>,
    /// True when the sample was synthesized rather than measured.
    pub simulated: bool,
}

/// Source of physiological signals, sampled once per tick.
///
/// Implementations: [`SimulatedPhysio`] (fallback), and eventually real
/// sensor adapters selected via configuration.
pub trait PhysioSource: Send {
    fn sample(&mut self, current_speed_ms: f64, elapsed_active_secs: u64) -> PhysioSample;
}

/// Per-activity coefficients for the simulator.
#[derive(Debug, Clone)]
pub struct PhysioProfile {
    /// Heart rate at zero intensity, bpm.
    pub resting_hr_bpm: f64,
    /// Added on top of resting at full intensity, bpm.
    pub hr_span_bpm: f64,
    /// Speed treated as full intensity; intensity = min(speed / this, 1).
    pub reference_speed_ms: f64,
    /// Half-width of the per-sample heart-rate jitter, bpm.
    pub hr_jitter_bpm: f64,
    /// Cadence at low and full intensity while moving.
    pub cadence_base: f64,
    pub cadence_span: f64,
    /// Power at full intensity; `None` for activities without a power model.
    pub max_power_w: Option<f64>,
}

impl PhysioProfile {
    pub fn for_kind(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Running => Self {
                resting_hr_bpm: 62.0,
                hr_span_bpm: 110.0,
                reference_speed_ms: 5.0,
                hr_jitter_bpm: 3.0,
                cadence_base: 150.0,
                cadence_span: 30.0,
                max_power_w: None,
            },
            ActivityKind::Cycling => Self {
                resting_hr_bpm: 62.0,
                hr_span_bpm: 98.0,
                reference_speed_ms: 10.0,
                hr_jitter_bpm: 3.0,
                cadence_base: 60.0,
                cadence_span: 35.0,
                max_power_w: Some(280.0),
            },
            ActivityKind::Walking => Self {
                resting_hr_bpm: 62.0,
                hr_span_bpm: 55.0,
                reference_speed_ms: 2.0,
                hr_jitter_bpm: 2.0,
                cadence_base: 95.0,
                cadence_span: 25.0,
                max_power_w: None,
            },
        }
    }
}

/// Deterministic-seeded simulator standing in for real sensors.
pub struct SimulatedPhysio {
    profile: PhysioProfile,
    rng: StdRng,
}

impl SimulatedPhysio {
    /// Create a simulator for an activity. `seed` fixes the jitter stream
    /// for reproducible tests; `None` seeds from entropy.
    pub fn new(kind: ActivityKind, seed: Option<u64>) -> Self {
        Self {
            profile: PhysioProfile::for_kind(kind),
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }

    pub fn with_profile(profile: PhysioProfile, seed: Option<u64>) -> Self {
        Self {
            profile,
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }
}

impl PhysioSource for SimulatedPhysio {
    fn sample(&mut self, current_speed_ms: f64, _elapsed_active_secs: u64) -> PhysioSample {
        let p = &self.profile;
        let intensity = (current_speed_ms / p.reference_speed_ms).clamp(0.0, 1.0);

        let jitter = self.rng.gen_range(-p.hr_jitter_bpm..=p.hr_jitter_bpm);
        let hr = (p.resting_hr_bpm + p.hr_span_bpm * intensity + jitter).clamp(HR_MIN_BPM, HR_MAX_BPM);

        let cadence = if current_speed_ms > 0.3 {
            let wobble = self.rng.gen_range(-2.0..=2.0);
            Some((p.cadence_base + p.cadence_span * intensity + wobble).max(0.0) as u16)
        } else {
            None
        };

        let power_w = p.max_power_w.map(|max| {
            let wobble = self.rng.gen_range(-10.0..=10.0);
            (max * intensity + wobble).max(0.0) as u16
        });

        PhysioSample {
            heart_rate_bpm: hr.round() as u16,
            cadence,
            power_w,
            simulated: true,
        }
    }
}
