//! Error taxonomy for the particle-tracking core.
//!
//! Mirrors the recovery policy of the error-handling design one-to-one:
//! `FieldIo`/`FieldIoTimeout`/`Config` are fatal and surface to the driver;
//! `SearchFail`/`BoundaryCrossed` are status codes absorbed locally;
//! `OutOfRange`/`Numerical` are logged-and-clamped unless the caller asks
//! for strict (debug-build-style) behaviour.

use thiserror::Error;

/// What kind of value went out of its expected bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Time,
    Sigma,
}

impl std::fmt::Display for RangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeKind::Time => write!(f, "time"),
            RangeKind::Sigma => write!(f, "sigma"),
        }
    }
}

/// Which kind of boundary a particle's tentative step crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossedBoundary {
    Land,
    Open,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("field source has no data at requested time: {0}")]
    FieldIo(String),

    #[error("field source read timed out after {0:?}")]
    FieldIoTimeout(std::time::Duration),

    #[error("host search did not converge for particle {particle_id} after {steps} steps")]
    SearchFail { particle_id: u64, steps: usize },

    #[error("{kind} interpolation fraction {value} outside [0,1]")]
    OutOfRange { kind: RangeKind, value: f64 },

    #[error("particle {particle_id} crossed a {boundary:?} boundary")]
    BoundaryCrossed {
        particle_id: u64,
        boundary: CrossedBoundary,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("numerical fault for particle {particle_id}: {reason}")]
    Numerical { particle_id: u64, reason: String },
}
