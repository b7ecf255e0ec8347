//! Engine error types.

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors surfaced by the tracking engine.
///
/// Ring-buffer misuse variants (`CapacityExceeded`, `EmptyBuffer`) are
/// assertion-level: the pipeline's own bookkeeping makes them unreachable, so
/// hitting one means a caller bypassed the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackError {
    /// `enqueue` was called on a full ring buffer.
    CapacityExceeded {
        /// Buffer capacity in frames.
        capacity: usize,
    },
    /// `remove_oldest` was called on an empty ring buffer.
    EmptyBuffer,
    /// A calibration scale evaluated to zero or a non-finite value; the
    /// coordinate chain cannot be inverted.
    DegenerateCalibration {
        /// Name of the offending scale factor.
        scale: &'static str,
        /// The degenerate value.
        value: f64,
    },
    /// A detection or background worker panicked mid-frame.
    WorkerFailed {
        /// Which worker failed.
        worker: &'static str,
    },
}

impl std::fmt::Display for TrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded { capacity } => {
                write!(f, "ring buffer full: capacity {}", capacity)
            }
            Self::EmptyBuffer => write!(f, "ring buffer empty"),
            Self::DegenerateCalibration { scale, value } => {
                write!(f, "degenerate calibration: {} = {}", scale, value)
            }
            Self::WorkerFailed { worker } => write!(f, "{} worker failed", worker),
        }
    }
}

impl std::error::Error for TrackError {}
