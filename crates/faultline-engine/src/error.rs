//! Engine error taxonomy.
//!
//! Only fatal conditions surface as `Err`: configuration mistakes caught at
//! startup and capability failures caught at the point of use.  Runtime
//! anomalies (negative differential counts, sub-granularity durations,
//! over-cap manual events) are clamped or dropped with a `warn!` diagnostic
//! and never appear here.

use thiserror::Error;

/// Errors from the scheduling engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A distribution kind outside the supported set was selected.
    #[error("unsupported distribution kind: {0}")]
    UnsupportedDistribution(String),

    /// A group query matched no assets.
    #[error("target selection matched no assets: {0:?}")]
    EmptySelection(String),

    /// A manual schedule did not parse as `target, fail, restore` triples.
    #[error("malformed manual schedule: {0}")]
    MalformedSchedule(String),

    /// A manual schedule parsed but violates the timing rules.
    #[error("invalid manual schedule: {0}")]
    InvalidManualSchedule(String),

    /// `max_simultaneous_faults` must be unlimited or at least 1.
    #[error("invalid simultaneous-fault cap: {0}")]
    InvalidFaultCap(i64),

    /// A selected asset does not implement the fault capability.
    #[error("target {0:?} does not support faulting")]
    TargetNotFaultable(String),

    /// A named target does not exist in the asset set.
    #[error("unknown target: {0:?}")]
    UnknownTarget(String),

    /// A target's `create_fault` capability call failed.
    #[error("failed to induce fault on {target:?}: {reason}")]
    FaultInjectionFailed { target: String, reason: String },

    /// A target's `fix_fault` capability call failed.
    #[error("failed to restore {target:?}: {reason}")]
    FaultRestorationFailed { target: String, reason: String },
}
