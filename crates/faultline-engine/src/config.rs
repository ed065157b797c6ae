//! Scheduler configuration.
//!
//! The distribution specs are live: the host may rewrite them mid-run and
//! the planner picks the change up on the next tick.  Everything else is
//! fixed at initialization.

use serde::{Deserialize, Serialize};

use crate::distribution::{DistributionKind, DistributionSpec};
use crate::error::EngineError;
use crate::time::SimTimeDelta;

/// How the set of managed targets is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSelector {
    /// A group query evaluated against the host's asset set.
    Group(String),
    /// A verbatim schedule: comma-separated `target, fail_time,
    /// restore_time` triples.
    Manual(String),
}

impl TargetSelector {
    pub fn is_manual(&self) -> bool {
        matches!(self, TargetSelector::Manual(_))
    }
}

/// Upper bound on concurrently active faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultCap {
    Unlimited,
    Limit(u32),
}

impl FaultCap {
    /// Decode the host encoding: `-1` means unlimited, anything `>= 1` is a
    /// hard limit, everything else is a configuration error.
    pub fn from_raw(raw: i64) -> Result<FaultCap, EngineError> {
        match raw {
            -1 => Ok(FaultCap::Unlimited),
            n if n >= 1 && n <= u32::MAX as i64 => Ok(FaultCap::Limit(n as u32)),
            n => Err(EngineError::InvalidFaultCap(n)),
        }
    }

    /// Whether another fault may start while `active` are already in
    /// progress.
    pub fn allows(&self, active: usize) -> bool {
        match self {
            FaultCap::Unlimited => true,
            FaultCap::Limit(n) => active < *n as usize,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub selector: TargetSelector,
    /// Default fault kind requested from targets; individual submitted
    /// events may override it.
    pub fault_type: String,
    pub failure_dist: DistributionSpec,
    pub restore_dist: DistributionSpec,
    /// Hard cap applied to every restoration duration.
    pub max_outage_duration: SimTimeDelta,
    pub max_simultaneous_faults: FaultCap,
}

impl Default for SchedulerConfig {
    /// Historical reliability defaults: 30-day mean time to failure
    /// (exponential), roughly 1-hour mean time to restore (Pareto), 5-day
    /// maximum outage, no concurrency cap.
    fn default() -> Self {
        SchedulerConfig {
            selector: TargetSelector::Group(String::new()),
            fault_type: String::new(),
            failure_dist: DistributionSpec::new(
                DistributionKind::Exponential,
                1.0 / 2_592_000.0,
                0.0,
            ),
            restore_dist: DistributionSpec::new(DistributionKind::Pareto, 1.0, 1.00027785496),
            max_outage_duration: SimTimeDelta::from_secs(432_000),
            max_simultaneous_faults: FaultCap::Unlimited,
        }
    }
}

impl SchedulerConfig {
    pub fn is_manual(&self) -> bool {
        self.selector.is_manual()
    }

    /// Startup validation of the parts that must be right before the first
    /// tick.  Distribution kinds are checked lazily at first sample.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_simultaneous_faults == FaultCap::Limit(0) {
            return Err(EngineError::InvalidFaultCap(0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_from_raw_encoding() {
        assert_eq!(FaultCap::from_raw(-1).unwrap(), FaultCap::Unlimited);
        assert_eq!(FaultCap::from_raw(1).unwrap(), FaultCap::Limit(1));
        assert_eq!(FaultCap::from_raw(40).unwrap(), FaultCap::Limit(40));
        assert!(matches!(
            FaultCap::from_raw(0),
            Err(EngineError::InvalidFaultCap(0))
        ));
        assert!(matches!(
            FaultCap::from_raw(-7),
            Err(EngineError::InvalidFaultCap(-7))
        ));
    }

    #[test]
    fn cap_allows() {
        assert!(FaultCap::Unlimited.allows(1_000_000));
        assert!(FaultCap::Limit(2).allows(1));
        assert!(!FaultCap::Limit(2).allows(2));
    }

    #[test]
    fn default_matches_historical_reliability_settings() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.failure_dist.kind, DistributionKind::Exponential);
        assert_eq!(cfg.restore_dist.kind, DistributionKind::Pareto);
        assert_eq!(cfg.max_outage_duration, SimTimeDelta::from_secs(432_000));
        assert_eq!(cfg.max_simultaneous_faults, FaultCap::Unlimited);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_cap_rejected_by_validate() {
        let cfg = SchedulerConfig {
            max_simultaneous_faults: FaultCap::Limit(0),
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidFaultCap(0))
        ));
    }
}
