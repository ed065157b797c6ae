//! The metrics collaborator, as seen from this engine.
//!
//! Reliability statistics live elsewhere; the scheduler only needs two
//! things from them: the count of currently interrupted customers (for
//! differential attribution) and a sink for finished events.

use crate::target::{FaultKindId, TargetId};
use crate::time::SimTime;

/// Everything the metrics collaborator learns about one finished event.
#[derive(Debug, Clone)]
pub struct EndedEvent {
    pub target: TargetId,
    /// Secondary object the fault action referenced (e.g. the protective
    /// device that opened).  Informational pass-through.
    pub linked_breaker: Option<TargetId>,
    pub fail_at: SimTime,
    pub restore_at: SimTime,
    pub requested_kind: String,
    pub realized_kind: Option<FaultKindId>,
    pub affected_customers: i64,
    /// Only populated when secondary counting is enabled for the run.
    pub affected_customers_secondary: Option<i64>,
}

/// Narrow interface onto the statistics subsystem.
pub trait MetricsBridge {
    /// Customers currently interrupted, per the host's own bookkeeping.
    fn interrupted_count(&mut self) -> u32;

    /// `(primary, secondary)` interrupted counts.  Only called when the
    /// run has secondary counting enabled; the default covers bridges
    /// without secondary support.
    fn interrupted_count_secondary(&mut self) -> (u32, u32) {
        (self.interrupted_count(), 0)
    }

    /// A fault/restoration pair has completed.
    fn event_ended(&mut self, event: EndedEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat(u32);

    impl MetricsBridge for Flat {
        fn interrupted_count(&mut self) -> u32 {
            self.0
        }

        fn event_ended(&mut self, _event: EndedEvent) {}
    }

    #[test]
    fn default_secondary_mirrors_primary() {
        let mut b = Flat(7);
        assert_eq!(b.interrupted_count_secondary(), (7, 0));
    }
}
