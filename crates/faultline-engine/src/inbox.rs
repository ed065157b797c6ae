//! Unhandled-event inbox — externally submitted one-off events.
//!
//! Events arrive here through [`submit`](Inbox::submit) rather than the
//! regular per-target schedule: a protection study wants one specific
//! breaker to fail at one specific instant, or an external subsystem
//! reports a fault it has already applied and only needs restored.
//!
//! Records live in a slot arena with free-list reuse and generation-tagged
//! ids, so removal during dispatch can never invalidate a handle an outer
//! loop still holds.  Iteration order is newest-first; nothing outside this
//! module may rely on that beyond tie-breaking.

use log::{debug, warn};

use crate::target::{FaultKindId, TargetId};
use crate::time::{SimTime, SimTimeDelta};

/// Stable handle to an inbox record.  Survives arbitrary removals of other
/// records; goes stale (lookups return `None`) once its record is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId {
    slot: usize,
    gen: u32,
}

/// One externally submitted event.
#[derive(Debug, Clone)]
pub struct UnhandledEventRecord {
    pub target: TargetId,
    pub linked_breaker: Option<TargetId>,
    /// Fault kind requested on the capability call, overriding the
    /// module-level default.
    pub requested_fault_kind: String,
    pub fail_at: SimTime,
    pub restore_at: SimTime,
    /// `None` means open-ended: apply the fault and leave restoration to a
    /// later, separate submission.
    pub restore_duration: Option<SimTimeDelta>,
    pub in_fault: bool,
    pub applied_fault_kind: Option<FaultKindId>,
    pub affected_customers: i64,
    pub affected_customers_secondary: i64,
}

impl UnhandledEventRecord {
    /// The instant this record next needs attention, if any.
    pub fn pending_instant(&self) -> SimTime {
        if self.in_fault {
            self.restore_at
        } else {
            self.fail_at
        }
    }
}

struct Slot {
    gen: u32,
    record: Option<UnhandledEventRecord>,
}

/// Ordered collection of pending one-off events.
#[derive(Default)]
pub struct Inbox {
    slots: Vec<Slot>,
    free: Vec<usize>,
    /// Newest-first.
    order: Vec<EventId>,
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            gen: 0,
            record: None,
        }
    }
}

impl Inbox {
    pub fn new() -> Inbox {
        Inbox::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Submit a one-off event.
    ///
    /// Returns `None` when there is nothing for this engine to schedule:
    /// a fault that already happened externally and is open-ended needs
    /// neither application nor restoration here.
    pub fn submit(
        &mut self,
        target: TargetId,
        requested_fault_kind: &str,
        fail_at: SimTime,
        restore_duration: Option<SimTimeDelta>,
        starts_already_faulted: bool,
        granularity: SimTimeDelta,
    ) -> Option<EventId> {
        let restore_duration = restore_duration.map(|d| {
            if d < granularity {
                warn!(
                    "submitted restore duration {d} below minimum granularity {granularity}, rounding up"
                );
                granularity
            } else {
                d
            }
        });

        if starts_already_faulted && restore_duration.is_none() {
            debug!(
                "submitted event on target {} is already faulted and open-ended, nothing to schedule",
                target.index()
            );
            return None;
        }

        let restore_at = match restore_duration {
            Some(d) if starts_already_faulted => fail_at + d,
            // Scheduled faults get their restoration pinned when the fault
            // actually lands, not before.
            _ => SimTime::NEVER,
        };

        let record = UnhandledEventRecord {
            target,
            linked_breaker: None,
            requested_fault_kind: requested_fault_kind.to_string(),
            fail_at,
            restore_at,
            restore_duration,
            in_fault: starts_already_faulted,
            applied_fault_kind: None,
            // Differential attribution only applies to faults this engine
            // itself applies; externally applied ones get no pending mark.
            affected_customers: 0,
            affected_customers_secondary: 0,
        };
        Some(self.insert(record))
    }

    fn insert(&mut self, record: UnhandledEventRecord) -> EventId {
        let slot = match self.free.pop() {
            Some(i) => i,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        self.slots[slot].record = Some(record);
        let id = EventId {
            slot,
            gen: self.slots[slot].gen,
        };
        self.order.insert(0, id);
        id
    }

    pub fn get(&self, id: EventId) -> Option<&UnhandledEventRecord> {
        let slot = self.slots.get(id.slot)?;
        if slot.gen != id.gen {
            return None;
        }
        slot.record.as_ref()
    }

    pub fn get_mut(&mut self, id: EventId) -> Option<&mut UnhandledEventRecord> {
        let slot = self.slots.get_mut(id.slot)?;
        if slot.gen != id.gen {
            return None;
        }
        slot.record.as_mut()
    }

    /// Remove a record, bumping the slot generation so stale ids miss.
    pub fn remove(&mut self, id: EventId) -> Option<UnhandledEventRecord> {
        let slot = self.slots.get_mut(id.slot)?;
        if slot.gen != id.gen {
            return None;
        }
        let record = slot.record.take()?;
        slot.gen = slot.gen.wrapping_add(1);
        self.free.push(id.slot);
        self.order.retain(|o| *o != id);
        Some(record)
    }

    /// Snapshot of the ids in iteration order (newest first).  Safe to act
    /// on while removing records.
    pub fn ids(&self) -> Vec<EventId> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnhandledEventRecord> {
        self.order.iter().filter_map(|id| self.get(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRANULARITY: SimTimeDelta = SimTimeDelta::from_secs(1);

    fn submit_simple(inbox: &mut Inbox, at: i64) -> EventId {
        inbox
            .submit(
                TargetId(0),
                "SLG",
                SimTime::from_secs(at),
                Some(SimTimeDelta::from_secs(60)),
                false,
                GRANULARITY,
            )
            .unwrap()
    }

    #[test]
    fn iteration_is_newest_first() {
        let mut inbox = Inbox::new();
        submit_simple(&mut inbox, 100);
        submit_simple(&mut inbox, 200);
        submit_simple(&mut inbox, 300);
        let times: Vec<i64> = inbox.iter().map(|r| r.fail_at.secs()).collect();
        assert_eq!(times, vec![300, 200, 100]);
    }

    #[test]
    fn removed_ids_go_stale_and_slots_are_reused() {
        let mut inbox = Inbox::new();
        let a = submit_simple(&mut inbox, 100);
        let b = submit_simple(&mut inbox, 200);

        assert!(inbox.remove(a).is_some());
        assert!(inbox.get(a).is_none());
        assert!(inbox.remove(a).is_none());
        assert_eq!(inbox.len(), 1);

        // The freed slot is reused under a new generation.
        let c = submit_simple(&mut inbox, 300);
        assert!(inbox.get(a).is_none());
        assert!(inbox.get(c).is_some());
        assert!(inbox.get(b).is_some());
    }

    #[test]
    fn scheduled_event_has_no_restore_until_applied() {
        let mut inbox = Inbox::new();
        let id = submit_simple(&mut inbox, 100);
        let rec = inbox.get(id).unwrap();
        assert!(!rec.in_fault);
        assert!(rec.restore_at.is_never());
        assert_eq!(rec.restore_duration, Some(SimTimeDelta::from_secs(60)));
        assert_eq!(rec.pending_instant(), SimTime::from_secs(100));
    }

    #[test]
    fn already_faulted_event_schedules_only_the_restoration() {
        let mut inbox = Inbox::new();
        let id = inbox
            .submit(
                TargetId(1),
                "TLG",
                SimTime::from_secs(50),
                Some(SimTimeDelta::from_secs(30)),
                true,
                GRANULARITY,
            )
            .unwrap();
        let rec = inbox.get(id).unwrap();
        assert!(rec.in_fault);
        assert_eq!(rec.restore_at, SimTime::from_secs(80));
        assert_eq!(rec.pending_instant(), SimTime::from_secs(80));
        assert_eq!(rec.affected_customers, 0);
    }

    #[test]
    fn already_faulted_open_ended_is_not_stored() {
        let mut inbox = Inbox::new();
        let id = inbox.submit(
            TargetId(1),
            "TLG",
            SimTime::from_secs(50),
            None,
            true,
            GRANULARITY,
        );
        assert!(id.is_none());
        assert!(inbox.is_empty());
    }

    #[test]
    fn sub_granularity_restore_duration_rounds_up() {
        let mut inbox = Inbox::new();
        let id = inbox
            .submit(
                TargetId(0),
                "SLG",
                SimTime::from_secs(10),
                Some(SimTimeDelta::from_secs_f64(0.25)),
                true,
                GRANULARITY,
            )
            .unwrap();
        let rec = inbox.get(id).unwrap();
        assert_eq!(rec.restore_duration, Some(GRANULARITY));
        assert_eq!(rec.restore_at, SimTime::from_secs(11));
    }
}
