//! Event dispatcher — applies due failures and restorations.
//!
//! Runs once per tick (and once per sub-second micro-step in deltamode).
//! Enforces the concurrency cap, drives the target capability calls, and
//! runs the differential customer-count protocol against the metrics
//! bridge.
//!
//! Customer attribution cannot be read synchronously: a host tick may run
//! several evaluation passes before every asset has updated its own
//! "interrupted" flag.  So the dispatcher snapshots the interrupted count
//! immediately before the first fault it applies in a tick, marks the
//! affected records with a pending sentinel, and resolves the sentinel in a
//! separate end-of-tick pass ([`Dispatcher::finalize`]).

use log::warn;

use crate::config::SchedulerConfig;
use crate::distribution::Sampler;
use crate::error::EngineError;
use crate::inbox::Inbox;
use crate::metrics::{EndedEvent, MetricsBridge};
use crate::planner::{earliest_pending, sample_durations};
use crate::registry::{TargetRecord, PENDING_CUSTOMER_COUNT};
use crate::target::AssetSet;
use crate::time::SimTime;

pub struct Dispatcher {
    active_fault_count: usize,
    /// Whether the run tracks secondary interruption counts (decided once,
    /// from the first resolved asset).
    secondary_enabled: bool,
    /// Interrupted count snapshot taken before the first fault applied
    /// this tick; `None` until a fault is applied.
    base_interrupted: Option<u32>,
    base_interrupted_secondary: Option<u32>,
}

impl Dispatcher {
    pub fn new(secondary_enabled: bool) -> Dispatcher {
        Dispatcher {
            active_fault_count: 0,
            secondary_enabled,
            base_interrupted: None,
            base_interrupted_secondary: None,
        }
    }

    pub fn active_fault_count(&self) -> usize {
        self.active_fault_count
    }

    pub fn secondary_enabled(&self) -> bool {
        self.secondary_enabled
    }

    /// Forget any differential snapshot from the previous tick.
    pub fn begin_tick(&mut self) {
        self.base_interrupted = None;
        self.base_interrupted_secondary = None;
    }

    /// Apply everything due at or before `now` and return the new earliest
    /// pending instant.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch(
        &mut self,
        now: SimTime,
        records: &mut [TargetRecord],
        inbox: &mut Inbox,
        assets: &mut AssetSet,
        bridge: &mut dyn MetricsBridge,
        config: &SchedulerConfig,
        sampler: &mut Sampler,
    ) -> Result<SimTime, EngineError> {
        let manual = config.is_manual();

        for index in 0..records.len() {
            let record = &records[index];
            if !record.in_fault && record.fail_at <= now {
                if config.max_simultaneous_faults.allows(self.active_fault_count) {
                    self.snapshot_base(bridge);
                    let record = &mut records[index];
                    let name = assets.name_of(record.target).to_string();
                    let outcome = assets
                        .get_mut(record.target)
                        .create_fault(&config.fault_type)
                        .map_err(|e| EngineError::FaultInjectionFailed {
                            target: name,
                            reason: e.to_string(),
                        })?;
                    record.in_fault = true;
                    record.applied_fault_kind = Some(outcome.realized_kind);
                    record.affected_customers = PENDING_CUSTOMER_COUNT;
                    record.affected_customers_secondary = if self.secondary_enabled {
                        PENDING_CUSTOMER_COUNT
                    } else {
                        0
                    };
                    record.restore_at = now + record.restore_duration + outcome.mean_repair_time;
                    self.active_fault_count += 1;
                } else if manual {
                    // Manual schedules may legitimately exceed the cap;
                    // the event is user error and is not retried.
                    let record = &mut records[index];
                    warn!(
                        "concurrency cap reached, dropping manual fault on {} scheduled at {}",
                        assets.name_of(record.target),
                        record.fail_at
                    );
                    record.fail_at = SimTime::NEVER;
                    record.restore_at = SimTime::NEVER;
                } else {
                    // Deferred, not queued: try again at a fresh instant.
                    let (fail, rest) = sample_durations(sampler, config)?;
                    let record = &mut records[index];
                    record.fail_duration = fail;
                    record.restore_duration = rest;
                    record.fail_at = now + fail;
                }
            } else if record.in_fault && record.restore_at <= now {
                let record = &mut records[index];
                let name = assets.name_of(record.target).to_string();
                assets
                    .get_mut(record.target)
                    .fix_fault(record.applied_fault_kind)
                    .map_err(|e| EngineError::FaultRestorationFailed {
                        target: name,
                        reason: e.to_string(),
                    })?;

                bridge.event_ended(EndedEvent {
                    target: record.target,
                    linked_breaker: record.linked_breaker,
                    fail_at: record.fail_at,
                    restore_at: record.restore_at,
                    requested_kind: config.fault_type.clone(),
                    realized_kind: record.applied_fault_kind,
                    affected_customers: record.affected_customers,
                    affected_customers_secondary: self
                        .secondary_enabled
                        .then_some(record.affected_customers_secondary),
                });

                record.in_fault = false;
                record.applied_fault_kind = None;
                self.active_fault_count = self.active_fault_count.saturating_sub(1);

                if manual {
                    // One-shot.
                    record.fail_at = SimTime::NEVER;
                    record.restore_at = SimTime::NEVER;
                } else {
                    let (fail, rest) = sample_durations(sampler, config)?;
                    record.fail_duration = fail;
                    record.restore_duration = rest;
                    record.fail_at = now + fail;
                    record.restore_at = SimTime::NEVER;
                }
            }
        }

        self.dispatch_inbox(now, inbox, assets, bridge, config)?;

        // Re-assert the invariant instead of trusting the increments above:
        // deferred and dropped attempts make incremental counting brittle.
        self.active_fault_count = records.iter().filter(|r| r.in_fault).count()
            + inbox.iter().filter(|r| r.in_fault).count();

        Ok(earliest_pending(records, inbox))
    }

    fn dispatch_inbox(
        &mut self,
        now: SimTime,
        inbox: &mut Inbox,
        assets: &mut AssetSet,
        bridge: &mut dyn MetricsBridge,
        config: &SchedulerConfig,
    ) -> Result<(), EngineError> {
        for id in inbox.ids() {
            let Some(record) = inbox.get(id) else {
                continue;
            };

            if !record.in_fault && record.fail_at <= now {
                if !config.max_simultaneous_faults.allows(self.active_fault_count) {
                    // Submitted events are user-specified one-offs, like
                    // manual schedule entries: over the cap they are
                    // dropped, not retried.
                    warn!(
                        "concurrency cap reached, dropping submitted fault on {} scheduled at {}",
                        assets.name_of(record.target),
                        record.fail_at
                    );
                    inbox.remove(id);
                    continue;
                }
                self.snapshot_base(bridge);

                let target = record.target;
                let kind = record.requested_fault_kind.clone();
                let name = assets.name_of(target).to_string();
                let outcome = assets.get_mut(target).create_fault(&kind).map_err(|e| {
                    EngineError::FaultInjectionFailed {
                        target: name,
                        reason: e.to_string(),
                    }
                })?;

                let secondary_enabled = self.secondary_enabled;
                let record = inbox
                    .get_mut(id)
                    .expect("inbox record vanished during dispatch");
                record.in_fault = true;
                record.applied_fault_kind = Some(outcome.realized_kind);
                record.affected_customers = PENDING_CUSTOMER_COUNT;
                record.affected_customers_secondary = if secondary_enabled {
                    PENDING_CUSTOMER_COUNT
                } else {
                    0
                };
                record.restore_at = match record.restore_duration {
                    Some(d) => now + d + outcome.mean_repair_time,
                    // Open-ended: a later submission restores it.
                    None => SimTime::NEVER,
                };
                self.active_fault_count += 1;
            } else if record.in_fault && record.restore_at <= now {
                let target = record.target;
                let name = assets.name_of(target).to_string();
                assets
                    .get_mut(target)
                    .fix_fault(record.applied_fault_kind)
                    .map_err(|e| EngineError::FaultRestorationFailed {
                        target: name,
                        reason: e.to_string(),
                    })?;

                let record = inbox
                    .remove(id)
                    .expect("inbox record vanished during dispatch");
                bridge.event_ended(EndedEvent {
                    target: record.target,
                    linked_breaker: record.linked_breaker,
                    fail_at: record.fail_at,
                    restore_at: record.restore_at,
                    requested_kind: record.requested_fault_kind,
                    realized_kind: record.applied_fault_kind,
                    affected_customers: record.affected_customers,
                    affected_customers_secondary: self
                        .secondary_enabled
                        .then_some(record.affected_customers_secondary),
                });
                self.active_fault_count = self.active_fault_count.saturating_sub(1);
            }
        }
        Ok(())
    }

    /// Capture the "before" interrupted counts, once per tick, right before
    /// the first fault application.
    fn snapshot_base(&mut self, bridge: &mut dyn MetricsBridge) {
        if self.base_interrupted.is_some() {
            return;
        }
        if self.secondary_enabled {
            let (primary, secondary) = bridge.interrupted_count_secondary();
            self.base_interrupted = Some(primary);
            self.base_interrupted_secondary = Some(secondary);
        } else {
            self.base_interrupted = Some(bridge.interrupted_count());
        }
    }

    /// End-of-tick differential resolution.
    ///
    /// Reads the "after" counts, computes the differential against the
    /// snapshot, and writes it into every record still carrying the pending
    /// sentinel.  A negative differential means something restored
    /// concurrently; it is clamped to the after-count with a warning rather
    /// than letting a negative customer count escape.
    pub fn finalize(
        &mut self,
        records: &mut [TargetRecord],
        inbox: &mut Inbox,
        bridge: &mut dyn MetricsBridge,
    ) {
        let Some(base) = self.base_interrupted.take() else {
            return;
        };
        let base_secondary = self.base_interrupted_secondary.take();

        let (after, after_secondary) = if self.secondary_enabled {
            bridge.interrupted_count_secondary()
        } else {
            (bridge.interrupted_count(), 0)
        };

        let diff = resolve_differential(after, base, "primary");
        let diff_secondary =
            resolve_differential(after_secondary, base_secondary.unwrap_or(0), "secondary");

        for record in records.iter_mut() {
            if record.affected_customers == PENDING_CUSTOMER_COUNT {
                record.affected_customers = diff;
            }
            if record.affected_customers_secondary == PENDING_CUSTOMER_COUNT {
                record.affected_customers_secondary = diff_secondary;
            }
        }
        for id in inbox.ids() {
            if let Some(record) = inbox.get_mut(id) {
                if record.affected_customers == PENDING_CUSTOMER_COUNT {
                    record.affected_customers = diff;
                }
                if record.affected_customers_secondary == PENDING_CUSTOMER_COUNT {
                    record.affected_customers_secondary = diff_secondary;
                }
            }
        }
    }
}

fn resolve_differential(after: u32, base: u32, label: &str) -> i64 {
    let diff = after as i64 - base as i64;
    if diff < 0 {
        warn!(
            "negative {label} customer differential ({after} after vs {base} before), \
             using the after-count"
        );
        after as i64
    } else {
        diff
    }
}
