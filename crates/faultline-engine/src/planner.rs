//! Schedule planner — when everything next happens.
//!
//! Owns `next_event_time`, the single earliest pending instant across all
//! target records and inbox entries, and the re-planning policy for live
//! distribution changes.  Re-planning is synchronous: it happens inside the
//! tick that first observes the changed configuration, never in the
//! background.

use log::debug;

use crate::config::SchedulerConfig;
use crate::distribution::{DistributionSpec, Sampler};
use crate::error::EngineError;
use crate::inbox::Inbox;
use crate::registry::TargetRecord;
use crate::time::{SimTime, SimTimeDelta};

/// Draw one failure/restoration duration pair, with the restoration capped
/// at the configured maximum outage length before any instant is computed
/// from it.
pub fn sample_durations(
    sampler: &mut Sampler,
    config: &SchedulerConfig,
) -> Result<(SimTimeDelta, SimTimeDelta), EngineError> {
    let fail = sampler.sample(&config.failure_dist)?;
    let mut rest = sampler.sample(&config.restore_dist)?;
    if rest > config.max_outage_duration {
        rest = config.max_outage_duration;
    }
    Ok((fail, rest))
}

/// The earliest pending instant across records and inbox entries.
///
/// Records are scanned before inbox entries, but ordering between
/// simultaneous instants is an artifact of traversal, not a contract.
pub fn earliest_pending(records: &[TargetRecord], inbox: &Inbox) -> SimTime {
    let mut next = SimTime::NEVER;
    for record in records {
        next = next.min(record.pending_instant());
    }
    for entry in inbox.iter() {
        next = next.min(entry.pending_instant());
    }
    next
}

pub struct Planner {
    /// Owned snapshot of the distribution specs last applied, compared
    /// field by field each tick to detect live reconfiguration.
    last_failure_dist: DistributionSpec,
    last_restore_dist: DistributionSpec,
    next_event_time: SimTime,
    planned: bool,
}

impl Planner {
    pub fn new(config: &SchedulerConfig) -> Planner {
        Planner {
            last_failure_dist: config.failure_dist,
            last_restore_dist: config.restore_dist,
            next_event_time: SimTime::NEVER,
            planned: false,
        }
    }

    pub fn next_event_time(&self) -> SimTime {
        self.next_event_time
    }

    pub fn set_next_event_time(&mut self, next: SimTime) {
        self.next_event_time = next;
    }

    pub fn is_planned(&self) -> bool {
        self.planned
    }

    /// First-tick planning.
    ///
    /// Random mode samples both durations per record and schedules the
    /// first failures; restorations stay `NEVER` until a fault actually
    /// lands.  Manual mode already carries its instants from resolution.
    /// The minimum is folded over records *and* inbox entries — events may
    /// legitimately be submitted before the first tick.
    pub fn plan_initial(
        &mut self,
        now: SimTime,
        records: &mut [TargetRecord],
        inbox: &Inbox,
        config: &SchedulerConfig,
        sampler: &mut Sampler,
    ) -> Result<(), EngineError> {
        if !config.is_manual() {
            for record in records.iter_mut() {
                let (fail, rest) = sample_durations(sampler, config)?;
                record.fail_duration = fail;
                record.restore_duration = rest;
                record.fail_at = now + fail;
                record.restore_at = SimTime::NEVER;
            }
        }
        self.next_event_time = earliest_pending(records, inbox);
        self.planned = true;
        Ok(())
    }

    /// Pick up a live distribution change.
    ///
    /// Every record *not* currently in fault is resampled from scratch;
    /// records in fault keep their authoritative `restore_at`.  The global
    /// `next_event_time` is then recomputed over all records and inbox
    /// entries, so events pending from before the change are not forgotten.
    /// Idempotent when nothing changed; a silent no-op in manual mode.
    pub fn replan_if_config_changed(
        &mut self,
        now: SimTime,
        records: &mut [TargetRecord],
        inbox: &Inbox,
        config: &SchedulerConfig,
        sampler: &mut Sampler,
    ) -> Result<bool, EngineError> {
        if config.is_manual() {
            return Ok(false);
        }
        if config.failure_dist == self.last_failure_dist
            && config.restore_dist == self.last_restore_dist
        {
            return Ok(false);
        }

        self.last_failure_dist = config.failure_dist;
        self.last_restore_dist = config.restore_dist;
        debug!("distribution parameters changed, re-planning all idle targets");

        for record in records.iter_mut() {
            if record.in_fault {
                continue;
            }
            let (fail, rest) = sample_durations(sampler, config)?;
            record.fail_duration = fail;
            record.restore_duration = rest;
            record.fail_at = now + fail;
            record.restore_at = SimTime::NEVER;
        }

        self.next_event_time = earliest_pending(records, inbox);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetSelector;
    use crate::distribution::DistributionKind;
    use crate::target::TargetId;

    fn random_config(failure: DistributionSpec) -> SchedulerConfig {
        SchedulerConfig {
            failure_dist: failure,
            ..SchedulerConfig::default()
        }
    }

    fn records(n: usize) -> Vec<TargetRecord> {
        (0..n).map(|i| TargetRecord::new(TargetId(i))).collect()
    }

    #[test]
    fn initial_plan_schedules_failures_after_now() {
        let config = SchedulerConfig::default();
        let mut sampler = Sampler::new(42, SimTimeDelta::from_secs(1));
        let mut planner = Planner::new(&config);
        let mut recs = records(4);
        let now = SimTime::from_secs(1000);

        planner
            .plan_initial(now, &mut recs, &Inbox::new(), &config, &mut sampler)
            .unwrap();

        for r in &recs {
            assert!(r.fail_at > now);
            assert!(r.restore_at.is_never());
            assert!(!r.fail_duration.is_zero());
        }
        let expected = recs.iter().map(|r| r.fail_at).min().unwrap();
        assert_eq!(planner.next_event_time(), expected);
        assert!(planner.is_planned());
    }

    #[test]
    fn initial_plan_manual_mode_keeps_resolved_instants() {
        let config = SchedulerConfig {
            selector: TargetSelector::Manual(String::new()),
            ..SchedulerConfig::default()
        };
        let mut sampler = Sampler::new(42, SimTimeDelta::from_secs(1));
        let mut planner = Planner::new(&config);
        let mut recs = records(2);
        recs[0].fail_at = SimTime::from_secs(500);
        recs[1].fail_at = SimTime::from_secs(300);

        planner
            .plan_initial(SimTime::ZERO, &mut recs, &Inbox::new(), &config, &mut sampler)
            .unwrap();

        assert_eq!(recs[0].fail_at, SimTime::from_secs(500));
        assert_eq!(planner.next_event_time(), SimTime::from_secs(300));
    }

    #[test]
    fn initial_plan_sees_events_submitted_before_it() {
        let config = SchedulerConfig {
            selector: TargetSelector::Manual(String::new()),
            ..SchedulerConfig::default()
        };
        let mut sampler = Sampler::new(42, SimTimeDelta::from_secs(1));
        let mut planner = Planner::new(&config);
        let mut recs = records(1);
        recs[0].fail_at = SimTime::from_secs(100);
        let mut inbox = Inbox::new();
        inbox.submit(
            TargetId(0),
            "SLG",
            SimTime::from_secs(50),
            Some(SimTimeDelta::from_secs(10)),
            false,
            SimTimeDelta::from_secs(1),
        );

        planner
            .plan_initial(SimTime::ZERO, &mut recs, &inbox, &config, &mut sampler)
            .unwrap();

        assert_eq!(planner.next_event_time(), SimTime::from_secs(50));
    }

    #[test]
    fn replan_is_idempotent_when_nothing_changed() {
        let config = SchedulerConfig::default();
        let mut sampler = Sampler::new(7, SimTimeDelta::from_secs(1));
        let mut planner = Planner::new(&config);
        let mut recs = records(3);
        let inbox = Inbox::new();
        planner
            .plan_initial(SimTime::ZERO, &mut recs, &inbox, &config, &mut sampler)
            .unwrap();

        let before: Vec<SimTime> = recs.iter().map(|r| r.fail_at).collect();
        let next_before = planner.next_event_time();

        for _ in 0..2 {
            let changed = planner
                .replan_if_config_changed(SimTime::ZERO, &mut recs, &inbox, &config, &mut sampler)
                .unwrap();
            assert!(!changed);
        }

        let after: Vec<SimTime> = recs.iter().map(|r| r.fail_at).collect();
        assert_eq!(before, after);
        assert_eq!(planner.next_event_time(), next_before);
    }

    #[test]
    fn replan_is_a_no_op_in_manual_mode() {
        let mut config = SchedulerConfig {
            selector: TargetSelector::Manual(String::new()),
            ..SchedulerConfig::default()
        };
        let mut sampler = Sampler::new(7, SimTimeDelta::from_secs(1));
        let mut planner = Planner::new(&config);
        let mut recs = records(1);
        recs[0].fail_at = SimTime::from_secs(900);
        let inbox = Inbox::new();

        config.failure_dist = DistributionSpec::new(DistributionKind::Exponential, 1.0 / 60.0, 0.0);
        let changed = planner
            .replan_if_config_changed(SimTime::ZERO, &mut recs, &inbox, &config, &mut sampler)
            .unwrap();
        assert!(!changed);
        assert_eq!(recs[0].fail_at, SimTime::from_secs(900));
    }

    #[test]
    fn faster_failure_rate_pulls_schedules_in() {
        // 30-day MTTF swapped mid-run for a 60-second MTTF.
        let mut config = random_config(DistributionSpec::new(
            DistributionKind::Exponential,
            1.0 / 2_592_000.0,
            0.0,
        ));
        let mut sampler = Sampler::new(99, SimTimeDelta::from_secs(1));
        let mut planner = Planner::new(&config);
        let mut recs = records(5);
        let inbox = Inbox::new();
        let now = SimTime::from_secs(10_000);
        planner
            .plan_initial(now, &mut recs, &inbox, &config, &mut sampler)
            .unwrap();

        config.failure_dist = DistributionSpec::new(DistributionKind::Exponential, 1.0 / 60.0, 0.0);
        let changed = planner
            .replan_if_config_changed(now, &mut recs, &inbox, &config, &mut sampler)
            .unwrap();
        assert!(changed);

        for r in &recs {
            assert!(r.fail_at > now);
            // With a 60 s mean, a day-long draw is astronomically unlikely.
            assert!((r.fail_at - now) < SimTimeDelta::from_secs(86_400));
        }
    }

    #[test]
    fn replan_leaves_faulted_records_alone_and_scans_everything() {
        let mut config = SchedulerConfig::default();
        let mut sampler = Sampler::new(3, SimTimeDelta::from_secs(1));
        let mut planner = Planner::new(&config);
        let mut recs = records(2);
        let mut inbox = Inbox::new();
        planner
            .plan_initial(SimTime::ZERO, &mut recs, &inbox, &config, &mut sampler)
            .unwrap();

        recs[0].in_fault = true;
        recs[0].restore_at = SimTime::from_secs(50);
        inbox.submit(
            TargetId(5),
            "SLG",
            SimTime::from_secs(20),
            Some(SimTimeDelta::from_secs(60)),
            false,
            SimTimeDelta::from_secs(1),
        );

        config.failure_dist = DistributionSpec::new(DistributionKind::Exponential, 1.0 / 3600.0, 0.0);
        planner
            .replan_if_config_changed(
                SimTime::from_secs(10),
                &mut recs,
                &inbox,
                &config,
                &mut sampler,
            )
            .unwrap();

        // Faulted record untouched, its restoration still authoritative.
        assert!(recs[0].in_fault);
        assert_eq!(recs[0].restore_at, SimTime::from_secs(50));
        // The recomputed minimum saw the inbox entry at t=20.
        assert!(planner.next_event_time() <= SimTime::from_secs(20));
    }

    #[test]
    fn restore_duration_capped_at_max_outage() {
        let config = SchedulerConfig {
            restore_dist: DistributionSpec::new(DistributionKind::Uniform, 1000.0, 2000.0),
            max_outage_duration: SimTimeDelta::from_secs(500),
            ..SchedulerConfig::default()
        };
        let mut sampler = Sampler::new(11, SimTimeDelta::from_secs(1));
        for _ in 0..16 {
            let (_, rest) = sample_durations(&mut sampler, &config).unwrap();
            assert_eq!(rest, SimTimeDelta::from_secs(500));
        }
    }

    #[test]
    fn earliest_pending_spans_records_and_inbox() {
        let mut recs = records(2);
        recs[0].fail_at = SimTime::from_secs(400);
        recs[1].in_fault = true;
        recs[1].restore_at = SimTime::from_secs(250);
        let mut inbox = Inbox::new();
        inbox.submit(
            TargetId(9),
            "SLG",
            SimTime::from_secs(150),
            Some(SimTimeDelta::from_secs(60)),
            false,
            SimTimeDelta::from_secs(1),
        );

        assert_eq!(earliest_pending(&recs, &inbox), SimTime::from_secs(150));
        assert_eq!(earliest_pending(&recs, &Inbox::new()), SimTime::from_secs(250));
        assert_eq!(earliest_pending(&[], &Inbox::new()), SimTime::NEVER);
    }
}
