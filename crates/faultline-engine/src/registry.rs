//! Target registry — which assets are subject to fault injection.
//!
//! Resolution happens once, at initialization, and produces one
//! [`TargetRecord`] per managed asset.  Group queries pull the population
//! from the host; manual schedules pin every instant verbatim.  No asset is
//! touched here — the dispatcher is the only component that acts on assets.

use log::warn;

use crate::config::TargetSelector;
use crate::error::EngineError;
use crate::target::{AssetSet, FaultKindId, TargetId};
use crate::time::{SimTime, SimTimeDelta};

/// Sentinel in `affected_customers*`: "compute via differential count once
/// all targets have reacted this tick".
pub const PENDING_CUSTOMER_COUNT: i64 = -1;

/// Per-asset scheduling state.  Created once; the instant fields are
/// recomputed continuously for the life of the run.
#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub target: TargetId,
    /// Secondary object passed through to the metrics bridge.
    pub linked_breaker: Option<TargetId>,
    pub fail_at: SimTime,
    /// `NEVER` while no fault is applied (random mode schedules the
    /// restoration only once the fault actually lands) and for open-ended
    /// manual faults.
    pub restore_at: SimTime,
    pub fail_duration: SimTimeDelta,
    pub restore_duration: SimTimeDelta,
    pub in_fault: bool,
    pub applied_fault_kind: Option<FaultKindId>,
    pub affected_customers: i64,
    pub affected_customers_secondary: i64,
}

impl TargetRecord {
    pub fn new(target: TargetId) -> TargetRecord {
        TargetRecord {
            target,
            linked_breaker: None,
            fail_at: SimTime::NEVER,
            restore_at: SimTime::NEVER,
            fail_duration: SimTimeDelta::ZERO,
            restore_duration: SimTimeDelta::ZERO,
            in_fault: false,
            applied_fault_kind: None,
            affected_customers: 0,
            affected_customers_secondary: 0,
        }
    }

    /// The instant this record next needs attention, if any.
    pub fn pending_instant(&self) -> SimTime {
        if self.in_fault {
            self.restore_at
        } else {
            self.fail_at
        }
    }
}

/// Resolve the selector into the managed record set.
///
/// Fatal on an empty group selection, a malformed manual schedule, manual
/// instants that violate the timing rules, or a selected asset that cannot
/// be faulted.
pub fn resolve(
    selector: &TargetSelector,
    assets: &AssetSet,
    start: SimTime,
    max_outage: SimTimeDelta,
) -> Result<Vec<TargetRecord>, EngineError> {
    match selector {
        TargetSelector::Group(query) => resolve_group(query, assets),
        TargetSelector::Manual(schedule) => resolve_manual(schedule, assets, start, max_outage),
    }
}

fn resolve_group(query: &str, assets: &AssetSet) -> Result<Vec<TargetRecord>, EngineError> {
    let ids = assets.find_group(query);
    if ids.is_empty() {
        return Err(EngineError::EmptySelection(query.to_string()));
    }
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        ensure_faultable(id, assets)?;
        records.push(TargetRecord::new(id));
    }
    Ok(records)
}

fn resolve_manual(
    schedule: &str,
    assets: &AssetSet,
    start: SimTime,
    max_outage: SimTimeDelta,
) -> Result<Vec<TargetRecord>, EngineError> {
    let tokens: Vec<&str> = schedule.split(',').map(str::trim).collect();
    if tokens.is_empty() || tokens.iter().all(|t| t.is_empty()) {
        return Err(EngineError::MalformedSchedule("empty schedule".into()));
    }
    if tokens.len() % 3 != 0 {
        return Err(EngineError::MalformedSchedule(format!(
            "{} tokens, expected target/fail/restore triples",
            tokens.len()
        )));
    }

    let mut records = Vec::with_capacity(tokens.len() / 3);
    for triple in tokens.chunks(3) {
        let (name, fail_tok, rest_tok) = (triple[0], triple[1], triple[2]);

        let id = assets.find_by_name(name).ok_or_else(|| {
            EngineError::MalformedSchedule(format!("unknown target {name:?}"))
        })?;
        ensure_faultable(id, assets)?;

        let fail_at = SimTime::parse(fail_tok).ok_or_else(|| {
            EngineError::MalformedSchedule(format!("bad fail time {fail_tok:?}"))
        })?;
        let restore_at = SimTime::parse(rest_tok).ok_or_else(|| {
            EngineError::MalformedSchedule(format!("bad restore time {rest_tok:?}"))
        })?;

        if fail_at.is_never() || fail_at <= start {
            return Err(EngineError::InvalidManualSchedule(format!(
                "fail time {fail_at} for {name:?} is not after run start {start}"
            )));
        }
        if !restore_at.is_never() && restore_at <= fail_at {
            return Err(EngineError::InvalidManualSchedule(format!(
                "restore time {restore_at} for {name:?} is not after its fail time {fail_at}"
            )));
        }

        let mut record = TargetRecord::new(id);
        record.fail_at = fail_at;
        record.fail_duration = fail_at - start;
        if restore_at.is_never() {
            // Open-ended: a separately submitted restoration closes it.
            record.restore_at = SimTime::NEVER;
        } else {
            let outage = restore_at - fail_at;
            if outage > max_outage {
                warn!(
                    "manual outage for {name:?} is {outage}, truncating to maximum {max_outage}"
                );
                record.restore_duration = max_outage;
                record.restore_at = fail_at + max_outage;
            } else {
                record.restore_duration = outage;
                record.restore_at = restore_at;
            }
        }
        records.push(record);
    }
    Ok(records)
}

fn ensure_faultable(id: TargetId, assets: &AssetSet) -> Result<(), EngineError> {
    if !assets.get(id).supports_faulting() {
        return Err(EngineError::TargetNotFaultable(
            assets.name_of(id).to_string(),
        ));
    }
    Ok(())
}
