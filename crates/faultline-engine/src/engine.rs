//! The reliability event engine — the central orchestrator.
//!
//! [`Engine`] combines the target registry, schedule planner, event
//! dispatcher, unhandled-event inbox, and deltamode controller into one
//! coordinator driven by the host simulation loop.
//!
//! # Host contract
//!
//! Single-threaded and cooperative.  Once per tick, in order:
//!
//! 1. [`Engine::tick`] with the current instant — plans on the first call,
//!    picks up live distribution changes, applies everything due, and
//!    returns a [`WakeRequest`];
//! 2. the host runs its own evaluation passes (assets update their own
//!    interruption state);
//! 3. [`Engine::finalize_tick`] — resolves pending differential customer
//!    counts.
//!
//! When `tick` returns [`WakeRequest::SubSecond`], the host drives
//! [`Engine::delta_step`] micro-steps until the engine reports it is done
//! with the current second.  [`Engine::submit_event`] may be called between
//! ticks at any point.

use crate::config::SchedulerConfig;
use crate::deltamode::{DeltaOutcome, DeltamodeController, Mode, WakeRequest};
use crate::dispatcher::Dispatcher;
use crate::distribution::Sampler;
use crate::error::EngineError;
use crate::inbox::{EventId, Inbox};
use crate::metrics::MetricsBridge;
use crate::planner::Planner;
use crate::registry::{self, TargetRecord};
use crate::target::{AssetSet, TargetId};
use crate::time::{SimTime, SimTimeDelta};

/// Host-level knobs that are not part of the scheduling configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Master seed for deterministic duration sampling.
    pub seed: u64,
    /// Minimum scheduling granularity; sampled durations below it are
    /// rounded up.
    pub granularity: SimTimeDelta,
    /// Run start instant; manual schedules must fail strictly after it.
    pub start: SimTime,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            seed: 42,
            granularity: SimTimeDelta::from_secs(1),
            start: SimTime::ZERO,
        }
    }
}

/// The reliability fault/restoration scheduling engine.
pub struct Engine {
    config: SchedulerConfig,
    records: Vec<TargetRecord>,
    inbox: Inbox,
    assets: AssetSet,
    bridge: Box<dyn MetricsBridge>,
    sampler: Sampler,
    planner: Planner,
    dispatcher: Dispatcher,
    deltamode: DeltamodeController,
}

impl Engine {
    /// Validate the configuration, resolve the target population, and
    /// build the engine.  Refuses to start on any configuration error —
    /// running with undefined schedules is worse than not running.
    pub fn new(
        config: SchedulerConfig,
        assets: AssetSet,
        bridge: Box<dyn MetricsBridge>,
        options: EngineOptions,
    ) -> Result<Engine, EngineError> {
        config.validate()?;
        let records = registry::resolve(
            &config.selector,
            &assets,
            options.start,
            config.max_outage_duration,
        )?;

        // Secondary interruption counting is a run-wide flag decided by
        // the first resolved asset.
        let secondary = records
            .first()
            .map(|r| assets.get(r.target).supports_secondary_interruption())
            .unwrap_or(false);

        let planner = Planner::new(&config);
        Ok(Engine {
            sampler: Sampler::new(options.seed, options.granularity),
            dispatcher: Dispatcher::new(secondary),
            deltamode: DeltamodeController::new(),
            planner,
            records,
            inbox: Inbox::new(),
            assets,
            bridge,
            config,
        })
    }

    /// One whole-second scheduler tick.
    pub fn tick(&mut self, now: SimTime) -> Result<WakeRequest, EngineError> {
        self.dispatcher.begin_tick();

        if !self.planner.is_planned() {
            self.planner.plan_initial(
                now,
                &mut self.records,
                &self.inbox,
                &self.config,
                &mut self.sampler,
            )?;
        }

        self.planner.replan_if_config_changed(
            now,
            &mut self.records,
            &self.inbox,
            &self.config,
            &mut self.sampler,
        )?;

        if self.planner.next_event_time() <= now {
            let next = self.dispatcher.dispatch(
                now,
                &mut self.records,
                &mut self.inbox,
                &mut self.assets,
                &mut *self.bridge,
                &self.config,
                &mut self.sampler,
            )?;
            self.planner.set_next_event_time(next);
        }

        Ok(self.deltamode.assess(now, self.planner.next_event_time()))
    }

    /// End-of-tick pass: resolve pending differential customer counts.
    /// Call after the host's own evaluation passes have settled.
    pub fn finalize_tick(&mut self) {
        self.dispatcher
            .finalize(&mut self.records, &mut self.inbox, &mut *self.bridge);
    }

    /// One sub-second micro-step.  Only meaningful after the engine has
    /// requested [`WakeRequest::SubSecond`].
    ///
    /// Customer counts left pending by an earlier micro-step are resolved
    /// against the bridge's current figures before anything is dispatched,
    /// so a restoration dispatched here always reports a resolved count
    /// even when its fault landed in the same second.
    pub fn delta_step(&mut self, now: SimTime) -> Result<DeltaOutcome, EngineError> {
        self.dispatcher
            .finalize(&mut self.records, &mut self.inbox, &mut *self.bridge);
        let next = self.dispatcher.dispatch(
            now,
            &mut self.records,
            &mut self.inbox,
            &mut self.assets,
            &mut *self.bridge,
            &self.config,
            &mut self.sampler,
        )?;
        self.planner.set_next_event_time(next);
        Ok(self.deltamode.after_delta_step(now, next))
    }

    /// Submit an ad hoc one-off event outside the regular schedule.
    ///
    /// Returns `Ok(None)` when there is nothing to schedule (an externally
    /// applied, open-ended fault).
    pub fn submit_event(
        &mut self,
        target: TargetId,
        requested_fault_kind: &str,
        fail_at: SimTime,
        restore_duration: Option<SimTimeDelta>,
        starts_already_faulted: bool,
    ) -> Result<Option<EventId>, EngineError> {
        if target.index() >= self.assets.len() {
            return Err(EngineError::UnknownTarget(format!(
                "target index {}",
                target.index()
            )));
        }
        let id = self.inbox.submit(
            target,
            requested_fault_kind,
            fail_at,
            restore_duration,
            starts_already_faulted,
            self.sampler.granularity(),
        );
        if let Some(id) = id {
            if let Some(record) = self.inbox.get(id) {
                let next = self.planner.next_event_time().min(record.pending_instant());
                self.planner.set_next_event_time(next);
            }
        }
        Ok(id)
    }

    /// Resolve an asset name to a target handle.
    pub fn find_target(&self, name: &str) -> Option<TargetId> {
        self.assets.find_by_name(name)
    }

    /// Live configuration access.  Only the distribution specs are
    /// expected to change mid-run; the next tick picks the change up.
    pub fn config_mut(&mut self) -> &mut SchedulerConfig {
        &mut self.config
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn next_event_time(&self) -> SimTime {
        self.planner.next_event_time()
    }

    pub fn active_fault_count(&self) -> usize {
        self.dispatcher.active_fault_count()
    }

    pub fn mode(&self) -> Mode {
        self.deltamode.mode()
    }

    pub fn records(&self) -> &[TargetRecord] {
        &self.records
    }

    pub fn pending_submitted_events(&self) -> usize {
        self.inbox.len()
    }
}
