//! Reliability fault scheduling engine for power-system simulations.
//!
//! Generates, dispatches, and accounts for fault/restoration events against
//! a host-owned population of network assets.  The host drives everything;
//! this crate never owns a clock or a thread.
//!
//! The main components:
//!
//! 1. **[`time`]** — a single fixed-point instant type covering both
//!    whole-second and sub-second resolution
//! 2. **[`distribution`]** — seeded, deterministic duration sampling from
//!    the supported statistical families
//! 3. **[`registry`]** — resolving the managed target population from a
//!    group query or a verbatim manual schedule
//! 4. **[`planner`]** / **[`dispatcher`]** — deciding when events happen
//!    and making them happen, under the concurrency cap, with differential
//!    customer accounting through the [`metrics`] bridge
//! 5. **[`inbox`]** — externally submitted one-off events
//! 6. **[`engine`]** — the per-tick orchestrator the host talks to
//!
//! # Architecture
//!
//! ```text
//! Host loop                 Engine                       Assets
//! ─────────                 ──────                       ──────
//! tick(now)          ──→ plan / replan / dispatch ──→ create_fault()
//!                                                      fix_fault()
//! (evaluation passes)
//! finalize_tick()    ──→ differential customer counts ──→ MetricsBridge
//! delta_step(now)    ──→ sub-second dispatch
//! ```

pub mod config;
pub mod deltamode;
pub mod dispatcher;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod inbox;
pub mod metrics;
pub mod planner;
pub mod registry;
pub mod target;
pub mod time;
