//! Deltamode controller — whole-second vs sub-second resolution.
//!
//! The engine is event-driven at whole-second resolution until a pending
//! instant falls inside the current second; then it asks the host to drive
//! sub-second micro-steps until nothing remains before the next boundary.
//! The switch is purely advisory and cooperative: the engine never enters
//! sub-second mode on its own, it only reports through its return value
//! that it would like to.

use crate::time::SimTime;

/// Scheduling resolution the engine is currently operating at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Whole-second, event-driven: the host may jump straight to the next
    /// requested instant.
    EventDriven,
    /// Sub-second: the host supplies micro-steps and the engine dispatches
    /// at fractional resolution.
    SubSecond,
}

/// What the engine asks of the host after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeRequest {
    /// Wake no later than this instant (always on a whole-second
    /// boundary).
    At(SimTime),
    /// A pending instant falls inside the current second: drive sub-second
    /// micro-steps.
    SubSecond,
    /// Nothing pending anywhere.
    Never,
}

/// Verdict after a sub-second micro-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// More sub-second work remains before the next whole second.
    Stay,
    /// Done with this second; resume event-driven operation with the given
    /// wake request.
    BackToEventDriven(WakeRequest),
}

#[derive(Debug)]
pub struct DeltamodeController {
    mode: Mode,
}

impl Default for DeltamodeController {
    fn default() -> Self {
        DeltamodeController::new()
    }
}

impl DeltamodeController {
    pub fn new() -> DeltamodeController {
        DeltamodeController {
            mode: Mode::EventDriven,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Decide the wake request after an event-driven tick at `now`, given
    /// the earliest pending instant.
    ///
    /// Sub-second mode is requested exactly when that instant lies strictly
    /// before the upcoming whole-second boundary.  An instant sitting
    /// exactly on the boundary is a whole-second event and gets a regular
    /// wake, never sub-second stepping.  A pending instant with a
    /// fractional component in a *later* second first gets a whole-second
    /// wake at its floor, and the request is made once that second is
    /// reached.
    pub fn assess(&mut self, now: SimTime, next: SimTime) -> WakeRequest {
        if next.is_never() {
            self.mode = Mode::EventDriven;
            return WakeRequest::Never;
        }
        if next < now.next_whole_second() {
            self.mode = Mode::SubSecond;
            return WakeRequest::SubSecond;
        }
        self.mode = Mode::EventDriven;
        WakeRequest::At(SimTime::from_secs(next.secs()))
    }

    /// Decide whether to stay in sub-second mode after a micro-step at
    /// `now`, given the earliest pending instant.
    pub fn after_delta_step(&mut self, now: SimTime, next: SimTime) -> DeltaOutcome {
        if !next.is_never() && next < now.next_whole_second() {
            self.mode = Mode::SubSecond;
            return DeltaOutcome::Stay;
        }
        self.mode = Mode::EventDriven;
        let wake = if next.is_never() {
            WakeRequest::Never
        } else {
            WakeRequest::At(SimTime::from_secs(next.secs()))
        };
        DeltaOutcome::BackToEventDriven(wake)
    }
}
