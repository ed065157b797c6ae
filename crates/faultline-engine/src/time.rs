//! Simulation time — one fixed-point representation for both resolutions.
//!
//! The engine runs at whole-second resolution most of the time and drops to
//! sub-second resolution only while a pending instant falls inside the
//! current second.  Both resolutions share a single [`SimTime`] type
//! (seconds plus a nanosecond fraction) so there is no parallel clock to
//! drift out of sync.  A sentinel value, [`SimTime::NEVER`], stands for
//! "no pending instant" and is sticky under arithmetic.

use std::fmt;
use std::ops::{Add, Sub};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A simulation instant: whole seconds since the host epoch plus a
/// nanosecond fraction in `[0, 1s)`.
///
/// Ordering is total; `NEVER` compares greater than every real instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime {
    secs: i64,
    nanos: u32,
}

impl SimTime {
    /// Sentinel for "no pending instant".
    pub const NEVER: SimTime = SimTime {
        secs: i64::MAX,
        nanos: 0,
    };

    /// The host epoch.
    pub const ZERO: SimTime = SimTime { secs: 0, nanos: 0 };

    /// An instant on a whole-second boundary.
    pub const fn from_secs(secs: i64) -> SimTime {
        SimTime { secs, nanos: 0 }
    }

    /// An instant with a sub-second component.  `nanos` must be below one
    /// second; excess is carried into the seconds field.
    pub fn new(secs: i64, nanos: u32) -> SimTime {
        SimTime {
            secs: secs + (nanos / NANOS_PER_SEC) as i64,
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    pub const fn is_never(self) -> bool {
        self.secs == i64::MAX
    }

    pub const fn secs(self) -> i64 {
        self.secs
    }

    pub const fn subsec_nanos(self) -> u32 {
        self.nanos
    }

    /// True when this instant sits exactly on a whole-second boundary.
    pub const fn is_whole_second(self) -> bool {
        self.nanos == 0
    }

    /// The first whole-second boundary strictly after this instant.
    pub fn next_whole_second(self) -> SimTime {
        if self.is_never() {
            return SimTime::NEVER;
        }
        SimTime::from_secs(self.secs.saturating_add(1))
    }

    /// Parse a timestamp literal from a manual schedule: either the host's
    /// standard `YYYY-MM-DD HH:MM:SS` syntax or bare epoch seconds.  The
    /// literal `NEVER` parses to the sentinel.
    pub fn parse(token: &str) -> Option<SimTime> {
        let token = token.trim();
        if token == "NEVER" {
            return Some(SimTime::NEVER);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(token, "%Y-%m-%d %H:%M:%S") {
            return Some(SimTime::from_secs(dt.and_utc().timestamp()));
        }
        token.parse::<i64>().ok().map(SimTime::from_secs)
    }
}

impl Add<SimTimeDelta> for SimTime {
    type Output = SimTime;

    /// Saturating: `NEVER + d == NEVER`, and overflow pins to `NEVER`.
    fn add(self, rhs: SimTimeDelta) -> SimTime {
        if self.is_never() {
            return SimTime::NEVER;
        }
        let mut nanos = self.nanos + rhs.nanos;
        let mut secs = match self.secs.checked_add(rhs.secs) {
            Some(s) => s,
            None => return SimTime::NEVER,
        };
        if nanos >= NANOS_PER_SEC {
            nanos -= NANOS_PER_SEC;
            secs = match secs.checked_add(1) {
                Some(s) => s,
                None => return SimTime::NEVER,
            };
        }
        if secs == i64::MAX {
            return SimTime::NEVER;
        }
        SimTime { secs, nanos }
    }
}

impl Sub for SimTime {
    type Output = SimTimeDelta;

    /// Elapsed time between two real instants.  Callers must order the
    /// operands; the result is clamped at zero.
    fn sub(self, rhs: SimTime) -> SimTimeDelta {
        if self <= rhs {
            return SimTimeDelta::ZERO;
        }
        let (mut secs, nanos) = if self.nanos >= rhs.nanos {
            (self.secs - rhs.secs, self.nanos - rhs.nanos)
        } else {
            (self.secs - rhs.secs - 1, NANOS_PER_SEC + self.nanos - rhs.nanos)
        };
        if secs < 0 {
            secs = 0;
        }
        SimTimeDelta { secs, nanos }
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            write!(f, "NEVER")
        } else if self.nanos == 0 {
            write!(f, "{}s", self.secs)
        } else {
            write!(f, "{}.{:09}s", self.secs, self.nanos)
        }
    }
}

/// A non-negative span of simulation time, same representation as
/// [`SimTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTimeDelta {
    secs: i64,
    nanos: u32,
}

impl SimTimeDelta {
    pub const ZERO: SimTimeDelta = SimTimeDelta { secs: 0, nanos: 0 };

    pub const fn from_secs(secs: i64) -> SimTimeDelta {
        SimTimeDelta { secs, nanos: 0 }
    }

    /// Convert a sampled duration in seconds, rounding to whole nanoseconds.
    /// Negative inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> SimTimeDelta {
        if !secs.is_finite() || secs <= 0.0 {
            return SimTimeDelta::ZERO;
        }
        let whole = secs.trunc();
        let frac = ((secs - whole) * NANOS_PER_SEC as f64).round() as u32;
        if whole >= i64::MAX as f64 {
            return SimTimeDelta {
                secs: i64::MAX - 1,
                nanos: 0,
            };
        }
        let mut secs = whole as i64;
        let mut nanos = frac;
        if nanos >= NANOS_PER_SEC {
            nanos -= NANOS_PER_SEC;
            secs += 1;
        }
        SimTimeDelta { secs, nanos }
    }

    pub const fn secs(self) -> i64 {
        self.secs
    }

    pub const fn subsec_nanos(self) -> u32 {
        self.nanos
    }

    pub fn as_secs_f64(self) -> f64 {
        self.secs as f64 + self.nanos as f64 / NANOS_PER_SEC as f64
    }

    pub const fn is_zero(self) -> bool {
        self.secs == 0 && self.nanos == 0
    }

    /// Round up to the next multiple of `step`, so durations land on the
    /// host's scheduling grid.  Already aligned values (and a zero step)
    /// come back unchanged.
    pub fn round_up_to(self, step: SimTimeDelta) -> SimTimeDelta {
        if step.is_zero() {
            return self;
        }
        let total = self.as_nanos();
        let step_nanos = step.as_nanos();
        let rem = total % step_nanos;
        if rem == 0 {
            return self;
        }
        SimTimeDelta::from_nanos(total - rem + step_nanos)
    }

    const fn as_nanos(self) -> i128 {
        self.secs as i128 * NANOS_PER_SEC as i128 + self.nanos as i128
    }

    const fn from_nanos(nanos: i128) -> SimTimeDelta {
        SimTimeDelta {
            secs: (nanos / NANOS_PER_SEC as i128) as i64,
            nanos: (nanos % NANOS_PER_SEC as i128) as u32,
        }
    }
}

impl Add for SimTimeDelta {
    type Output = SimTimeDelta;

    fn add(self, rhs: SimTimeDelta) -> SimTimeDelta {
        let mut nanos = self.nanos + rhs.nanos;
        let mut secs = self.secs.saturating_add(rhs.secs);
        if nanos >= NANOS_PER_SEC {
            nanos -= NANOS_PER_SEC;
            secs = secs.saturating_add(1);
        }
        SimTimeDelta { secs, nanos }
    }
}

impl fmt::Display for SimTimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            write!(f, "{}s", self.secs)
        } else {
            write!(f, "{}.{:09}s", self.secs, self.nanos)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_total_with_never_last() {
        let a = SimTime::from_secs(10);
        let b = SimTime::new(10, 500_000_000);
        let c = SimTime::from_secs(11);
        assert!(a < b);
        assert!(b < c);
        assert!(c < SimTime::NEVER);
    }

    #[test]
    fn never_is_sticky_under_addition() {
        let d = SimTimeDelta::from_secs(60);
        assert_eq!(SimTime::NEVER + d, SimTime::NEVER);
    }

    #[test]
    fn addition_carries_subsecond_overflow() {
        let t = SimTime::new(5, 700_000_000);
        let d = SimTimeDelta::from_secs_f64(0.5);
        let sum = t + d;
        assert_eq!(sum.secs(), 6);
        assert_eq!(sum.subsec_nanos(), 200_000_000);
    }

    #[test]
    fn subtraction_yields_elapsed_delta() {
        let start = SimTime::from_secs(10);
        let end = SimTime::new(40, 250_000_000);
        let d = end - start;
        assert_eq!(d.secs(), 30);
        assert_eq!(d.subsec_nanos(), 250_000_000);

        // Borrow across the second boundary
        let d = SimTime::new(41, 100_000_000) - SimTime::new(40, 900_000_000);
        assert_eq!(d.secs(), 0);
        assert_eq!(d.subsec_nanos(), 200_000_000);
    }

    #[test]
    fn subtraction_clamps_at_zero() {
        let d = SimTime::from_secs(5) - SimTime::from_secs(9);
        assert_eq!(d, SimTimeDelta::ZERO);
    }

    #[test]
    fn parse_datetime_literal() {
        let t = SimTime::parse("2000-01-01 00:00:10").unwrap();
        let t0 = SimTime::parse("2000-01-01 00:00:00").unwrap();
        assert_eq!((t - t0).secs(), 10);
    }

    #[test]
    fn parse_epoch_seconds_and_never() {
        assert_eq!(SimTime::parse("12345"), Some(SimTime::from_secs(12345)));
        assert_eq!(SimTime::parse("NEVER"), Some(SimTime::NEVER));
        assert_eq!(SimTime::parse("not a time"), None);
    }

    #[test]
    fn from_secs_f64_rounds_to_nanos() {
        let d = SimTimeDelta::from_secs_f64(1.5);
        assert_eq!(d.secs(), 1);
        assert_eq!(d.subsec_nanos(), 500_000_000);

        assert_eq!(SimTimeDelta::from_secs_f64(-3.0), SimTimeDelta::ZERO);
        assert_eq!(SimTimeDelta::from_secs_f64(f64::NAN), SimTimeDelta::ZERO);
    }

    #[test]
    fn next_whole_second_boundary() {
        assert_eq!(
            SimTime::new(7, 1).next_whole_second(),
            SimTime::from_secs(8)
        );
        assert_eq!(
            SimTime::from_secs(7).next_whole_second(),
            SimTime::from_secs(8)
        );
        assert_eq!(SimTime::NEVER.next_whole_second(), SimTime::NEVER);
    }

    #[test]
    fn round_up_to_grid() {
        let step = SimTimeDelta::from_secs(1);
        assert_eq!(
            SimTimeDelta::from_secs_f64(43.7).round_up_to(step),
            SimTimeDelta::from_secs(44)
        );
        assert_eq!(
            SimTimeDelta::from_secs(44).round_up_to(step),
            SimTimeDelta::from_secs(44)
        );
        let ms = SimTimeDelta::from_secs_f64(0.001);
        assert_eq!(
            SimTimeDelta::from_secs_f64(0.03045).round_up_to(ms),
            SimTimeDelta::from_secs_f64(0.031)
        );
        assert_eq!(SimTimeDelta::from_secs(5).round_up_to(SimTimeDelta::ZERO), SimTimeDelta::from_secs(5));
    }

    #[test]
    fn display_formats() {
        assert_eq!(SimTime::from_secs(42).to_string(), "42s");
        assert_eq!(SimTime::new(42, 5).to_string(), "42.000000005s");
        assert_eq!(SimTime::NEVER.to_string(), "NEVER");
    }
}
