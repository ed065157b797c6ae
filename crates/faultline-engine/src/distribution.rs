//! Statistical duration sampling.
//!
//! Failure and restoration durations are drawn from a configurable
//! distribution family.  Sampling is deterministic: given the same master
//! seed, the same sequence of durations comes out, which keeps whole runs
//! reproducible.
//!
//! Samples are durations, so the contract is: the result is never negative,
//! always a multiple of the host's minimum scheduling granularity (rounded
//! up), and anything below the granularity becomes one full granule, with a
//! warning — a sub-granularity outage is almost always a sign of odd
//! distribution parameters, not a fatal error.

use std::fmt;

use log::warn;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::time::SimTimeDelta;

/// The closed set of supported distribution families.
///
/// `None` flags that no randomized schedule is in use (manual mode); asking
/// it for a sample is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DistributionKind {
    Uniform,
    Normal,
    LogNormal,
    Bernoulli,
    Pareto,
    Exponential,
    Rayleigh,
    Weibull,
    Gamma,
    Beta,
    Triangular,
    None,
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistributionKind::Uniform => "uniform",
            DistributionKind::Normal => "normal",
            DistributionKind::LogNormal => "lognormal",
            DistributionKind::Bernoulli => "bernoulli",
            DistributionKind::Pareto => "pareto",
            DistributionKind::Exponential => "exponential",
            DistributionKind::Rayleigh => "rayleigh",
            DistributionKind::Weibull => "weibull",
            DistributionKind::Gamma => "gamma",
            DistributionKind::Beta => "beta",
            DistributionKind::Triangular => "triangular",
            DistributionKind::None => "none",
        };
        write!(f, "{name}")
    }
}

/// A distribution family plus its two numeric parameters.
///
/// Compared field by field to detect live reconfiguration; unused second
/// parameters should be left at 0.0 so the comparison stays meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    pub kind: DistributionKind,
    pub param1: f64,
    pub param2: f64,
}

impl DistributionSpec {
    pub fn new(kind: DistributionKind, param1: f64, param2: f64) -> DistributionSpec {
        DistributionSpec {
            kind,
            param1,
            param2,
        }
    }
}

/// Seeded duration sampler.
pub struct Sampler {
    rng: ChaCha20Rng,
    granularity: SimTimeDelta,
}

impl Sampler {
    /// Create a sampler from a master seed and the host's minimum
    /// scheduling granularity.
    pub fn new(seed: u64, granularity: SimTimeDelta) -> Sampler {
        Sampler {
            rng: rng_from_seed(seed),
            granularity,
        }
    }

    pub fn granularity(&self) -> SimTimeDelta {
        self.granularity
    }

    /// Draw one duration from `spec`.
    ///
    /// Never negative; rounded up to the next granularity multiple so every
    /// instant computed from it lands on the host's scheduling grid.  Fails
    /// only for [`DistributionKind::None`] — every other anomaly (bad
    /// parameters producing zero or non-finite values) is clamped and
    /// logged instead.
    pub fn sample(&mut self, spec: &DistributionSpec) -> Result<SimTimeDelta, EngineError> {
        let raw = self.sample_raw(spec)?;
        let delta = SimTimeDelta::from_secs_f64(raw);
        if delta < self.granularity {
            warn!(
                "sampled {} duration {:.6}s below minimum granularity {}, rounding up",
                spec.kind, raw, self.granularity
            );
            return Ok(self.granularity);
        }
        Ok(delta.round_up_to(self.granularity))
    }

    fn sample_raw(&mut self, spec: &DistributionSpec) -> Result<f64, EngineError> {
        let (p1, p2) = (spec.param1, spec.param2);
        let value = match spec.kind {
            DistributionKind::Uniform => {
                if p2 < p1 {
                    warn!("uniform distribution with max {p2} below min {p1}");
                }
                self.randunit() * (p2 - p1) + p1
            }
            DistributionKind::Normal => self.normal(p1, p2),
            DistributionKind::LogNormal => (self.normal(0.0, 1.0) * p2 + p1).exp(),
            DistributionKind::Bernoulli => {
                if p1 >= self.randunit() {
                    1.0
                } else {
                    0.0
                }
            }
            DistributionKind::Pareto => {
                if p2 <= 0.0 {
                    warn!("pareto distribution requires a positive shape, got {p2}");
                    0.0
                } else {
                    p1 * self.randunit_open().powf(-1.0 / p2)
                }
            }
            DistributionKind::Exponential => {
                if p1 <= 0.0 {
                    warn!("exponential distribution requires a positive rate, got {p1}");
                    0.0
                } else {
                    -self.randunit_open().ln() / p1
                }
            }
            DistributionKind::Rayleigh => p1 * (-2.0 * (1.0 - self.randunit()).ln()).sqrt(),
            DistributionKind::Weibull => {
                if p2 <= 0.0 {
                    warn!("weibull distribution requires a positive shape, got {p2}");
                    0.0
                } else {
                    p1 * (-(1.0 - self.randunit()).ln()).powf(1.0 / p2)
                }
            }
            DistributionKind::Gamma => self.gamma(p1, p2),
            DistributionKind::Beta => {
                let x1 = self.gamma(p1, 1.0);
                let x2 = self.gamma(p2, 1.0);
                x1 / (x1 + x2)
            }
            DistributionKind::Triangular => {
                (self.randunit() + self.randunit()) * (p2 - p1) / 2.0 + p1
            }
            DistributionKind::None => {
                return Err(EngineError::UnsupportedDistribution("none".into()));
            }
        };
        Ok(value)
    }

    /// Uniform in `[0, 1)`.
    fn randunit(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Uniform in `(0, 1)`.
    fn randunit_open(&mut self) -> f64 {
        loop {
            let r: f64 = self.rng.gen();
            if r > 0.0 {
                return r;
            }
        }
    }

    /// Box-Muller, sine form.
    fn normal(&mut self, mean: f64, stdev: f64) -> f64 {
        if stdev < 0.0 {
            warn!("normal distribution with negative stdev {stdev}");
        }
        let r = self.randunit_open();
        let theta = 2.0 * std::f64::consts::PI * self.randunit();
        (-2.0 * r.ln()).sqrt() * theta.sin() * stdev + mean
    }

    /// Shape-dependent gamma sampling: product-of-uniforms for small
    /// integer shapes, Ahrens-Dieter for shape below 1, and a rejection
    /// method with a Cauchy envelope for large shapes.
    fn gamma(&mut self, alpha: f64, beta: f64) -> f64 {
        let na = alpha.floor();
        if (na - alpha).abs() < 1e-8 && na < 12.0 && na >= 1.0 {
            let mut prod = 1.0;
            for _ in 0..na as u32 {
                prod *= self.randunit_open();
            }
            -beta * prod.ln()
        } else if alpha < 1.0 {
            if alpha <= 0.0 {
                warn!("gamma distribution requires a positive shape, got {alpha}");
                return 0.0;
            }
            let p = std::f64::consts::E / (alpha + std::f64::consts::E);
            loop {
                let u = self.randunit();
                let v = self.randunit_open();
                let (x, q) = if u < p {
                    let x = ((1.0 / alpha) * v.ln()).exp();
                    (x, (-x).exp())
                } else {
                    let x = 1.0 - v.ln();
                    (x, ((alpha - 1.0) * x.ln()).exp())
                };
                if self.randunit() < q {
                    return beta * x;
                }
            }
        } else {
            let sqrta = (2.0 * alpha - 1.0).sqrt();
            loop {
                let mut x;
                let mut y;
                loop {
                    y = (std::f64::consts::PI * self.randunit()).tan();
                    x = sqrta * y + alpha - 1.0;
                    if x > 0.0 {
                        break;
                    }
                }
                let v = self.randunit();
                let bound =
                    (1.0 + y * y) * ((alpha - 1.0) * (x / (alpha - 1.0)).ln() - sqrta * y).exp();
                if v <= bound {
                    return beta * x;
                }
            }
        }
    }
}

/// Expand a `u64` master seed into a ChaCha key.
fn rng_from_seed(seed: u64) -> ChaCha20Rng {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&seed.to_le_bytes());
    ChaCha20Rng::from_seed(key)
}
