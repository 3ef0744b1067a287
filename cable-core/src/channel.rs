//! Membrane channel mechanisms.
//!
//! Every mechanism contributes a set of ohmic branches `g_i * (V - E_i)`.
//! Conductances are densities (S/cm2) here; the compartment scales them by
//! its area.
//!
//! ```text
//! I_ion = gnabar * m^3 * h * (V - ena) + gkbar * n^4 * (V - ek) + gl * (V - el)
//! dx/dt = (x_inf(V) - x) / tau_x(V)          x in {m, h, n}
//! ```
//!
//! Gates are advanced with exponential Euler, which is exact for the linear
//! gate ODE at fixed voltage and stable for any step size.

use core::ops::AddAssign;

use crate::error::{CableError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Accumulated ohmic branches: total conductance and sum of `g * E`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Conductance {
    pub g: f64,
    pub ge: f64,
}

impl Conductance {
    #[inline]
    pub fn add(&mut self, g: f64, e: f64) {
        self.g += g;
        self.ge += g * e;
    }

    #[inline]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            g: self.g * factor,
            ge: self.ge * factor,
        }
    }

    /// Net outward current at voltage `v`.
    #[inline]
    pub fn current(&self, v: f64) -> f64 {
        self.g * v - self.ge
    }

    /// Voltage at which the branches carry no net current.
    pub fn reversal(&self) -> Option<f64> {
        if self.g > 0.0 {
            Some(self.ge / self.g)
        } else {
            None
        }
    }
}

impl AddAssign for Conductance {
    fn add_assign(&mut self, rhs: Self) {
        self.g += rhs.g;
        self.ge += rhs.ge;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PassiveParams {
    /// Leak conductance (S/cm2)
    pub g: f64,
    /// Leak reversal (mV)
    pub e: f64,
}

impl Default for PassiveParams {
    fn default() -> Self {
        Self { g: 0.001, e: -70.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HhParams {
    /// Sodium maximal conductance (S/cm2)
    pub gnabar: f64,
    /// Potassium maximal conductance (S/cm2)
    pub gkbar: f64,
    /// Leak conductance (S/cm2)
    pub gl: f64,
    pub ena: f64,
    pub ek: f64,
    pub el: f64,
    /// Temperature (degC); rates scale by 3^((celsius - 6.3) / 10)
    pub celsius: f64,
}

impl Default for HhParams {
    fn default() -> Self {
        Self {
            gnabar: 0.12,
            gkbar: 0.036,
            gl: 0.0003,
            ena: 50.0,
            ek: -77.0,
            el: -54.3,
            celsius: 6.3,
        }
    }
}

impl PassiveParams {
    pub fn validate(&self) -> Result<()> {
        check_density(self.g, "leak conductance must be finite and >= 0")?;
        check_reversal(self.e, "leak reversal must be finite")
    }
}

impl HhParams {
    pub fn validate(&self) -> Result<()> {
        check_density(self.gnabar, "gnabar must be finite and >= 0")?;
        check_density(self.gkbar, "gkbar must be finite and >= 0")?;
        check_density(self.gl, "gl must be finite and >= 0")?;
        check_reversal(self.ena, "ena must be finite")?;
        check_reversal(self.ek, "ek must be finite")?;
        check_reversal(self.el, "el must be finite")?;
        check_reversal(self.celsius, "celsius must be finite")
    }

    fn q10(&self) -> f64 {
        3.0_f64.powf((self.celsius - 6.3) / 10.0)
    }
}

fn check_density(g: f64, what: &'static str) -> Result<()> {
    if g >= 0.0 && g.is_finite() {
        Ok(())
    } else {
        Err(CableError::InvalidParameter(what))
    }
}

fn check_reversal(e: f64, what: &'static str) -> Result<()> {
    if e.is_finite() {
        Ok(())
    } else {
        Err(CableError::InvalidParameter(what))
    }
}

/// Which HH gate to read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Gate {
    M,
    H,
    N,
}

/// Steady state and time constant of one gate at a given voltage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateRate {
    pub inf: f64,
    pub tau: f64,
}

impl GateRate {
    #[inline]
    fn from_alpha_beta(alpha: f64, beta: f64, q10: f64) -> Self {
        let sum = alpha + beta;
        Self {
            inf: alpha / sum,
            tau: 1.0 / (q10 * sum),
        }
    }

    /// Exponential-Euler advance of `x` over `dt` at fixed voltage.
    #[inline]
    pub fn relax(&self, x: f64, dt: f64) -> f64 {
        let next = self.inf + (x - self.inf) * (-dt / self.tau).exp();
        next.clamp(0.0, 1.0)
    }
}

/// `x / (exp(x/y) - 1)` with the removable singularity at x = 0 handled.
#[inline]
fn vtrap(x: f64, y: f64) -> f64 {
    if (x / y).abs() < 1e-6 {
        y * (1.0 - x / y / 2.0)
    } else {
        x / ((x / y).exp() - 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HhRates {
    pub m: GateRate,
    pub h: GateRate,
    pub n: GateRate,
}

impl HhRates {
    pub fn at(v: f64, params: &HhParams) -> Self {
        let q10 = params.q10();

        let alpha_m = 0.1 * vtrap(-(v + 40.0), 10.0);
        let beta_m = 4.0 * (-(v + 65.0) / 18.0).exp();

        let alpha_h = 0.07 * (-(v + 65.0) / 20.0).exp();
        let beta_h = 1.0 / ((-(v + 35.0) / 10.0).exp() + 1.0);

        let alpha_n = 0.01 * vtrap(-(v + 55.0), 10.0);
        let beta_n = 0.125 * (-(v + 65.0) / 80.0).exp();

        Self {
            m: GateRate::from_alpha_beta(alpha_m, beta_m, q10),
            h: GateRate::from_alpha_beta(alpha_h, beta_h, q10),
            n: GateRate::from_alpha_beta(alpha_n, beta_n, q10),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HhChannel {
    pub params: HhParams,
    m: f64,
    h: f64,
    n: f64,
}

impl HhChannel {
    pub fn new(params: HhParams) -> Self {
        let mut ch = Self {
            params,
            m: 0.0,
            h: 0.0,
            n: 0.0,
        };
        ch.initialize(-65.0);
        ch
    }

    pub fn initialize(&mut self, v: f64) {
        let r = HhRates::at(v, &self.params);
        self.m = r.m.inf;
        self.h = r.h.inf;
        self.n = r.n.inf;
    }

    pub fn advance(&mut self, v: f64, dt: f64) {
        let r = HhRates::at(v, &self.params);
        self.m = r.m.relax(self.m, dt);
        self.h = r.h.relax(self.h, dt);
        self.n = r.n.relax(self.n, dt);
    }

    pub fn gate(&self, gate: Gate) -> f64 {
        match gate {
            Gate::M => self.m,
            Gate::H => self.h,
            Gate::N => self.n,
        }
    }

    fn accumulate(&self, out: &mut Conductance) {
        let p = &self.params;
        out.add(p.gnabar * self.m * self.m * self.m * self.h, p.ena);
        out.add(p.gkbar * self.n.powi(4), p.ek);
        out.add(p.gl, p.el);
    }
}

/// A channel mechanism attached to one compartment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mechanism {
    Passive(PassiveParams),
    HodgkinHuxley(HhChannel),
}

impl Mechanism {
    pub fn passive(params: PassiveParams) -> Result<Self> {
        params.validate()?;
        Ok(Mechanism::Passive(params))
    }

    pub fn hh(params: HhParams) -> Result<Self> {
        params.validate()?;
        Ok(Mechanism::HodgkinHuxley(HhChannel::new(params)))
    }

    pub fn initialize(&mut self, v: f64) {
        if let Mechanism::HodgkinHuxley(ch) = self {
            ch.initialize(v);
        }
    }

    pub fn advance(&mut self, v: f64, dt: f64) {
        if let Mechanism::HodgkinHuxley(ch) = self {
            ch.advance(v, dt);
        }
    }

    /// Add this mechanism's branches (density units) to `out`.
    pub fn accumulate(&self, out: &mut Conductance) {
        match self {
            Mechanism::Passive(p) => out.add(p.g, p.e),
            Mechanism::HodgkinHuxley(ch) => ch.accumulate(out),
        }
    }

    pub fn gate(&self, gate: Gate) -> Option<f64> {
        match self {
            Mechanism::HodgkinHuxley(ch) => Some(ch.gate(gate)),
            Mechanism::Passive(_) => None,
        }
    }
}
