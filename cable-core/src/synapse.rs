//! Conductance-based synapses driven by delivered events.
//!
//! Exp2: `g = B - A`, A decays with tau1 (rise), B with tau2 (decay). Each
//! event adds `weight * factor` to both, where `factor` scales the peak of
//! `B - A` to `weight`. Exp: a single state `g` decaying with tau.
//! Conductances are in uS; current `i = g * (V - e)` in nA.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::channel::Conductance;
use crate::error::{CableError, Result};
use crate::morphology::Location;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExpSynParams {
    /// Decay time constant (ms)
    pub tau: f64,
    /// Reversal potential (mV)
    pub e: f64,
}

impl Default for ExpSynParams {
    fn default() -> Self {
        Self { tau: 0.1, e: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Exp2SynParams {
    /// Rise time constant (ms)
    pub tau1: f64,
    /// Decay time constant (ms)
    pub tau2: f64,
    /// Reversal potential (mV)
    pub e: f64,
}

impl Default for Exp2SynParams {
    fn default() -> Self {
        Self {
            tau1: 0.1,
            tau2: 10.0,
            e: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SynapseKind {
    Exp(ExpSynParams),
    Exp2(Exp2SynParams),
}

impl SynapseKind {
    pub fn reversal(&self) -> f64 {
        match self {
            SynapseKind::Exp(p) => p.e,
            SynapseKind::Exp2(p) => p.e,
        }
    }
}

fn valid_tau(tau: f64) -> bool {
    tau > 0.0 && tau.is_finite()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Synapse {
    kind: SynapseKind,
    target: Location,
    /// Rise state (Exp2 only)
    a: f64,
    /// Decay state (the conductance itself for Exp)
    b: f64,
    factor: f64,
}

impl Synapse {
    pub fn new(kind: SynapseKind, target: Location) -> Result<Self> {
        if !kind.reversal().is_finite() {
            return Err(CableError::InvalidParameter("synaptic reversal must be finite"));
        }
        let factor = match kind {
            SynapseKind::Exp(p) => {
                if !valid_tau(p.tau) {
                    return Err(CableError::DegenerateSynapse("tau must be > 0"));
                }
                1.0
            }
            SynapseKind::Exp2(p) => {
                if !valid_tau(p.tau1) || !valid_tau(p.tau2) {
                    return Err(CableError::DegenerateSynapse("tau1 and tau2 must be > 0"));
                }
                if p.tau1 == p.tau2 {
                    return Err(CableError::DegenerateSynapse("tau1 == tau2"));
                }
                let tp = p.tau1 * p.tau2 / (p.tau2 - p.tau1) * (p.tau2 / p.tau1).ln();
                1.0 / ((-tp / p.tau2).exp() - (-tp / p.tau1).exp())
            }
        };
        if !factor.is_finite() {
            return Err(CableError::DegenerateSynapse("tau1 and tau2 too close"));
        }
        Ok(Self {
            kind,
            target,
            a: 0.0,
            b: 0.0,
            factor,
        })
    }

    pub fn kind(&self) -> &SynapseKind {
        &self.kind
    }

    pub fn target(&self) -> Location {
        self.target
    }

    /// Peak normalization applied to each delivered weight.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Raw (A, B) state.
    pub fn state(&self) -> (f64, f64) {
        (self.a, self.b)
    }

    pub fn conductance(&self) -> f64 {
        match self.kind {
            SynapseKind::Exp(_) => self.b,
            SynapseKind::Exp2(_) => self.b - self.a,
        }
    }

    /// Synaptic current (nA) at target voltage `v`, outward positive.
    pub fn current(&self, v: f64) -> f64 {
        self.conductance() * (v - self.kind.reversal())
    }

    pub fn branch(&self) -> Conductance {
        let mut c = Conductance::default();
        c.add(self.conductance(), self.kind.reversal());
        c
    }

    /// Apply one delivered event.
    pub fn deliver(&mut self, weight: f64) {
        match self.kind {
            SynapseKind::Exp(_) => self.b += weight,
            SynapseKind::Exp2(_) => {
                self.a += weight * self.factor;
                self.b += weight * self.factor;
            }
        }
    }

    /// Let the state relax for `dt`.
    pub fn decay(&mut self, dt: f64) {
        match self.kind {
            SynapseKind::Exp(p) => self.b *= (-dt / p.tau).exp(),
            SynapseKind::Exp2(p) => {
                self.a *= (-dt / p.tau1).exp();
                self.b *= (-dt / p.tau2).exp();
            }
        }
    }

    pub fn reset(&mut self) {
        self.a = 0.0;
        self.b = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const HERE: Location = Location { section: 0, index: 0 };

    fn exp2(tau1: f64, tau2: f64) -> Result<Synapse> {
        Synapse::new(SynapseKind::Exp2(Exp2SynParams { tau1, tau2, e: 0.0 }), HERE)
    }

    #[test]
    fn degenerate_time_constants_are_rejected() {
        assert!(matches!(exp2(1.0, 1.0), Err(CableError::DegenerateSynapse(_))));
        assert!(matches!(exp2(0.0, 1.0), Err(CableError::DegenerateSynapse(_))));
        assert!(matches!(
            Synapse::new(SynapseKind::Exp(ExpSynParams { tau: -1.0, e: 0.0 }), HERE),
            Err(CableError::DegenerateSynapse(_))
        ));
    }

    #[test]
    fn non_finite_reversal_is_rejected() {
        let kind = SynapseKind::Exp2(Exp2SynParams { tau1: 0.5, tau2: 2.0, e: f64::NAN });
        assert!(matches!(
            Synapse::new(kind, HERE),
            Err(CableError::InvalidParameter(_))
        ));
        let kind = SynapseKind::Exp(ExpSynParams { tau: 2.0, e: f64::NEG_INFINITY });
        assert!(Synapse::new(kind, HERE).is_err());
    }

    #[test]
    fn exp2_peak_equals_weight() {
        let mut syn = exp2(0.5, 5.0).unwrap();
        syn.deliver(0.01);
        assert_eq!(syn.conductance(), 0.0);
        let dt = 0.001;
        let mut peak: f64 = 0.0;
        for _ in 0..20_000 {
            syn.decay(dt);
            peak = peak.max(syn.conductance());
        }
        assert_abs_diff_eq!(peak, 0.01, epsilon = 1e-6);
    }

    #[test]
    fn exp_jumps_then_decays() {
        let mut syn =
            Synapse::new(SynapseKind::Exp(ExpSynParams { tau: 2.0, e: -80.0 }), HERE).unwrap();
        syn.deliver(0.5);
        assert_eq!(syn.conductance(), 0.5);
        syn.decay(2.0);
        assert_abs_diff_eq!(syn.conductance(), 0.5 / core::f64::consts::E, epsilon = 1e-12);
        // inhibitory at rest: outward current
        assert!(syn.current(-65.0) > 0.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut syn = exp2(1.0, 3.0).unwrap();
        syn.deliver(1.0);
        syn.decay(0.5);
        syn.reset();
        assert_eq!(syn.state(), (0.0, 0.0));
    }
}
