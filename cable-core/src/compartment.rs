//! Cylindrical membrane compartment.
//!
//! Units: length and diameter in um, axial resistivity in ohm*cm, specific
//! capacitance in uF/cm2, voltage in mV, injected current in nA. Derived
//! quantities are returned in nF (capacitance), uS (conductance) and
//! megaohm (resistance) so that `uS * mV = nA` and `nF * mV/ms = nA`.

use core::f64::consts::PI;

use crate::channel::{Conductance, Mechanism};
use crate::error::{CableError, Result};

/// S/cm2 * um2 -> uS
const DENSITY_TO_US: f64 = 1e-2;
/// uF/cm2 * um2 -> nF
const SPECIFIC_CAP_TO_NF: f64 = 1e-5;
/// ohm*cm * um / um2 -> megaohm
const RESISTIVITY_TO_MOHM: f64 = 1e-2;

#[derive(Clone, Debug)]
pub struct Compartment {
    length: f64,
    diameter: f64,
    axial_resistivity: f64,
    capacitance: f64,
    /// Transmembrane voltage (mV)
    pub v: f64,
    /// External stimulus current (nA), positive depolarizes
    pub i_inj: f64,
    mechanisms: Vec<Mechanism>,
}

impl Compartment {
    pub fn create(
        length: f64,
        diameter: f64,
        axial_resistivity: f64,
        capacitance: f64,
    ) -> Result<Self> {
        if !(length > 0.0 && length.is_finite() && diameter > 0.0 && diameter.is_finite()) {
            return Err(CableError::InvalidGeometry { length, diameter });
        }
        if !(axial_resistivity > 0.0 && axial_resistivity.is_finite()) {
            return Err(CableError::InvalidParameter("axial resistivity must be > 0"));
        }
        if !(capacitance > 0.0 && capacitance.is_finite()) {
            return Err(CableError::InvalidParameter("membrane capacitance must be > 0"));
        }
        Ok(Self {
            length,
            diameter,
            axial_resistivity,
            capacitance,
            v: 0.0,
            i_inj: 0.0,
            mechanisms: Vec::new(),
        })
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn axial_resistivity(&self) -> f64 {
        self.axial_resistivity
    }

    pub fn specific_capacitance(&self) -> f64 {
        self.capacitance
    }

    /// Lateral surface area (um2); end caps are not membrane.
    #[inline]
    pub fn surface_area(&self) -> f64 {
        PI * self.diameter * self.length
    }

    /// Total membrane capacitance (nF).
    #[inline]
    pub fn membrane_capacitance(&self) -> f64 {
        self.capacitance * self.surface_area() * SPECIFIC_CAP_TO_NF
    }

    /// Convert a density conductance (S/cm2) on this membrane to uS.
    #[inline]
    pub fn absolute_conductance(&self, density: f64) -> f64 {
        density * self.surface_area() * DENSITY_TO_US
    }

    /// Resistance (megaohm) from the centre of this compartment to one of its ends.
    #[inline]
    pub fn half_resistance(&self) -> f64 {
        let cross_section = PI * self.diameter * self.diameter / 4.0;
        self.axial_resistivity * (self.length / 2.0) / cross_section * RESISTIVITY_TO_MOHM
    }

    /// Centre-to-centre axial resistance (megaohm).
    pub fn axial_resistance_to(&self, neighbor: &Compartment) -> f64 {
        self.half_resistance() + neighbor.half_resistance()
    }

    /// Centre-to-centre axial conductance (uS).
    pub fn axial_conductance_to(&self, neighbor: &Compartment) -> f64 {
        1.0 / self.axial_resistance_to(neighbor)
    }

    pub fn insert(&mut self, mechanism: Mechanism) {
        self.mechanisms.push(mechanism);
    }

    pub fn mechanisms(&self) -> &[Mechanism] {
        &self.mechanisms
    }

    pub fn mechanisms_mut(&mut self) -> &mut [Mechanism] {
        &mut self.mechanisms
    }

    /// Sum of channel conductances on this compartment, in absolute units.
    pub fn ionic_conductance(&self) -> Conductance {
        let mut density = Conductance::default();
        for mech in &self.mechanisms {
            mech.accumulate(&mut density);
        }
        density.scaled(self.surface_area() * DENSITY_TO_US)
    }

    /// Ionic current (nA), outward positive.
    pub fn ionic_current(&self) -> f64 {
        self.ionic_conductance().current(self.v)
    }

    /// Set the voltage and put every mechanism at its steady state for it.
    /// `i_inj` is configuration and is left as set.
    pub fn initialize(&mut self, v: f64) {
        self.v = v;
        for mech in &mut self.mechanisms {
            mech.initialize(v);
        }
    }
}
