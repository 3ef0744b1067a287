//! Cell morphologies as data.
//!
//! A template lists sections, how they attach and which mechanisms they
//! carry. Instantiating it adds a fresh cell to a [`Network`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use cable_core::{
    CableError, HhParams, Mechanism, Morphology, PassiveParams, Result, Section,
};

use crate::network::{CellId, Network, DEFAULT_THRESHOLD};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MechanismSpec {
    Passive(PassiveParams),
    HodgkinHuxley(HhParams),
}

impl MechanismSpec {
    pub fn build(&self) -> Result<Mechanism> {
        match *self {
            MechanismSpec::Passive(p) => Mechanism::passive(p),
            MechanismSpec::HodgkinHuxley(p) => Mechanism::hh(p),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectionSpec {
    pub name: String,
    /// um
    pub length: f64,
    /// um
    pub diameter: f64,
    pub nseg: usize,
    /// Ohm cm
    pub axial_resistivity: f64,
    /// uF/cm2
    pub capacitance: f64,
    /// Parent section name and attachment point
    pub parent: Option<(String, f64)>,
    pub mechanisms: Vec<MechanismSpec>,
}

impl SectionSpec {
    pub fn new(name: impl Into<String>, length: f64, diameter: f64) -> Self {
        Self {
            name: name.into(),
            length,
            diameter,
            ..Self::default()
        }
    }

    pub fn nseg(mut self, nseg: usize) -> Self {
        self.nseg = nseg;
        self
    }

    pub fn attach_to(mut self, parent: impl Into<String>, x: f64) -> Self {
        self.parent = Some((parent.into(), x));
        self
    }

    pub fn with(mut self, mechanism: MechanismSpec) -> Self {
        self.mechanisms.push(mechanism);
        self
    }
}

impl Default for SectionSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            length: 100.0,
            diameter: 1.0,
            nseg: 1,
            axial_resistivity: 100.0,
            capacitance: 1.0,
            parent: None,
            mechanisms: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorSpec {
    pub section: String,
    pub x: f64,
    pub threshold: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellTemplate {
    pub name: String,
    pub sections: Vec<SectionSpec>,
    pub detector: Option<DetectorSpec>,
}

impl CellTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn section(mut self, section: SectionSpec) -> Self {
        self.sections.push(section);
        self
    }

    pub fn detector(mut self, section: impl Into<String>, x: f64, threshold: f64) -> Self {
        self.detector = Some(DetectorSpec {
            section: section.into(),
            x,
            threshold,
        });
        self
    }

    /// A single HH axon, 10000 um long and 100 um thick.
    pub fn axon_only() -> Self {
        Self::new("axon_only")
            .section(
                SectionSpec::new("axon", 10_000.0, 100.0)
                    .with(MechanismSpec::HodgkinHuxley(HhParams::default())),
            )
            .detector("axon", 0.1, DEFAULT_THRESHOLD)
    }

    /// Passive 100 x 100 um soma hanging off the far end of a 7500 x 75 um HH axon.
    pub fn ball_and_stick() -> Self {
        Self::new("ball_and_stick")
            .section(
                SectionSpec::new("axon", 7_500.0, 75.0)
                    .with(MechanismSpec::HodgkinHuxley(HhParams::default())),
            )
            .section(
                SectionSpec::new("soma", 100.0, 100.0)
                    .attach_to("axon", 1.0)
                    .with(MechanismSpec::Passive(PassiveParams::default())),
            )
            .detector("axon", 0.1, DEFAULT_THRESHOLD)
    }

    pub fn build_morphology(&self) -> Result<Morphology> {
        let mut morphology = Morphology::new();
        for desc in &self.sections {
            if morphology.find(&desc.name).is_some() {
                return Err(CableError::InvalidTopology("duplicate section name"));
            }
            let id = morphology.add_section(Section::new(
                desc.name.clone(),
                desc.length,
                desc.diameter,
                desc.nseg,
                desc.axial_resistivity,
                desc.capacitance,
            )?);
            let section = morphology.section_mut(id)?;
            for m in &desc.mechanisms {
                section.insert(m.build()?);
            }
        }
        for (child, desc) in self.sections.iter().enumerate() {
            if let Some((parent, x)) = &desc.parent {
                let parent = morphology
                    .find(parent)
                    .ok_or(CableError::InvalidTopology("unknown parent section"))?;
                morphology.connect(child, parent, *x)?;
            }
        }
        Ok(morphology)
    }

    /// Add one cell built from this template.
    pub fn instantiate(&self, network: &mut Network) -> Result<CellId> {
        let cell = network.add_cell(self.build_morphology()?)?;
        if let Some(d) = &self.detector {
            let section = network.section(cell, &d.section)?;
            network.set_spike_detector(cell, section, d.x, d.threshold)?;
        }
        Ok(cell)
    }
}
