//! Sections and the section tree of one cell.
//!
//! A section is an unbranched cable cut into `nseg` equal compartments.
//! Sections join child-end-0 to a normalized point on the parent, so the
//! sections of a cell always form a tree with a single root.

use crate::channel::Mechanism;
use crate::compartment::Compartment;
use crate::error::{CableError, Result};

pub type SectionId = usize;

/// Address of one compartment inside a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub section: SectionId,
    pub index: usize,
}

#[derive(Clone, Debug)]
pub struct Section {
    name: String,
    compartments: Vec<Compartment>,
    parent: Option<(SectionId, f64)>,
}

impl Section {
    /// Cylinder of `length` x `diameter` (um) cut into `nseg` compartments.
    pub fn new(
        name: impl Into<String>,
        length: f64,
        diameter: f64,
        nseg: usize,
        axial_resistivity: f64,
        capacitance: f64,
    ) -> Result<Self> {
        if nseg == 0 {
            return Err(CableError::InvalidParameter("nseg must be >= 1"));
        }
        let seg_len = length / nseg as f64;
        let compartments = (0..nseg)
            .map(|_| Compartment::create(seg_len, diameter, axial_resistivity, capacitance))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.into(),
            compartments,
            parent: None,
        })
    }

    /// Section built from explicit compartments (tapered cables etc.).
    pub fn from_compartments(name: impl Into<String>, compartments: Vec<Compartment>) -> Result<Self> {
        if compartments.is_empty() {
            return Err(CableError::InvalidParameter("section needs at least one compartment"));
        }
        Ok(Self {
            name: name.into(),
            compartments,
            parent: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nseg(&self) -> usize {
        self.compartments.len()
    }

    pub fn length(&self) -> f64 {
        self.compartments.iter().map(Compartment::length).sum()
    }

    pub fn parent(&self) -> Option<(SectionId, f64)> {
        self.parent
    }

    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn compartments_mut(&mut self) -> &mut [Compartment] {
        &mut self.compartments
    }

    /// Index of the compartment containing normalized position `x`.
    pub fn locate(&self, x: f64) -> Result<usize> {
        if !(0.0..=1.0).contains(&x) {
            return Err(CableError::InvalidPosition(x));
        }
        let n = self.compartments.len();
        Ok(((x * n as f64) as usize).min(n - 1))
    }

    /// Attach a copy of `mechanism` to every compartment.
    pub fn insert(&mut self, mechanism: Mechanism) {
        for c in &mut self.compartments {
            c.insert(mechanism);
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Morphology {
    sections: Vec<Section>,
}

impl Morphology {
    pub fn new() -> Self {
        Self { sections: Vec::new() }
    }

    pub fn add_section(&mut self, section: Section) -> SectionId {
        self.sections.push(section);
        self.sections.len() - 1
    }

    /// Attach `child`'s 0-end to position `x` of `parent`.
    pub fn connect(&mut self, child: SectionId, parent: SectionId, x: f64) -> Result<()> {
        self.section(child)?;
        self.section(parent)?.locate(x)?;
        if child == parent {
            return Err(CableError::InvalidTopology("section connected to itself"));
        }
        if self.sections[child].parent.is_some() {
            return Err(CableError::InvalidTopology("section already has a parent"));
        }
        // walking up from `parent` must never reach `child`
        let mut cursor = Some(parent);
        while let Some(s) = cursor {
            if s == child {
                return Err(CableError::InvalidTopology("connection would form a cycle"));
            }
            cursor = self.sections[s].parent.map(|(p, _)| p);
        }
        self.sections[child].parent = Some((parent, x));
        Ok(())
    }

    /// The single parentless section.
    pub fn root(&self) -> Result<SectionId> {
        let mut roots = self
            .sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.parent.is_none())
            .map(|(i, _)| i);
        match (roots.next(), roots.next()) {
            (Some(r), None) => Ok(r),
            (None, _) => Err(CableError::InvalidTopology("morphology has no sections")),
            (Some(_), Some(_)) => Err(CableError::InvalidTopology("morphology has more than one root")),
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Result<&Section> {
        self.sections.get(id).ok_or(CableError::UnknownSection(id))
    }

    pub fn section_mut(&mut self, id: SectionId) -> Result<&mut Section> {
        self.sections.get_mut(id).ok_or(CableError::UnknownSection(id))
    }

    pub fn find(&self, name: &str) -> Option<SectionId> {
        self.sections.iter().position(|s| s.name == name)
    }

    pub fn location(&self, section: SectionId, x: f64) -> Result<Location> {
        let index = self.section(section)?.locate(x)?;
        Ok(Location { section, index })
    }

    pub fn compartment(&self, loc: Location) -> Result<&Compartment> {
        self.section(loc.section)?
            .compartments
            .get(loc.index)
            .ok_or(CableError::InvalidParameter("compartment index out of range"))
    }

    pub fn compartment_mut(&mut self, loc: Location) -> Result<&mut Compartment> {
        self.section_mut(loc.section)?
            .compartments
            .get_mut(loc.index)
            .ok_or(CableError::InvalidParameter("compartment index out of range"))
    }

    /// Unchecked access for locations produced by this morphology's cable tree.
    pub(crate) fn at_mut(&mut self, loc: Location) -> &mut Compartment {
        &mut self.sections[loc.section].compartments[loc.index]
    }

    pub fn compartment_count(&self) -> usize {
        self.sections.iter().map(Section::nseg).sum()
    }
}
