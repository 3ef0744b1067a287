//! One cell's cable system: morphology, attached mechanisms, synapses and
//! clamps, advanced a fixed step at a time.

use crate::cable::{CableTree, NodeInput};
use crate::channel::{Gate, Mechanism};
use crate::clamp::{ClampParams, CurrentClamp};
use crate::compartment::Compartment;
use crate::error::{CableError, Result};
use crate::morphology::{Location, Morphology, SectionId};
use crate::synapse::{Synapse, SynapseKind};

#[derive(Clone, Debug)]
pub struct Neuron {
    pub id: u32,
    morphology: Morphology,
    tree: CableTree,
    synapses: Vec<Option<Synapse>>,
    clamps: Vec<CurrentClamp>,
    inputs: Vec<NodeInput>,
}

impl Neuron {
    /// Take ownership of a finished morphology. It must form a single tree.
    pub fn new(id: u32, morphology: Morphology) -> Result<Self> {
        let root = morphology.root()?;
        let tree = CableTree::build(&morphology, root);
        let inputs = vec![NodeInput::default(); tree.len()];
        Ok(Self {
            id,
            morphology,
            tree,
            synapses: Vec::new(),
            clamps: Vec::new(),
            inputs,
        })
    }

    pub fn morphology(&self) -> &Morphology {
        &self.morphology
    }

    pub fn tree(&self) -> &CableTree {
        &self.tree
    }

    pub fn location(&self, section: SectionId, x: f64) -> Result<Location> {
        self.morphology.location(section, x)
    }

    pub fn compartment(&self, loc: Location) -> Result<&Compartment> {
        self.morphology.compartment(loc)
    }

    pub fn compartment_mut(&mut self, loc: Location) -> Result<&mut Compartment> {
        self.morphology.compartment_mut(loc)
    }

    pub fn voltage(&self, loc: Location) -> Result<f64> {
        Ok(self.morphology.compartment(loc)?.v)
    }

    /// Insert a mechanism into every compartment of a section.
    pub fn insert(&mut self, section: SectionId, mechanism: Mechanism) -> Result<()> {
        self.morphology.section_mut(section)?.insert(mechanism);
        Ok(())
    }

    /// Insert a mechanism into the compartment at `x` only.
    pub fn insert_at(&mut self, section: SectionId, x: f64, mechanism: Mechanism) -> Result<()> {
        let loc = self.location(section, x)?;
        self.morphology.compartment_mut(loc)?.insert(mechanism);
        Ok(())
    }

    /// First HH gate value found on the compartment.
    pub fn gate(&self, loc: Location, gate: Gate) -> Result<Option<f64>> {
        Ok(self
            .morphology
            .compartment(loc)?
            .mechanisms()
            .iter()
            .find_map(|m| m.gate(gate)))
    }

    pub fn add_synapse(&mut self, section: SectionId, x: f64, kind: SynapseKind) -> Result<usize> {
        let loc = self.location(section, x)?;
        self.synapses.push(Some(Synapse::new(kind, loc)?));
        Ok(self.synapses.len() - 1)
    }

    /// Detach a synapse. Its slot stays vacant so other indices remain valid.
    pub fn remove_synapse(&mut self, index: usize) -> Result<Synapse> {
        self.synapses
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(CableError::UnknownSynapse(index))
    }

    pub fn synapse(&self, index: usize) -> Option<&Synapse> {
        self.synapses.get(index).and_then(Option::as_ref)
    }

    pub fn synapses(&self) -> impl Iterator<Item = (usize, &Synapse)> {
        self.synapses
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }

    /// Apply a delivered event. A vacant slot means the event outlived its target.
    pub fn deliver(&mut self, index: usize, weight: f64) -> Result<()> {
        let cell = self.id;
        let syn = self
            .synapses
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or(CableError::DanglingTarget { cell, synapse: index })?;
        syn.deliver(weight);
        Ok(())
    }

    pub fn add_clamp(&mut self, section: SectionId, x: f64, params: ClampParams) -> Result<usize> {
        let loc = self.location(section, x)?;
        self.clamps.push(CurrentClamp::new(loc, params)?);
        Ok(self.clamps.len() - 1)
    }

    pub fn clamp(&self, index: usize) -> Option<&CurrentClamp> {
        self.clamps.get(index)
    }

    pub fn clamp_mut(&mut self, index: usize) -> Option<&mut CurrentClamp> {
        self.clamps.get_mut(index)
    }

    /// Uniform voltage `v`, gates at steady state, synapses and clamps at rest.
    pub fn initialize(&mut self, v: f64) {
        for s in 0..self.morphology.len() {
            if let Ok(section) = self.morphology.section_mut(s) {
                for c in section.compartments_mut() {
                    c.initialize(v);
                }
            }
        }
        for syn in self.synapses.iter_mut().flatten() {
            syn.reset();
        }
        for clamp in &mut self.clamps {
            clamp.reset();
        }
    }

    /// Integrate from `t` to `t + dt`. Synaptic conductances are read as they stand at `t`.
    pub fn advance(&mut self, t: f64, dt: f64) -> Result<()> {
        self.inputs.fill(NodeInput::default());
        for clamp in &mut self.clamps {
            let node = self.tree.node(clamp.target());
            self.inputs[node].current += clamp.update(t);
        }
        for syn in self.synapses.iter().flatten() {
            let node = self.tree.node(syn.target());
            self.inputs[node].conductance += syn.branch();
        }

        self.tree
            .advance(&mut self.morphology, &self.inputs, dt)
            .map_err(|_| CableError::NumericalDivergence {
                cell: self.id,
                time: t + dt,
            })
    }

    pub fn decay_synapses(&mut self, dt: f64) {
        for syn in self.synapses.iter_mut().flatten() {
            syn.decay(dt);
        }
    }
}
