//! cable-core: multi-compartment cable engine (one cell at a time)
//!
//! Units are fixed throughout: ms, mV, nA, uS, um.

pub mod error;
pub mod compartment;
pub mod channel;
pub mod morphology;
pub mod cable;
pub mod synapse;
pub mod clamp;
pub mod event_queue;
pub mod neuron;

// Re-exports
pub use error::{CableError, Result};
pub use compartment::Compartment;
pub use channel::{Conductance, Gate, GateRate, HhChannel, HhParams, HhRates, Mechanism, PassiveParams};
pub use morphology::{Location, Morphology, Section, SectionId};
pub use cable::{CableTree, Diverged, NodeInput};
pub use synapse::{Exp2SynParams, ExpSynParams, Synapse, SynapseKind};
pub use clamp::{ClampParams, CurrentClamp};
pub use event_queue::{EventQueue, SynapseTarget, SynapticEvent};
pub use neuron::Neuron;
