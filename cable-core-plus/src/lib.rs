//! cable-core-plus: network runtime atop cable-core
//!
//! Additions:
//! - Cells, shared spike sources and delayed connections, with a
//!   source -> connections index so detection never scans every connection
//! - Event delivery: rising-edge detection, scheduling, dispatch
//! - Fixed-step clock and the simulation driver (initialize / run / set_step)
//! - Probes and per-step time series
//! - Cell templates as data
//! - Optional parallel integration of independent cells (feature "parallel")
//!
//! Units follow cable-core: ms, mV, nA, uS, um.

pub mod network;
pub mod delivery;
pub mod clock;
pub mod record;
pub mod template;
pub mod simulation;

// Re-exports
pub use cable_core::{
    CableError, ClampParams, Exp2SynParams, ExpSynParams, Gate, HhParams, Location, Mechanism,
    Morphology, PassiveParams, Result, Section, SectionId, SynapseKind, SynapticEvent,
};
pub use clock::{SimClock, DEFAULT_DT};
pub use delivery::EventDelivery;
pub use network::{
    Cell, CellId, Connection, ConnectionId, Network, SourceId, SpikeSource, SynapseId,
    DEFAULT_THRESHOLD,
};
pub use record::{Probe, Recorder, TimeSeries, TraceHandle};
pub use simulation::{Simulation, DEFAULT_V_INIT};
pub use template::{CellTemplate, DetectorSpec, MechanismSpec, SectionSpec};
