//! Cells, spike sources and delayed connections.
//!
//! - A spike source watches one compartment against a threshold. Sources with
//!   the same binding are shared, so a cell's detector and the connections
//!   leaving the same point see one crossing record.
//! - Connections are indexed by source (source -> connections) so detection
//!   never scans the full connection list.

use std::collections::BTreeMap;

use tracing::debug;

use cable_core::{
    CableError, ClampParams, Location, Mechanism, Morphology, Neuron, Result, SectionId,
    SynapseKind, SynapseTarget,
};

use crate::record::TraceHandle;

pub type CellId = u32;
pub type SourceId = usize;
pub type ConnectionId = usize;
pub type SynapseId = SynapseTarget;

/// Default crossing threshold (mV).
pub const DEFAULT_THRESHOLD: f64 = 10.0;

#[derive(Clone, Debug, PartialEq)]
pub struct SpikeSource {
    pub cell: CellId,
    pub location: Location,
    pub threshold: f64,
    /// Whether the watched voltage was above threshold after the last check
    pub(crate) above: bool,
    pub(crate) spikes: Vec<f64>,
}

impl SpikeSource {
    pub fn spike_times(&self) -> &[f64] {
        &self.spikes
    }

    /// Rising-edge test against the new voltage. Returns true on a crossing.
    pub(crate) fn check(&mut self, v: f64, t: f64) -> bool {
        let above = v > self.threshold;
        let crossed = above && !self.above;
        self.above = above;
        if crossed {
            self.spikes.push(t);
        }
        crossed
    }

    pub(crate) fn reset(&mut self, v: f64) {
        self.spikes.clear();
        self.above = v > self.threshold;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Connection {
    pub source: SourceId,
    pub target: SynapseId,
    pub weight: f64,
    /// Axonal + synaptic delay (ms), strictly positive
    pub delay: f64,
}

impl Connection {
    pub fn new(source: SourceId, target: SynapseId, weight: f64, delay: f64) -> Result<Self> {
        if !(delay > 0.0 && delay.is_finite()) {
            return Err(CableError::InvalidDelay(delay));
        }
        if !weight.is_finite() {
            return Err(CableError::InvalidParameter("connection weight must be finite"));
        }
        Ok(Self {
            source,
            target,
            weight,
            delay,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Cell {
    pub neuron: Neuron,
    detector: Option<SourceId>,
    outgoing: Vec<ConnectionId>,
    pub(crate) traces: BTreeMap<String, TraceHandle>,
}

impl Cell {
    pub fn id(&self) -> CellId {
        self.neuron.id
    }

    pub fn detector(&self) -> Option<SourceId> {
        self.detector
    }

    /// Connections whose source sits on this cell.
    pub fn outgoing(&self) -> &[ConnectionId] {
        &self.outgoing
    }

    pub fn trace_handle(&self, name: &str) -> Option<TraceHandle> {
        self.traces.get(name).copied()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Network {
    cells: Vec<Cell>,
    sources: Vec<SpikeSource>,
    connections: Vec<Option<Connection>>,
    source_to_connections: Vec<Vec<ConnectionId>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cell(&mut self, morphology: Morphology) -> Result<CellId> {
        let id = self.cells.len() as CellId;
        let neuron = Neuron::new(id, morphology)?;
        debug!(cell = id, compartments = neuron.tree().len(), "added cell");
        self.cells.push(Cell {
            neuron,
            detector: None,
            outgoing: Vec::new(),
            traces: BTreeMap::new(),
        });
        Ok(id)
    }

    pub fn cell(&self, id: CellId) -> Result<&Cell> {
        self.cells.get(id as usize).ok_or(CableError::UnknownCell(id))
    }

    pub fn cell_mut(&mut self, id: CellId) -> Result<&mut Cell> {
        self.cells.get_mut(id as usize).ok_or(CableError::UnknownCell(id))
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn neuron(&self, id: CellId) -> Result<&Neuron> {
        Ok(&self.cell(id)?.neuron)
    }

    pub fn neuron_mut(&mut self, id: CellId) -> Result<&mut Neuron> {
        Ok(&mut self.cell_mut(id)?.neuron)
    }

    pub fn section(&self, cell: CellId, name: &str) -> Result<SectionId> {
        self.neuron(cell)?
            .morphology()
            .find(name)
            .ok_or_else(|| CableError::UnknownSectionName(name.to_owned()))
    }

    pub fn insert(&mut self, cell: CellId, section: SectionId, mechanism: Mechanism) -> Result<()> {
        self.neuron_mut(cell)?.insert(section, mechanism)
    }

    pub fn insert_at(
        &mut self,
        cell: CellId,
        section: SectionId,
        x: f64,
        mechanism: Mechanism,
    ) -> Result<()> {
        self.neuron_mut(cell)?.insert_at(section, x, mechanism)
    }

    pub fn add_synapse(
        &mut self,
        cell: CellId,
        section: SectionId,
        x: f64,
        kind: SynapseKind,
    ) -> Result<SynapseId> {
        let synapse = self.neuron_mut(cell)?.add_synapse(section, x, kind)?;
        Ok(SynapseId { cell, synapse })
    }

    /// Remove a synapse together with every connection that targets it.
    ///
    /// Events already queued for it are not withdrawn; dispatching one
    /// fails with `DanglingTarget`.
    pub fn remove_synapse(&mut self, id: SynapseId) -> Result<()> {
        self.neuron_mut(id.cell)?.remove_synapse(id.synapse)?;
        for cid in 0..self.connections.len() {
            let Some(conn) = self.connections[cid] else {
                continue;
            };
            if conn.target != id {
                continue;
            }
            self.connections[cid] = None;
            self.source_to_connections[conn.source].retain(|&c| c != cid);
            let owner = self.sources[conn.source].cell;
            if let Some(cell) = self.cells.get_mut(owner as usize) {
                cell.outgoing.retain(|&c| c != cid);
            }
        }
        Ok(())
    }

    pub fn add_clamp(
        &mut self,
        cell: CellId,
        section: SectionId,
        x: f64,
        params: ClampParams,
    ) -> Result<usize> {
        self.neuron_mut(cell)?.add_clamp(section, x, params)
    }

    /// Spike source at (cell, section, x) with `threshold`, shared when one already exists.
    pub fn spike_source(
        &mut self,
        cell: CellId,
        section: SectionId,
        x: f64,
        threshold: f64,
    ) -> Result<SourceId> {
        if !threshold.is_finite() {
            return Err(CableError::InvalidParameter("threshold must be finite"));
        }
        let neuron = self.neuron(cell)?;
        let location = neuron.location(section, x)?;
        if let Some(id) = self
            .sources
            .iter()
            .position(|s| s.cell == cell && s.location == location && s.threshold == threshold)
        {
            return Ok(id);
        }
        let v = neuron.voltage(location)?;
        self.sources.push(SpikeSource {
            cell,
            location,
            threshold,
            above: v > threshold,
            spikes: Vec::new(),
        });
        self.source_to_connections.push(Vec::new());
        Ok(self.sources.len() - 1)
    }

    /// Bind the cell's own spike record to (section, x) with `threshold`.
    pub fn set_spike_detector(
        &mut self,
        cell: CellId,
        section: SectionId,
        x: f64,
        threshold: f64,
    ) -> Result<SourceId> {
        let id = self.spike_source(cell, section, x, threshold)?;
        self.cell_mut(cell)?.detector = Some(id);
        Ok(id)
    }

    pub fn connect(
        &mut self,
        source: SourceId,
        target: SynapseId,
        weight: f64,
        delay: f64,
    ) -> Result<ConnectionId> {
        let owner = self
            .sources
            .get(source)
            .ok_or(CableError::InvalidParameter("unknown spike source"))?
            .cell;
        if self.neuron(target.cell)?.synapse(target.synapse).is_none() {
            return Err(CableError::UnknownSynapse(target.synapse));
        }
        let conn = Connection::new(source, target, weight, delay)?;
        let id = self.connections.len();
        self.connections.push(Some(conn));
        self.source_to_connections[source].push(id);
        self.cell_mut(owner)?.outgoing.push(id);
        debug!(
            connection = id,
            from = owner,
            to = target.cell,
            weight,
            delay,
            "connected"
        );
        Ok(id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id).and_then(Option::as_ref)
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i, c)))
    }

    pub fn connections_from(&self, source: SourceId) -> impl Iterator<Item = &Connection> {
        self.source_to_connections
            .get(source)
            .into_iter()
            .flatten()
            .filter_map(|&id| self.connection(id))
    }

    pub fn source(&self, id: SourceId) -> Option<&SpikeSource> {
        self.sources.get(id)
    }

    pub fn sources(&self) -> &[SpikeSource] {
        &self.sources
    }

    /// Emission times recorded by the cell's detector, in order.
    pub fn spike_times(&self, cell: CellId) -> Result<&[f64]> {
        let c = self.cell(cell)?;
        Ok(c.detector
            .and_then(|id| self.sources.get(id))
            .map(SpikeSource::spike_times)
            .unwrap_or(&[]))
    }

    /// Split borrow for crossing detection.
    pub(crate) fn detection_view(&mut self) -> (&[Cell], &mut [SpikeSource]) {
        (&self.cells, &mut self.sources)
    }

    pub(crate) fn initialize(&mut self, v: f64) -> Result<()> {
        for cell in &mut self.cells {
            cell.neuron.initialize(v);
        }
        for source in &mut self.sources {
            let cell = self
                .cells
                .get(source.cell as usize)
                .ok_or(CableError::UnknownCell(source.cell))?;
            source.reset(cell.neuron.voltage(source.location)?);
        }
        Ok(())
    }
}
