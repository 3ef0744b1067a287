//! Observation channels sampled once per step.

use cable_core::{CableError, Gate, Location, Result};

use crate::network::{CellId, Network, SynapseId};

/// A quantity that can be sampled from a network.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Probe {
    /// Membrane voltage (mV)
    Voltage { cell: CellId, location: Location },
    /// HH gating variable
    Gate {
        cell: CellId,
        location: Location,
        gate: Gate,
    },
    /// Synaptic conductance (uS)
    SynapticConductance(SynapseId),
    /// Synaptic current (nA), outward positive
    SynapticCurrent(SynapseId),
    /// Clamp current (nA)
    ClampCurrent { cell: CellId, clamp: usize },
}

impl Probe {
    pub fn cell(&self) -> CellId {
        match *self {
            Probe::Voltage { cell, .. }
            | Probe::Gate { cell, .. }
            | Probe::ClampCurrent { cell, .. } => cell,
            Probe::SynapticConductance(s) | Probe::SynapticCurrent(s) => s.cell,
        }
    }

    pub fn read(&self, network: &Network) -> Result<f64> {
        let neuron = network.neuron(self.cell())?;
        match *self {
            Probe::Voltage { location, .. } => neuron.voltage(location),
            Probe::Gate { location, gate, .. } => neuron
                .gate(location, gate)?
                .ok_or(CableError::InvalidParameter("no gated mechanism at location")),
            Probe::SynapticConductance(id) => neuron
                .synapse(id.synapse)
                .map(|s| s.conductance())
                .ok_or(CableError::UnknownSynapse(id.synapse)),
            Probe::SynapticCurrent(id) => {
                let syn = neuron
                    .synapse(id.synapse)
                    .ok_or(CableError::UnknownSynapse(id.synapse))?;
                Ok(syn.current(neuron.voltage(syn.target())?))
            }
            Probe::ClampCurrent { clamp, .. } => neuron
                .clamp(clamp)
                .map(|c| c.current())
                .ok_or(CableError::InvalidParameter("unknown clamp")),
        }
    }
}

/// Ordered (time, value) samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.times.last()?, *self.values.last()?))
    }

    /// Value at the first sample with time >= `t`.
    pub fn at(&self, t: f64) -> Option<f64> {
        let i = self.times.partition_point(|&s| s < t);
        self.values.get(i).copied()
    }

    fn push(&mut self, t: f64, v: f64) {
        self.times.push(t);
        self.values.push(v);
    }

    fn clear(&mut self) {
        self.times.clear();
        self.values.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceHandle(usize);

#[derive(Clone, Debug, Default)]
pub struct Recorder {
    probes: Vec<Probe>,
    series: Vec<TimeSeries>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a probe. It must be readable now.
    pub fn add(&mut self, probe: Probe, network: &Network) -> Result<TraceHandle> {
        probe.read(network)?;
        self.probes.push(probe);
        self.series.push(TimeSeries::default());
        Ok(TraceHandle(self.series.len() - 1))
    }

    pub fn get(&self, handle: TraceHandle) -> Option<&TimeSeries> {
        self.series.get(handle.0)
    }

    pub fn probe(&self, handle: TraceHandle) -> Option<&Probe> {
        self.probes.get(handle.0)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Append one sample to every trace. A probe whose target has gone
    /// away samples NaN.
    pub fn sample(&mut self, network: &Network, t: f64) {
        for (probe, series) in self.probes.iter().zip(&mut self.series) {
            series.push(t, probe.read(network).unwrap_or(f64::NAN));
        }
    }

    pub fn clear(&mut self) {
        for s in &mut self.series {
            s.clear();
        }
    }
}
