//! Simulation driver: owns the network, clock, event queue and recordings.
//!
//! One step from `t` to `t + dt`:
//! 1. clamps are evaluated at `t` and every cell tree is integrated
//!    (in parallel with the `parallel` feature; all cells finish first)
//! 2. synaptic state decays by `dt`
//! 3. crossings are detected at the new time and their events queued
//! 4. events due by the new time are dispatched
//! 5. every trace takes one sample

use tracing::{debug, info, warn};

use cable_core::{CableError, Result, SynapticEvent};

use crate::clock::SimClock;
use crate::delivery::EventDelivery;
use crate::network::{CellId, Network, SourceId};
use crate::record::{Probe, Recorder, TimeSeries, TraceHandle};

/// Initial voltage used when stepping starts before `initialize`.
pub const DEFAULT_V_INIT: f64 = -65.0;

pub struct Simulation {
    network: Network,
    clock: SimClock,
    delivery: EventDelivery,
    recorder: Recorder,
    initialized: bool,
}

impl Simulation {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            clock: SimClock::default(),
            delivery: EventDelivery::new(),
            recorder: Recorder::new(),
            initialized: false,
        }
    }

    pub fn with_step(network: Network, dt: f64) -> Result<Self> {
        let mut sim = Self::new(network);
        sim.set_step(dt)?;
        Ok(sim)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn dt(&self) -> f64 {
        self.clock.dt()
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn set_step(&mut self, dt: f64) -> Result<()> {
        self.clock.set_step(dt)
    }

    /// Reset to t = 0 with every compartment at `v_init` and gates at steady state.
    ///
    /// Spike records, pending events and traces are cleared; the t = 0 sample
    /// is taken immediately.
    pub fn initialize(&mut self, v_init: f64) -> Result<()> {
        if !v_init.is_finite() {
            return Err(CableError::InvalidParameter("initial voltage must be finite"));
        }
        self.clock.reset();
        self.network.initialize(v_init)?;
        self.delivery.clear();
        self.recorder.clear();
        self.recorder.sample(&self.network, self.clock.time());
        self.initialized = true;
        debug!(
            v_init,
            cells = self.network.cells().len(),
            connections = self.network.connections().count(),
            "initialized"
        );
        Ok(())
    }

    /// Step until the clock reaches `t_stop`.
    ///
    /// Continues from the current state; call `initialize` first for an
    /// independent trial. On divergence the run stops and everything recorded
    /// so far stays available, but cell state is invalid until the next
    /// `initialize`: cells solved before the failing one have already moved
    /// past the clock.
    pub fn run(&mut self, t_stop: f64) -> Result<()> {
        if !t_stop.is_finite() {
            return Err(CableError::InvalidParameter("stop time must be finite"));
        }
        self.ensure_initialized()?;
        let start = self.clock.time();
        let tol = self.clock.tolerance();
        info!(start, t_stop, dt = self.clock.dt(), "run started");

        let mut steps = 0u64;
        while self.clock.time() < t_stop - tol {
            if let Err(err) = self.step() {
                warn!(error = %err, time = self.clock.time(), "run aborted");
                return Err(err);
            }
            steps += 1;
        }

        info!(
            steps,
            time = self.clock.time(),
            pending = self.delivery.queue().len(),
            "run finished"
        );
        Ok(())
    }

    /// Advance exactly one step. Initializes at `DEFAULT_V_INIT` first if
    /// nothing has been initialized yet.
    pub fn step(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let t = self.clock.time();
        let dt = self.clock.dt();

        self.integrate(t, dt)?;
        for cell in self.network.cells_mut() {
            cell.neuron.decay_synapses(dt);
        }
        self.clock.tick();

        let now = self.clock.time();
        let fired = self.delivery.detect(&mut self.network, now);
        self.delivery.schedule(&self.network, &fired, now);
        self.delivery
            .dispatch(&mut self.network, now + self.clock.tolerance())?;
        self.recorder.sample(&self.network, now);
        Ok(())
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialize(DEFAULT_V_INIT)
    }

    #[cfg(not(feature = "parallel"))]
    fn integrate(&mut self, t: f64, dt: f64) -> Result<()> {
        for cell in self.network.cells_mut() {
            cell.neuron.advance(t, dt)?;
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn integrate(&mut self, t: f64, dt: f64) -> Result<()> {
        use rayon::prelude::*;

        // collect first so the reported failure is the lowest cell id
        let results: Vec<Result<()>> = self
            .network
            .cells_mut()
            .par_iter_mut()
            .map(|cell| cell.neuron.advance(t, dt))
            .collect();
        results.into_iter().collect()
    }

    /// Attach a probe. Sampling starts at the next `initialize` or step.
    pub fn record(&mut self, probe: Probe) -> Result<TraceHandle> {
        self.recorder.add(probe, &self.network)
    }

    /// Record under a name stored on `cell`. Re-using a name rebinds it.
    pub fn record_as(
        &mut self,
        cell: CellId,
        name: impl Into<String>,
        probe: Probe,
    ) -> Result<TraceHandle> {
        self.network.cell(cell)?;
        let handle = self.record(probe)?;
        self.network.cell_mut(cell)?.traces.insert(name.into(), handle);
        Ok(handle)
    }

    pub fn trace(&self, handle: TraceHandle) -> Option<&TimeSeries> {
        self.recorder.get(handle)
    }

    pub fn named_trace(&self, cell: CellId, name: &str) -> Option<&TimeSeries> {
        let handle = self.network.cell(cell).ok()?.trace_handle(name)?;
        self.recorder.get(handle)
    }

    pub fn spike_times(&self, cell: CellId) -> Result<&[f64]> {
        self.network.spike_times(cell)
    }

    pub fn source_spike_times(&self, source: SourceId) -> Option<&[f64]> {
        self.network.source(source).map(|s| s.spike_times())
    }

    /// Queued events in delivery order.
    pub fn pending_events(&self) -> Vec<SynapticEvent> {
        self.delivery.pending()
    }

    pub fn delivered_events(&self) -> u64 {
        self.delivery.delivered()
    }
}
