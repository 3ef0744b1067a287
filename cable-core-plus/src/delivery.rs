//! Spike detection, event scheduling and dispatch.
//!
//! Detection runs after every cell has been integrated to the new time `t`.
//! A crossing emits at `t`; each connection leaving the source schedules an
//! event at `t + delay`. Dispatch then pops every event due by `t`, so the
//! synapse state changes exactly at the delivery time and the next
//! integration step sees it.

use tracing::trace;

use cable_core::{CableError, EventQueue, Result, SynapticEvent};

use crate::network::{Network, SourceId};

#[derive(Clone, Debug, Default)]
pub struct EventDelivery {
    queue: EventQueue,
    delivered: u64,
}

impl EventDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record rising-edge crossings at time `t`. Returns the sources that fired.
    pub fn detect(&mut self, network: &mut Network, t: f64) -> Vec<SourceId> {
        let (cells, sources) = network.detection_view();
        let mut fired = Vec::new();
        for (id, source) in sources.iter_mut().enumerate() {
            let Some(cell) = cells.get(source.cell as usize) else {
                continue;
            };
            let Ok(v) = cell.neuron.voltage(source.location) else {
                continue;
            };
            if source.check(v, t) {
                trace!(source = id, cell = source.cell, time = t, "spike");
                fired.push(id);
            }
        }
        fired
    }

    /// Queue one event per connection leaving each fired source.
    pub fn schedule(&mut self, network: &Network, fired: &[SourceId], t: f64) {
        for &source in fired {
            for conn in network.connections_from(source) {
                self.queue.schedule(SynapticEvent {
                    time: t + conn.delay,
                    target: conn.target,
                    weight: conn.weight,
                });
            }
        }
    }

    /// Apply every event due by `until`. Returns how many were delivered.
    pub fn dispatch(&mut self, network: &mut Network, until: f64) -> Result<usize> {
        let due = self.queue.pop_due(until);
        let n = due.len();
        for ev in due {
            let target = ev.target;
            let neuron = network
                .neuron_mut(target.cell)
                .map_err(|_| CableError::DanglingTarget {
                    cell: target.cell,
                    synapse: target.synapse,
                })?;
            neuron.deliver(target.synapse, ev.weight)?;
            trace!(
                cell = target.cell,
                synapse = target.synapse,
                time = ev.time,
                weight = ev.weight,
                "delivered"
            );
        }
        self.delivered += n as u64;
        Ok(n)
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Queued events in delivery order.
    pub fn pending(&self) -> Vec<SynapticEvent> {
        self.queue.pending()
    }

    /// Events delivered since the last clear.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.delivered = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{CellId, SynapseId};
    use cable_core::{Exp2SynParams, Mechanism, Morphology, PassiveParams, Section, SynapseKind};

    fn setup() -> (Network, CellId, SynapseId, SourceId) {
        let mut net = Network::new();
        for _ in 0..2 {
            let mut m = Morphology::new();
            m.add_section(Section::new("soma", 20.0, 20.0, 1, 100.0, 1.0).unwrap());
            let c = net.add_cell(m).unwrap();
            net.insert(c, 0, Mechanism::passive(PassiveParams::default()).unwrap()).unwrap();
        }
        net.initialize(-65.0).unwrap();
        let kind = SynapseKind::Exp2(Exp2SynParams { tau1: 0.5, tau2: 2.0, e: 0.0 });
        let syn = net.add_synapse(1, 0, 0.5, kind).unwrap();
        let src = net.set_spike_detector(0, 0, 0.5, 0.0).unwrap();
        net.connect(src, syn, 0.01, 2.0).unwrap();
        (net, 0, syn, src)
    }

    fn drive(net: &mut Network, cell: CellId, v: f64) {
        let loc = cable_core::Location { section: 0, index: 0 };
        net.neuron_mut(cell).unwrap().compartment_mut(loc).unwrap().v = v;
    }

    #[test]
    fn crossing_schedules_after_delay() {
        let (mut net, pre, syn, src) = setup();
        let mut d = EventDelivery::new();
        drive(&mut net, pre, 5.0);
        let fired = d.detect(&mut net, 1.0);
        assert_eq!(fired, vec![src]);
        d.schedule(&net, &fired, 1.0);
        let pending = d.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].time, 3.0);
        assert_eq!(pending[0].target, syn);

        assert_eq!(d.dispatch(&mut net, 2.975).unwrap(), 0);
        assert_eq!(net.neuron(1).unwrap().synapse(syn.synapse).unwrap().state(), (0.0, 0.0));
        assert_eq!(d.dispatch(&mut net, 3.0).unwrap(), 1);
        assert!(net.neuron(1).unwrap().synapse(syn.synapse).unwrap().conductance().abs() < 1e-12);
        assert!(net.neuron(1).unwrap().synapse(syn.synapse).unwrap().state().1 > 0.0);
        assert_eq!(d.delivered(), 1);
        assert!(d.queue().is_empty());
    }

    #[test]
    fn held_above_threshold_fires_once() {
        let (mut net, pre, _, src) = setup();
        let mut d = EventDelivery::new();
        drive(&mut net, pre, 5.0);
        let mut total = 0;
        for k in 1..=10 {
            total += d.detect(&mut net, k as f64 * 0.025).len();
        }
        assert_eq!(total, 1);
        assert_eq!(net.source(src).unwrap().spike_times(), &[0.025]);
    }

    #[test]
    fn event_for_removed_synapse_is_dangling() {
        let (mut net, pre, syn, _) = setup();
        let mut d = EventDelivery::new();
        drive(&mut net, pre, 5.0);
        let fired = d.detect(&mut net, 0.5);
        d.schedule(&net, &fired, 0.5);
        net.remove_synapse(syn).unwrap();
        assert!(matches!(
            d.dispatch(&mut net, 10.0),
            Err(CableError::DanglingTarget { cell: 1, synapse: 0 })
        ));
    }
}
