//! Three ball-and-stick cells: A excites B and C, B feeds inhibition back to A.
//!
//! Sweeps the drive current on A and the position of the inhibitory synapse,
//! printing spike times per cell and the peak inhibitory current.
//!
//! Run with: cargo run -p cable-core-plus --example feedback_circuit

use anyhow::Result;
use cable_core_plus::{
    CellId, CellTemplate, ClampParams, Exp2SynParams, Network, Probe, Simulation, SynapseKind,
};

struct Circuit {
    net: Network,
    cells: [CellId; 3],
}

fn circuit(drive: f64) -> Result<Circuit> {
    let mut net = Network::new();
    let template = CellTemplate::ball_and_stick();
    let a = template.instantiate(&mut net)?;
    let b = template.instantiate(&mut net)?;
    let c = template.instantiate(&mut net)?;

    let soma = net.section(a, "soma")?;
    net.add_clamp(a, soma, 0.5, ClampParams { delay: 10.0, duration: 90.0, amplitude: drive })?;

    let excite = SynapseKind::Exp2(Exp2SynParams { tau1: 0.5, tau2: 1.0, e: 40.0 });
    let axon = net.section(a, "axon")?;
    let from_a = net.spike_source(a, axon, 0.9, 0.0)?;
    for target in [b, c] {
        let soma = net.section(target, "soma")?;
        let syn = net.add_synapse(target, soma, 0.5, excite)?;
        net.connect(from_a, syn, 5.0, 1.0)?;
    }
    Ok(Circuit { net, cells: [a, b, c] })
}

fn report(sim: &Simulation, cells: &[CellId; 3]) -> Result<()> {
    for (name, &cell) in ["A", "B", "C"].iter().zip(cells) {
        let spikes = sim.spike_times(cell)?;
        println!("  {name}: {:>3} spikes {:?}", spikes.len(), spikes);
    }
    Ok(())
}

fn main() -> Result<()> {
    for drive in [150.0, 200.0, 250.0] {
        let Circuit { net, cells } = circuit(drive)?;
        let mut sim = Simulation::new(net);
        sim.initialize(-65.0)?;
        sim.run(100.0)?;
        println!("drive {drive} nA, no inhibition");
        report(&sim, &cells)?;

        for (section, x) in [("soma", 0.5), ("axon", 0.3), ("axon", 0.7)] {
            let Circuit { mut net, cells } = circuit(drive)?;
            let [a, b, _] = cells;
            let site = net.section(a, section)?;
            let inhibit = SynapseKind::Exp2(Exp2SynParams { tau1: 1.0, tau2: 2.0, e: -65.0 });
            let syn = net.add_synapse(a, site, x, inhibit)?;
            let axon = net.section(b, "axon")?;
            let from_b = net.spike_source(b, axon, 0.9, 0.0)?;
            net.connect(from_b, syn, 1000.0, 1.0)?;

            let mut sim = Simulation::new(net);
            let i = sim.record_as(a, "i_inhibit", Probe::SynapticCurrent(syn))?;
            sim.initialize(-65.0)?;
            sim.run(100.0)?;

            let peak = sim
                .trace(i)
                .map(|s| s.values().iter().fold(0.0_f64, |m, v| m.max(v.abs())))
                .unwrap_or(0.0);
            println!("drive {drive} nA, inhibition at {section}({x}), peak |i| {peak:.1} nA");
            report(&sim, &cells)?;
        }
    }
    Ok(())
}
