use cable_core_plus::{
    CellId, CellTemplate, ClampParams, Exp2SynParams, HhParams, Location, Mechanism, Morphology,
    Network, PassiveParams, Probe, Section, Simulation, SynapseId, SynapseKind,
};

const SOMA: Location = Location { section: 0, index: 0 };
const DT: f64 = 0.025;

fn soma_cell(net: &mut Network, mech: Mechanism) -> CellId {
    let mut m = Morphology::new();
    m.add_section(Section::new("soma", 20.0, 20.0, 1, 100.0, 1.0).unwrap());
    let c = net.add_cell(m).unwrap();
    net.insert(c, 0, mech).unwrap();
    c
}

fn exp2(tau1: f64, tau2: f64, e: f64) -> SynapseKind {
    SynapseKind::Exp2(Exp2SynParams { tau1, tau2, e })
}

/// Pre (HH, clamped) -> post (passive at rest), delay 2 ms.
fn pre_post() -> (Network, CellId, CellId, SynapseId) {
    let mut net = Network::new();
    let pre = soma_cell(&mut net, Mechanism::hh(HhParams::default()).unwrap());
    let post = soma_cell(&mut net, Mechanism::passive(PassiveParams { g: 0.0001, e: -65.0 }).unwrap());
    net.add_clamp(pre, 0, 0.5, ClampParams { delay: 1.0, duration: 20.0, amplitude: 0.5 })
        .unwrap();
    let syn = net.add_synapse(post, 0, 0.5, exp2(0.5, 2.0, 0.0)).unwrap();
    let src = net.set_spike_detector(pre, 0, 0.5, 0.0).unwrap();
    net.connect(src, syn, 0.001, 2.0).unwrap();
    (net, pre, post, syn)
}

/// A excites B and C; optionally B inhibits A.
fn feedback(inhibit: bool) -> (Network, [CellId; 3]) {
    let mut net = Network::new();
    let a = soma_cell(&mut net, Mechanism::hh(HhParams::default()).unwrap());
    let b = soma_cell(&mut net, Mechanism::hh(HhParams::default()).unwrap());
    let c = soma_cell(&mut net, Mechanism::hh(HhParams::default()).unwrap());
    net.add_clamp(a, 0, 0.5, ClampParams { delay: 5.0, duration: 95.0, amplitude: 0.3 })
        .unwrap();

    let src_a = net.set_spike_detector(a, 0, 0.5, 0.0).unwrap();
    let src_b = net.set_spike_detector(b, 0, 0.5, 0.0).unwrap();
    net.set_spike_detector(c, 0, 0.5, 0.0).unwrap();

    for target in [b, c] {
        let syn = net.add_synapse(target, 0, 0.5, exp2(0.5, 2.0, 0.0)).unwrap();
        net.connect(src_a, syn, 0.05, 2.0).unwrap();
    }
    if inhibit {
        let syn = net.add_synapse(a, 0, 0.5, exp2(1.0, 5.0, -80.0)).unwrap();
        net.connect(src_b, syn, 0.5, 1.0).unwrap();
    }
    (net, [a, b, c])
}

#[test]
fn post_depolarizes_two_ms_after_pre_spike() {
    let (net, pre, post, _) = pre_post();
    let mut sim = Simulation::new(net);
    let v = sim.record(Probe::Voltage { cell: post, location: SOMA }).unwrap();
    sim.initialize(-65.0).unwrap();
    sim.run(30.0).unwrap();

    let spikes = sim.spike_times(pre).unwrap();
    assert!(!spikes.is_empty(), "pre never fired");
    let arrival = spikes[0] + 2.0;

    let trace = sim.trace(v).unwrap();
    for (t, x) in trace.iter().filter(|&(t, _)| t <= arrival + 1e-9) {
        assert!((x + 65.0).abs() < 1e-9, "post moved before arrival: {x} at {t}");
    }
    let peak = trace
        .iter()
        .filter(|&(t, _)| t > arrival && t <= arrival + 3.0)
        .map(|(_, x)| x)
        .fold(f64::MIN, f64::max);
    assert!(peak > -64.5, "peak {peak}");
}

#[test]
fn synapse_state_changes_exactly_at_delivery_time() {
    let (net, pre, post, syn) = pre_post();
    let mut sim = Simulation::new(net);
    sim.initialize(-65.0).unwrap();
    while sim.spike_times(pre).unwrap().is_empty() {
        sim.step().unwrap();
        assert!(sim.time() < 30.0, "pre never fired");
    }
    let emitted = sim.spike_times(pre).unwrap()[0];
    assert_eq!(emitted, sim.time());
    let pending = sim.pending_events();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].time, emitted + 2.0);
    assert_eq!(pending[0].target, syn);

    let state = |sim: &Simulation| {
        sim.network()
            .neuron(post)
            .unwrap()
            .synapse(syn.synapse)
            .unwrap()
            .state()
    };
    while sim.time() < emitted + 2.0 - DT - 1e-9 {
        sim.step().unwrap();
    }
    assert_eq!(state(&sim), (0.0, 0.0));
    sim.step().unwrap();
    assert!((sim.time() - (emitted + 2.0)).abs() < 1e-9);
    let (a, b) = state(&sim);
    assert!(a > 0.0 && b > 0.0);
}

#[test]
fn feedback_inhibition_reduces_driver_spikes() {
    let count = |inhibit: bool| {
        let (net, [a, b, c]) = feedback(inhibit);
        let mut sim = Simulation::new(net);
        sim.initialize(-65.0).unwrap();
        sim.run(100.0).unwrap();
        assert!(!sim.spike_times(b).unwrap().is_empty());
        assert!(!sim.spike_times(c).unwrap().is_empty());
        sim.spike_times(a).unwrap().len()
    };
    let free = count(false);
    let inhibited = count(true);
    assert!(free > 1);
    assert!(inhibited < free, "inhibited {inhibited} vs free {free}");
}

#[test]
fn held_above_threshold_records_one_spike() {
    let mut net = Network::new();
    let c = soma_cell(&mut net, Mechanism::passive(PassiveParams { g: 0.001, e: 20.0 }).unwrap());
    net.set_spike_detector(c, 0, 0.5, 0.0).unwrap();
    let mut sim = Simulation::new(net);
    let v = sim.record(Probe::Voltage { cell: c, location: SOMA }).unwrap();
    sim.initialize(-65.0).unwrap();
    sim.run(50.0).unwrap();

    let spikes = sim.spike_times(c).unwrap();
    assert_eq!(spikes.len(), 1);
    let trace = sim.trace(v).unwrap();
    // the spike sits at the first sample above threshold
    let first_above = trace.iter().find(|&(_, x)| x > 0.0).map(|(t, _)| t);
    assert_eq!(first_above, Some(spikes[0]));
    assert!(trace.last().unwrap().1 > 19.0);
}

#[test]
fn repeated_trials_are_bit_identical() {
    let (net, cells) = feedback(true);
    let mut sim = Simulation::new(net);
    let mut trials = Vec::new();
    for _ in 0..2 {
        sim.initialize(-65.0).unwrap();
        sim.run(100.0).unwrap();
        let spikes: Vec<Vec<f64>> = cells
            .iter()
            .map(|&c| sim.spike_times(c).unwrap().to_vec())
            .collect();
        trials.push(spikes);
    }
    assert!(!trials[0][0].is_empty());
    assert_eq!(trials[0], trials[1]);
}

#[test]
fn recording_has_one_sample_per_step() {
    let (net, pre, _, syn) = pre_post();
    let mut sim = Simulation::new(net);
    let v = sim.record(Probe::Voltage { cell: pre, location: SOMA }).unwrap();
    let g = sim.record(Probe::SynapticCurrent(syn)).unwrap();
    sim.initialize(-65.0).unwrap();
    sim.run(100.0).unwrap();

    for h in [v, g] {
        let times = sim.trace(h).unwrap().times();
        assert_eq!(times.len(), 4001);
        assert_eq!(times[0], 0.0);
        for w in times.windows(2) {
            assert!(w[1] > w[0]);
            approx::assert_abs_diff_eq!(w[1] - w[0], DT, epsilon = 1e-9);
        }
    }
}

#[test]
fn ball_and_stick_fires_under_soma_clamp() -> anyhow::Result<()> {
    let mut net = Network::new();
    let cell = CellTemplate::ball_and_stick().instantiate(&mut net)?;
    let soma = net.section(cell, "soma")?;
    net.add_clamp(cell, soma, 0.5, ClampParams { delay: 10.0, duration: 90.0, amplitude: 200.0 })?;
    let mut sim = Simulation::new(net);
    let axon = sim.network().section(cell, "axon")?;
    let loc = sim.network().neuron(cell)?.location(axon, 0.1)?;
    let v = sim.record_as(cell, "axon_v", Probe::Voltage { cell, location: loc })?;
    sim.initialize(-65.0)?;
    sim.run(60.0)?;

    let spikes = sim.spike_times(cell)?;
    assert!(!spikes.is_empty());
    assert!(spikes.iter().all(|&t| t > 10.0));
    assert_eq!(sim.named_trace(cell, "axon_v"), sim.trace(v));
    Ok(())
}
