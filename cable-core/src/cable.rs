//! Implicit cable integrator for one cell.
//!
//! Compartments are numbered breadth-first from the root so that every
//! node's parent has a smaller index. The backward-Euler system
//!
//! ```text
//! (C_i/dt + G_i + sum_j a_ij) V_i' - sum_j a_ij V_j' = C_i/dt V_i + sum g E + I_inj
//! ```
//!
//! is then tridiagonal on the tree and is solved in O(n) by eliminating
//! leaves into parents and back-substituting from the root.

use std::collections::VecDeque;

use tracing::debug;

use crate::channel::Conductance;
use crate::morphology::{Location, Morphology};

/// Point-process input on one node for the coming step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeInput {
    /// Synaptic branches (uS, uS*mV)
    pub conductance: Conductance,
    /// Stimulus current (nA)
    pub current: f64,
}

/// A voltage left the finite range during a solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Diverged {
    pub location: Location,
    pub value: f64,
}

#[derive(Clone, Debug)]
pub struct CableTree {
    nodes: Vec<Location>,
    parent: Vec<usize>,
    /// Axial conductance to the parent (uS); unused for the root
    axial: Vec<f64>,
    capacitance: Vec<f64>,
    /// node_of[section][index]
    node_of: Vec<Vec<usize>>,
    diag: Vec<f64>,
    rhs: Vec<f64>,
    v_pre: Vec<f64>,
}

impl CableTree {
    /// Flatten a morphology. The caller guarantees a single root (see `Morphology::root`).
    pub fn build(morphology: &Morphology, root: usize) -> Self {
        let sections = morphology.sections();

        // children[section][index] -> child locations
        let mut children: Vec<Vec<Vec<Location>>> =
            sections.iter().map(|s| vec![Vec::new(); s.nseg()]).collect();
        for (sid, s) in sections.iter().enumerate() {
            for i in 1..s.nseg() {
                children[sid][i - 1].push(Location { section: sid, index: i });
            }
            if let Some((p, x)) = s.parent() {
                // `connect` validated the position
                let at = sections[p].locate(x).unwrap_or(0);
                children[p][at].push(Location { section: sid, index: 0 });
            }
        }

        let n = morphology.compartment_count();
        let mut nodes = Vec::with_capacity(n);
        let mut parent = Vec::with_capacity(n);
        let mut node_of: Vec<Vec<usize>> = sections.iter().map(|s| vec![0; s.nseg()]).collect();

        let mut queue = VecDeque::new();
        queue.push_back((Location { section: root, index: 0 }, 0usize));
        while let Some((loc, up)) = queue.pop_front() {
            let id = nodes.len();
            node_of[loc.section][loc.index] = id;
            nodes.push(loc);
            parent.push(up);
            for &c in &children[loc.section][loc.index] {
                queue.push_back((c, id));
            }
        }

        let comp = |loc: Location| &sections[loc.section].compartments()[loc.index];
        let capacitance = nodes.iter().map(|&l| comp(l).membrane_capacitance()).collect();
        let axial = nodes
            .iter()
            .enumerate()
            .map(|(i, &l)| {
                if i == 0 {
                    0.0
                } else {
                    comp(l).axial_conductance_to(comp(nodes[parent[i]]))
                }
            })
            .collect();

        debug!(nodes = nodes.len(), sections = sections.len(), "flattened cable tree");

        Self {
            node_of,
            axial,
            capacitance,
            diag: vec![0.0; nodes.len()],
            rhs: vec![0.0; nodes.len()],
            v_pre: vec![0.0; nodes.len()],
            nodes,
            parent,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, loc: Location) -> usize {
        self.node_of[loc.section][loc.index]
    }

    pub fn location(&self, node: usize) -> Location {
        self.nodes[node]
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        if node == 0 {
            None
        } else {
            Some(self.parent[node])
        }
    }

    pub fn axial_conductance(&self, node: usize) -> f64 {
        self.axial[node]
    }

    /// Advance gates and voltages of every compartment by `dt`.
    ///
    /// Gates move first using the pre-step voltage, then voltages are solved
    /// with the resulting channel conductances plus `inputs` (indexed by node).
    pub fn advance(
        &mut self,
        morphology: &mut Morphology,
        inputs: &[NodeInput],
        dt: f64,
    ) -> Result<(), Diverged> {
        let n = self.nodes.len();
        debug_assert_eq!(inputs.len(), n);

        for i in 0..n {
            let c = morphology.at_mut(self.nodes[i]);
            let v = c.v;
            self.v_pre[i] = v;
            for mech in c.mechanisms_mut() {
                mech.advance(v, dt);
            }

            let ionic = c.ionic_conductance();
            let input = &inputs[i];
            let cdt = self.capacitance[i] / dt;
            self.diag[i] = cdt + ionic.g + input.conductance.g;
            self.rhs[i] = cdt * v + ionic.ge + input.conductance.ge + input.current + c.i_inj;
        }

        for i in 1..n {
            let a = self.axial[i];
            self.diag[i] += a;
            self.diag[self.parent[i]] += a;
        }

        // Off-diagonal entry between i and parent[i] is -axial[i].
        for i in (1..n).rev() {
            let p = self.parent[i];
            let f = -self.axial[i] / self.diag[i];
            self.diag[p] += f * self.axial[i];
            self.rhs[p] -= f * self.rhs[i];
        }

        let mut diverged = None;
        for i in 0..n {
            let v = if i == 0 {
                self.rhs[0] / self.diag[0]
            } else {
                let vp = self.v_pre[self.parent[i]];
                (self.rhs[i] + self.axial[i] * vp) / self.diag[i]
            };
            // v_pre now holds solved voltages for nodes < i
            self.v_pre[i] = v;
            if !v.is_finite() && diverged.is_none() {
                diverged = Some(Diverged {
                    location: self.nodes[i],
                    value: v,
                });
            }
        }

        for i in 0..n {
            morphology.at_mut(self.nodes[i]).v = self.v_pre[i];
        }

        match diverged {
            Some(d) => Err(d),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Mechanism, PassiveParams};
    use crate::morphology::Section;
    use approx::assert_abs_diff_eq;

    fn branched() -> (Morphology, usize) {
        let mut m = Morphology::new();
        let soma = m.add_section(Section::new("soma", 20.0, 20.0, 1, 100.0, 1.0).unwrap());
        let a = m.add_section(Section::new("a", 200.0, 2.0, 4, 100.0, 1.0).unwrap());
        let b = m.add_section(Section::new("b", 200.0, 2.0, 4, 100.0, 1.0).unwrap());
        m.connect(a, soma, 1.0).unwrap();
        m.connect(b, soma, 0.0).unwrap();
        for s in [soma, a, b] {
            m.section_mut(s)
                .unwrap()
                .insert(Mechanism::passive(PassiveParams { g: 0.001, e: -70.0 }).unwrap());
        }
        (m, soma)
    }

    #[test]
    fn parents_precede_children() {
        let (m, root) = branched();
        let tree = CableTree::build(&m, root);
        assert_eq!(tree.len(), 9);
        assert_eq!(tree.location(0), Location { section: root, index: 0 });
        for i in 1..tree.len() {
            assert!(tree.parent(i).unwrap() < i);
            assert!(tree.axial_conductance(i) > 0.0);
        }
        // every location maps back to itself
        for i in 0..tree.len() {
            assert_eq!(tree.node(tree.location(i)), i);
        }
    }

    #[test]
    fn uniform_rest_is_a_fixed_point() {
        let (mut m, root) = branched();
        let mut tree = CableTree::build(&m, root);
        for s in 0..m.len() {
            for c in m.section_mut(s).unwrap().compartments_mut() {
                c.initialize(-70.0);
            }
        }
        let inputs = vec![NodeInput::default(); tree.len()];
        for _ in 0..100 {
            tree.advance(&mut m, &inputs, 0.025).unwrap();
        }
        for s in m.sections() {
            for c in s.compartments() {
                assert_abs_diff_eq!(c.v, -70.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn current_spreads_and_attenuates() {
        let (mut m, root) = branched();
        let mut tree = CableTree::build(&m, root);
        for s in 0..m.len() {
            for c in m.section_mut(s).unwrap().compartments_mut() {
                c.initialize(-70.0);
            }
        }
        let mut inputs = vec![NodeInput::default(); tree.len()];
        let tip = tree.node(Location { section: 1, index: 3 });
        inputs[tip].current = 0.05;
        for _ in 0..400 {
            tree.advance(&mut m, &inputs, 0.025).unwrap();
        }
        let v = |s: usize, i: usize| m.compartment(Location { section: s, index: i }).unwrap().v;
        // depolarized where injected, decaying towards the soma and the sibling branch
        assert!(v(1, 3) > v(1, 0));
        assert!(v(1, 0) > v(0, 0));
        assert!(v(0, 0) > v(2, 3));
        assert!(v(2, 3) > -70.0);
    }

    #[test]
    fn implicit_solve_is_stable_with_huge_steps() {
        let (mut m, root) = branched();
        let mut tree = CableTree::build(&m, root);
        for s in 0..m.len() {
            for c in m.section_mut(s).unwrap().compartments_mut() {
                c.initialize(0.0);
            }
        }
        let inputs = vec![NodeInput::default(); tree.len()];
        for _ in 0..10 {
            tree.advance(&mut m, &inputs, 50.0).unwrap();
        }
        for s in m.sections() {
            for c in s.compartments() {
                assert!(c.v <= 0.0 && c.v >= -70.0 - 1e-9);
            }
        }
    }

    #[test]
    fn non_finite_input_reports_divergence() {
        let (mut m, root) = branched();
        let mut tree = CableTree::build(&m, root);
        let mut inputs = vec![NodeInput::default(); tree.len()];
        inputs[3].current = f64::INFINITY;
        let err = tree.advance(&mut m, &inputs, 0.025).unwrap_err();
        assert!(!err.value.is_finite());
    }
}
