//! Provides a BFS visitor walking a circuit from its output towards its inputs.
//!
//! See [`Bfs`] for details.

use std::collections::VecDeque;

use crate::{
    circuit::Circuit,
    lit::{AigIndex, AigLit},
};

/// A simple BFS visitor over node indices.
///
/// Nodes are yielded layer by layer, starting from the output node, so an index is
/// yielded before any index further away from the output. The constant node is never
/// yielded.
///
/// ```rust
/// use boolmatch::circuit::{CircuitBuilder, bfs::Bfs};
///
/// let mut builder = CircuitBuilder::new();
/// let a = builder.add_input();
/// let b = builder.add_input();
/// let z = builder.add_and(a, b);
/// builder.add_output(z);
/// let circuit = builder.build().unwrap();
///
/// let mut bfs = Bfs::from_output(&circuit, z);
/// let mut order = Vec::new();
/// while let Some(index) = bfs.next(&circuit) {
///     order.push(index);
/// }
/// assert_eq!(order, vec![3, 1, 2]);
/// ```
pub struct Bfs {
    /// All indices in the queue have not been yielded yet and are marked as seen.
    queue: VecDeque<AigIndex>,
    seen: Vec<bool>,
}

impl Bfs {
    /// Create a BFS from the given literal of the circuit.
    pub fn from_output(circuit: &Circuit, output: AigLit) -> Self {
        let mut seen = vec![false; circuit.max_index() as usize + 1];
        let mut queue = VecDeque::new();
        if !output.is_const() {
            seen[output.index() as usize] = true;
            queue.push_back(output.index());
        }
        Bfs { queue, seen }
    }

    /// Yield the next index of the BFS, or None if it is done.
    pub fn next(&mut self, circuit: &Circuit) -> Option<AigIndex> {
        let index = self.queue.pop_front()?;
        if let Some(gate) = circuit.gate(index) {
            for child in [gate.rhs0, gate.rhs1] {
                let child = child.index();
                if child != 0 && !self.seen[child as usize] {
                    self.seen[child as usize] = true;
                    self.queue.push_back(child);
                }
            }
        }
        Some(index)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::circuit::CircuitBuilder;

    #[test]
    fn bfs_layers_test() {
        // o = (a & b) & (c & a)
        let mut b = CircuitBuilder::new();
        let x = b.add_input();
        let y = b.add_input();
        let z = b.add_input();
        let g1 = b.add_and(x, y);
        let g2 = b.add_and(z, x);
        let o = b.add_and(g1, g2);
        b.add_output(o);
        let c = b.build().unwrap();

        let mut bfs = Bfs::from_output(&c, o);
        let mut order = Vec::new();
        while let Some(index) = bfs.next(&c) {
            order.push(index);
        }
        assert_eq!(order, vec![6, 4, 5, 1, 2, 3]);
    }

    #[test]
    fn bfs_constant_test() {
        let mut b = CircuitBuilder::new();
        b.add_input();
        b.add_output(AigLit::TRUE);
        let c = b.build().unwrap();
        let mut bfs = Bfs::from_output(&c, AigLit::TRUE);
        assert!(bfs.next(&c).is_none());
    }
}
