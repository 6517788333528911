//! Module defining the [`Circuit`] struct, the read-only view of a combinational AIG
//! consumed by the encoder and the simulator.
//!
//! A circuit can be read from an AIGER file with [`Circuit::from_file`] or built by hand
//! with a [`CircuitBuilder`]:
//!
//! ```rust
//! use boolmatch::circuit::CircuitBuilder;
//!
//! let mut builder = CircuitBuilder::new();
//! let a = builder.add_input();
//! let b = builder.add_input();
//! let z = builder.add_and(a, b);
//! builder.add_output(z);
//! let circuit = builder.build().unwrap();
//! assert_eq!(circuit.evaluate(&[true, true]), vec![true]);
//! ```

pub mod bfs;
pub mod error;
mod integrity;
mod parser;

pub use error::{CircuitError, ParserError};

use crate::lit::{AigIndex, AigLit};

/// An AND gate `lhs = rhs0 & rhs1`. `lhs` is always a positive literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AndGate {
    pub lhs: AigLit,
    pub rhs0: AigLit,
    pub rhs1: AigLit,
}

/// A combinational AIG.
///
/// Gates are stored in topological order, so a single forward pass over [`ands`]
/// evaluates the whole circuit.
///
/// [`ands`]: Circuit::ands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    max_index: AigIndex,
    inputs: Vec<AigLit>,
    outputs: Vec<AigLit>,
    ands: Vec<AndGate>,
    /// Position of the gate defining an index, if any.
    gate_of: Vec<Option<usize>>,
    /// Indices used by the circuit: inputs, gate operands and outputs.
    referenced: Vec<bool>,
}

impl Circuit {
    /// Creates a circuit after checking its integrity.
    ///
    /// Gates may be given in any order, they are sorted topologically.
    pub fn new(
        max_index: AigIndex,
        inputs: Vec<AigLit>,
        outputs: Vec<AigLit>,
        ands: Vec<AndGate>,
    ) -> Result<Self, CircuitError> {
        let mut circuit = Circuit {
            max_index,
            inputs,
            outputs,
            ands,
            gate_of: Vec::new(),
            referenced: Vec::new(),
        };
        circuit.check_integrity()?;
        circuit.sort_topologically()?;
        circuit.compute_indices();
        Ok(circuit)
    }

    fn compute_indices(&mut self) {
        let size = self.max_index as usize + 1;
        self.gate_of = vec![None; size];
        self.referenced = vec![false; size];
        for (pos, gate) in self.ands.iter().enumerate() {
            self.gate_of[gate.lhs.index() as usize] = Some(pos);
            self.referenced[gate.rhs0.index() as usize] = true;
            self.referenced[gate.rhs1.index() as usize] = true;
        }
        for lit in self.inputs.iter().chain(self.outputs.iter()) {
            self.referenced[lit.index() as usize] = true;
        }
    }

    pub fn max_index(&self) -> AigIndex {
        self.max_index
    }

    /// The ordered list of input literals.
    pub fn inputs(&self) -> &[AigLit] {
        &self.inputs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn outputs(&self) -> &[AigLit] {
        &self.outputs
    }

    /// The output literal of a single-output circuit.
    pub fn output(&self) -> Result<AigLit, CircuitError> {
        match self.outputs.as_slice() {
            [out] => Ok(*out),
            outs => Err(CircuitError::NotSingleOutput(outs.len())),
        }
    }

    /// The gates, in topological order.
    pub fn ands(&self) -> &[AndGate] {
        &self.ands
    }

    /// The gate defining `index`, if `index` is a gate output.
    pub fn gate(&self, index: AigIndex) -> Option<&AndGate> {
        self.gate_of
            .get(index as usize)
            .copied()
            .flatten()
            .map(|pos| &self.ands[pos])
    }

    /// Whether the index is used as an input, a gate operand or an output.
    pub fn is_index_referenced(&self, index: AigIndex) -> bool {
        self.referenced.get(index as usize).copied().unwrap_or(false)
    }

    /// Evaluates all outputs for the given input values (one per input, in order).
    pub fn evaluate(&self, values: &[bool]) -> Vec<bool> {
        let mut node = vec![false; self.max_index as usize + 1];
        for (lit, &val) in self.inputs.iter().zip(values) {
            node[lit.index() as usize] = val;
        }
        let read = |node: &[bool], lit: AigLit| node[lit.index() as usize] ^ lit.is_complemented();
        for gate in &self.ands {
            node[gate.lhs.index() as usize] = read(&node, gate.rhs0) && read(&node, gate.rhs1);
        }
        self.outputs.iter().map(|&lit| read(&node, lit)).collect()
    }
}

/// Incremental construction of a [`Circuit`], mostly useful for tests.
///
/// Indices are allocated in order: inputs and gates get the next free index.
#[derive(Debug, Clone, Default)]
pub struct CircuitBuilder {
    max_index: AigIndex,
    inputs: Vec<AigLit>,
    outputs: Vec<AigLit>,
    ands: Vec<AndGate>,
}

impl CircuitBuilder {
    pub fn new() -> Self {
        CircuitBuilder::default()
    }

    fn fresh(&mut self) -> AigLit {
        self.max_index += 1;
        AigLit::from_index(self.max_index)
    }

    pub fn add_input(&mut self) -> AigLit {
        let lit = self.fresh();
        self.inputs.push(lit);
        lit
    }

    pub fn add_and(&mut self, rhs0: AigLit, rhs1: AigLit) -> AigLit {
        let lhs = self.fresh();
        self.ands.push(AndGate { lhs, rhs0, rhs1 });
        lhs
    }

    /// `a | b`, as `!(!a & !b)`.
    pub fn add_or(&mut self, a: AigLit, b: AigLit) -> AigLit {
        !self.add_and(!a, !b)
    }

    /// `a ^ b`, with three AND gates.
    pub fn add_xor(&mut self, a: AigLit, b: AigLit) -> AigLit {
        let both = self.add_and(a, b);
        let none = self.add_and(!a, !b);
        self.add_and(!both, !none)
    }

    pub fn add_output(&mut self, lit: AigLit) {
        self.outputs.push(lit);
    }

    pub fn build(self) -> Result<Circuit, CircuitError> {
        Circuit::new(self.max_index, self.inputs, self.outputs, self.ands)
    }
}
