//! Ternary simulation over {0, 1, X} and don't-care maximization of input assignments.

use log::trace;
use serde::Deserialize;

use crate::{
    circuit::{Circuit, bfs::Bfs},
    lit::{AigLit, TVal},
};

/// The order in which inputs are tried when widening them to don't-care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimOrder {
    /// Inputs in the order of the circuit's input list.
    #[default]
    InputsFirst,
    /// Inputs closest to the output first, in BFS order from the output.
    OutputFirst,
}

/// A ternary simulator bound to one circuit.
#[derive(Debug, Clone)]
pub struct TernarySim {
    circuit: Circuit,
    output: AigLit,
    /// Value of every node index after the last simulation.
    values: Vec<TVal>,
    /// Input positions in widening order.
    order: Vec<usize>,
}

impl TernarySim {
    /// This will fail if the circuit does not have exactly one output.
    pub fn new(circuit: &Circuit, order: SimOrder) -> Result<Self, crate::circuit::CircuitError> {
        let output = circuit.output()?;
        let order = match order {
            SimOrder::InputsFirst => (0..circuit.num_inputs()).collect(),
            SimOrder::OutputFirst => output_first_order(circuit, output),
        };
        Ok(TernarySim {
            circuit: circuit.clone(),
            output,
            values: vec![TVal::DontCare; circuit.max_index() as usize + 1],
            order,
        })
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Input positions in the order [`maximize_dont_care`] tries them.
    ///
    /// [`maximize_dont_care`]: TernarySim::maximize_dont_care
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Simulates the circuit with one value per input position and returns the output.
    /// Missing positions are don't-cares.
    pub fn simulate(&mut self, inputs: &[TVal]) -> TVal {
        self.values.fill(TVal::DontCare);
        self.values[0] = TVal::False;
        for (pos, lit) in self.circuit.inputs().iter().enumerate() {
            let val = inputs.get(pos).copied().unwrap_or_default();
            self.values[lit.index() as usize] = val;
        }
        for gate in self.circuit.ands() {
            let v0 = self.lit_value(gate.rhs0);
            let v1 = self.lit_value(gate.rhs1);
            self.values[gate.lhs.index() as usize] = v0.and(v1);
        }
        self.lit_value(self.output)
    }

    /// Value of `lit` after the last simulation.
    pub fn lit_value(&self, lit: AigLit) -> TVal {
        self.values[lit.index() as usize].complement_if(lit.is_complemented())
    }

    /// Widens as many inputs as possible to don't-care while the output keeps its
    /// current Boolean value. Concrete values are never flipped, only dropped.
    ///
    /// Returns the output value. If the output is not Boolean to begin with, `inputs` is
    /// left untouched.
    pub fn maximize_dont_care(&mut self, inputs: &mut [TVal]) -> TVal {
        let target = self.simulate(inputs);
        if !target.is_bool() {
            return target;
        }
        let mut dropped = 0;
        for i in 0..self.order.len() {
            let pos = self.order[i];
            let Some(&saved) = inputs.get(pos) else {
                continue;
            };
            if !saved.is_bool() {
                continue;
            }
            inputs[pos] = TVal::DontCare;
            if self.simulate(inputs) == target {
                dropped += 1;
            } else {
                inputs[pos] = saved;
            }
        }
        trace!("ternary simulation dropped {dropped} of {} inputs", inputs.len());
        target
    }
}

/// Inputs in BFS order from the output. Inputs outside the output cone come last, in
/// input-list order.
fn output_first_order(circuit: &Circuit, output: AigLit) -> Vec<usize> {
    let mut position = vec![None; circuit.max_index() as usize + 1];
    for (pos, lit) in circuit.inputs().iter().enumerate() {
        position[lit.index() as usize] = Some(pos);
    }
    let mut order = Vec::with_capacity(circuit.num_inputs());
    let mut bfs = Bfs::from_output(circuit, output);
    while let Some(index) = bfs.next(circuit) {
        if let Some(pos) = position[index as usize].take() {
            order.push(pos);
        }
    }
    for (pos, lit) in circuit.inputs().iter().enumerate() {
        if position[lit.index() as usize].is_some() {
            order.push(pos);
        }
    }
    order
}
