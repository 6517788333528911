use crate::{
    circuit::{AndGate, Circuit, CircuitError},
    lit::{AigIndex, AigLit},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl Circuit {
    fn check_lit_range(&self, lit: AigLit) -> Result<(), CircuitError> {
        if lit.index() > self.max_index {
            return Err(CircuitError::LiteralOutOfRange {
                lit,
                max_index: self.max_index,
            });
        }
        Ok(())
    }

    /// Checks that:
    /// - every literal is in range
    /// - inputs and gate outputs are positive, non-constant and defined once
    /// - every gate operand and output refers to a defined index.
    pub(super) fn check_integrity(&self) -> Result<(), CircuitError> {
        let mut defined = vec![false; self.max_index as usize + 1];
        defined[0] = true;

        let definitions = self
            .inputs
            .iter()
            .copied()
            .chain(self.ands.iter().map(|gate| gate.lhs));
        for lit in definitions {
            self.check_lit_range(lit)?;
            if lit.is_complemented() {
                return Err(CircuitError::ComplementedDefinition(lit));
            }
            let slot = &mut defined[lit.index() as usize];
            if *slot {
                return Err(CircuitError::DuplicateDefinition(lit.index()));
            }
            *slot = true;
        }

        let uses = self
            .ands
            .iter()
            .flat_map(|gate| [gate.rhs0, gate.rhs1])
            .chain(self.outputs.iter().copied());
        for lit in uses {
            self.check_lit_range(lit)?;
            if !defined[lit.index() as usize] {
                return Err(CircuitError::UndefinedIndex(lit.index()));
            }
        }
        Ok(())
    }

    /// Reorders the gates so that every gate comes after the gates of its operands.
    ///
    /// Iterative post-order DFS, so deep circuits do not overflow the stack.
    pub(super) fn sort_topologically(&mut self) -> Result<(), CircuitError> {
        let size = self.max_index as usize + 1;
        let mut gate_of: Vec<Option<usize>> = vec![None; size];
        for (pos, gate) in self.ands.iter().enumerate() {
            gate_of[gate.lhs.index() as usize] = Some(pos);
        }

        let mut marks = vec![Mark::Unvisited; size];
        let mut sorted: Vec<AndGate> = Vec::with_capacity(self.ands.len());
        // (index, operands already pushed)
        let mut stack: Vec<(AigIndex, bool)> = Vec::new();

        for root in self.ands.iter().map(|gate| gate.lhs.index()) {
            if marks[root as usize] != Mark::Unvisited {
                continue;
            }
            stack.push((root, false));
            while let Some((index, expanded)) = stack.pop() {
                let Some(pos) = gate_of[index as usize] else {
                    continue;
                };
                if expanded {
                    marks[index as usize] = Mark::Done;
                    sorted.push(self.ands[pos]);
                    continue;
                }
                match marks[index as usize] {
                    Mark::Done => continue,
                    Mark::InProgress => return Err(CircuitError::Cycle(index)),
                    Mark::Unvisited => (),
                }
                marks[index as usize] = Mark::InProgress;
                stack.push((index, true));
                let gate = self.ands[pos];
                for child in [gate.rhs1.index(), gate.rhs0.index()] {
                    match marks[child as usize] {
                        Mark::InProgress if gate_of[child as usize].is_some() => {
                            return Err(CircuitError::Cycle(child));
                        }
                        Mark::Unvisited => stack.push((child, false)),
                        _ => (),
                    }
                }
            }
        }

        self.ands = sorted;
        Ok(())
    }
}
