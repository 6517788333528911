use thiserror::Error;

use crate::lit::{AigIndex, AigLit};

/// Error returned when a circuit cannot be built or read.
#[derive(Debug, Error)]
pub enum CircuitError {
    /// The literal refers to an index above the declared maximum index.
    #[error("literal {lit} is out of range (max index is {max_index})")]
    LiteralOutOfRange { lit: AigLit, max_index: AigIndex },

    /// Inputs and gate outputs must be positive literals.
    #[error("literal {0} is complemented but defines a node")]
    ComplementedDefinition(AigLit),

    /// The index is defined more than once (as an input or a gate), or is the constant node.
    #[error("index {0} is defined more than once")]
    DuplicateDefinition(AigIndex),

    /// The index is used by a gate or an output but never defined.
    #[error("index {0} is used but never defined")]
    UndefinedIndex(AigIndex),

    /// The gates contain a combinational cycle through this index.
    #[error("combinational cycle through index {0}")]
    Cycle(AigIndex),

    /// Matching is only defined for circuits with exactly one output.
    #[error("expected exactly one output, got {0}")]
    NotSingleOutput(usize),

    /// Just forwarding a [`ParserError`].
    #[error("{0}")]
    ParserError(#[from] ParserError),
}

/// Error returned when parsing from file failed.
#[derive(Debug, Error)]
pub enum ParserError {
    /// All features are not supported (combinational AIGs only).
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Invalid token, something else was expected.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// An IO error occured (file doesn't exist, or doesn't have the right extension, ...).
    #[error("io error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ParserError {
    fn from(value: std::io::Error) -> Self {
        ParserError::IoError(value.to_string())
    }
}
