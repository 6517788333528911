use thiserror::Error;

use crate::{
    circuit::{CircuitError, ParserError},
    config::ConfigError,
    generalize::GeneralizeError,
    matrix::MatrixError,
    miter::MiterError,
    oracle::{OracleError, SolveStatus},
};

/// The result of a matching run.
pub type Result<T> = std::result::Result<T, BoolMatchError>;

/// Error returned when a matching run failed.
#[derive(Debug, Error)]
pub enum BoolMatchError {
    /// The wall-clock budget is exhausted. [`BoolMatcher::run`] turns it into a partial
    /// report, it only escapes from lower-level calls.
    ///
    /// [`BoolMatcher::run`]: crate::search::BoolMatcher::run
    #[error("timeout")]
    Timeout,

    /// The encoded circuits (and the initial mapping, if any) admit no model at all.
    #[error("the initial model is unsatisfiable")]
    InitialModelUnsat,

    /// An oracle answered a status that is impossible at this point of the search.
    #[error("solver contract violation: {0:?} during {1}")]
    SolverContractViolation(SolveStatus, &'static str),

    /// Matching is only defined for circuits with the same number of inputs.
    #[error("circuits have different input counts: {0} vs {1}")]
    InputCountMismatch(usize, usize),

    /// A component was used outside of its domain.
    #[error("precondition violation: {0}")]
    PreconditionViolation(String),

    /// Just forwarding a [`ConfigError`].
    #[error("{0}")]
    ConfigError(#[from] ConfigError),

    /// Just forwarding a [`CircuitError`].
    #[error("{0}")]
    CircuitError(#[from] CircuitError),

    /// Just forwarding a [`OracleError`].
    #[error("{0}")]
    OracleError(#[from] OracleError),

    /// Just forwarding a [`MatrixError`].
    #[error("{0}")]
    MatrixError(#[from] MatrixError),

    /// Just forwarding a [`GeneralizeError`].
    #[error("{0}")]
    GeneralizeError(#[from] GeneralizeError),
}

impl From<ParserError> for BoolMatchError {
    fn from(value: ParserError) -> Self {
        BoolMatchError::CircuitError(value.into())
    }
}

impl From<MiterError> for BoolMatchError {
    fn from(value: MiterError) -> Self {
        match value {
            MiterError::InputCountMismatch(src, trg) => BoolMatchError::InputCountMismatch(src, trg),
            MiterError::CircuitError(e) => BoolMatchError::CircuitError(e),
            e @ MiterError::EncodingMismatch { .. } => {
                BoolMatchError::PreconditionViolation(e.to_string())
            }
        }
    }
}
