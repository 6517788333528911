pub mod circuit;
pub mod cnf;
pub mod config;
pub mod error;
pub mod generalize;
pub mod lit;
pub mod matrix;
pub mod miter;
pub mod oracle;
pub mod search;
pub mod sim;

// Re-exporting symbols and modules.
pub use circuit::{Circuit, CircuitBuilder, CircuitError, ParserError};
pub use config::{Algorithm, MatchConfig};
pub use error::{BoolMatchError, Result};
pub use lit::{AigLit, SatLit, TVal};
pub use matrix::{BlockType, FullMatch, MatchPair};
pub use miter::Encoding;
pub use oracle::{SatOracle, SolveStatus, VarisatOracle};
pub use search::{BoolMatcher, FoundMatch, MatchSink, SearchReport};
