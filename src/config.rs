//! Run configuration, read from TOML or built in code.
//!
//! ```rust
//! use boolmatch::config::{Algorithm, MatchConfig};
//!
//! let config: MatchConfig = "algorithm = \"blocking\"\nallow_neg_map = true".parse().unwrap();
//! assert_eq!(config.algorithm, Algorithm::Blocking);
//! assert!(config.allow_neg_map);
//! assert_eq!(config.timeout_secs, 60);
//! config.validate().unwrap();
//! ```

use std::{
    fs,
    path::Path,
    str::FromStr,
    time::{Duration, Instant},
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    generalize::GeneralizeOptions, matrix::BlockType, miter::Encoding, sim::SimOrder,
};

/// Error returned when a configuration cannot be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The configuration is not valid TOML or has unknown keys.
    #[error("invalid configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Two settings cannot be used together.
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(&'static str),
}

/// The search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Candidate permutations from a dedicated matrix oracle, validated one by one.
    #[default]
    Iterative,
    /// Counterexamples first over a miter holding the matrix, then enumeration.
    Blocking,
}

/// Every knob of a run. Missing keys take their default value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    /// Wall-clock limit of the run in seconds, 0 for none.
    pub timeout_secs: u64,
    pub print_matches: bool,
    pub algorithm: Algorithm,
    pub encoding: Encoding,
    /// Allow target inputs to be complemented.
    pub allow_neg_map: bool,
    pub block_type: BlockType,
    /// Ternary simulation generalization.
    pub use_cirsim: bool,
    pub sim_order: SimOrder,
    /// UNSAT-core generalization on a dual miter.
    pub use_ucore: bool,
    pub use_lit_drop: bool,
    pub lit_drop_conflict_limit: u64,
    /// Report the core of each valid match along with it.
    pub minimize_valid_matches: bool,
    /// Dual-rail: two don't-care inputs also count as equal.
    pub use_weak_input_eq: bool,
    /// Dual-rail: steer inputs toward don't-care.
    pub use_dual_rail_dc_bias: bool,
    /// Blocking: steer inputs toward the dominant value of counterexamples.
    pub use_max_val_approx: bool,
    pub use_adaptive_max_val: bool,
    pub max_val_init: u8,
    pub max_val_boost: f64,
    pub stop_at_first_valid_match: bool,
    pub stop_after_blocking: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            timeout_secs: 60,
            print_matches: true,
            algorithm: Algorithm::Iterative,
            encoding: Encoding::Tseitin,
            allow_neg_map: false,
            block_type: BlockType::Dynamic,
            use_cirsim: false,
            sim_order: SimOrder::InputsFirst,
            use_ucore: false,
            use_lit_drop: true,
            lit_drop_conflict_limit: 0,
            minimize_valid_matches: false,
            use_weak_input_eq: false,
            use_dual_rail_dc_bias: false,
            use_max_val_approx: false,
            use_adaptive_max_val: true,
            max_val_init: 1,
            max_val_boost: 1.0,
            stop_at_first_valid_match: false,
            stop_after_blocking: false,
        }
    }
}

impl FromStr for MatchConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl MatchConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        fs::read_to_string(path)?.parse()
    }

    /// Reads `base`, then applies each override (a TOML snippet such as
    /// `allow_neg_map = true`) on top of it. Later overrides win.
    pub fn from_toml_with_overrides(
        base: &str,
        overrides: &[impl AsRef<str>],
    ) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(base)?;
        for option in overrides {
            let option: toml::Table = toml::from_str(option.as_ref())?;
            table.extend(option);
        }
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Rejects combinations of settings that are unsound or meaningless together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let conflict = |msg| Err(ConfigError::ConfigurationConflict(msg));
        if !self.allow_neg_map && (self.use_cirsim || self.use_ucore) {
            return conflict("generalization requires negated maps to be allowed");
        }
        if self.use_max_val_approx && self.allow_neg_map {
            return conflict("max-value approximation cannot be used with negated maps");
        }
        if self.algorithm == Algorithm::Blocking && self.encoding == Encoding::DualRail {
            return conflict("the blocking algorithm only supports tseitin encoding");
        }
        if self.use_weak_input_eq && !self.allow_neg_map {
            return conflict("weak input equality requires negated maps to be allowed");
        }
        if self.use_weak_input_eq && self.encoding != Encoding::DualRail {
            return conflict("weak input equality requires dual-rail encoding");
        }
        if self.block_type == BlockType::Eliminate
            && self.allow_neg_map
            && (self.use_cirsim
                || self.use_ucore
                || self.use_weak_input_eq
                || self.encoding == Encoding::DualRail)
        {
            return conflict(
                "elimination with negated maps needs fully Boolean counterexamples",
            );
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// The deadline of a run starting now.
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout().map(|t| Instant::now() + t)
    }

    /// The first biased value of the max-value approximation.
    pub fn max_val_init(&self) -> bool {
        self.max_val_init > 0
    }

    pub fn generalize_options(&self) -> GeneralizeOptions {
        GeneralizeOptions {
            use_cirsim: self.use_cirsim,
            sim_order: self.sim_order,
            use_ucore: self.use_ucore,
            use_lit_drop: self.use_lit_drop,
            conflict_limit: self.lit_drop_conflict_limit,
        }
    }
}
