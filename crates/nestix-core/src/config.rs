//! Module: config
//! Responsibility: evaluation tunables and their TOML loading.
//! Does not own: tree shape decisions, which come from the external planner.

use crate::error::{ConfigurationError, EvalError};
use serde::Deserialize;

///
/// EvalConfig
///
/// Knobs shared by every node of one evaluation tree.
/// Loaded from TOML or built with `Default`.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EvalConfig {
    /// Reject index leaves whose source emits a key at or below the previous one.
    pub verify_order: bool,

    /// Slots an array leaf scans linearly before falling back to binary search.
    pub linear_skip_window: usize,

    /// Drop an intersection include whose seek failed, provided it carries no
    /// non-event leaf and another independent include remains.
    pub degrade_on_event_seek_failure: bool,
}

impl EvalConfig {
    pub const DEFAULT_LINEAR_SKIP_WINDOW: usize = 8;

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, EvalError> {
        let config: Self = toml::from_str(raw).map_err(|err| {
            EvalError::from(ConfigurationError::InvalidConfig {
                message: err.to_string(),
            })
        })?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.linear_skip_window == 0 {
            return Err(ConfigurationError::InvalidConfig {
                message: "linear_skip_window must be at least 1".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            verify_order: true,
            linear_skip_window: Self::DEFAULT_LINEAR_SKIP_WINDOW,
            degrade_on_event_seek_failure: true,
        }
    }
}
