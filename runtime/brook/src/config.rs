//! Host configuration read from the environment.
//!
//! | variable | effect |
//! |---|---|
//! | `BROOK_MAX_CALL_DEPTH` | nested invocations before `StackOverflow` |
//! | `BROOK_LOG` | tracing filter directives, falls back to `RUST_LOG` |
//! | `BROOK_LOG_TREE` | `1` for hierarchical log output |
//! | `BROOK_TRACE` | `1` to record frame transitions in each Mind's history |

use brook_eval::interpreter::{DEFAULT_MAX_CALL_DEPTH, DEFAULT_MIND_NAME};
use brook_eval::{InterpreterBuilder, RuntimeConfig};

pub const MAX_CALL_DEPTH_VAR: &str = "BROOK_MAX_CALL_DEPTH";
pub const LOG_VAR: &str = "BROOK_LOG";
pub const LOG_TREE_VAR: &str = "BROOK_LOG_TREE";
pub const TRACE_VAR: &str = "BROOK_TRACE";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got `{value}`")]
    InvalidDepth { var: &'static str, value: String },
    #[error("{var} must be 0 or 1 (or true/false), got `{value}`")]
    InvalidFlag { var: &'static str, value: String },
}

/// Settings for one embedded runtime and its logging.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub max_call_depth: usize,
    /// Filter directives; `None` leaves logging off.
    pub log_filter: Option<String>,
    pub log_tree: bool,
    pub trace: bool,
    pub default_mind: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            log_filter: None,
            log_tree: false,
            trace: false,
            default_mind: Some(DEFAULT_MIND_NAME.to_string()),
        }
    }
}

impl HostConfig {
    /// Read the `BROOK_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(MAX_CALL_DEPTH_VAR) {
            config.max_call_depth = parse_depth(MAX_CALL_DEPTH_VAR, &value)?;
        }
        config.log_filter = lookup(LOG_VAR)
            .or_else(|| lookup("RUST_LOG"))
            .filter(|directives| !directives.trim().is_empty());
        if let Some(value) = lookup(LOG_TREE_VAR) {
            config.log_tree = parse_flag(LOG_TREE_VAR, &value)?;
        }
        if let Some(value) = lookup(TRACE_VAR) {
            config.trace = parse_flag(TRACE_VAR, &value)?;
        }
        Ok(config)
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            max_call_depth: self.max_call_depth,
            trace: self.trace,
            default_mind: self.default_mind.clone(),
        }
    }

    pub fn builder(&self) -> InterpreterBuilder {
        InterpreterBuilder::new().config(self.runtime_config())
    }
}

fn parse_depth(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(depth) if depth > 0 => Ok(depth),
        _ => Err(ConfigError::InvalidDepth {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests;
