//! Controller configuration, read from the environment.

use crate::error::ControllerError;
use std::env;

const DEFAULT_OUTPUT_BUFFER: usize = 64;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Label selector restricting which nodes are watched
    pub label_selector: Option<String>,
    /// Field selector restricting which nodes are watched
    pub field_selector: Option<String>,
    /// Capacity of the target group channel
    pub output_buffer: usize,
}

impl Config {
    /// Loads configuration from `NODE_LABEL_SELECTOR`, `NODE_FIELD_SELECTOR`
    /// and `OUTPUT_BUFFER`.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let output_buffer = match non_empty("OUTPUT_BUFFER") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(ControllerError::InvalidConfig(format!(
                        "OUTPUT_BUFFER must be a positive integer, got {raw:?}"
                    )));
                }
                Ok(n) => n,
            },
            None => DEFAULT_OUTPUT_BUFFER,
        };

        Ok(Self {
            label_selector: non_empty("NODE_LABEL_SELECTOR"),
            field_selector: non_empty("NODE_FIELD_SELECTOR"),
            output_buffer,
        })
    }
}
