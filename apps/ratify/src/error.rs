//! Error taxonomy for a validation run.
//!
//! `Error` covers infrastructure failures that abort the whole run. Content
//! problems never travel through this type: they are recorded as report
//! events. `UnparseableOutput` sits in between and is caught per command
//! descriptor by the engine.

use std::io;

/// Fatal errors. Any of these terminates the run with a diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command '{command}' was not found in the bundled bin directories or PATH")]
    CommandNotFound { command: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A check ran but its output could not be interpreted.
#[derive(Debug, thiserror::Error)]
#[error("{validator}: unable to parse output ({reason})")]
pub struct UnparseableOutput {
    pub validator: String,
    pub reason: String,
}

impl UnparseableOutput {
    pub fn new(validator: impl Into<String>, reason: impl Into<String>) -> Self {
        UnparseableOutput {
            validator: validator.into(),
            reason: reason.into(),
        }
    }
}
