//! Error types shared across the pipeline.
//!
//! Media actions never surface these to the key-event path; they are logged
//! at the action boundary and folded into an [`Outcome`](crate::media::Outcome).

use std::path::PathBuf;

use thiserror::Error;

use crate::dom::NodeId;

/// Failures raised by a [`Page`](crate::dom::Page) implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Node {0} is no longer attached to the document")]
    Detached(NodeId),

    #[error("Node {0} is not a media element")]
    NotMedia(NodeId),

    #[error("Operation '{operation}' rejected: {reason}")]
    Rejected { operation: &'static str, reason: String },
}

impl DomError {
    /// Shorthand for a rejected DOM operation.
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        DomError::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

/// Failures raised while loading or persisting settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings provider is unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read settings file at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to persist settings to {path}: {message}")]
    Persist { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Raised when a key table is built with two entries for one key code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyMapError {
    #[error("Key code '{0}' is mapped more than once")]
    DuplicateKey(String),
}

/// Failures of a single pipeline startup attempt, or of the whole sequence.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Settings did not finish loading within {0:?}")]
    SettingsTimeout(std::time::Duration),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    KeyMap(#[from] KeyMapError),

    #[error("Startup abandoned after {attempts} attempts")]
    GaveUp { attempts: u32 },
}
