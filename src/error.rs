//! Error taxonomy for a provisioning run.
//!
//! Every failure aborts the run before anything is persisted, so each variant
//! carries enough context (row, resource class, tool) for the operator to fix
//! the input and rerun.

use crate::config::ConfigError;
use std::fmt;
use std::path::PathBuf;

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Kind of resource that ran out during allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Subnet,
    Address,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceClass::Subnet => write!(f, "subnet"),
            ResourceClass::Address => write!(f, "host address"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("No {resource} left to assign (row {row}): {detail}")]
    ResourceExhausted {
        resource: ResourceClass,
        row: usize,
        detail: String,
    },

    #[error("External tool '{tool}' failed: {detail}")]
    ExternalToolFailure { tool: String, detail: String },

    #[error("Malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("Record store error in {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn malformed(row: usize, reason: impl Into<String>) -> Self {
        EngineError::MalformedRecord {
            row,
            reason: reason.into(),
        }
    }

    pub fn exhausted(resource: ResourceClass, row: usize, detail: impl Into<String>) -> Self {
        EngineError::ResourceExhausted {
            resource,
            row,
            detail: detail.into(),
        }
    }

    pub fn tool(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        EngineError::ExternalToolFailure {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
