use std::{fmt, path::PathBuf};

use thiserror::Error;

use crate::session::SessionStatus;

/// Core error type for ResearchDesk.
#[derive(Debug, Error)]
pub enum ResearchDeskError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error(transparent)]
    Agent(#[from] AgentInvocationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResearchDeskError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}

/// Failure raised by (or on behalf of) the research agent.
#[derive(Debug, Clone)]
pub struct AgentInvocationError {
    pub reason: String,
    pub malformed_result: bool,
}

impl AgentInvocationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            malformed_result: false,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            malformed_result: true,
        }
    }
}

impl fmt::Display for AgentInvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.malformed_result {
            write!(f, "agent returned a malformed result: {}", self.reason)
        } else {
            write!(f, "research agent failed: {}", self.reason)
        }
    }
}

impl std::error::Error for AgentInvocationError {}

/// Failure while producing or writing an export artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("value at {field} is not serialisable: {value}")]
    NonFiniteValue { field: String, value: f64 },
    #[error("failed to serialise export: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub fn io(path: PathBuf, source: std::io::Error) -> Self {
        Self::Io { path, source }
    }
}
