//! Error types for relay.
//!
//! A deterministic miss is a routing signal, not an error; it lives in the
//! dispatch/stage outcome enums, not here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("verb {verb} is not supported by domain {domain}")]
    IncompatibleVerb { verb: String, domain: String },

    #[error("service execution failed: {0}")]
    Execution(String),

    #[error("agent {agent} unavailable: {reason}")]
    AgentUnavailable { agent: String, reason: String },

    #[error("agent {agent} timed out after {secs}s")]
    AgentTimeout { agent: String, secs: u64 },

    #[error("agent {agent} returned a non-answer: {response}")]
    NonAnswer { agent: String, response: String },

    #[error("entity source unreachable: {0}")]
    CatalogUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn code(&self) -> i32 {
        match self {
            RelayError::IncompatibleVerb { .. } => -32000,
            RelayError::Execution(_) => -32001,
            RelayError::AgentUnavailable { .. } => -32002,
            RelayError::AgentTimeout { .. } => -32003,
            RelayError::NonAnswer { .. } => -32004,
            RelayError::CatalogUnavailable(_) => -32005,
            RelayError::Io(_) => -32006,
            RelayError::Json(_) => -32700,
            RelayError::Internal(_) => -32603,
        }
    }
}
