//! IPC protocol for the relay daemon socket.
//!
//! Newline-delimited JSON: one `Request` per line in, one `Response` per
//! line out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trace::DebugLevel;
use crate::types::{Stage, StageOutcome};

/// IPC request from client to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: Method,
}

/// IPC response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<ResponseData, String>,
}

/// Request methods
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Method {
    /// Ping daemon (health check)
    Ping,

    /// Get daemon status
    Status,

    /// Route one utterance
    Process {
        text: String,
        conversation_id: Option<String>,
        language: Option<String>,
    },

    /// Rebuild the entity catalog snapshot now
    RefreshCatalog,

    /// Re-read the config file and swap the active configuration
    ReloadConfig,
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResponseData {
    /// Simple success/pong
    Ok,

    /// Status information
    Status(StatusData),

    /// Routing answer for one utterance
    Answer(AnswerData),

    /// Catalog refresh result
    Refreshed { entities: usize },
}

/// Daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusData {
    pub version: String,
    pub uptime_seconds: u64,
    pub catalog_entities: usize,
    pub catalog_built_at: Option<DateTime<Utc>>,
    pub debug_level: DebugLevel,
}

/// The turn's answer, plus routing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerData {
    pub conversation_id: String,
    pub response: String,
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Rendered trace, present when debug level is low or verbose.
    pub trace: Option<String>,
}
