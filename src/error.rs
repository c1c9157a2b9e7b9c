//! Error taxonomy for the integration boundary and the dispatch path
//!
//! Construction failures are distinguished from malformed wiring and from
//! runtime dispatch errors so callers can react to each differently.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity carried by a dispatched error value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// An error value travelling a bus in place of a state fragment
///
/// Routed to the owning store's error handler instead of the merge path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDispatchable {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub level: ErrorLevel,
}

impl ErrorDispatchable {
    /// Create an error value with no code
    pub fn new(message: impl Into<String>, level: ErrorLevel) -> Self {
        Self {
            message: message.into(),
            code: None,
            level,
        }
    }

    /// Attach a machine-readable code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Errors surfaced by [`create_iotes`](crate::create_iotes) and the
/// integration boundary
#[derive(Debug, Error)]
pub enum IotesError {
    /// The strategy returned a real error while connecting a host
    #[error("strategy failed to construct host '{host}': {error}")]
    StrategyConstruction {
        host: String,
        error: anyhow::Error,
    },

    /// Malformed wiring, detected before the strategy runs
    #[error("invalid topology: {reason}")]
    InvalidTopology { reason: String },

    /// A dispatch error surfaced at the integration boundary
    #[error("runtime dispatch error on {channel} bus: {message}")]
    RuntimeDispatch { channel: String, message: String },
}
