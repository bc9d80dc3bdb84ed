//! Error types for flowmgrd.
//!
//! No variant is fatal to the daemon: every failure is scoped to the event
//! or the switch it occurred on, and processing of other events and other
//! switches continues.

use ofctl_types::DatapathId;
use thiserror::Error;

/// Result type alias for flowmgrd operations.
pub type FlowmgrResult<T> = Result<T, FlowmgrError>;

/// Errors that can occur in the flow manager and its southbound channel.
#[derive(Debug, Error)]
pub enum FlowmgrError {
    /// Wire decoding failed (malformed frame or message).
    #[error("codec error: {0}")]
    Codec(#[from] ofctl_codec::CodecError),

    /// An installation was attempted for a switch with no live connection.
    #[error("switch {dpid} is not connected")]
    SwitchNotConnected {
        /// The target datapath.
        dpid: DatapathId,
    },

    /// Sending to a connected switch failed. Installs are fire-and-forget;
    /// the failure is surfaced to the caller but nothing is retried or
    /// rolled back.
    #[error("transport failure for switch {dpid}: {message}")]
    Transport {
        /// The target datapath.
        dpid: DatapathId,
        /// What went wrong.
        message: String,
    },

    /// Configuration validation error.
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowmgrError {
    /// Creates a transport error.
    pub fn transport(dpid: DatapathId, message: impl Into<String>) -> Self {
        FlowmgrError::Transport {
            dpid,
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        FlowmgrError::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}
