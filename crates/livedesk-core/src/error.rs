// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Livedesk live-state engine.

use thiserror::Error;

/// The primary error type used across Livedesk collaborator traits and the engine.
///
/// None of these are surfaced to consumers of the query façade: transport and
/// snapshot failures are retried or absorbed, malformed frames are dropped, and
/// capacity overruns degrade coverage. They exist so every suppressed failure
/// still has a typed shape that can be logged and counted.
#[derive(Debug, Error)]
pub enum LivedeskError {
    /// Configuration errors (invalid values, missing credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// Push-path failures: channel creation, subscription, socket open/read.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Pull-path failures while fetching a REST snapshot.
    #[error("snapshot error: {message}")]
    Snapshot {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A frame or event body that could not be interpreted.
    #[error("malformed event: {0}")]
    Malformed(String),

    /// The requested topic set exceeds what the channel caps allow.
    #[error("topic capacity exceeded: {covered} of {requested} topics covered")]
    Capacity { requested: usize, covered: usize },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LivedeskError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a snapshot error without an underlying source.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for errors on the push path that the channel supervisor retries.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
