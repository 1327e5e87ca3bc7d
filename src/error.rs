//! Error types for the harness.
//!
//! Only *fatal* conditions live here: bad configuration, a server that will
//! not come up, a lifecycle command that fails outright. Per-operation
//! failures during a run are never errors — they are folded into the phase
//! tallies and surface in the final report.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal harness errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (bad size bounds, empty lifecycle command, ...)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A server start/stop command could not be spawned.
    #[error("lifecycle command {command:?} failed to launch: {source}")]
    LifecycleSpawn {
        /// The argv that failed.
        command: Vec<String>,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A server start/stop command exited unsuccessfully.
    #[error("lifecycle command {command:?} exited with status {status}")]
    LifecycleStatus {
        /// The argv that failed.
        command: Vec<String>,
        /// Rendered exit status.
        status: String,
    },

    /// The server never answered the readiness probe within the deadline.
    #[error("server not ready within {0:?}")]
    ServerNotReady(Duration),
}
