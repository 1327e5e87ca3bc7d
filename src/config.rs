//! Harness configuration.
//!
//! All shared knobs are plain values passed in at construction time; nothing
//! is read from ambient globals. `validate()` methods reject impossible
//! setups before any process is spawned.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Half-open size range `[min, max)` for generated keys and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    /// Inclusive lower bound, in bytes.
    pub min: usize,
    /// Exclusive upper bound, in bytes.
    pub max: usize,
}

impl SizeBounds {
    /// Construct bounds, rejecting an empty range.
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min >= max {
            return Err(Error::Config(format!(
                "size bounds [{min}, {max}) are empty"
            )));
        }
        Ok(Self { min, max })
    }
}

/// How the external client is reached.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path to the `kvdb_cli` binary.
    pub program: PathBuf,
    /// Server hostname passed as `--host=`.
    pub host: String,
    /// Server port passed as `--port=`.
    pub port: u16,
    /// Hard deadline for a single client invocation. Expiry is a transport
    /// failure, not a hang.
    pub op_timeout: Duration,
}

/// How the external server is started and stopped.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Argv (program + args) that brings the server up.
    pub start: Vec<String>,
    /// Argv that takes it down.
    pub stop: Vec<String>,
    /// Delay after a start command before the first readiness probe.
    pub settle: Duration,
    /// Total budget for the server to answer a readiness probe.
    pub ready_timeout: Duration,
    /// Pause between readiness probes.
    pub poll_interval: Duration,
}

impl LifecycleConfig {
    /// Reject empty start/stop command vectors.
    pub fn validate(&self) -> Result<()> {
        if self.start.is_empty() {
            return Err(Error::Config("start command is empty".to_string()));
        }
        if self.stop.is_empty() {
            return Err(Error::Config("stop command is empty".to_string()));
        }
        Ok(())
    }
}

/// What happens when an operation fails mid-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Count the failure and keep driving the remaining records.
    #[default]
    ContinueThrough,
    /// Abort the current phase on the first failed operation.
    StopOnFirst,
}

/// Parameters of a single scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Number of records to attempt during Populating.
    pub records: usize,
    /// Key length bounds.
    pub key_len: SizeBounds,
    /// Value length bounds.
    pub value_len: SizeBounds,
    /// Workload seed. Always logged so a failing run can be replayed.
    pub seed: u64,
    /// Failure policy for the Populating phase.
    pub failure_policy: FailurePolicy,
}

impl ScenarioConfig {
    /// Reject a zero-record scenario.
    pub fn validate(&self) -> Result<()> {
        if self.records == 0 {
            return Err(Error::Config("record count must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_bounds_reject_empty_range() {
        assert!(SizeBounds::new(10, 10).is_err());
        assert!(SizeBounds::new(10, 5).is_err());
    }

    #[test]
    fn size_bounds_accept_single_length() {
        let b = SizeBounds::new(4, 5).unwrap();
        assert_eq!(b.min, 4);
        assert_eq!(b.max, 5);
    }

    #[test]
    fn lifecycle_rejects_empty_commands() {
        let cfg = LifecycleConfig {
            start: vec![],
            stop: vec!["true".to_string()],
            settle: Duration::ZERO,
            ready_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn scenario_rejects_zero_records() {
        let cfg = ScenarioConfig {
            records: 0,
            key_len: SizeBounds::new(1, 2).unwrap(),
            value_len: SizeBounds::new(1, 2).unwrap(),
            seed: 7,
            failure_policy: FailurePolicy::ContinueThrough,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn failure_policy_defaults_to_continue() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::ContinueThrough);
    }
}
