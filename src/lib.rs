//! kvcheck — randomized correctness and durability harness for kvdb.
//!
//! The store under test is a black box reachable only through its
//! command-line client. A run populates it with randomized records,
//! restarts the server, replays an in-memory oracle against it, deletes
//! everything, and renders a pass/fail verdict from the per-phase tallies.
//!
//! # Quick start
//!
//! ```ignore
//! use kvcheck::{CliStore, ScenarioRunner, ServerLifecycle, Verdict};
//!
//! let lifecycle = ServerLifecycle::new(lifecycle_config)?;
//! let mut store = CliStore::new(client_config);
//! let tallies = ScenarioRunner::new(&mut store, &lifecycle, &scenario).run()?;
//! assert_eq!(Verdict::of(&tallies), Verdict::Pass);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod oracle;
pub mod report;
pub mod scenario;
pub mod workload;

pub use client::{CliStore, GetOutcome, Store, TransportError, WriteOutcome};
pub use config::{ClientConfig, FailurePolicy, LifecycleConfig, ScenarioConfig, SizeBounds};
pub use error::{Error, Result};
pub use lifecycle::{Lifecycle, ServerGuard, ServerLifecycle};
pub use oracle::Oracle;
pub use report::{render, Tallies, Tally, Verdict, VerifyTally};
pub use scenario::ScenarioRunner;
pub use workload::{Generator, ALPHABET};
