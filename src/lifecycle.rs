//! Server lifecycle control.
//!
//! The server is an opaque process brought up and down by configurable
//! commands (typically `docker-compose up -d server` / `docker-compose
//! stop`). The controller cannot see whether the server actually came up;
//! readiness is established by probing the store through the client until it
//! answers, with a bounded deadline.

use std::process::Command;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::client::{GetOutcome, Store};
use crate::config::LifecycleConfig;
use crate::error::{Error, Result};

/// Key used for readiness probes. A `NotFound` answer is as good as a
/// `Found` one; both mean the server is accepting queries.
pub const PROBE_KEY: &[u8] = b"__kvcheck_probe__";

/// Restart seam used by the scenario runner.
pub trait Lifecycle {
    /// Take the server down and bring it back up.
    fn restart(&self) -> Result<()>;

    /// Block until the server answers queries, or fail with
    /// [`Error::ServerNotReady`].
    fn await_ready(&self, store: &mut dyn Store) -> Result<()>;
}

/// Drives the real server through its start/stop commands.
pub struct ServerLifecycle {
    config: LifecycleConfig,
}

impl ServerLifecycle {
    pub fn new(config: LifecycleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the start command, then wait the settle delay.
    pub fn start(&self) -> Result<()> {
        info!(target: "kvcheck::lifecycle", command = ?self.config.start, "starting server");
        run_command(&self.config.start)?;
        thread::sleep(self.config.settle);
        Ok(())
    }

    /// Run the stop command.
    pub fn stop(&self) -> Result<()> {
        info!(target: "kvcheck::lifecycle", command = ?self.config.stop, "stopping server");
        run_command(&self.config.stop)
    }
}

impl Lifecycle for ServerLifecycle {
    fn restart(&self) -> Result<()> {
        self.stop()?;
        self.start()
    }

    fn await_ready(&self, store: &mut dyn Store) -> Result<()> {
        let deadline = Instant::now() + self.config.ready_timeout;
        loop {
            match store.get(PROBE_KEY) {
                GetOutcome::Found(_) | GetOutcome::NotFound => {
                    debug!(target: "kvcheck::lifecycle", "server is ready");
                    return Ok(());
                }
                GetOutcome::Transport(e) => {
                    if Instant::now() >= deadline {
                        return Err(Error::ServerNotReady(self.config.ready_timeout));
                    }
                    debug!(target: "kvcheck::lifecycle", error = %e, "server not ready yet");
                    thread::sleep(self.config.poll_interval);
                }
            }
        }
    }
}

/// Scoped "server is running" resource. Dropping the guard stops the server
/// on every exit path, including unwinding.
pub struct ServerGuard<'a> {
    lifecycle: &'a ServerLifecycle,
}

impl<'a> ServerGuard<'a> {
    /// Start the server and arm the guard.
    pub fn start(lifecycle: &'a ServerLifecycle) -> Result<Self> {
        lifecycle.start()?;
        Ok(Self { lifecycle })
    }
}

impl Drop for ServerGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lifecycle.stop() {
            warn!(target: "kvcheck::lifecycle", error = %e, "best-effort stop failed");
        }
    }
}

fn run_command(argv: &[String]) -> Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::Config("empty lifecycle command".to_string()))?;
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| Error::LifecycleSpawn {
            command: argv.to_vec(),
            source: e,
        })?;
    if !status.success() {
        return Err(Error::LifecycleStatus {
            command: argv.to_vec(),
            status: status.to_string(),
        });
    }
    Ok(())
}
