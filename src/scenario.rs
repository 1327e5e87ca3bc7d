//! Scenario runner.
//!
//! One run walks the phases Populating -> Restarting -> Verifying ->
//! Cleaning, strictly in order, never retrying a phase. Per-operation
//! failures are folded into the tallies; only a dead server (restart failed,
//! readiness deadline exhausted) aborts the run.

use tracing::{info, warn};

use crate::client::{GetOutcome, Store};
use crate::config::{FailurePolicy, ScenarioConfig};
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::oracle::Oracle;
use crate::report::Tallies;
use crate::workload::Generator;

/// Drives one scenario against a store.
pub struct ScenarioRunner<'a, S, L> {
    store: &'a mut S,
    lifecycle: &'a L,
    config: &'a ScenarioConfig,
}

impl<'a, S: Store, L: Lifecycle> ScenarioRunner<'a, S, L> {
    pub fn new(store: &'a mut S, lifecycle: &'a L, config: &'a ScenarioConfig) -> Self {
        Self {
            store,
            lifecycle,
            config,
        }
    }

    /// Run all phases and return the tallies for the reporter.
    pub fn run(mut self) -> Result<Tallies> {
        let mut oracle = Oracle::new();
        let mut generator = Generator::from_seed(self.config.seed);
        let mut tallies = Tallies::default();

        self.populate(&mut generator, &mut oracle, &mut tallies);
        self.restart()?;
        self.verify(&oracle, &mut tallies);
        self.clean(&oracle, &mut tallies);

        Ok(tallies)
    }

    fn populate(&mut self, generator: &mut Generator, oracle: &mut Oracle, tallies: &mut Tallies) {
        info!(
            target: "kvcheck::scenario",
            records = self.config.records,
            "populating"
        );
        for _ in 0..self.config.records {
            let key = generator.gen_bytes(&self.config.key_len);
            let value = generator.gen_bytes(&self.config.value_len);
            tallies.insert.attempt();

            // A colliding generated key is an upsert of our own earlier
            // record, so it must go out as UPDATE, not a duplicate INSERT.
            let outcome = if oracle.contains(&key) {
                self.store.update(&key, &value)
            } else {
                self.store.insert(&key, &value)
            };

            if outcome.is_applied() {
                oracle.record(key, value);
            } else {
                warn!(target: "kvcheck::scenario", outcome = ?outcome, "write failed");
                tallies.insert.fail();
                if self.config.failure_policy == FailurePolicy::StopOnFirst {
                    warn!(target: "kvcheck::scenario", "stopping population on first failure");
                    break;
                }
            }
        }
    }

    fn restart(&mut self) -> Result<()> {
        info!(target: "kvcheck::scenario", "restarting server");
        self.lifecycle.restart()?;
        self.lifecycle.await_ready(&mut *self.store)
    }

    fn verify(&mut self, oracle: &Oracle, tallies: &mut Tallies) {
        info!(
            target: "kvcheck::scenario",
            records = oracle.len(),
            "verifying survivors"
        );
        for (key, expected) in oracle.iter() {
            tallies.verify.attempted += 1;
            match self.store.get(key) {
                GetOutcome::Found(actual) => {
                    // Byte-exact or it does not count.
                    if actual != expected {
                        tallies.verify.mismatched += 1;
                        warn!(
                            target: "kvcheck::scenario",
                            expected_len = expected.len(),
                            actual_len = actual.len(),
                            "value mismatch"
                        );
                    }
                }
                GetOutcome::NotFound => {
                    tallies.verify.missing += 1;
                    warn!(target: "kvcheck::scenario", "record missing after restart");
                }
                GetOutcome::Transport(e) => {
                    tallies.verify.transport += 1;
                    warn!(target: "kvcheck::scenario", error = %e, "get failed");
                }
            }
        }
    }

    fn clean(&mut self, oracle: &Oracle, tallies: &mut Tallies) {
        info!(
            target: "kvcheck::scenario",
            records = oracle.len(),
            "cleaning"
        );
        for (key, _) in oracle.iter() {
            tallies.delete.attempt();
            let outcome = self.store.delete(key);
            if !outcome.is_applied() {
                warn!(target: "kvcheck::scenario", outcome = ?outcome, "delete failed");
                tallies.delete.fail();
            }
        }
    }
}
