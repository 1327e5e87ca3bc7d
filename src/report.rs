//! Phase tallies and the final verdict.

use std::fmt;

/// Attempted/failed counters for one phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub attempted: u64,
    pub failed: u64,
}

impl Tally {
    pub fn attempt(&mut self) {
        self.attempted += 1;
    }

    pub fn fail(&mut self) {
        self.failed += 1;
    }
}

/// Verification counters. Store-side absence, transport failure, and value
/// mismatch are separately countable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VerifyTally {
    pub attempted: u64,
    /// Store answered: key absent.
    pub missing: u64,
    /// No store answer at all.
    pub transport: u64,
    /// Store answered with the wrong bytes.
    pub mismatched: u64,
}

impl VerifyTally {
    pub fn failed(&self) -> u64 {
        self.missing + self.transport + self.mismatched
    }
}

/// All counters of one scenario run. Created per run, mutated only by the
/// scenario runner, read once by the reporter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tallies {
    pub insert: Tally,
    pub verify: VerifyTally,
    pub delete: Tally,
}

impl Tallies {
    /// Total failures across all phases.
    pub fn failures(&self) -> u64 {
        self.insert.failed + self.verify.failed() + self.delete.failed
    }
}

/// Pass iff every failure counter is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn of(tallies: &Tallies) -> Self {
        if tallies.failures() == 0 {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Process exit code: 0 on pass, 1 on fail. (Fatal harness errors exit
    /// with 2 before a verdict exists.)
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Render the human report. The seed is echoed so a failing run can be
/// replayed with `--seed`.
pub fn render(tallies: &Tallies, seed: u64) -> String {
    let verdict = Verdict::of(tallies);
    format!(
        "seed             : {seed}\n\
         insert attempted : {}\n\
         insert failed    : {}\n\
         get attempted    : {}\n\
         get missing      : {}\n\
         get transport    : {}\n\
         value mismatches : {}\n\
         delete attempted : {}\n\
         delete failed    : {}\n\
         verdict          : {verdict}\n",
        tallies.insert.attempted,
        tallies.insert.failed,
        tallies.verify.attempted,
        tallies.verify.missing,
        tallies.verify.transport,
        tallies.verify.mismatched,
        tallies.delete.attempted,
        tallies.delete.failed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_tallies_pass_with_exit_zero() {
        let tallies = Tallies::default();
        assert_eq!(Verdict::of(&tallies), Verdict::Pass);
        assert_eq!(Verdict::of(&tallies).exit_code(), 0);
    }

    #[test]
    fn any_nonzero_failure_fails() {
        let mut tallies = Tallies::default();
        tallies.verify.mismatched = 1;
        assert_eq!(Verdict::of(&tallies), Verdict::Fail);
        assert_eq!(Verdict::of(&tallies).exit_code(), 1);

        let mut tallies = Tallies::default();
        tallies.delete.failed = 3;
        assert_eq!(Verdict::of(&tallies), Verdict::Fail);
    }

    #[test]
    fn verify_failures_sum_all_three_kinds() {
        let verify = VerifyTally {
            attempted: 10,
            missing: 1,
            transport: 2,
            mismatched: 3,
        };
        assert_eq!(verify.failed(), 6);
    }

    #[test]
    fn render_echoes_seed_and_counts() {
        let mut tallies = Tallies::default();
        tallies.insert.attempted = 50;
        tallies.verify.attempted = 50;
        tallies.verify.mismatched = 2;
        let text = render(&tallies, 1234);
        assert!(text.contains("seed             : 1234"));
        assert!(text.contains("insert attempted : 50"));
        assert!(text.contains("value mismatches : 2"));
        assert!(text.contains("verdict          : FAIL"));
    }
}
