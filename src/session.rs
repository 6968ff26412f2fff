// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! Protocol progress for one harness run.
//!
//! Read access is public; every mutator is crate-private and called only by
//! the dispatcher.

use std::time::Duration;

use tokio::time::Instant;

use crate::link::{StateBlob, TestName};

/// How a finished test was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
    Skipped,
}

/// Running totals for the suite summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl RunTally {
    pub fn total(&self) -> u32 {
        self.passed + self.failed + self.skipped
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    current_test: TestName,
    started_at: Option<Instant>,
    nightly_only: bool,
    saved_state: Option<StateBlob>,
    suite_drained: bool,
    tally: RunTally,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_test(&self) -> &TestName {
        &self.current_test
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn nightly_only(&self) -> bool {
        self.nightly_only
    }

    pub fn saved_state(&self) -> Option<&StateBlob> {
        self.saved_state.as_ref()
    }

    pub fn is_drained(&self) -> bool {
        self.suite_drained
    }

    pub fn tally(&self) -> RunTally {
        self.tally
    }

    /// Time since the current test started, minus `compensation`.
    ///
    /// Zero when no test has started or the compensation exceeds the gap.
    pub fn elapsed(&self, now: Instant, compensation: Duration) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start).saturating_sub(compensation))
            .unwrap_or(Duration::ZERO)
    }

    pub(crate) fn begin_test(&mut self, name: TestName, nightly_only: bool, now: Instant) {
        self.current_test = name;
        self.nightly_only = nightly_only;
        self.started_at = Some(now);
    }

    /// Wholesale replacement; the previous blob is dropped.
    pub(crate) fn replace_saved_state(&mut self, state: StateBlob) {
        self.saved_state = Some(state);
    }

    pub(crate) fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Passed => self.tally.passed += 1,
            Verdict::Failed => self.tally.failed += 1,
            Verdict::Skipped => self.tally.skipped += 1,
        }
    }

    pub(crate) fn mark_drained(&mut self) {
        self.suite_drained = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session = SessionState::new();
        assert!(session.current_test().is_empty());
        assert!(session.saved_state().is_none());
        assert!(!session.is_drained());
        assert_eq!(session.tally().total(), 0);
    }

    #[test]
    fn test_saved_state_is_replaced_not_merged() {
        let mut session = SessionState::new();
        session.replace_saved_state(StateBlob::new(vec![1, 2, 3, 4]).unwrap());
        session.replace_saved_state(StateBlob::new(vec![9]).unwrap());
        assert_eq!(session.saved_state().unwrap().as_bytes(), &[9]);
    }

    #[test]
    fn test_elapsed_subtracts_compensation() {
        let mut session = SessionState::new();
        let start = Instant::now();
        session.begin_test(TestName::new(b"t").unwrap(), false, start);

        let now = start + Duration::from_millis(2_150);
        assert_eq!(
            session.elapsed(now, Duration::from_millis(600)),
            Duration::from_millis(1_550)
        );
        assert_eq!(session.elapsed(now, Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_without_start_is_zero() {
        let session = SessionState::new();
        assert_eq!(
            session.elapsed(Instant::now(), Duration::from_millis(600)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_tally_counts_each_verdict() {
        let mut session = SessionState::new();
        session.record(Verdict::Passed);
        session.record(Verdict::Passed);
        session.record(Verdict::Failed);
        session.record(Verdict::Skipped);
        assert_eq!(
            session.tally(),
            RunTally { passed: 2, failed: 1, skipped: 1 }
        );
        assert_eq!(session.tally().total(), 4);
    }
}
