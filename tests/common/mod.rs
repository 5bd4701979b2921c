//! Shared helpers for integration tests.

#![allow(dead_code)]

use selector_flow::{DebugCounts, EvaluationKind, Params, RunOutcome, Selector};

/// Accumulates the counters a selector is expected to report for one
/// parameter key, so tests only spell out what changed since the last check.
pub struct DebugInfoCheck<T: 'static> {
    selector: Selector<T>,
    params: Params,
    expected: DebugCounts,
}

impl<T: 'static> DebugInfoCheck<T> {
    pub fn new(selector: &Selector<T>) -> Self {
        Self::with_params(selector, ())
    }

    pub fn with_params(selector: &Selector<T>, params: impl Into<Params>) -> Self {
        Self {
            selector: selector.clone(),
            params: params.into(),
            expected: DebugCounts::default(),
        }
    }

    #[track_caller]
    pub fn expect_invoked(&mut self, outcome: RunOutcome) {
        self.log(EvaluationKind::Invoked, outcome);
        self.expect_untouched();
    }

    #[track_caller]
    pub fn expect_dep_checked(&mut self, outcome: RunOutcome) {
        self.log(EvaluationKind::DepCheck, outcome);
        self.expect_untouched();
    }

    #[track_caller]
    pub fn expect_dep_check_and_invoked(&mut self, dep_check: RunOutcome, invoked: RunOutcome) {
        self.log(EvaluationKind::DepCheck, dep_check);
        self.log(EvaluationKind::Invoked, invoked);
        self.expect_untouched();
    }

    /// Several evaluations between two checks.
    #[track_caller]
    pub fn expect_multiple(&mut self, evaluations: &[(EvaluationKind, RunOutcome)]) {
        for &(kind, outcome) in evaluations {
            self.log(kind, outcome);
        }
        self.expect_untouched();
    }

    #[track_caller]
    pub fn expect_untouched(&self) {
        let actual = self
            .selector
            .get_debug_info(self.params.clone())
            .unwrap_or_default();
        assert_eq!(
            actual,
            self.expected,
            "debug info of {} with params {:?}",
            self.selector.display_name(),
            self.params
        );
    }

    fn log(&mut self, kind: EvaluationKind, outcome: RunOutcome) {
        self.expected.record_kind(kind);
        self.expected.record_outcome(outcome);
    }
}
