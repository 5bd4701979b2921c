//! Per-selector, per-parameter-key outcome counters.

use std::cell::Cell;

use serde::Serialize;

/// How an evaluation was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EvaluationKind {
    /// A real, recordable call.
    Invoked,
    /// A validation pass on behalf of another selector or a read-only probe.
    DepCheck,
}

/// How an evaluation was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunOutcome {
    /// The cached value was reused without executing.
    Skipped,
    /// The selector executed, but the result compared equal and the previous
    /// value was kept.
    Phantom,
    /// The selector executed and produced a new value.
    Full,
    /// The selector failed, or needed to execute while execution was not
    /// permitted.
    Aborted,
}

/// Snapshot of the counters for one selector and parameter key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DebugCounts {
    /// Number of validation-only evaluations.
    pub dep_check_count: u32,
    /// Number of real invocations.
    pub invoke_count: u32,
    /// Number of evaluations that reused the cached value.
    pub skipped_run_count: u32,
    /// Number of executions whose result compared equal to the previous one.
    pub phantom_run_count: u32,
    /// Number of executions that produced a new value.
    pub full_run_count: u32,
    /// Number of failed or blocked executions.
    pub aborted_run_count: u32,
}

impl DebugCounts {
    /// Total number of evaluations, invoked or dep-checked.
    pub fn evaluations(&self) -> u32 {
        self.dep_check_count + self.invoke_count
    }

    /// Number of times the selector function actually executed.
    pub fn executions(&self) -> u32 {
        self.phantom_run_count + self.full_run_count
    }

    /// Add one evaluation entry.
    pub fn record_kind(&mut self, kind: EvaluationKind) {
        match kind {
            EvaluationKind::Invoked => self.invoke_count += 1,
            EvaluationKind::DepCheck => self.dep_check_count += 1,
        }
    }

    /// Add one outcome.
    pub fn record_outcome(&mut self, outcome: RunOutcome) {
        match outcome {
            RunOutcome::Skipped => self.skipped_run_count += 1,
            RunOutcome::Phantom => self.phantom_run_count += 1,
            RunOutcome::Full => self.full_run_count += 1,
            RunOutcome::Aborted => self.aborted_run_count += 1,
        }
    }
}

/// Live counters shared by every result entry of one parameter key.
///
/// These survive recomputation: a new entry inherits the counters of the
/// entry it replaces.
#[derive(Debug, Default)]
pub(crate) struct DebugInfo {
    counts: Cell<DebugCounts>,
    verbose: Option<String>,
}

impl DebugInfo {
    pub(crate) fn new(verbose: Option<String>) -> Self {
        Self {
            counts: Cell::new(DebugCounts::default()),
            verbose,
        }
    }

    pub(crate) fn snapshot(&self) -> DebugCounts {
        self.counts.get()
    }

    pub(crate) fn begin(&self, kind: EvaluationKind, param_key: &str) {
        let mut counts = self.counts.get();
        counts.record_kind(kind);
        self.counts.set(counts);
        let label = match kind {
            EvaluationKind::Invoked => "Begin Invoke",
            EvaluationKind::DepCheck => "Begin DepCheck",
        };
        self.log(label, param_key);
    }

    pub(crate) fn finish(&self, outcome: RunOutcome, param_key: &str) {
        let mut counts = self.counts.get();
        counts.record_outcome(outcome);
        self.counts.set(counts);
        let label = match outcome {
            RunOutcome::Skipped => "Skipped!",
            RunOutcome::Phantom => "Phantom!",
            RunOutcome::Full => "Full run!",
            RunOutcome::Aborted => "Aborted!",
        };
        self.log(label, param_key);
    }

    fn log(&self, label: &str, param_key: &str) {
        let counts = self.counts.get();
        match &self.verbose {
            Some(prefix) => tracing::debug!(
                target: "selector_flow",
                params = param_key,
                ?counts,
                "{}: {}",
                prefix,
                label
            ),
            None => tracing::trace!(target: "selector_flow", params = param_key, "{}", label),
        }
    }
}
