//! Tracer trait for observing selector evaluation.
//!
//! The default [`NoopTracer`] ignores every event. Install a custom tracer with
//! [`UniverseBuilder::tracer`](crate::UniverseBuilder::tracer) to collect events
//! in tests or forward them elsewhere.
//!
//! # Example
//!
//! ```ignore
//! use selector_flow::{EvaluationKind, SpanId, Tracer, TracerSelectorKey, Universe};
//!
//! struct PrintTracer;
//!
//! impl Tracer for PrintTracer {
//!     fn new_span_id(&self) -> SpanId {
//!         SpanId(1)
//!     }
//!
//!     fn on_evaluate_start(&self, _id: SpanId, key: &TracerSelectorKey, kind: EvaluationKind) {
//!         println!("{kind:?} {}({})", key.selector, key.param_key);
//!     }
//! }
//!
//! let universe = Universe::builder().tracer(PrintTracer).build();
//! ```

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::debug_info::{EvaluationKind, RunOutcome};

/// Identifies one evaluation from start to outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(pub u64);

/// A selector and parameter key, as reported to tracers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TracerSelectorKey {
    /// Display name of the selector.
    pub selector: String,
    /// Parameter key of the evaluation.
    pub param_key: String,
}

impl TracerSelectorKey {
    /// Create a new tracer selector key.
    #[inline]
    pub fn new(selector: impl Into<String>, param_key: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            param_key: param_key.into(),
        }
    }
}

/// Observer of selector evaluation.
///
/// All methods but [`new_span_id`](Tracer::new_span_id) have empty default
/// implementations. Tracers are called synchronously from inside evaluation
/// and must not call selectors themselves.
pub trait Tracer: 'static {
    /// Generate a new span ID. Called at the start of each evaluation.
    fn new_span_id(&self) -> SpanId;

    /// An evaluation started.
    #[inline]
    fn on_evaluate_start(&self, _span_id: SpanId, _key: &TracerSelectorKey, _kind: EvaluationKind) {
    }

    /// An evaluation was resolved.
    #[inline]
    fn on_evaluate_end(&self, _span_id: SpanId, _key: &TracerSelectorKey, _outcome: RunOutcome) {}

    /// An evaluation was registered as a call dependency of the running selector.
    #[inline]
    fn on_dependency_registered(&self, _dependency: &TracerSelectorKey, _read_only: bool) {}

    /// A selector's cache was replaced. `while_running` is true if any
    /// evaluation was in flight.
    #[inline]
    fn on_cache_reset(&self, _selector: &str, _while_running: bool) {}

    /// A selector was called from inside a selector of another universe.
    #[inline]
    fn on_cross_universe_call(&self, _selector: &str) {}
}

/// Tracer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopTracer {
    next: Cell<u64>,
}

impl Tracer for NoopTracer {
    #[inline]
    fn new_span_id(&self) -> SpanId {
        let id = self.next.get();
        self.next.set(id + 1);
        SpanId(id)
    }
}
