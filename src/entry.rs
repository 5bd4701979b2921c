//! Result entries: one cached evaluation of a selector for one parameter key.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::debug_info::DebugInfo;
use crate::dependency::{CallDependencies, StateDependencies};
use crate::error::SelectorError;
use crate::value::Value;

/// A cached evaluation.
///
/// Entries are immutable once stored, except for `state`, which slides forward
/// to the latest state the entry was confirmed valid against.
#[derive(Debug)]
pub(crate) struct ResultEntry<T> {
    state: RefCell<Value>,
    state_dependencies: StateDependencies,
    call_dependencies: CallDependencies,
    value: Option<Arc<T>>,
    error: Option<SelectorError>,
    debug: Rc<DebugInfo>,
}

impl<T> ResultEntry<T> {
    pub(crate) fn new(
        state: Value,
        state_dependencies: StateDependencies,
        call_dependencies: CallDependencies,
        value: Option<Arc<T>>,
        error: Option<SelectorError>,
        debug: Rc<DebugInfo>,
    ) -> Self {
        Self {
            state: RefCell::new(state),
            state_dependencies,
            call_dependencies,
            value,
            error,
            debug,
        }
    }

    /// An entry for an evaluation that needed to execute but was not allowed to.
    pub(crate) fn blocked(state: Value, debug: Rc<DebugInfo>) -> Self {
        Self::new(
            state,
            StateDependencies::default(),
            CallDependencies::default(),
            None,
            None,
            debug,
        )
    }

    pub(crate) fn state(&self) -> Value {
        self.state.borrow().clone()
    }

    pub(crate) fn slide_state(&self, state: &Value) {
        *self.state.borrow_mut() = state.clone();
    }

    pub(crate) fn state_dependencies(&self) -> &StateDependencies {
        &self.state_dependencies
    }

    pub(crate) fn call_dependencies(&self) -> &CallDependencies {
        &self.call_dependencies
    }

    pub(crate) fn value(&self) -> Option<&Arc<T>> {
        self.value.as_ref()
    }

    pub(crate) fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub(crate) fn error(&self) -> Option<&SelectorError> {
        self.error.as_ref()
    }

    pub(crate) fn debug(&self) -> &Rc<DebugInfo> {
        &self.debug
    }
}
