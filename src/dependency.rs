//! Recorded dependencies of a result entry and their re-validation.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::options::GetFn;
use crate::params::Params;
use crate::stack::FrameGuard;
use crate::value::{StatePath, Value};

/// State reads made by one execution: path to the value observed there.
///
/// A missing path is recorded as `None`, so it stays distinct from a path
/// holding `Value::Null`.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateDependencies(Rc<BTreeMap<StatePath, Option<Value>>>);

impl StateDependencies {
    pub(crate) fn new(reads: BTreeMap<StatePath, Option<Value>>) -> Self {
        Self(Rc::new(reads))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if any recorded path appeared, disappeared, or no longer
    /// holds an identical value.
    pub(crate) fn any_changed(&self, get: &GetFn, state: &Value) -> bool {
        self.0.iter().any(|(path, recorded)| {
            match (recorded, read_path(get, state, path)) {
                (None, None) => false,
                (Some(recorded), Some(current)) => !recorded.is_identical(&current),
                _ => true,
            }
        })
    }
}

/// Read one path the way recorded reads observe it. `None` if it is missing.
pub(crate) fn read_path(get: &GetFn, state: &Value, path: &StatePath) -> Option<Value> {
    if path.is_root() {
        return Some(state.clone());
    }
    get(state, path)
}

/// Type-erased view of a selector, as seen by the entries that depend on it.
pub(crate) trait DependencySource {
    fn display_name(&self) -> &str;

    /// Evaluate under the current top frame and report whether the result is
    /// still the value recorded in `recorded` (an `Option<Arc<T>>`).
    fn is_unchanged(&self, state: &Value, params: &Params, extra: &[Value], recorded: &dyn Any)
        -> bool;
}

/// One nested selector call made by an execution.
pub(crate) struct CallDependency {
    selector: Weak<dyn DependencySource>,
    params: Params,
    value: Box<dyn Any>,
    read_only: bool,
}

impl CallDependency {
    pub(crate) fn new(
        selector: Weak<dyn DependencySource>,
        params: Params,
        value: Box<dyn Any>,
        read_only: bool,
    ) -> Self {
        Self {
            selector,
            params,
            value,
            read_only,
        }
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Re-evaluate the callee. A dropped callee always counts as changed.
    fn is_unchanged(&self, state: &Value, extra: &[Value]) -> bool {
        match self.selector.upgrade() {
            Some(source) => source.is_unchanged(state, &self.params, extra, &*self.value),
            None => false,
        }
    }
}

impl fmt::Debug for CallDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .selector
            .upgrade()
            .map(|source| source.display_name().to_owned())
            .unwrap_or_else(|| "<dropped>".to_owned());
        f.debug_struct("CallDependency")
            .field("selector", &name)
            .field("params", &self.params)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Ordered nested calls of one execution.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallDependencies(Rc<Vec<CallDependency>>);

impl CallDependencies {
    pub(crate) fn new(calls: Vec<CallDependency>) -> Self {
        Self(Rc::new(calls))
    }

    /// Re-evaluate every callee in recorded order under `frame`, stopping at the
    /// first one whose result differs.
    ///
    /// Read-only dependencies are re-checked with execution disabled, so that
    /// validating a probe never forces a computation.
    pub(crate) fn any_changed(
        &self,
        frame: &FrameGuard,
        state: &Value,
        extra: &[Value],
        allow_execution: bool,
    ) -> bool {
        self.0.iter().any(|dependency| {
            frame.set_allow_execution(allow_execution && !dependency.is_read_only());
            !dependency.is_unchanged(state, extra)
        })
    }
}
