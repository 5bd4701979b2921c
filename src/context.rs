//! Tracked state access for running selectors.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::dependency::StateDependencies;
use crate::options::GetFn;
use crate::value::{StatePath, Value};

/// State accessor handed to a selector function.
///
/// Every read is recorded as a state dependency of the running execution. On
/// the next call, the cached result is reused as long as every recorded path
/// still holds an identical value.
pub struct SelectorContext<'a> {
    state: &'a Value,
    get: &'a GetFn,
    reads: RefCell<BTreeMap<StatePath, Option<Value>>>,
}

impl<'a> SelectorContext<'a> {
    pub(crate) fn new(state: &'a Value, get: &'a GetFn) -> Self {
        Self {
            state,
            get,
            reads: RefCell::new(BTreeMap::new()),
        }
    }

    /// Read the value at `path`, or `Value::Null` if it does not exist.
    pub fn get(&self, path: impl Into<StatePath>) -> Value {
        self.get_or(path, Value::Null)
    }

    /// Read the value at `path`, or `default` if it does not exist.
    ///
    /// The dependency is recorded on the raw lookup, so the default never
    /// masks a path appearing later, even when it appears as `Value::Null`.
    pub fn get_or(&self, path: impl Into<StatePath>, default: impl Into<Value>) -> Value {
        let path = path.into();
        let raw = if path.is_root() {
            Some(self.state.clone())
        } else {
            (self.get)(self.state, &path)
        };
        self.reads.borrow_mut().insert(path, raw.clone());
        raw.unwrap_or_else(|| default.into())
    }

    /// Read the whole state. The result depends on every part of it.
    pub fn state(&self) -> Value {
        self.get(StatePath::root())
    }

    pub(crate) fn into_state_dependencies(self) -> StateDependencies {
        StateDependencies::new(self.reads.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::get_at_path;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn test_reads_are_recorded() {
        let get: GetFn = Rc::new(get_at_path);
        let state = Value::from(json!({"a": 1, "b": {"c": "x"}}));
        let context = SelectorContext::new(&state, &get);

        assert_eq!(context.get("a").as_i64(), Some(1));
        assert_eq!(context.get("b.c").as_str(), Some("x"));
        assert_eq!(context.get_or("missing", 5).as_i64(), Some(5));

        let deps = context.into_state_dependencies();
        assert_eq!(deps.len(), 3);
        assert!(!deps.any_changed(&get, &state.with_key("other", Value::Null)));
        assert!(deps.any_changed(&get, &state.with_key("missing", Value::from(5))));
    }
}
