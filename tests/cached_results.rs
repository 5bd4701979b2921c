//! Tests for read-only access to cached results.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::DebugInfoCheck;
use selector_flow::{
    ParamValue, Params,
    RunOutcome::{Aborted, Full, Skipped},
    Selector, Universe, Value,
};
use serde_json::json;

fn has(selector: &Selector<i64>, state: &Value) -> bool {
    selector.has_cached_result(Some(state), ())
}

fn cached(selector: &Selector<i64>, state: &Value) -> Option<i64> {
    selector.get_cached_result(Some(state), ()).map(|value| *value)
}

#[test]
fn test_without_params_from_outside() {
    let universe = Universe::new();
    let child = universe.selector(|ctx, _params, _extra| Ok(ctx.get("a").as_i64().unwrap_or(0)));
    let parent = {
        let child = child.clone();
        universe.selector(move |_ctx, _params, _extra| Ok(*child.call_nested(())? * 10))
    };

    let state = Value::from(json!({"a": 1}));
    assert!(!has(&parent, &state));
    assert!(!has(&child, &state));

    assert_eq!(*parent.call(&state, ()).unwrap(), 10);
    assert!(has(&parent, &state));
    assert_eq!(cached(&parent, &state), Some(10));
    assert!(has(&child, &state));
    assert_eq!(cached(&child, &state), Some(1));

    let state = Value::from(json!({"a": 5}));
    assert!(!has(&parent, &state));
    assert!(!has(&child, &state));

    assert_eq!(*parent.call(&state, ()).unwrap(), 50);
    assert!(has(&parent, &state));
    assert_eq!(cached(&parent, &state), Some(50));
    assert!(has(&child, &state));
    assert_eq!(cached(&child, &state), Some(5));
}

#[test]
fn test_with_params_from_outside() {
    let universe = Universe::new();
    let child = universe.selector(|ctx, params, _extra| {
        let path = params
            .field("path")
            .and_then(ParamValue::as_str)
            .unwrap_or_default();
        Ok(ctx.get(path).as_i64().unwrap_or(0))
    });
    let parent = {
        let child = child.clone();
        universe.selector(move |_ctx, params, _extra| {
            let path = params.as_str().unwrap_or_default();
            let value = child.call_nested(Params::record([("path", path)]))?;
            Ok(format!("{path}={value}"))
        })
    };
    let child_params = |path: &str| Params::record([("path", path)]);
    let parent_cached = |state: &Value, path: &str| {
        parent
            .get_cached_result(Some(state), path)
            .map(|value| value.as_str().to_owned())
    };

    let state = Value::from(json!({"a": 1, "b": 1}));
    assert!(!parent.has_cached_result(Some(&state), "a"));
    assert!(!parent.has_cached_result(Some(&state), "b"));
    assert!(!child.has_cached_result(Some(&state), child_params("a")));
    assert!(!child.has_cached_result(Some(&state), child_params("b")));

    assert_eq!(*parent.call(&state, "a").unwrap(), "a=1");
    assert_eq!(parent_cached(&state, "a").as_deref(), Some("a=1"));
    assert_eq!(
        child.get_cached_result(Some(&state), child_params("a")).as_deref(),
        Some(&1)
    );
    assert_eq!(*parent.call(&state, "b").unwrap(), "b=1");
    assert_eq!(parent_cached(&state, "b").as_deref(), Some("b=1"));

    let state = Value::from(json!({"a": 1, "b": 2}));
    // "a" is still cached: the state it read did not change
    assert_eq!(parent_cached(&state, "a").as_deref(), Some("a=1"));
    assert!(!parent.has_cached_result(Some(&state), "b"));
    assert_eq!(
        child.get_cached_result(Some(&state), child_params("a")).as_deref(),
        Some(&1)
    );
    assert!(!child.has_cached_result(Some(&state), child_params("b")));

    assert_eq!(*parent.call(&state, "a").unwrap(), "a=1");
    assert_eq!(*parent.call(&state, "b").unwrap(), "b=2");
    assert_eq!(parent_cached(&state, "b").as_deref(), Some("b=2"));
    assert_eq!(
        child.get_cached_result(Some(&state), child_params("b")).as_deref(),
        Some(&2)
    );
}

// parent's result depends on whether "b" changed, as seen through a cached lookup of other
#[test]
fn test_without_params_from_inside() {
    let universe = Universe::new();
    let other = universe.selector(|ctx, _params, _extra| Ok(ctx.get("b").as_i64().unwrap_or(0)));
    let child = universe.selector(|ctx, _params, _extra| Ok(ctx.get("a").as_i64().unwrap_or(0)));
    let parent = {
        let (other, child) = (other.clone(), child.clone());
        universe.selector(move |_ctx, _params, _extra| {
            let factor = if other.has_cached_result(None, ()) { 5 } else { 10 };
            Ok(*child.call_nested(())? * factor)
        })
    };

    let state = Value::from(json!({"a": 1, "b": 2}));
    assert!(!has(&parent, &state));
    assert!(!has(&child, &state));
    assert!(!has(&other, &state));

    assert_eq!(*parent.call(&state, ()).unwrap(), 10);
    assert_eq!(cached(&parent, &state), Some(10));
    assert_eq!(cached(&child, &state), Some(1));

    // Running other changes parent, but not child
    let state = Value::from(json!({"a": 5, "b": 2}));
    assert_eq!(*other.call(&state, ()).unwrap(), 2);
    assert_eq!(cached(&other, &state), Some(2));

    assert_eq!(*parent.call(&state, ()).unwrap(), 25);
    assert_eq!(cached(&parent, &state), Some(25));
    assert_eq!(cached(&child, &state), Some(5));

    // other is still cached
    let state = Value::from(json!({"a": 9, "b": 2}));
    assert_eq!(cached(&other, &state), Some(2));

    assert_eq!(*parent.call(&state, ()).unwrap(), 45);
    assert_eq!(cached(&parent, &state), Some(45));
    assert_eq!(cached(&child, &state), Some(9));

    // other is no longer cached, which invalidates parent as well
    let state = Value::from(json!({"a": 9, "b": 50}));
    assert!(!has(&other, &state));
    assert!(!has(&parent, &state));
    assert!(has(&child, &state));

    assert_eq!(*parent.call(&state, ()).unwrap(), 90);
    assert_eq!(cached(&parent, &state), Some(90));
    assert_eq!(cached(&child, &state), Some(9));
}

#[test]
fn test_cached_lookup_never_executes() {
    let universe = Universe::new();
    let runs = Rc::new(Cell::new(0));
    let selector = {
        let runs = runs.clone();
        universe.selector(move |ctx, _params, _extra| {
            runs.set(runs.get() + 1);
            Ok(ctx.get("a").as_i64().unwrap_or(0))
        })
    };

    let state = Value::from(json!({"a": 1}));
    assert_eq!(cached(&selector, &state), None);
    selector.call(&state, ()).unwrap();

    let state = Value::from(json!({"a": 2}));
    assert_eq!(cached(&selector, &state), None);
    assert_eq!(runs.get(), 1);

    let counts = selector.get_debug_info(()).unwrap();
    assert_eq!(counts.dep_check_count, 1);
    assert_eq!(counts.aborted_run_count, 1);
}

#[test]
fn test_read_only_dependency_is_rechecked_without_executing() {
    let universe = Universe::new();
    let other_runs = Rc::new(Cell::new(0));
    let other = {
        let other_runs = other_runs.clone();
        universe.selector(move |ctx, _params, _extra| {
            other_runs.set(other_runs.get() + 1);
            Ok(ctx.get("b").as_i64().unwrap_or(0))
        })
    };
    let parent = {
        let other = other.clone();
        universe.selector(move |ctx, _params, _extra| {
            let cached = other.get_cached_result(None, ()).map_or(-1, |value| *value);
            Ok(cached + ctx.get("a").as_i64().unwrap_or(0))
        })
    };
    let mut other_check = DebugInfoCheck::new(&other);

    let state = Value::from(json!({"a": 1, "b": 2}));
    assert_eq!(*other.call(&state, ()).unwrap(), 2);
    other_check.expect_invoked(Full);
    assert_eq!(*parent.call(&state, ()).unwrap(), 3);
    other_check.expect_dep_checked(Skipped);

    // The parent may execute, but other was only ever looked up: it stays unexecuted
    let state = state.with_key("b", Value::from(3));
    assert_eq!(*parent.call(&state, ()).unwrap(), 0);
    other_check.expect_dep_checked(Aborted);
    assert_eq!(other_runs.get(), 1);
    assert!(!has(&other, &state));
}
