//! Selectors and the evaluation engine.
//!
//! Every call resolves to one evaluation of one parameter key:
//!
//! 1. Look up the cached entry for the key.
//! 2. If it holds a value, decide whether it is still valid: first with the
//!    universe's coarse state comparison, then by re-checking every recorded
//!    state read and nested selector call.
//! 3. Reuse it (skipped), or execute the selector function (phantom or full),
//!    or give up without a value when execution is not permitted (aborted).
//! 4. Register the evaluation as a call dependency of the running parent.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::context::SelectorContext;
use crate::debug_info::{DebugCounts, DebugInfo, EvaluationKind, RunOutcome};
use crate::dependency::{CallDependencies, CallDependency, DependencySource};
use crate::entry::ResultEntry;
use crate::error::SelectorError;
use crate::options::{ErrorArgs, ResolvedOptions};
use crate::params::Params;
use crate::stack::{CallStack, Frame};
use crate::storage::{CachedEntry, ResultCache};
use crate::tracer::TracerSelectorKey;
use crate::universe::Universe;
use crate::value::Value;

/// Signature of a selector function.
pub type SelectorFn<T> =
    dyn Fn(&SelectorContext<'_>, &Params, &[Value]) -> Result<T, SelectorError>;

/// A memoized derivation over the state of a [`Universe`].
///
/// Results are cached per parameter key. A cached result is handed out as the
/// same `Arc` for as long as it stays valid, so callers can detect changes with
/// `Arc::ptr_eq`.
///
/// Clone is cheap: clones share the same cache.
pub struct Selector<T> {
    inner: Rc<SelectorInner<T>>,
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("name", &self.inner.options.display_name)
            .finish_non_exhaustive()
    }
}

/// A non-owning handle to a selector, used for self reference.
pub struct WeakSelector<T> {
    inner: Weak<SelectorInner<T>>,
}

impl<T> Clone for WeakSelector<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for WeakSelector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakSelector(..)")
    }
}

pub(crate) struct SelectorInner<T> {
    this: Weak<SelectorInner<T>>,
    universe: Universe,
    compute: Box<SelectorFn<T>>,
    options: ResolvedOptions<T>,
    cache: RefCell<Box<dyn ResultCache>>,
}

impl<T: 'static> Selector<T> {
    pub(crate) fn new(
        universe: Universe,
        options: ResolvedOptions<T>,
        build: impl FnOnce(WeakSelector<T>) -> Box<SelectorFn<T>>,
    ) -> Self {
        let cache = RefCell::new((options.create_result_cache)());
        let inner = Rc::new_cyclic(|this: &Weak<SelectorInner<T>>| SelectorInner {
            this: this.clone(),
            universe,
            compute: build(WeakSelector {
                inner: this.clone(),
            }),
            options,
            cache,
        });
        Selector { inner }
    }

    /// Call with an explicit state.
    ///
    /// From inside another selector of the same universe, the call is
    /// recorded as a dependency of the running selector.
    pub fn call(&self, state: &Value, params: impl Into<Params>) -> Result<Arc<T>, SelectorError> {
        self.call_with(Some(state), params, &[])
    }

    /// Call from inside a running selector, against the state it runs on.
    ///
    /// Fails with `MissingState` when no selector of this universe is running.
    pub fn call_nested(&self, params: impl Into<Params>) -> Result<Arc<T>, SelectorError> {
        self.call_with(None, params, &[])
    }

    /// Call with an optional state and extra arguments.
    ///
    /// Extra arguments are passed to the selector function and reused when
    /// this call is later re-validated as a dependency. They are not part of
    /// the cache key.
    pub fn call_with(
        &self,
        state: Option<&Value>,
        params: impl Into<Params>,
        extra: &[Value],
    ) -> Result<Arc<T>, SelectorError> {
        self.inner.invoke(state, &params.into(), extra)
    }

    /// Returns true if a cached result is available and still valid.
    ///
    /// Never executes the selector function. See
    /// [`get_cached_result`](Self::get_cached_result).
    pub fn has_cached_result(&self, state: Option<&Value>, params: impl Into<Params>) -> bool {
        self.get_cached_result(state, params).is_some()
    }

    /// Returns the cached result if it is still valid, without executing.
    ///
    /// Dependencies of the cached entry are re-validated, which may reuse but
    /// never recompute them. From inside a running selector, a found result is
    /// recorded as a read-only dependency.
    pub fn get_cached_result(
        &self,
        state: Option<&Value>,
        params: impl Into<Params>,
    ) -> Option<Arc<T>> {
        match self.inner.probe(state, &params.into()) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(
                    target: "selector_flow",
                    selector = %self.display_name(),
                    error = %err,
                    "cached result probe failed"
                );
                None
            }
        }
    }

    /// Discard every cached result.
    ///
    /// Resetting while any selector is evaluating is allowed but logged: the
    /// running evaluations may store entries recorded against the old cache.
    pub fn reset_cache(&self) {
        let running = CallStack::depth() > 0;
        if running {
            tracing::warn!(
                target: "selector_flow",
                selector = %self.display_name(),
                "cache reset while selectors are evaluating"
            );
        }
        self.inner
            .universe
            .tracer()
            .on_cache_reset(self.display_name(), running);
        let fresh = (self.inner.options.create_result_cache)();
        let stale = std::mem::replace(&mut *self.inner.cache.borrow_mut(), fresh);
        drop(stale);
    }

    /// Counters of one parameter key, or `None` if it was never evaluated.
    pub fn get_debug_info(&self, params: impl Into<Params>) -> Option<DebugCounts> {
        let key = (self.inner.options.get_key_for_params)(&params.into());
        match self.inner.cached_entry(&key) {
            Ok(entry) => entry.map(|entry| entry.debug().snapshot()),
            Err(err) => {
                tracing::error!(target: "selector_flow", error = %err, "debug info lookup failed");
                None
            }
        }
    }

    /// Name used in logs and diagnostics.
    pub fn display_name(&self) -> &str {
        &self.inner.options.display_name
    }

    /// The universe this selector belongs to.
    pub fn universe(&self) -> &Universe {
        &self.inner.universe
    }

    /// Create a weak handle.
    pub fn downgrade(&self) -> WeakSelector<T> {
        WeakSelector {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<T: 'static> WeakSelector<T> {
    /// The selector, if it is still alive.
    pub fn upgrade(&self) -> Option<Selector<T>> {
        self.inner.upgrade().map(|inner| Selector { inner })
    }

    /// See [`Selector::call`].
    pub fn call(&self, state: &Value, params: impl Into<Params>) -> Result<Arc<T>, SelectorError> {
        self.selector()?.call(state, params)
    }

    /// See [`Selector::call_nested`].
    pub fn call_nested(&self, params: impl Into<Params>) -> Result<Arc<T>, SelectorError> {
        self.selector()?.call_nested(params)
    }

    /// See [`Selector::call_with`].
    pub fn call_with(
        &self,
        state: Option<&Value>,
        params: impl Into<Params>,
        extra: &[Value],
    ) -> Result<Arc<T>, SelectorError> {
        self.selector()?.call_with(state, params, extra)
    }

    fn selector(&self) -> Result<Selector<T>, SelectorError> {
        self.upgrade()
            .ok_or_else(|| SelectorError::internal("selector called after it was dropped"))
    }
}

impl<T: 'static> SelectorInner<T> {
    fn display_name(&self) -> &str {
        &self.options.display_name
    }

    fn cached_entry(&self, key: &str) -> Result<Option<Rc<ResultEntry<T>>>, SelectorError> {
        let cached = self.cache.borrow().get(key);
        match cached {
            None => Ok(None),
            Some(entry) => entry.downcast::<T>().map(Some).ok_or_else(|| {
                SelectorError::internal(format!(
                    "cache of selector `{}` holds an entry of another type under {}",
                    self.display_name(),
                    key
                ))
            }),
        }
    }

    /// Resolve the state to evaluate against.
    ///
    /// Returns whether the call is nested inside a running selector of this
    /// universe.
    fn resolve_state(&self, state: Option<&Value>) -> Result<(Value, bool), SelectorError> {
        match CallStack::top_context() {
            Some((universe, ambient)) if universe == self.universe.id() => {
                Ok((state.cloned().unwrap_or(ambient), true))
            }
            top => {
                if top.is_some() {
                    tracing::error!(
                        target: "selector_flow",
                        selector = %self.display_name(),
                        "selector called from inside a selector of another universe; \
                         treating it as an outermost call"
                    );
                    self.universe
                        .tracer()
                        .on_cross_universe_call(self.display_name());
                }
                let state = state.cloned().ok_or_else(|| SelectorError::MissingState {
                    selector: self.display_name().to_owned(),
                })?;
                Ok((state, false))
            }
        }
    }

    fn invoke(
        &self,
        state: Option<&Value>,
        params: &Params,
        extra: &[Value],
    ) -> Result<Arc<T>, SelectorError> {
        let (state, nested) = self.resolve_state(state)?;
        let root =
            (!nested).then(|| CallStack::push(Frame::root(self.universe.id(), state.clone())));
        let entry = self.evaluate(&state, params, extra);
        drop(root);

        let entry = entry?;
        match (entry.value(), entry.error()) {
            (Some(value), _) => Ok(value.clone()),
            (None, Some(error)) => Err(error.clone()),
            (None, None) => Err(SelectorError::internal(format!(
                "selector `{}` produced neither a value nor an error",
                self.display_name()
            ))),
        }
    }

    fn probe(
        &self,
        state: Option<&Value>,
        params: &Params,
    ) -> Result<Option<Arc<T>>, SelectorError> {
        let (state, nested) = self.resolve_state(state)?;
        let param_key = (self.options.get_key_for_params)(params);
        let cached = self.cached_entry(&param_key)?;
        if !cached.is_some_and(|entry| entry.has_value()) {
            return Ok(None);
        }

        let frame = CallStack::push(Frame::probe(self.universe.id(), state.clone()));
        let key = TracerSelectorKey::new(self.display_name(), param_key.as_str());
        let entry = self.evaluate_keyed(&state, params, &[], param_key);
        drop(frame);

        let value = entry?.value().cloned();
        if nested && value.is_some() {
            self.register_with_parent(params, &key, value.clone(), true);
        }
        Ok(value)
    }

    fn evaluate(
        &self,
        state: &Value,
        params: &Params,
        extra: &[Value],
    ) -> Result<Rc<ResultEntry<T>>, SelectorError> {
        let param_key = (self.options.get_key_for_params)(params);
        self.evaluate_keyed(state, params, extra, param_key)
    }

    fn evaluate_keyed(
        &self,
        state: &Value,
        params: &Params,
        extra: &[Value],
        param_key: String,
    ) -> Result<Rc<ResultEntry<T>>, SelectorError> {
        let flags = CallStack::top_flags().ok_or_else(|| {
            SelectorError::internal(format!(
                "selector `{}` evaluated outside of any frame",
                self.display_name()
            ))
        })?;
        let previous = self.cached_entry(&param_key)?;
        let debug = match &previous {
            Some(previous) => previous.debug().clone(),
            None => Rc::new(DebugInfo::new(self.options.verbose.clone())),
        };

        let kind = if flags.record_dependencies {
            EvaluationKind::Invoked
        } else {
            EvaluationKind::DepCheck
        };
        let tracer = self.universe.tracer();
        let span_id = tracer.new_span_id();
        let key = TracerSelectorKey::new(self.display_name(), param_key.as_str());
        debug.begin(kind, &param_key);
        tracer.on_evaluate_start(span_id, &key, kind);

        let reusable = previous.as_ref().is_some_and(|previous| {
            previous.has_value()
                && self.is_still_valid(previous, state, extra, flags.allow_execution)
        });
        let (entry, outcome) = match previous {
            Some(previous) if reusable => {
                previous.slide_state(state);
                (previous, RunOutcome::Skipped)
            }
            previous if flags.allow_execution => {
                self.execute(state, params, extra, previous.as_deref(), debug.clone())
            }
            _ => (
                Rc::new(ResultEntry::blocked(state.clone(), debug.clone())),
                RunOutcome::Aborted,
            ),
        };

        debug.finish(outcome, &param_key);
        tracer.on_evaluate_end(span_id, &key, outcome);
        if flags.record_dependencies {
            self.register_with_parent(params, &key, entry.value().cloned(), !flags.allow_execution);
        }
        self.cache
            .borrow_mut()
            .set(param_key, CachedEntry::new(entry.clone()));
        Ok(entry)
    }

    /// Coarse state comparison first, then every recorded dependency in order.
    fn is_still_valid(
        &self,
        previous: &ResultEntry<T>,
        state: &Value,
        extra: &[Value],
        allow_execution: bool,
    ) -> bool {
        if let Some(compare_state) = self.universe.compare_state() {
            if compare_state(&previous.state(), state) {
                return true;
            }
        }

        let frame = CallStack::push(Frame::dependency_check(
            self.universe.id(),
            state.clone(),
            allow_execution,
        ));
        let unchanged = !previous
            .state_dependencies()
            .any_changed(self.universe.getter(), state)
            && !previous
                .call_dependencies()
                .any_changed(&frame, state, extra, allow_execution);
        drop(frame);
        unchanged
    }

    fn execute(
        &self,
        state: &Value,
        params: &Params,
        extra: &[Value],
        previous: Option<&ResultEntry<T>>,
        debug: Rc<DebugInfo>,
    ) -> (Rc<ResultEntry<T>>, RunOutcome) {
        let context = SelectorContext::new(state, self.universe.getter());
        let frame = CallStack::push(Frame::executing(self.universe.id(), state.clone()));
        let (mut value, error) = match (self.compute)(&context, params, extra) {
            Ok(value) => (Some(Arc::new(value)), None),
            Err(error) => {
                let recovered = self.recover(&error, state, params, extra);
                (recovered.map(Arc::new), Some(error))
            }
        };
        let calls = frame.finish();
        let reads = context.into_state_dependencies();

        let mut outcome = if error.is_some() {
            RunOutcome::Aborted
        } else {
            RunOutcome::Full
        };
        // Equal results keep the previous Arc so dependents see no change.
        let unchanged = match (
            previous.and_then(|previous| previous.value()),
            &value,
            &self.options.compare_result,
        ) {
            (Some(before), Some(now), Some(compare)) if compare(&**before, &**now) => {
                Some(before.clone())
            }
            _ => None,
        };
        if let Some(before) = unchanged {
            value = Some(before);
            if error.is_none() {
                outcome = RunOutcome::Phantom;
            }
        }

        let entry = ResultEntry::new(
            state.clone(),
            reads,
            CallDependencies::new(calls),
            value,
            error,
            debug,
        );
        (Rc::new(entry), outcome)
    }

    /// Run the `on_error` hook, if any, while the failed execution's frame is
    /// still on the stack.
    fn recover(
        &self,
        error: &SelectorError,
        state: &Value,
        params: &Params,
        extra: &[Value],
    ) -> Option<T> {
        let hook = self.options.on_error.as_ref()?;
        let inner = self.this.upgrade()?;
        hook(
            error,
            ErrorArgs {
                state,
                params,
                extra,
            },
            &Selector { inner },
        )
    }

    fn register_with_parent(
        &self,
        params: &Params,
        key: &TracerSelectorKey,
        value: Option<Arc<T>>,
        read_only: bool,
    ) {
        let source: Weak<dyn DependencySource> = self.this.clone();
        let dependency = CallDependency::new(source, params.clone(), Box::new(value), read_only);
        if CallStack::record_call(dependency) {
            self.universe
                .tracer()
                .on_dependency_registered(key, read_only);
        }
    }
}

impl<T: 'static> DependencySource for SelectorInner<T> {
    fn display_name(&self) -> &str {
        &self.options.display_name
    }

    fn is_unchanged(
        &self,
        state: &Value,
        params: &Params,
        extra: &[Value],
        recorded: &dyn Any,
    ) -> bool {
        let Some(recorded) = recorded.downcast_ref::<Option<Arc<T>>>() else {
            tracing::error!(
                target: "selector_flow",
                selector = %self.options.display_name,
                "internal consistency error: recorded dependency value has another type"
            );
            return false;
        };
        match self.evaluate(state, params, extra) {
            Ok(entry) => match (entry.value(), recorded) {
                (Some(now), Some(before)) => Arc::ptr_eq(now, before),
                _ => false,
            },
            Err(err) => {
                tracing::error!(
                    target: "selector_flow",
                    selector = %self.options.display_name,
                    error = %err,
                    "dependency re-validation failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_cross_universe_call_is_logged() {
        let local = Universe::new().selector(|ctx, _params, _extra| Ok(ctx.get("a").as_i64()));
        let outer = {
            let local = local.clone();
            Universe::new().selector(move |ctx, _params, _extra| {
                let missing = local.call_nested(());
                assert!(matches!(missing, Err(SelectorError::MissingState { .. })));
                Ok(*local.call(&ctx.state(), ())?)
            })
        };

        let state = Value::from(json!({"a": 3}));
        assert_eq!(*outer.call(&state, ()).unwrap(), Some(3));
        assert!(logs_contain("selector of another universe"));
    }

    #[traced_test]
    #[test]
    fn test_reset_while_running_is_logged() {
        let universe = Universe::new();
        let resetting = universe.recursive_selector(|this| {
            move |_ctx: &SelectorContext<'_>,
                  _params: &Params,
                  _extra: &[Value]|
                  -> Result<i32, SelectorError> {
                if let Some(this) = this.upgrade() {
                    this.reset_cache();
                }
                Ok(1)
            }
        });

        let state = Value::from(json!({}));
        assert_eq!(*resetting.call(&state, ()).unwrap(), 1);
        assert!(logs_contain("cache reset while selectors are evaluating"));
    }

    #[traced_test]
    #[test]
    fn test_quiet_reset_is_not_logged() {
        let selector = Universe::new().selector(|_ctx, _params, _extra| Ok(()));
        selector.reset_cache();
        assert!(!logs_contain("cache reset while selectors are evaluating"));
    }

    #[traced_test]
    #[test]
    fn test_verbose_selector_logs_evaluations() {
        let selector = Universe::new().selector_with(
            crate::SelectorOptions::with_partial_eq().debug("watched"),
            |ctx, _params, _extra| Ok(ctx.get("a").as_i64()),
        );

        let state = Value::from(json!({"a": 1}));
        selector.call(&state, ()).unwrap();
        assert!(logs_contain("watched"));
    }

    #[test]
    fn test_reset_discards_every_entry() {
        let selector = Universe::new().selector(|_ctx, params, _extra| Ok(params.as_i64()));
        let state = Value::Null;
        selector.call(&state, 1).unwrap();
        selector.call(&state, 2).unwrap();
        assert_eq!(selector.inner.cache.borrow().len(), 2);

        selector.reset_cache();
        assert!(selector.inner.cache.borrow().is_empty());
        assert!(selector.get_debug_info(1).is_none());
    }
}
