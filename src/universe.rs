//! Universes: shared state configuration binding a family of selectors.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::context::SelectorContext;
use crate::error::SelectorError;
use crate::options::{
    validate_selector_options, validate_state_options, CompareStateFn, DefaultSelectorOptions,
    GetFn, ResolvedOptions, SelectorOptions, StateOptions,
};
use crate::params::Params;
use crate::selector::{Selector, SelectorFn, WeakSelector};
use crate::stack::UniverseId;
use crate::tracer::{NoopTracer, Tracer};
use crate::value::{StatePath, Value};

/// A family of selectors sharing one state shape and configuration.
///
/// Selectors of one universe may call each other freely. Calling a selector
/// from inside a selector of another universe is reported and treated as a
/// fresh outermost call.
///
/// Clone is cheap: clones share the same universe.
///
/// # Example
///
/// ```ignore
/// let universe = Universe::new();
/// let total = universe.selector(|ctx, _params, _extra| {
///     Ok(ctx.get("a").as_i64().unwrap_or(0) + ctx.get("b").as_i64().unwrap_or(0))
/// });
///
/// let state = Value::from(json!({"a": 1, "b": 2}));
/// assert_eq!(*total.call(&state, ())?, 3);
/// ```
#[derive(Clone)]
pub struct Universe {
    inner: Rc<UniverseInner>,
}

struct UniverseInner {
    id: UniverseId,
    options: StateOptions,
    tracer: Rc<dyn Tracer>,
    next_selector: Cell<u64>,
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Universe")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl Universe {
    /// Create a universe with the default options.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a universe from explicit state options.
    pub fn with_options(options: StateOptions) -> Self {
        Self::builder().state_options(options).build()
    }

    /// Create a builder for configuring a universe.
    pub fn builder() -> UniverseBuilder {
        UniverseBuilder::new()
    }

    /// Create a selector comparing results with `==`.
    pub fn selector<T, F>(&self, compute: F) -> Selector<T>
    where
        T: PartialEq + 'static,
        F: Fn(&SelectorContext<'_>, &Params, &[Value]) -> Result<T, SelectorError> + 'static,
    {
        self.selector_with(SelectorOptions::with_partial_eq(), compute)
    }

    /// Create a selector with explicit options.
    pub fn selector_with<T, F>(&self, options: SelectorOptions<T>, compute: F) -> Selector<T>
    where
        T: 'static,
        F: Fn(&SelectorContext<'_>, &Params, &[Value]) -> Result<T, SelectorError> + 'static,
    {
        let compute: Box<SelectorFn<T>> = Box::new(compute);
        self.build_selector(options, move |_| compute)
    }

    /// Create a selector that can call itself.
    ///
    /// `build` receives a weak handle to the selector under construction and
    /// returns the selector function. The handle must not be called before
    /// `build` returns.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let fib = universe.recursive_selector(|fib| {
    ///     move |_ctx: &SelectorContext<'_>, params: &Params, _extra: &[Value]| {
    ///         let n = params.as_i64().unwrap_or(0);
    ///         if n < 2 {
    ///             return Ok(n);
    ///         }
    ///         Ok(*fib.call_nested(n - 1)? + *fib.call_nested(n - 2)?)
    ///     }
    /// });
    /// ```
    pub fn recursive_selector<T, F, B>(&self, build: B) -> Selector<T>
    where
        T: PartialEq + 'static,
        B: FnOnce(WeakSelector<T>) -> F,
        F: Fn(&SelectorContext<'_>, &Params, &[Value]) -> Result<T, SelectorError> + 'static,
    {
        self.recursive_selector_with(SelectorOptions::with_partial_eq(), build)
    }

    /// Create a self-calling selector with explicit options.
    pub fn recursive_selector_with<T, F, B>(
        &self,
        options: SelectorOptions<T>,
        build: B,
    ) -> Selector<T>
    where
        T: 'static,
        B: FnOnce(WeakSelector<T>) -> F,
        F: Fn(&SelectorContext<'_>, &Params, &[Value]) -> Result<T, SelectorError> + 'static,
    {
        self.build_selector(options, move |this| {
            let compute: Box<SelectorFn<T>> = Box::new(build(this));
            compute
        })
    }

    fn build_selector<T: 'static>(
        &self,
        options: SelectorOptions<T>,
        build: impl FnOnce(WeakSelector<T>) -> Box<SelectorFn<T>>,
    ) -> Selector<T> {
        validate_selector_options(&options);
        let index = self.inner.next_selector.get();
        self.inner.next_selector.set(index + 1);
        let resolved = ResolvedOptions::resolve(
            options,
            &self.inner.options.default_selector_options,
            format!("selector#{index}"),
        );
        Selector::new(self.clone(), resolved, build)
    }

    pub(crate) fn id(&self) -> UniverseId {
        self.inner.id
    }

    pub(crate) fn getter(&self) -> &GetFn {
        &self.inner.options.get
    }

    pub(crate) fn compare_state(&self) -> Option<&CompareStateFn> {
        self.inner.options.compare_state.as_ref()
    }

    pub(crate) fn tracer(&self) -> &dyn Tracer {
        self.inner.tracer.as_ref()
    }
}

/// Builder for [`Universe`].
pub struct UniverseBuilder {
    options: StateOptions,
    tracer: Rc<dyn Tracer>,
}

impl Default for UniverseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UniverseBuilder {
    /// Start from the default options and the [`NoopTracer`].
    pub fn new() -> Self {
        Self {
            options: StateOptions::default(),
            tracer: Rc::new(NoopTracer::default()),
        }
    }

    /// Replace all state options at once.
    pub fn state_options(mut self, options: StateOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the coarse state comparison tried before any recorded dependency.
    pub fn compare_state(mut self, compare: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        self.options.compare_state = Some(Rc::new(compare));
        self
    }

    /// Always re-check recorded dependencies, even against the same state.
    pub fn without_state_comparison(mut self) -> Self {
        self.options.compare_state = None;
        self
    }

    /// Set the state accessor.
    pub fn get(mut self, get: impl Fn(&Value, &StatePath) -> Option<Value> + 'static) -> Self {
        self.options.get = Rc::new(get);
        self
    }

    /// Set the options every selector starts from.
    pub fn default_selector_options(mut self, defaults: DefaultSelectorOptions) -> Self {
        self.options.default_selector_options = defaults;
        self
    }

    /// Set the tracer observing every selector of the universe.
    pub fn tracer<T: Tracer>(mut self, tracer: T) -> Self {
        self.tracer = Rc::new(tracer);
        self
    }

    /// Build the universe. Option issues are logged, never fatal.
    pub fn build(self) -> Universe {
        validate_state_options(&self.options);
        Universe {
            inner: Rc::new(UniverseInner {
                id: UniverseId::next(),
                options: self.options,
                tracer: self.tracer,
                next_selector: Cell::new(1),
            }),
        }
    }
}
