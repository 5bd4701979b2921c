//! Universe and selector configuration, defaults, and sanity checks.

use std::fmt;
use std::rc::Rc;

use crate::error::SelectorError;
use crate::params::{json_key_for_params, Params};
use crate::selector::Selector;
use crate::storage::{default_cache_factory, CacheFactory, ResultCache};
use crate::value::{StatePath, Value};

/// Decides whether two state snapshots are equivalent for every selector.
pub type CompareStateFn = Rc<dyn Fn(&Value, &Value) -> bool>;

/// Reads the value at a path. `None` means the path does not exist.
pub type GetFn = Rc<dyn Fn(&Value, &StatePath) -> Option<Value>>;

/// Derives the cache key of a parameter value.
pub type KeyFn = Rc<dyn Fn(&Params) -> String>;

/// Decides whether a new result equals the previous one.
pub type CompareResultFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Recovery hook: a substitute value, or `None` to leave the entry without one.
pub type OnErrorFn<T> = Rc<dyn Fn(&SelectorError, ErrorArgs<'_>, &Selector<T>) -> Option<T>>;

/// Arguments of the failed call, handed to an `on_error` hook.
#[derive(Debug, Clone, Copy)]
pub struct ErrorArgs<'a> {
    /// State the selector was evaluated against.
    pub state: &'a Value,
    /// Params of the failed call.
    pub params: &'a Params,
    /// Extra arguments of the failed call.
    pub extra: &'a [Value],
}

/// Verbose logging of evaluations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DebugSetting {
    /// Evaluations are logged at `trace` level only.
    #[default]
    Off,
    /// Log at `debug` level, prefixed with the display name.
    On,
    /// Log at `debug` level, prefixed with this label.
    Label(String),
}

impl From<bool> for DebugSetting {
    fn from(on: bool) -> Self {
        if on {
            DebugSetting::On
        } else {
            DebugSetting::Off
        }
    }
}

impl From<&str> for DebugSetting {
    fn from(label: &str) -> Self {
        DebugSetting::Label(label.to_owned())
    }
}

/// Shallow state comparison: identical values, or objects with the same keys
/// whose values are pairwise identical.
pub fn shallow_equal(previous: &Value, next: &Value) -> bool {
    if previous.is_identical(next) {
        return true;
    }
    match (previous, next) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && va.is_identical(vb))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_identical(y))
        }
        _ => false,
    }
}

/// Default accessor: walk object keys and array indices.
pub fn get_at_path(state: &Value, path: &StatePath) -> Option<Value> {
    state.at_path(path).cloned()
}

/// Options shared by every selector of a universe unless overridden.
#[derive(Clone)]
pub struct DefaultSelectorOptions {
    pub(crate) create_result_cache: CacheFactory,
    pub(crate) get_key_for_params: KeyFn,
    pub(crate) debug: DebugSetting,
}

impl Default for DefaultSelectorOptions {
    fn default() -> Self {
        Self {
            create_result_cache: default_cache_factory(),
            get_key_for_params: Rc::new(json_key_for_params),
            debug: DebugSetting::Off,
        }
    }
}

impl fmt::Debug for DefaultSelectorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultSelectorOptions")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl DefaultSelectorOptions {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the factory of per-selector result caches.
    pub fn create_result_cache(
        mut self,
        factory: impl Fn() -> Box<dyn ResultCache> + 'static,
    ) -> Self {
        self.create_result_cache = Rc::new(factory);
        self
    }

    /// Set the parameter key function.
    pub fn get_key_for_params(mut self, key: impl Fn(&Params) -> String + 'static) -> Self {
        self.get_key_for_params = Rc::new(key);
        self
    }

    /// Set verbose logging.
    pub fn debug(mut self, debug: impl Into<DebugSetting>) -> Self {
        self.debug = debug.into();
        self
    }
}

/// Per-selector options. Unset fields fall back to the universe defaults.
///
/// # Example
///
/// ```ignore
/// let options = SelectorOptions::new()
///     .display_name("sortedList")
///     .compare_result(output_eq::partial_eq)
///     .on_error(|_err, _args, _selector| Some(Vec::new()));
/// ```
pub struct SelectorOptions<T> {
    pub(crate) compare_result: Option<CompareResultFn<T>>,
    pub(crate) create_result_cache: Option<CacheFactory>,
    pub(crate) get_key_for_params: Option<KeyFn>,
    pub(crate) on_error: Option<OnErrorFn<T>>,
    pub(crate) display_name: Option<String>,
    pub(crate) debug: Option<DebugSetting>,
}

impl<T> Default for SelectorOptions<T> {
    fn default() -> Self {
        Self {
            compare_result: None,
            create_result_cache: None,
            get_key_for_params: None,
            on_error: None,
            display_name: None,
            debug: None,
        }
    }
}

impl<T> Clone for SelectorOptions<T> {
    fn clone(&self) -> Self {
        Self {
            compare_result: self.compare_result.clone(),
            create_result_cache: self.create_result_cache.clone(),
            get_key_for_params: self.get_key_for_params.clone(),
            on_error: self.on_error.clone(),
            display_name: self.display_name.clone(),
            debug: self.debug.clone(),
        }
    }
}

impl<T> fmt::Debug for SelectorOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorOptions")
            .field("compare_result", &self.compare_result.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("display_name", &self.display_name)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl<T> SelectorOptions<T> {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the result comparison used to detect phantom runs.
    ///
    /// Without one, every execution that produces a value is a full run.
    pub fn compare_result(mut self, compare: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.compare_result = Some(Rc::new(compare));
        self
    }

    /// Set the factory of this selector's result cache.
    pub fn create_result_cache(
        mut self,
        factory: impl Fn() -> Box<dyn ResultCache> + 'static,
    ) -> Self {
        self.create_result_cache = Some(Rc::new(factory));
        self
    }

    /// Set the parameter key function.
    pub fn get_key_for_params(mut self, key: impl Fn(&Params) -> String + 'static) -> Self {
        self.get_key_for_params = Some(Rc::new(key));
        self
    }

    /// Set the recovery hook called when the selector function fails.
    pub fn on_error(
        mut self,
        hook: impl Fn(&SelectorError, ErrorArgs<'_>, &Selector<T>) -> Option<T> + 'static,
    ) -> Self {
        self.on_error = Some(Rc::new(hook));
        self
    }

    /// Set the name used in logs and diagnostics.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set verbose logging.
    pub fn debug(mut self, debug: impl Into<DebugSetting>) -> Self {
        self.debug = Some(debug.into());
        self
    }
}

impl<T: PartialEq + 'static> SelectorOptions<T> {
    /// Options comparing results with `==`.
    pub fn with_partial_eq() -> Self {
        Self::new().compare_result(crate::output_eq::partial_eq)
    }
}

/// Options of one selector after merging with the universe defaults.
pub(crate) struct ResolvedOptions<T> {
    pub compare_result: Option<CompareResultFn<T>>,
    pub create_result_cache: CacheFactory,
    pub get_key_for_params: KeyFn,
    pub on_error: Option<OnErrorFn<T>>,
    pub display_name: String,
    /// Log prefix when verbose logging is on.
    pub verbose: Option<String>,
}

impl<T> ResolvedOptions<T> {
    pub(crate) fn resolve(
        options: SelectorOptions<T>,
        defaults: &DefaultSelectorOptions,
        fallback_name: String,
    ) -> Self {
        let display_name = options.display_name.unwrap_or(fallback_name);
        let verbose = match options.debug.unwrap_or_else(|| defaults.debug.clone()) {
            DebugSetting::Off => None,
            DebugSetting::On => Some(display_name.clone()),
            DebugSetting::Label(label) => Some(label),
        };
        Self {
            compare_result: options.compare_result,
            create_result_cache: options
                .create_result_cache
                .unwrap_or_else(|| defaults.create_result_cache.clone()),
            get_key_for_params: options
                .get_key_for_params
                .unwrap_or_else(|| defaults.get_key_for_params.clone()),
            on_error: options.on_error,
            display_name,
            verbose,
        }
    }
}

/// Universe-wide configuration.
#[derive(Clone)]
pub struct StateOptions {
    pub(crate) compare_state: Option<CompareStateFn>,
    pub(crate) get: GetFn,
    pub(crate) default_selector_options: DefaultSelectorOptions,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            compare_state: Some(Rc::new(shallow_equal)),
            get: Rc::new(get_at_path),
            default_selector_options: DefaultSelectorOptions::default(),
        }
    }
}

impl fmt::Debug for StateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateOptions")
            .field("compare_state", &self.compare_state.is_some())
            .field("default_selector_options", &self.default_selector_options)
            .finish_non_exhaustive()
    }
}

/// A finding of the option sanity checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    /// `display_name` was set to an empty string.
    #[error("display name must not be empty")]
    EmptyDisplayName,
    /// Verbose logging was enabled with an empty label.
    #[error("debug label must not be empty")]
    EmptyDebugLabel,
    /// The result cache factory returned a cache that already holds entries.
    #[error("result cache factory returned a cache holding {len} entries")]
    NonEmptyResultCache {
        /// Entries found in the fresh cache.
        len: usize,
    },
}

fn check_debug(debug: &DebugSetting, issues: &mut Vec<ValidationIssue>) {
    if matches!(debug, DebugSetting::Label(label) if label.is_empty()) {
        issues.push(ValidationIssue::EmptyDebugLabel);
    }
}

fn check_cache_factory(factory: &CacheFactory, issues: &mut Vec<ValidationIssue>) {
    let len = factory().len();
    if len != 0 {
        issues.push(ValidationIssue::NonEmptyResultCache { len });
    }
}

fn report(context: &str, issues: Vec<ValidationIssue>) -> Vec<ValidationIssue> {
    for issue in &issues {
        tracing::error!(target: "selector_flow", context, %issue, "invalid options");
    }
    issues
}

/// Check universe-wide options. Every issue is also logged at `error` level.
pub fn validate_state_options(options: &StateOptions) -> Vec<ValidationIssue> {
    let defaults = &options.default_selector_options;
    let mut issues = Vec::new();
    check_debug(&defaults.debug, &mut issues);
    check_cache_factory(&defaults.create_result_cache, &mut issues);
    report("state options", issues)
}

/// Check per-selector options. Every issue is also logged at `error` level.
pub fn validate_selector_options<T>(options: &SelectorOptions<T>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if options.display_name.as_deref() == Some("") {
        issues.push(ValidationIssue::EmptyDisplayName);
    }
    if let Some(debug) = &options.debug {
        check_debug(debug, &mut issues);
    }
    if let Some(factory) = &options.create_result_cache {
        check_cache_factory(factory, &mut issues);
    }
    report("selector options", issues)
}
