//! Selector-Flow: memoized selectors that discover their own dependencies.
//!
//! A selector is a function deriving a value from a shared, externally-owned
//! state tree. Each selector caches its result per parameter key and records,
//! while it runs, every state path it reads and every other selector it calls.
//! On the next call the recorded dependencies are re-checked instead of
//! re-running the function, so unrelated state changes never cause work.
//!
//! # Key Features
//!
//! - **No dependency declarations**: reads through [`SelectorContext`] and
//!   nested selector calls are tracked automatically
//! - **Fine-grained revalidation**: a cached result stays valid as long as
//!   every recorded path holds an identical value
//! - **Early cutoff**: a re-run producing an equal result keeps the previous
//!   `Arc`, so dependents stay valid (a phantom run)
//! - **Recursion**: selectors can call themselves through
//!   [`Universe::recursive_selector`]
//! - **Read-only probes**: [`Selector::get_cached_result`] validates the cache
//!   without ever executing
//!
//! # Example
//!
//! ```ignore
//! use selector_flow::{Universe, Value};
//! use serde_json::json;
//!
//! let universe = Universe::new();
//! let item = universe.selector(|ctx, params, _extra| {
//!     let id = params.as_i64().unwrap_or(0);
//!     Ok(ctx.get(format!("items.{id}")).as_i64().unwrap_or(0))
//! });
//! let doubled = {
//!     let item = item.clone();
//!     universe.selector(move |_ctx, params, _extra| Ok(*item.call_nested(params)? * 2))
//! };
//!
//! let state = Value::from(json!({"items": [1, 2, 3]}));
//! assert_eq!(*doubled.call(&state, 2)?, 6);
//! ```
//!
//! Everything here is single-threaded: selectors, universes and cached
//! results live on the thread that created them.

mod context;
mod debug_info;
mod dependency;
mod entry;
mod error;
mod options;
pub mod output_eq;
mod params;
mod selector;
mod stack;
mod storage;
pub mod tracer;
mod universe;
mod value;

pub use context::SelectorContext;
pub use debug_info::{DebugCounts, EvaluationKind, RunOutcome};
pub use error::SelectorError;
pub use options::{
    get_at_path, shallow_equal, validate_selector_options, validate_state_options,
    CompareResultFn, CompareStateFn, DebugSetting, DefaultSelectorOptions, ErrorArgs, GetFn,
    KeyFn, OnErrorFn, SelectorOptions, StateOptions, ValidationIssue,
};
pub use params::{json_key_for_params, sorted_key_for_params, ParamValue, Params, Primitive};
pub use selector::{Selector, SelectorFn, WeakSelector};
pub use storage::{
    default_cache_factory, CacheFactory, CachedEntry, HashMapResultCache, ResultCache,
};
pub use tracer::{NoopTracer, SpanId, Tracer, TracerSelectorKey};
pub use universe::{Universe, UniverseBuilder};
pub use value::{StatePath, Value};
