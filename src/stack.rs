//! The call stack of in-flight evaluations.
//!
//! One stack per thread, shared by every universe on that thread. The frame on
//! top tells a starting evaluation which state to use when none was passed,
//! whether it may execute its selector function, and where to register itself
//! as a dependency.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dependency::CallDependency;
use crate::value::Value;

thread_local! {
    static CALL_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Identifies the universe a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct UniverseId(u64);

static NEXT_UNIVERSE_ID: AtomicU64 = AtomicU64::new(1);

impl UniverseId {
    pub(crate) fn next() -> Self {
        UniverseId(NEXT_UNIVERSE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Permissions of the frame on top of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameFlags {
    pub allow_execution: bool,
    pub record_dependencies: bool,
}

/// One entry of the call stack.
pub(crate) struct Frame {
    universe: UniverseId,
    state: Value,
    flags: FrameFlags,
    // Outermost frames count as recording but have no selector to record into.
    discards_calls: bool,
    calls: Vec<CallDependency>,
}

impl Frame {
    /// Outermost call: may execute. Calls recorded into it are dropped.
    pub(crate) fn root(universe: UniverseId, state: Value) -> Self {
        Self {
            discards_calls: true,
            ..Self::with_flags(universe, state, true, true)
        }
    }

    /// A selector function is running: nested calls become its dependencies.
    pub(crate) fn executing(universe: UniverseId, state: Value) -> Self {
        Self::with_flags(universe, state, true, true)
    }

    /// Re-validating recorded dependencies; never records.
    pub(crate) fn dependency_check(
        universe: UniverseId,
        state: Value,
        allow_execution: bool,
    ) -> Self {
        Self::with_flags(universe, state, allow_execution, false)
    }

    /// Read-only probe: may neither execute nor record.
    pub(crate) fn probe(universe: UniverseId, state: Value) -> Self {
        Self::with_flags(universe, state, false, false)
    }

    fn with_flags(
        universe: UniverseId,
        state: Value,
        allow_execution: bool,
        record_dependencies: bool,
    ) -> Self {
        Self {
            universe,
            state,
            flags: FrameFlags {
                allow_execution,
                record_dependencies,
            },
            discards_calls: false,
            calls: Vec::new(),
        }
    }
}

/// Accessors for the thread's call stack.
pub(crate) struct CallStack;

impl CallStack {
    /// Push a frame. It is popped when the returned guard is finished or dropped.
    pub(crate) fn push(frame: Frame) -> FrameGuard {
        let depth = CALL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(frame);
            stack.len()
        });
        FrameGuard {
            depth,
            finished: false,
        }
    }

    /// Number of frames currently on the stack.
    pub(crate) fn depth() -> usize {
        CALL_STACK.with(|stack| stack.borrow().len())
    }

    pub(crate) fn top_flags() -> Option<FrameFlags> {
        CALL_STACK.with(|stack| stack.borrow().last().map(|frame| frame.flags))
    }

    /// Universe and state of the frame on top.
    pub(crate) fn top_context() -> Option<(UniverseId, Value)> {
        CALL_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| (frame.universe, frame.state.clone()))
        })
    }

    /// Append a call dependency to the top frame if it records.
    ///
    /// Returns false if the dependency was dropped, including when the top
    /// frame is an outermost call.
    pub(crate) fn record_call(dependency: CallDependency) -> bool {
        let rejected = CALL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last_mut() {
                Some(top) if top.flags.record_dependencies && !top.discards_calls => {
                    top.calls.push(dependency);
                    None
                }
                _ => Some(dependency),
            }
        });
        // Dropped outside the borrow: releasing a recorded value may run user code.
        rejected.is_none()
    }
}

/// Scope of one pushed frame.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub(crate) struct FrameGuard {
    depth: usize,
    finished: bool,
}

impl FrameGuard {
    /// Change whether evaluations started under this frame may execute.
    pub(crate) fn set_allow_execution(&self, allow_execution: bool) {
        CALL_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().get_mut(self.depth - 1) {
                frame.flags.allow_execution = allow_execution;
            }
        });
    }

    /// Pop the frame and hand back the call dependencies recorded into it.
    pub(crate) fn finish(mut self) -> Vec<CallDependency> {
        self.finished = true;
        self.pop().map(|frame| frame.calls).unwrap_or_default()
    }

    fn pop(&self) -> Option<Frame> {
        let (frame, leaked, len) = CALL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let len = stack.len();
            if len < self.depth {
                return (None, Vec::new(), len);
            }
            // Frames above ours were leaked by an unbalanced scope: discard them too.
            let mut leaked = stack.split_off(self.depth - 1);
            let frame = (!leaked.is_empty()).then(|| leaked.remove(0));
            (frame, leaked, len)
        });
        // Dropped outside the borrow: releasing a recorded value may run user code.
        drop(leaked);
        if len != self.depth {
            tracing::error!(
                target: "selector_flow",
                expected = self.depth,
                actual = len,
                "internal consistency error: call stack is unbalanced"
            );
        }
        frame
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.pop();
        }
    }
}
