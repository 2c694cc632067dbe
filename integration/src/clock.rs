//! Execution Clock (§4.1).
//!
//! Exposes a scoped `{symbol, when, backtest}` value to every call
//! underneath a `run_in_context` invocation. Implemented with a thread-local
//! stack rather than async-task-local storage: the concurrency model (§5)
//! serializes all work for a given instance onto a single logical task that
//! never yields mid-tick while holding the context, so a thread-local is
//! sufficient and keeps the dependency footprint small.

use chrono::{DateTime, Utc};
use keel_markets::Symbol;
use std::cell::RefCell;

/// The value the [`ExecutionClock`] exposes for the duration of a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockContext {
    pub symbol: Symbol,
    pub when: DateTime<Utc>,
    pub backtest: bool,
}

impl ClockContext {
    pub fn new(symbol: Symbol, when: DateTime<Utc>, backtest: bool) -> Self {
        Self {
            symbol,
            when,
            backtest,
        }
    }
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ClockContext>> = const { RefCell::new(Vec::new()) };
}

/// Scoped execution-time context. See module docs.
#[derive(Debug, Default, Copy, Clone)]
pub struct ExecutionClock;

impl ExecutionClock {
    /// Install `ctx` as the current context for the duration of `f`,
    /// restoring whatever was previously installed (if anything) once `f`
    /// returns or unwinds.
    pub fn run_in_context<R>(ctx: ClockContext, f: impl FnOnce() -> R) -> R {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(ctx));
        let _guard = PopOnDrop;
        f()
    }

    /// The innermost currently-installed context, if any.
    pub fn current() -> Option<ClockContext> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }
}

struct PopOnDrop;

impl Drop for PopOnDrop {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
