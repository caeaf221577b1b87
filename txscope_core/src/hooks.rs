//! Typed lifecycle hook registry. A closed enumeration of events replaces the
//! original string-keyed emitter; ordering semantics are unchanged: hooks for
//! one event run strictly in registration order, fully sequentially, and a
//! failing hook aborts the rest of that emission.

use crate::{DbError, DbResult, Value};
use futures::future::BoxFuture;
use std::sync::Arc;

/// The named points in a scope's operation sequence at which registered
/// callbacks are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeBegin,
    Begin,
    BeforeCommit,
    Commit,
    BeforeRollback,
    Rollback,
    BeforeExec,
    Exec,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 8] = [
        LifecycleEvent::BeforeBegin,
        LifecycleEvent::Begin,
        LifecycleEvent::BeforeCommit,
        LifecycleEvent::Commit,
        LifecycleEvent::BeforeRollback,
        LifecycleEvent::Rollback,
        LifecycleEvent::BeforeExec,
        LifecycleEvent::Exec,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::BeforeBegin => "beforeBegin",
            LifecycleEvent::Begin => "begin",
            LifecycleEvent::BeforeCommit => "beforeCommit",
            LifecycleEvent::Commit => "commit",
            LifecycleEvent::BeforeRollback => "beforeRollback",
            LifecycleEvent::Rollback => "rollback",
            LifecycleEvent::BeforeExec => "beforeExec",
            LifecycleEvent::Exec => "exec",
        }
    }

    fn index(self) -> usize {
        match self {
            LifecycleEvent::BeforeBegin => 0,
            LifecycleEvent::Begin => 1,
            LifecycleEvent::BeforeCommit => 2,
            LifecycleEvent::Commit => 3,
            LifecycleEvent::BeforeRollback => 4,
            LifecycleEvent::Rollback => 5,
            LifecycleEvent::BeforeExec => 6,
            LifecycleEvent::Exec => 7,
        }
    }
}

/// Arguments handed to each hook. Exec events carry the statement and its
/// parameters; transaction-control events carry nothing.
#[derive(Debug, Clone, Default)]
pub struct HookArgs {
    pub sql: Option<String>,
    pub params: Vec<Value>,
}

impl HookArgs {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn statement(sql: &str, params: &[Value]) -> Self {
        Self {
            sql: Some(sql.to_string()),
            params: params.to_vec(),
        }
    }
}

/// Errors raised by hook callbacks; wrapped into [`DbError::Hook`] on emit.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A registered hook callback. Shared so emission can run on a snapshot
/// without holding any registry lock.
pub type HookFn = Arc<dyn Fn(HookArgs) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

/// An ordered sequence of callbacks per lifecycle event. Never pruned
/// automatically; callers register at most the hooks that matter per unit of
/// work.
#[derive(Clone, Default)]
pub struct HookRegistry {
    slots: [Vec<HookFn>; 8],
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `hook` to the end of `event`'s sequence.
    pub fn on<F>(&mut self, event: LifecycleEvent, hook: F)
    where
        F: Fn(HookArgs) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.slots[event.index()].push(Arc::new(hook));
    }

    pub fn is_empty(&self, event: LifecycleEvent) -> bool {
        self.slots[event.index()].is_empty()
    }

    /// A clone of the ordered callbacks for `event`, for emission outside any
    /// lock guarding the registry itself.
    pub fn snapshot(&self, event: LifecycleEvent) -> Vec<HookFn> {
        self.slots[event.index()].clone()
    }

    /// Await every callback for `event` strictly in registration order. A
    /// no-op when none are registered; the first failure aborts the remaining
    /// callbacks and surfaces as [`DbError::Hook`].
    pub async fn emit(&self, event: LifecycleEvent, args: &HookArgs) -> DbResult<()> {
        for hook in &self.slots[event.index()] {
            hook(args.clone()).await.map_err(DbError::hook)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("HookRegistry");
        for event in LifecycleEvent::ALL {
            s.field(event.as_str(), &self.slots[event.index()].len());
        }
        s.finish()
    }
}
