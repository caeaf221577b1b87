//! The transaction scope: one unit of work bound to at most one connection
//! handle, with lifecycle hooks awaited around every transition.

use crate::driver::{Connection, Driver};
use crate::hooks::{HookArgs, HookError, HookRegistry, LifecycleEvent};
use crate::source::ConnectionSource;
use crate::{DbError, DbResult, QueryOutcome, Value};
use futures::future::{try_join_all, BoxFuture};
use std::sync::{Arc, Mutex};

/// An ordered field-name/value mapping for the insert and update helpers.
/// Iteration order is insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; chainable.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.fields.iter().map(|(_, value)| value.clone()).collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Input to [`TransactionScope::insert`]: one record or an ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Records {
    One(Record),
    Many(Vec<Record>),
}

impl From<Record> for Records {
    fn from(record: Record) -> Self {
        Records::One(record)
    }
}

impl From<Vec<Record>> for Records {
    fn from(records: Vec<Record>) -> Self {
        Records::Many(records)
    }
}

/// Result of [`TransactionScope::insert`], preserving the input shape: a
/// single record yields the bare outcome, a sequence yields the outcomes in
/// input order.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    One(QueryOutcome),
    Many(Vec<QueryOutcome>),
}

impl InsertOutcome {
    pub fn as_one(&self) -> Option<&QueryOutcome> {
        match self {
            InsertOutcome::One(outcome) => Some(outcome),
            InsertOutcome::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[QueryOutcome]> {
        match self {
            InsertOutcome::One(_) => None,
            InsertOutcome::Many(outcomes) => Some(outcomes),
        }
    }
}

/// One unit of work bound to at most one connection handle, acquired lazily
/// from its [`ConnectionSource`] on first use and held until `commit`,
/// `rollback`, or `release`.
///
/// A scope is not reentrant across concurrent transactions: at most one
/// handle is bound at any time. Methods take `&self`; the binding slot sits
/// behind a mutex held only across non-await sections so `insert` can fan
/// its statements out concurrently.
pub struct TransactionScope<D: Driver> {
    source: Arc<ConnectionSource<D>>,
    conn: Mutex<Option<D::Conn>>,
    hooks: Mutex<HookRegistry>,
}

impl<D: Driver> TransactionScope<D> {
    pub fn new(source: Arc<ConnectionSource<D>>) -> Self {
        Self {
            source,
            conn: Mutex::new(None),
            hooks: Mutex::new(HookRegistry::new()),
        }
    }

    /// Register a lifecycle hook at the end of `event`'s sequence; chainable.
    pub fn on<F>(&self, event: LifecycleEvent, hook: F) -> &Self
    where
        F: Fn(HookArgs) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.hooks.lock().unwrap().on(event, hook);
        self
    }

    /// Whether a handle is currently bound.
    pub fn is_bound(&self) -> bool {
        self.conn.lock().unwrap().is_some()
    }

    pub fn source(&self) -> &Arc<ConnectionSource<D>> {
        &self.source
    }

    /// Await `event`'s hooks in registration order, on a snapshot so the
    /// registry lock is never held across a hook.
    async fn emit(&self, event: LifecycleEvent, args: &HookArgs) -> DbResult<()> {
        let hooks = self.hooks.lock().unwrap().snapshot(event);
        for hook in hooks {
            hook(args.clone()).await.map_err(DbError::hook)?;
        }
        Ok(())
    }

    /// The bound handle, acquiring and caching one on first use. Idempotent
    /// per scope until released. When two lazy acquisitions race, the first
    /// bound handle wins and the loser goes straight back to the source.
    async fn handle(&self) -> DbResult<D::Conn> {
        if let Some(conn) = self.conn.lock().unwrap().clone() {
            return Ok(conn);
        }
        let acquired = self.source.acquire_handle().await?;
        let existing = {
            let mut slot = self.conn.lock().unwrap();
            match slot.as_ref() {
                Some(bound) => Some(bound.clone()),
                None => {
                    *slot = Some(acquired.clone());
                    None
                }
            }
        };
        if let Some(bound) = existing {
            self.source.release_handle(acquired).await;
            return Ok(bound);
        }
        Ok(acquired)
    }

    /// Acquire a handle, emit `beforeBegin`, start a transaction, emit
    /// `begin`. On a driver failure the handle stays bound; only commit,
    /// rollback, or an explicit release unbind it.
    pub async fn begin(&self) -> DbResult<()> {
        let conn = self.handle().await?;
        self.emit(LifecycleEvent::BeforeBegin, &HookArgs::empty())
            .await?;
        conn.begin().await?;
        self.emit(LifecycleEvent::Begin, &HookArgs::empty()).await?;
        Ok(())
    }

    /// Run one statement through the scope's single choke point: acquire if
    /// unbound, emit `beforeExec` with the statement and parameters, run the
    /// query, emit `exec` with the same arguments, return the raw outcome.
    pub async fn exec(&self, sql: &str, params: &[Value]) -> DbResult<QueryOutcome> {
        let conn = self.handle().await?;
        let args = HookArgs::statement(sql, params);
        self.emit(LifecycleEvent::BeforeExec, &args).await?;
        let outcome = conn.query(sql, params).await?;
        self.emit(LifecycleEvent::Exec, &args).await?;
        Ok(outcome)
    }

    /// Insert one record or a sequence of records into `table`, issuing one
    /// statement per record and awaiting them together. The outcome shape
    /// mirrors the input shape.
    pub async fn insert(
        &self,
        table: &str,
        records: impl Into<Records>,
    ) -> DbResult<InsertOutcome> {
        match records.into() {
            Records::One(record) => {
                Ok(InsertOutcome::One(self.insert_one(table, &record).await?))
            }
            Records::Many(records) => {
                let pending = records.iter().map(|record| self.insert_one(table, record));
                Ok(InsertOutcome::Many(try_join_all(pending).await?))
            }
        }
    }

    async fn insert_one(&self, table: &str, record: &Record) -> DbResult<QueryOutcome> {
        let sql = txscope_sql_builder::insert(table, &record.columns());
        self.exec(&sql, &record.values()).await
    }

    /// Update `table`, building the SET clause from `fields` in insertion
    /// order; `where_params` trail the SET parameters when a WHERE clause is
    /// given. Returns the changed-row count.
    pub async fn update(
        &self,
        table: &str,
        fields: &Record,
        where_clause: Option<&str>,
        where_params: &[Value],
    ) -> DbResult<u64> {
        let sql = txscope_sql_builder::update(table, &fields.columns(), where_clause);
        let mut params = fields.values();
        if where_clause.is_some() {
            params.extend_from_slice(where_params);
        }
        Ok(self.exec(&sql, &params).await?.changed_rows)
    }

    /// Delete from `table` with an optional WHERE clause. Returns the
    /// affected-row count.
    pub async fn delete(
        &self,
        table: &str,
        where_clause: Option<&str>,
        where_params: &[Value],
    ) -> DbResult<u64> {
        let sql = txscope_sql_builder::delete(table, where_clause);
        let params = if where_clause.is_some() {
            where_params
        } else {
            &[]
        };
        Ok(self.exec(&sql, params).await?.affected_rows)
    }

    /// Emit `beforeCommit`, commit on the bound handle, release it back to
    /// the source, emit `commit`. The release happens before the `commit`
    /// event fires, so hooks on `commit` must not assume a bound handle. A
    /// failed driver commit leaves the handle bound for the caller to
    /// inspect; only the success path releases. A no-op when unbound.
    pub async fn commit(&self) -> DbResult<()> {
        let conn = match self.bound() {
            Some(conn) => conn,
            None => return Ok(()),
        };
        self.emit(LifecycleEvent::BeforeCommit, &HookArgs::empty())
            .await?;
        conn.commit().await?;
        self.release().await;
        self.emit(LifecycleEvent::Commit, &HookArgs::empty())
            .await?;
        Ok(())
    }

    /// Symmetric to [`commit`](TransactionScope::commit) with rollback
    /// semantics.
    pub async fn rollback(&self) -> DbResult<()> {
        let conn = match self.bound() {
            Some(conn) => conn,
            None => return Ok(()),
        };
        self.emit(LifecycleEvent::BeforeRollback, &HookArgs::empty())
            .await?;
        conn.rollback().await?;
        self.release().await;
        self.emit(LifecycleEvent::Rollback, &HookArgs::empty())
            .await?;
        Ok(())
    }

    /// Return the bound handle to the source (decrementing in-flight
    /// accounting when pooled) and clear the slot. Idempotent when already
    /// unbound.
    pub async fn release(&self) {
        let conn = self.conn.lock().unwrap().take();
        if let Some(conn) = conn {
            self.source.release_handle(conn).await;
        }
    }

    fn bound(&self) -> Option<D::Conn> {
        self.conn.lock().unwrap().clone()
    }
}

impl<D: Driver> std::fmt::Debug for TransactionScope<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("bound", &self.is_bound())
            .field("source", &self.source)
            .finish()
    }
}
