#![forbid(unsafe_code)]
//! Shared test support: an in-memory, scriptable driver implementing the full
//! txscope driver contract. Tests read back an ordered event log, the exact
//! statements with their bound parameters, and acquire/release counts.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use txscope_core::{Connection, ConnectionPool, DbError, DbResult, Driver, QueryOutcome, Value};

/// Operations whose next invocation can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Connect,
    Acquire,
    Query,
    Begin,
    Commit,
    Rollback,
    Close,
}

#[derive(Debug, Default)]
struct Shared {
    log: Mutex<Vec<String>>,
    statements: Mutex<Vec<(String, Vec<Value>)>>,
    outcomes: Mutex<VecDeque<QueryOutcome>>,
    fail_once: Mutex<HashSet<MockOp>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    next_conn_id: AtomicUsize,
}

impl Shared {
    fn push_log(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn take_failure(&self, op: MockOp) -> bool {
        self.fail_once.lock().unwrap().remove(&op)
    }

    fn next_outcome(&self) -> QueryOutcome {
        self.outcomes.lock().unwrap().pop_front().unwrap_or_default()
    }
}

/// Scriptable in-memory driver. Clones share the script and the log.
#[derive(Clone, Default)]
pub struct MockDriver {
    shared: Arc<Shared>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next invocation of `op` fail with the matching taxonomy
    /// error.
    pub fn fail_once(&self, op: MockOp) {
        self.shared.fail_once.lock().unwrap().insert(op);
    }

    /// Queue an outcome for the next query; queries beyond the queue return
    /// an empty default outcome.
    pub fn push_outcome(&self, outcome: QueryOutcome) {
        self.shared.outcomes.lock().unwrap().push_back(outcome);
    }

    /// The ordered event log across all connections and pools.
    pub fn log(&self) -> Vec<String> {
        self.shared.log.lock().unwrap().clone()
    }

    /// Every executed statement with its bound parameters, in order.
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.shared.statements.lock().unwrap().clone()
    }

    pub fn acquired(&self) -> usize {
        self.shared.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.shared.released.load(Ordering::SeqCst)
    }

    fn next_conn(&self) -> MockConnection {
        let id = self.shared.next_conn_id.fetch_add(1, Ordering::SeqCst) + 1;
        MockConnection {
            id,
            shared: self.shared.clone(),
        }
    }
}

/// A connection handle vended by [`MockDriver`]. Distinct acquisitions carry
/// distinct ids so tests can assert handle identity.
#[derive(Debug, Clone)]
pub struct MockConnection {
    id: usize,
    shared: Arc<Shared>,
}

impl MockConnection {
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<QueryOutcome> {
        if self.shared.take_failure(MockOp::Query) {
            self.shared.push_log(format!("query_failed[{}]", self.id));
            return Err(DbError::query("scripted query failure"));
        }
        self.shared.push_log(format!("query[{}]:{sql}", self.id));
        self.shared
            .statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.shared.next_outcome())
    }

    async fn begin(&self) -> DbResult<()> {
        if self.shared.take_failure(MockOp::Begin) {
            return Err(DbError::transaction("scripted begin failure"));
        }
        self.shared.push_log(format!("begin[{}]", self.id));
        Ok(())
    }

    async fn commit(&self) -> DbResult<()> {
        if self.shared.take_failure(MockOp::Commit) {
            return Err(DbError::transaction("scripted commit failure"));
        }
        self.shared.push_log(format!("commit[{}]", self.id));
        Ok(())
    }

    async fn rollback(&self) -> DbResult<()> {
        if self.shared.take_failure(MockOp::Rollback) {
            return Err(DbError::transaction("scripted rollback failure"));
        }
        self.shared.push_log(format!("rollback[{}]", self.id));
        Ok(())
    }

    async fn close(&self) -> DbResult<()> {
        if self.shared.take_failure(MockOp::Close) {
            return Err(DbError::connection("scripted close failure"));
        }
        self.shared.push_log(format!("close[{}]", self.id));
        Ok(())
    }

    fn destroy(&self) {
        self.shared.push_log(format!("destroy[{}]", self.id));
    }
}

/// A pool handle vended by [`MockDriver`]; every acquire hands out a fresh
/// connection id.
#[derive(Clone)]
pub struct MockPool {
    driver: MockDriver,
}

#[async_trait]
impl ConnectionPool for MockPool {
    type Conn = MockConnection;

    async fn acquire(&self) -> DbResult<MockConnection> {
        let shared = &self.driver.shared;
        if shared.take_failure(MockOp::Acquire) {
            return Err(DbError::pool_exhausted("scripted pool exhaustion"));
        }
        let conn = self.driver.next_conn();
        shared.acquired.fetch_add(1, Ordering::SeqCst);
        shared.push_log(format!("acquire[{}]", conn.id));
        Ok(conn)
    }

    async fn release(&self, conn: MockConnection) {
        let shared = &self.driver.shared;
        shared.released.fetch_add(1, Ordering::SeqCst);
        shared.push_log(format!("release[{}]", conn.id));
    }

    async fn close(&self) -> DbResult<()> {
        let shared = &self.driver.shared;
        if shared.take_failure(MockOp::Close) {
            return Err(DbError::connection("scripted pool close failure"));
        }
        shared.push_log("pool_close".to_string());
        Ok(())
    }

    fn destroy(&self) {
        self.driver.shared.push_log("pool_destroy".to_string());
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Options = String;
    type Conn = MockConnection;
    type Pool = MockPool;

    async fn connect(&self, options: &String) -> DbResult<MockConnection> {
        if self.shared.take_failure(MockOp::Connect) {
            return Err(DbError::connection("scripted connect failure"));
        }
        let conn = self.next_conn();
        self.shared
            .push_log(format!("connect[{}]:{options}", conn.id));
        Ok(conn)
    }

    fn create_pool(&self, options: &String) -> MockPool {
        self.shared.push_log(format!("create_pool:{options}"));
        MockPool {
            driver: self.clone(),
        }
    }
}
