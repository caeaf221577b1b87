#![forbid(unsafe_code)]
//! Core traits and transaction-scoping machinery for the txscope library.
//! This crate is driver-agnostic: concrete backends implement the traits in
//! [`driver`] and everything else is built on top of them.

// Re-export for downstream adapter implementations.
pub use async_trait::async_trait;

pub mod driver;
pub mod hooks;
pub mod scope;
pub mod source;
pub mod unit_of_work;

pub use driver::{Connection, ConnectionPool, Driver};
pub use hooks::{HookArgs, HookError, HookFn, HookRegistry, LifecycleEvent};
pub use scope::{InsertOutcome, Record, Records, TransactionScope};
pub use source::{ConnectionSource, SourceMode, DEFAULT_DRAIN_TIMEOUT, DRAIN_POLL_INTERVAL};
pub use unit_of_work::UnitOfWork;

/// A driver-agnostic representation of a bound statement parameter or a
/// result-set cell. Adapters convert to and from their driver's value type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Null,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I64(i64::from(i))
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::I64(i)
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

/// One result-set row: column names paired positionally with values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    /// Look a cell up by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }
}

/// The raw result of a single statement, as reported by the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub affected_rows: u64,
    /// Rows whose contents actually changed. Drivers that do not expose the
    /// distinction report the affected count here as well.
    pub changed_rows: u64,
    pub last_insert_id: Option<u64>,
}

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Error taxonomy for every operation in this library. There are no internal
/// retries anywhere; each failure surfaces to the immediate caller.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Connect- or acquire-time failure reaching the database.
    #[error("connection failure")]
    Connection {
        #[source]
        source: BoxedError,
    },
    /// The pool could not hand out a connection.
    #[error("pool exhausted")]
    PoolExhausted {
        #[source]
        source: BoxedError,
    },
    /// The driver rejected a statement.
    #[error("query failure")]
    Query {
        #[source]
        source: BoxedError,
    },
    /// The driver rejected a begin/commit/rollback.
    #[error("transaction failure")]
    Transaction {
        #[source]
        source: BoxedError,
    },
    /// A registered lifecycle hook failed; remaining hooks for that emission
    /// were skipped.
    #[error("lifecycle hook failure")]
    Hook {
        #[source]
        source: BoxedError,
    },
    /// Misuse of the configuration surface (duplicate or unknown context
    /// name, empty config list, connect-state violations).
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl DbError {
    pub fn connection<E: Into<BoxedError>>(e: E) -> Self {
        DbError::Connection { source: e.into() }
    }
    pub fn pool_exhausted<E: Into<BoxedError>>(e: E) -> Self {
        DbError::PoolExhausted { source: e.into() }
    }
    pub fn query<E: Into<BoxedError>>(e: E) -> Self {
        DbError::Query { source: e.into() }
    }
    pub fn transaction<E: Into<BoxedError>>(e: E) -> Self {
        DbError::Transaction { source: e.into() }
    }
    pub fn hook<E: Into<BoxedError>>(e: E) -> Self {
        DbError::Hook { source: e.into() }
    }
    pub fn config(message: impl Into<String>) -> Self {
        DbError::Config {
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned across this library.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_error_display_messages() {
        assert_eq!(format!("{}", DbError::connection("down")), "connection failure");
        assert_eq!(format!("{}", DbError::pool_exhausted("full")), "pool exhausted");
        assert_eq!(format!("{}", DbError::query("bad sql")), "query failure");
        assert_eq!(
            format!("{}", DbError::transaction("no tx")),
            "transaction failure"
        );
        assert_eq!(format!("{}", DbError::hook("boom")), "lifecycle hook failure");
        assert_eq!(
            format!("{}", DbError::config("duplicate name")),
            "configuration error: duplicate name"
        );
    }

    #[test]
    fn value_from_impls() {
        assert_eq!(Value::from("s"), Value::String("s".to_string()));
        assert_eq!(Value::from(7i32), Value::I64(7));
        assert_eq!(Value::from(7i64), Value::I64(7));
        assert_eq!(Value::from(1.5f64), Value::F64(1.5));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
    }

    #[test]
    fn row_get_by_column_name() {
        let row = Row {
            columns: vec!["id".into(), "email".into()],
            values: vec![Value::I64(1), Value::String("a@example.com".into())],
        };
        assert_eq!(row.get("id"), Some(&Value::I64(1)));
        assert_eq!(
            row.get("email"),
            Some(&Value::String("a@example.com".into()))
        );
        assert_eq!(row.get("missing"), None);
    }
}
