#![forbid(unsafe_code)]
//! Facade crate for the txscope library.
//!
//! Re-exports the driver-agnostic core (connection sources, transaction
//! scopes, lifecycle hooks, the unit-of-work runner) and owns the
//! configuration surface a host uses to stand the library up: an ordered list
//! of [`SourceConfig`]s becomes a [`Databases`] registry of named connection
//! sources, torn down again through the host's stop signal.
//!
//! ```ignore
//! let dbs = Databases::connect(
//!     MysqlDriver,
//!     vec![SourceConfig::pooled("main", opts)],
//! )
//! .await?;
//!
//! // Per request:
//! let uow = dbs.unit_of_work();
//! let out = uow
//!     .run(|uow| {
//!         Box::pin(async move {
//!             let db = uow.scope("main").expect("configured");
//!             db.exec("SELECT 1", &[]).await
//!         })
//!     })
//!     .await?;
//!
//! // On the host's stop signal:
//! dbs.shutdown(DEFAULT_DRAIN_TIMEOUT).await;
//! ```

mod config;
mod registry;

pub use config::SourceConfig;
pub use registry::Databases;

// Re-export the whole core API.
pub use txscope_core::{
    Connection, ConnectionPool, ConnectionSource, DbError, DbResult, Driver, HookArgs, HookError,
    HookFn, HookRegistry, InsertOutcome, LifecycleEvent, QueryOutcome, Record, Records, Row,
    SourceMode, TransactionScope, UnitOfWork, Value, DEFAULT_DRAIN_TIMEOUT, DRAIN_POLL_INTERVAL,
};

// SQL builder helpers under a stable path.
pub use txscope_sql_builder as sql_builder;

// Backend drivers re-exported under a neutral namespace, so end-users don't
// have to depend on backend crates directly. Feature-gated.
pub mod backends {
    #[cfg(feature = "mysql-async")]
    pub use txscope_mysql_async::{MysqlConnection, MysqlDriver, MysqlPool};
}
