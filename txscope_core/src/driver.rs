//! The uniform async contract over a raw database driver. Adapter crates
//! implement these traits; everything else in the library is written against
//! them and never sees driver types.

use crate::{DbResult, QueryOutcome, Value};
use async_trait::async_trait;

/// A live, checked-out connection able to run statements and transaction
/// control commands.
///
/// Implementations are cheap, cloneable handles (internally `Arc`) so that a
/// single-mode source can hand the same physical connection to several users.
/// No method retries internally; failures surface to the caller unchanged.
#[async_trait]
pub trait Connection: Clone + Send + Sync + 'static {
    /// Run one parameterized statement and return the raw outcome.
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<QueryOutcome>;

    /// Start a transaction on this connection.
    async fn begin(&self) -> DbResult<()>;

    /// Commit the current transaction.
    async fn commit(&self) -> DbResult<()>;

    /// Roll the current transaction back.
    async fn rollback(&self) -> DbResult<()>;

    /// Close the connection gracefully, flushing any pending protocol state.
    async fn close(&self) -> DbResult<()>;

    /// Tear the connection down immediately. Used as the fallback when a
    /// graceful close fails; must not block or fail.
    fn destroy(&self);
}

/// A managed set of reusable connections with check-out/return semantics.
#[async_trait]
pub trait ConnectionPool: Clone + Send + Sync + 'static {
    type Conn: Connection;

    /// Check a connection out. The caller owns it exclusively until it is
    /// passed back through [`release`](ConnectionPool::release).
    async fn acquire(&self) -> DbResult<Self::Conn>;

    /// Return a checked-out connection.
    async fn release(&self, conn: Self::Conn);

    /// Close the pool gracefully.
    async fn close(&self) -> DbResult<()>;

    /// Tear the pool down immediately; the fallback when `close` fails.
    fn destroy(&self);
}

/// Factory for connections and pools. `Options` is opaque to this layer and
/// carries whatever the underlying driver needs to reach the database.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Options: Clone + Send + Sync + 'static;
    type Conn: Connection;
    type Pool: ConnectionPool<Conn = Self::Conn>;

    /// Open one connection and await its readiness.
    async fn connect(&self, options: &Self::Options) -> DbResult<Self::Conn>;

    /// Create a pool object. Pool creation is synchronous and performs no
    /// handshake; the first acquire pays for it.
    fn create_pool(&self, options: &Self::Options) -> Self::Pool;
}
