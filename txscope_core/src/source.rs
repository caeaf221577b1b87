//! The connection source owns the raw handle or pool and its shutdown
//! semantics. The single/pooled split is a tag fixed at construction; callers
//! use one acquire/release interface and never branch on mode.

use crate::driver::{Connection, ConnectionPool, Driver};
use crate::{DbError, DbResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// How often the drain loop re-checks the in-flight count during shutdown.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long a pooled shutdown waits for outstanding checkouts before closing
/// the pool anyway.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// One persistent connection shared by every scope.
    Single,
    /// A managed pool; each scope holds an exclusive checkout.
    Pooled,
}

enum SourceState<D: Driver> {
    Disconnected,
    Single(D::Conn),
    Pooled(D::Pool),
    Closed,
}

/// Owns either one persistent connection or a pool, created on `connect` and
/// destroyed on `shutdown`.
///
/// Invariants: the handle exists only between a successful `connect` and a
/// completed `shutdown`; in pooled mode `in_flight` only decrements on an
/// explicit release.
pub struct ConnectionSource<D: Driver> {
    driver: D,
    options: D::Options,
    mode: SourceMode,
    state: Mutex<SourceState<D>>,
    in_flight: AtomicUsize,
}

impl<D: Driver> ConnectionSource<D> {
    /// A source backed by one persistent connection.
    pub fn single(driver: D, options: D::Options) -> Self {
        Self::new(driver, options, SourceMode::Single)
    }

    /// A source backed by a managed pool.
    pub fn pooled(driver: D, options: D::Options) -> Self {
        Self::new(driver, options, SourceMode::Pooled)
    }

    fn new(driver: D, options: D::Options, mode: SourceMode) -> Self {
        Self {
            driver,
            options,
            mode,
            state: Mutex::new(SourceState::Disconnected),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// Currently checked-out pooled connections. Always zero in single mode.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            *self.state.lock().unwrap(),
            SourceState::Single(_) | SourceState::Pooled(_)
        )
    }

    /// Open the underlying connection (single mode, awaits readiness) or
    /// create the pool object (pooled mode, no handshake). A connect failure
    /// leaves the source unconnected.
    pub async fn connect(&self) -> DbResult<()> {
        {
            let state = self.state.lock().unwrap();
            match *state {
                SourceState::Disconnected => {}
                SourceState::Closed => {
                    return Err(DbError::config("connection source already shut down"))
                }
                _ => return Err(DbError::config("connection source already connected")),
            }
        }

        match self.mode {
            SourceMode::Single => {
                let conn = self.driver.connect(&self.options).await?;
                *self.state.lock().unwrap() = SourceState::Single(conn);
            }
            SourceMode::Pooled => {
                let pool = self.driver.create_pool(&self.options);
                *self.state.lock().unwrap() = SourceState::Pooled(pool);
            }
        }
        debug!(mode = ?self.mode, "connection source connected");
        Ok(())
    }

    /// Hand out a usable connection. Single mode returns the one shared
    /// handle, idempotently and with no checkout accounting. Pooled mode
    /// checks a connection out and increments the in-flight count;
    /// `PoolExhausted`/`Connection` failures propagate unchanged.
    pub async fn acquire_handle(&self) -> DbResult<D::Conn> {
        enum Target<C, P> {
            Shared(C),
            Pool(P),
        }

        let target = {
            let state = self.state.lock().unwrap();
            match &*state {
                SourceState::Single(conn) => Target::Shared(conn.clone()),
                SourceState::Pooled(pool) => Target::Pool(pool.clone()),
                _ => return Err(DbError::connection("connection source is not connected")),
            }
        };

        match target {
            Target::Shared(conn) => Ok(conn),
            Target::Pool(pool) => {
                let conn = pool.acquire().await?;
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                Ok(conn)
            }
        }
    }

    /// Return a handle. A no-op in single mode; pooled mode gives the
    /// connection back to the pool and decrements the in-flight count,
    /// saturating at zero so an over-release cannot wedge the drain wait.
    pub async fn release_handle(&self, conn: D::Conn) {
        let pool = {
            let state = self.state.lock().unwrap();
            match &*state {
                SourceState::Pooled(pool) => Some(pool.clone()),
                _ => None,
            }
        };
        if let Some(pool) = pool {
            pool.release(conn).await;
            let _ = self
                .in_flight
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        }
    }

    /// Tear the source down. Single mode closes the connection, falling back
    /// to a forced destroy; pooled mode first drains, polling the in-flight
    /// count every [`DRAIN_POLL_INTERVAL`] until it reaches zero or
    /// `drain_timeout` elapses, then closes the pool the same way. Close
    /// failures are swallowed after the destroy fallback: shutdown always
    /// completes so the host can terminate. Idempotent.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        if self.mode == SourceMode::Pooled && self.is_connected() {
            let deadline = tokio::time::Instant::now() + drain_timeout;
            while self.in_flight() > 0 {
                if tokio::time::Instant::now() >= deadline {
                    warn!(
                        in_flight = self.in_flight(),
                        "pool drain timed out; closing with checkouts outstanding"
                    );
                    break;
                }
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        }

        let state = std::mem::replace(&mut *self.state.lock().unwrap(), SourceState::Closed);
        match state {
            SourceState::Single(conn) => {
                if let Err(error) = conn.close().await {
                    debug!(%error, "graceful close failed; destroying connection");
                    conn.destroy();
                }
            }
            SourceState::Pooled(pool) => {
                if let Err(error) = pool.close().await {
                    debug!(%error, "graceful pool close failed; destroying pool");
                    pool.destroy();
                }
            }
            SourceState::Disconnected | SourceState::Closed => {}
        }
        debug!(mode = ?self.mode, "connection source shut down");
    }
}

impl<D: Driver> std::fmt::Debug for ConnectionSource<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSource")
            .field("mode", &self.mode)
            .field("connected", &self.is_connected())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
