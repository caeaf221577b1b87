//! Composes a set of transaction scopes into one all-or-nothing outcome for a
//! single inbound request: commit every scope in configured order when the
//! downstream work succeeds, roll every bound scope back when it fails.

use crate::driver::Driver;
use crate::scope::TransactionScope;
use crate::{DbError, DbResult};
use futures::future::BoxFuture;
use tracing::{debug, warn};

/// An ordered, named collection of scopes covering one unit of work.
///
/// The rollback path is catch-triggered: a downstream failure rolls back
/// every scope that bound a handle, whether or not it ever called `begin`.
pub struct UnitOfWork<D: Driver> {
    scopes: Vec<(String, TransactionScope<D>)>,
}

impl<D: Driver> UnitOfWork<D> {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Append a scope; order of insertion is commit order.
    pub fn push(&mut self, name: impl Into<String>, scope: TransactionScope<D>) {
        self.scopes.push((name.into(), scope));
    }

    /// The scope registered under `name`.
    pub fn scope(&self, name: &str) -> Option<&TransactionScope<D>> {
        self.scopes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, scope)| scope)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransactionScope<D>)> {
        self.scopes
            .iter()
            .map(|(name, scope)| (name.as_str(), scope))
    }

    /// Commit every scope sequentially in configured order. The first commit
    /// failure propagates; later scopes are left untouched with their handles
    /// still bound, matching the contract that only the success path
    /// releases.
    pub async fn commit_all(&self) -> DbResult<()> {
        for (name, scope) in &self.scopes {
            debug!(scope = %name, "committing unit-of-work scope");
            scope.commit().await?;
        }
        Ok(())
    }

    /// Roll back every scope that currently binds a handle; unbound scopes
    /// are skipped. Rollback failures are logged and swallowed, and the
    /// handle a failed rollback left bound is force-released so a pooled
    /// source can still drain.
    pub async fn rollback_all(&self) {
        for (name, scope) in &self.scopes {
            if !scope.is_bound() {
                continue;
            }
            debug!(scope = %name, "rolling back unit-of-work scope");
            if let Err(error) = scope.rollback().await {
                warn!(scope = %name, %error, "rollback failed during unit-of-work failure handling");
                scope.release().await;
            }
        }
    }

    /// Run `f` as the downstream work of this unit: on success commit every
    /// scope in order (a commit failure becomes the overall error); on
    /// failure roll every bound scope back and propagate the downstream
    /// error unchanged.
    pub async fn run<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<DbError>,
        F: for<'a> FnOnce(&'a UnitOfWork<D>) -> BoxFuture<'a, Result<R, E>>,
    {
        match f(self).await {
            Ok(value) => {
                self.commit_all().await?;
                Ok(value)
            }
            Err(error) => {
                self.rollback_all().await;
                Err(error)
            }
        }
    }
}

impl<D: Driver> Default for UnitOfWork<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Driver> std::fmt::Debug for UnitOfWork<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.scopes.iter().map(|(name, _)| name))
            .finish()
    }
}
