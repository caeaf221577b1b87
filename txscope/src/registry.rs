//! The named-source registry a host constructs once at startup and passes by
//! reference into request-handling code. An explicit registry replaces the
//! ambient per-application globals some frameworks use for context binding.

use crate::config::SourceConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use txscope_core::{ConnectionSource, DbError, DbResult, Driver, TransactionScope, UnitOfWork};

/// An ordered collection of named, connected [`ConnectionSource`]s.
///
/// Order follows the configuration list and determines unit-of-work commit
/// order. Sources are shared (`Arc`); scopes are cheap per-request objects
/// over them.
pub struct Databases<D: Driver> {
    sources: Vec<(String, Arc<ConnectionSource<D>>)>,
}

impl<D: Driver + Clone> Databases<D> {
    /// Build and connect every configured source, in order. Fails on an
    /// empty config list, on a duplicate `context_name`, and on the first
    /// source whose connect fails (sources already connected are left for
    /// the caller to shut down via [`shutdown`](Databases::shutdown)).
    pub async fn connect(driver: D, configs: Vec<SourceConfig<D::Options>>) -> DbResult<Self> {
        if configs.is_empty() {
            return Err(DbError::config("at least one database config is required"));
        }

        let mut sources: Vec<(String, Arc<ConnectionSource<D>>)> =
            Vec::with_capacity(configs.len());
        for config in configs {
            if sources.iter().any(|(name, _)| *name == config.context_name) {
                return Err(DbError::config(format!(
                    "duplicate context name `{}`",
                    config.context_name
                )));
            }
            let source = if config.pooled {
                ConnectionSource::pooled(driver.clone(), config.options)
            } else {
                ConnectionSource::single(driver.clone(), config.options)
            };
            source.connect().await?;
            debug!(context = %config.context_name, pooled = config.pooled, "database source ready");
            sources.push((config.context_name, Arc::new(source)));
        }
        Ok(Self { sources })
    }
}

impl<D: Driver> Databases<D> {
    /// The source registered under `name`.
    pub fn source(&self, name: &str) -> Option<&Arc<ConnectionSource<D>>> {
        self.sources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, source)| source)
    }

    /// A fresh scope over the source registered under `name`.
    pub fn scope(&self, name: &str) -> Option<TransactionScope<D>> {
        self.source(name)
            .map(|source| TransactionScope::new(source.clone()))
    }

    /// Configured context names, in order.
    pub fn context_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// A unit of work with one fresh scope per configured source, in
    /// configured order.
    pub fn unit_of_work(&self) -> UnitOfWork<D> {
        let mut uow = UnitOfWork::new();
        for (name, source) in &self.sources {
            uow.push(name.clone(), TransactionScope::new(source.clone()));
        }
        uow
    }

    /// Shut every source down sequentially, each draining up to
    /// `drain_timeout`. Always completes; the host registers this with its
    /// stop signal.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        for (name, source) in &self.sources {
            debug!(context = %name, "shutting database source down");
            source.shutdown(drain_timeout).await;
        }
    }
}

impl<D: Driver> std::fmt::Debug for Databases<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|(name, _)| name))
            .finish()
    }
}
