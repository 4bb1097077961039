use super::directory::AccountDirectory;
use super::engine::TransactionEngine;
use super::history::HistoryCache;
use super::locks::AccountLocks;
use super::reporting::ReportingEngine;
use crate::config::LedgerConfig;
use crate::domain::ports::{CacheRef, ClockRef, LedgerStoreRef};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::in_memory::{InMemoryCache, InMemoryLedgerStore};
use std::sync::Arc;

/// The ledger services wired over one store, cache and clock.
///
/// All three share the same lock manager, so directory soft deletes and
/// engine postings serialize on the same accounts.
#[derive(Clone)]
pub struct Bank {
    pub directory: AccountDirectory,
    pub engine: TransactionEngine,
    pub reporting: ReportingEngine,
}

impl Bank {
    pub fn new(
        store: LedgerStoreRef,
        cache: CacheRef,
        clock: ClockRef,
        config: LedgerConfig,
    ) -> Self {
        let config = Arc::new(config);
        let locks = AccountLocks::new();
        let directory = AccountDirectory::new(store.clone(), clock.clone(), locks.clone());
        let history = HistoryCache::new(
            cache,
            config.history_cache_ttl(),
            config.history_version_ttl(),
        );
        let engine = TransactionEngine::new(
            store.clone(),
            directory.clone(),
            history.clone(),
            clock.clone(),
            locks,
            config.clone(),
        );
        let reporting = ReportingEngine::new(store, directory.clone(), history, clock, config);

        Self {
            directory,
            engine,
            reporting,
        }
    }

    /// Volatile bank on the system clock, for tests and one-shot batches.
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(InMemoryCache::new()),
            Arc::new(SystemClock),
            config,
        )
    }
}
