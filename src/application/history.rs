use crate::domain::account::AccountId;
use crate::domain::ports::CacheRef;
use crate::domain::report::Page;
use crate::domain::transaction::Transaction;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Cached transaction-history pages, keyed per account generation.
///
/// Every account has a generation marker in the cache; page keys embed it.
/// Invalidation drops the marker, which orphans every page of that account
/// at once. Cache failures are logged and treated as misses.
#[derive(Clone)]
pub struct HistoryCache {
    cache: CacheRef,
    page_ttl: Duration,
    generation_ttl: Duration,
}

impl HistoryCache {
    pub fn new(cache: CacheRef, page_ttl: Duration, generation_ttl: Duration) -> Self {
        Self {
            cache,
            page_ttl,
            generation_ttl,
        }
    }

    fn generation_key(account_id: AccountId) -> String {
        format!("account_transactions:{account_id}:generation")
    }

    async fn generation(&self, account_id: AccountId) -> String {
        let key = Self::generation_key(account_id);
        match self.cache.get(&key).await {
            Ok(Some(generation)) => return generation,
            Ok(None) => {}
            Err(e) => warn!(%account_id, error = %e, "history generation lookup failed"),
        }
        let generation = Uuid::new_v4().simple().to_string();
        if let Err(e) = self
            .cache
            .set(&key, generation.clone(), self.generation_ttl)
            .await
        {
            warn!(%account_id, error = %e, "history generation store failed");
        }
        generation
    }

    /// Must be resolved before the ledger is read, so a page computed from a
    /// pre-commit snapshot lands under a generation that is already dropped.
    pub async fn page_key(&self, account_id: AccountId, page: u32, page_size: u32) -> String {
        let generation = self.generation(account_id).await;
        format!("account_transactions:{account_id}:{generation}:page:{page}:size:{page_size}")
    }

    pub async fn load(&self, key: &str) -> Option<Page<Transaction>> {
        let cached = match self.cache.get(key).await {
            Ok(cached) => cached?,
            Err(e) => {
                warn!(key, error = %e, "history cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&cached) {
            Ok(page) => {
                debug!(key, "history cache hit");
                Some(page)
            }
            Err(e) => {
                warn!(key, error = %e, "discarding undecodable history page");
                None
            }
        }
    }

    pub async fn store(&self, key: &str, page: &Page<Transaction>) {
        let encoded = match serde_json::to_string(page) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key, error = %e, "history page encode failed");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, encoded, self.page_ttl).await {
            warn!(key, error = %e, "history cache write failed");
        }
    }

    pub async fn invalidate(&self, account_ids: &[AccountId]) {
        for account_id in account_ids {
            if let Err(e) = self.cache.remove(&Self::generation_key(*account_id)).await {
                warn!(%account_id, error = %e, "history cache invalidation failed");
            }
        }
    }
}
