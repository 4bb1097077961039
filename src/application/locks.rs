use crate::domain::account::AccountId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-account async mutexes serializing read-check-write on balances.
///
/// Locks are always taken in ascending id order, so two units touching the
/// same pair of accounts cannot deadlock.
#[derive(Clone, Default)]
pub struct AccountLocks {
    locks: Arc<DashMap<AccountId, Arc<Mutex<()>>>>,
}

/// Held locks; released on drop.
pub struct AccountGuards {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, account_ids: &[AccountId]) -> AccountGuards {
        let mut ids = account_ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let lock = self.locks.entry(id).or_default().clone();
            guards.push(lock.lock_owned().await);
        }
        AccountGuards { _guards: guards }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_duplicate_ids_do_not_self_deadlock() {
        let locks = AccountLocks::new();
        let id = AccountId::new();
        let guards = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&[id, id]))
            .await
            .expect("acquire should not block on a repeated id");
        drop(guards);
    }

    #[tokio::test]
    async fn test_second_holder_waits() {
        let locks = AccountLocks::new();
        let id = AccountId::new();
        let held = locks.acquire(&[id]).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(&[id])).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(&[id])).await;
        assert!(acquired.is_ok());
    }
}
