//! Per-base-name serialisation.
//!
//! Every conversion writes to `pdf-images/{base}.pdf` and `pdf-images/{base}/`,
//! so two uploads that share a base name (say `report.xlsx` and
//! `report.docx`) must not run their produce and rasterise stages at the same
//! time. Different base names never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Async mutexes keyed by base name, created on demand.
#[derive(Clone, Default)]
pub struct BaseNameLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl BaseNameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            // Entries nobody holds or waits on are dropped here.
            map.retain(|k, m| k == key || Arc::strong_count(m) > 1);
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = BaseNameLocks::new();
        let guard = locks.lock("report").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock("report").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "second holder must wait");

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = BaseNameLocks::new();
        let _a = locks.lock("report").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock("memo")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = BaseNameLocks::new();
        drop(locks.lock("a").await);
        drop(locks.lock("b").await);
        drop(locks.lock("c").await);
        // Only the key being locked survives the sweep.
        assert_eq!(locks.len(), 1);
    }
}
