use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{domain::UserId, draft::Draft, Result};

/// Keyed storage for in-progress drafts, one per owner.
///
/// Expiry is part of the contract, not cleanup: a record older than its TTL
/// must read back as absent, so an abandoned conversation can never be resumed
/// with stale data. Every `put` refreshes the deadline. No cross-owner
/// operations are exposed.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn put(&self, draft: Draft, ttl: Duration) -> Result<()>;
    async fn get(&self, owner: UserId) -> Result<Option<Draft>>;
    async fn delete(&self, owner: UserId) -> Result<()>;
}

struct StoredDraft {
    draft: Draft,
    expires_at: Instant,
}

/// In-memory backend. Suitable for a single process; swap behind the trait
/// for a durable backend when running more than one instance.
#[derive(Default)]
pub struct MemoryDraftStore {
    inner: Mutex<HashMap<UserId, StoredDraft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn put(&self, draft: Draft, ttl: Duration) -> Result<()> {
        let mut map = self.inner.lock().await;
        map.insert(
            draft.owner,
            StoredDraft {
                draft,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, owner: UserId) -> Result<Option<Draft>> {
        let mut map = self.inner.lock().await;
        match map.get(&owner) {
            Some(rec) if rec.expires_at > Instant::now() => Ok(Some(rec.draft.clone())),
            Some(_) => {
                map.remove(&owner);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, owner: UserId) -> Result<()> {
        self.inner.lock().await.remove(&owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftStage;

    fn draft(owner: i64) -> Draft {
        Draft::new(UserId(owner))
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = MemoryDraftStore::new();
        store
            .put(draft(1), Duration::from_secs(60))
            .await
            .unwrap();

        let got = store.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(got.stage, DraftStage::AwaitingDestination);
        assert!(store.get(UserId(2)).await.unwrap().is_none());

        store.delete(UserId(1)).await.unwrap();
        assert!(store.get(UserId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_draft_reads_back_as_absent() {
        let store = MemoryDraftStore::new();
        store
            .put(draft(1), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get(UserId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_refreshes_the_deadline() {
        let store = MemoryDraftStore::new();
        store
            .put(draft(1), Duration::from_millis(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        store
            .put(draft(1), Duration::from_millis(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get(UserId(1)).await.unwrap().is_some());
    }
}
