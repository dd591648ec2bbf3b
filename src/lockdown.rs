//! Process-wide maintenance switch backed by a persisted control flag.
//!
//! Reads are served from a cache that is refreshed from the store at most
//! once per `LOCKDOWN_TTL`. A toggle from another process can therefore take
//! up to that long to become visible here.

use crate::interaction::Actor;
use crate::store::{Filter, RecordStore, StoreResult, Update};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

pub const LOCKDOWN_TTL: Duration = Duration::from_secs(15);
pub const FLAG_COLLECTION: &str = "control_flags";
pub const LOCKDOWN_KEY: &str = "lockdown";

/// Commands that stay usable while the bot is locked.
pub const ALLOWED_WHILE_LOCKED: [&str; 3] = ["lockdown", "unlock", "status"];

/// Who last flipped a control flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagActor {
    pub id: String,
    pub tag: String,
}

/// Persisted form of a control flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlag {
    pub key: String,
    pub value: bool,
    pub updated_by: Option<FlagActor>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct CachedFlag {
    value: bool,
    fetched_at: Option<Instant>,
}

impl CachedFlag {
    fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < LOCKDOWN_TTL)
    }
}

pub struct LockdownFlag {
    store: Arc<dyn RecordStore>,
    cache: RwLock<CachedFlag>,
}

impl LockdownFlag {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(CachedFlag::default()),
        }
    }

    fn filter() -> Filter {
        Filter::new().field("key", LOCKDOWN_KEY)
    }

    /// Current state, refreshed from the store when the cache is stale.
    ///
    /// A failed refresh keeps the last known value (unlocked if never read).
    pub async fn get(&self) -> bool {
        {
            let cached = self.cache.read().await;
            if cached.is_fresh() {
                return cached.value;
            }
        }

        match self.store.find_one(FLAG_COLLECTION, &Self::filter()).await {
            Ok(document) => {
                let value = document
                    .and_then(|d| d.get("value").and_then(Value::as_bool))
                    .unwrap_or(false);
                let mut cached = self.cache.write().await;
                cached.value = value;
                cached.fetched_at = Some(Instant::now());
                value
            }
            Err(e) => {
                let cached = self.cache.read().await;
                warn!(
                    "Failed to refresh lockdown flag, using cached value {}: {e}",
                    cached.value
                );
                cached.value
            }
        }
    }

    /// Persist a new state and make it visible to this process immediately.
    ///
    /// # Errors
    ///
    /// Returns the store error when the write fails; the cache is left unchanged.
    pub async fn set(&self, enabled: bool, actor: &Actor) -> StoreResult<bool> {
        let update = Update::new()
            .set("value", enabled)
            .set(
                "updated_by",
                json!({ "id": actor.id.to_string(), "tag": actor.tag }),
            )
            .set("updated_at", Utc::now().to_rfc3339());
        self.store
            .find_one_and_update(FLAG_COLLECTION, &Self::filter(), &update, true)
            .await?;

        let mut cached = self.cache.write().await;
        cached.value = enabled;
        cached.fetched_at = Some(Instant::now());
        info!("Lockdown set to {enabled} by {} ({})", actor.tag, actor.id);
        Ok(enabled)
    }

    /// The persisted record, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn record(&self) -> StoreResult<Option<ControlFlag>> {
        self.store
            .find_one(FLAG_COLLECTION, &Self::filter())
            .await?
            .map(crate::store::from_document)
            .transpose()
    }
}

#[must_use]
pub fn allowed_while_locked(command: &str) -> bool {
    ALLOWED_WHILE_LOCKED.contains(&command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRecordStore, MockRecordStore, StoreError};
    use poise::serenity_prelude::UserId;

    fn actor() -> Actor {
        Actor {
            id: UserId::new(1),
            tag: "owner".to_string(),
            bot: false,
        }
    }

    #[tokio::test]
    async fn test_defaults_to_unlocked() {
        let flag = LockdownFlag::new(Arc::new(MemoryRecordStore::new()));
        assert!(!flag.get().await);
    }

    #[tokio::test]
    async fn test_set_is_visible_immediately_and_persisted() {
        let store = Arc::new(MemoryRecordStore::new());
        let flag = LockdownFlag::new(store.clone());
        assert!(flag.set(true, &actor()).await.unwrap());
        assert!(flag.get().await);

        let record = flag.record().await.unwrap().unwrap();
        assert!(record.value);
        assert_eq!(record.updated_by.unwrap().tag, "owner");
        assert_eq!(
            store
                .count_documents(FLAG_COLLECTION, &Filter::new())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_change_visible_after_ttl() {
        let store = Arc::new(MemoryRecordStore::new());
        let flag = LockdownFlag::new(store.clone());
        assert!(!flag.get().await);

        // Another process locks the bot.
        store
            .find_one_and_update(
                FLAG_COLLECTION,
                &Filter::new().field("key", LOCKDOWN_KEY),
                &Update::new().set("value", true),
                true,
            )
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(!flag.get().await);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(flag.get().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_returns_last_value() {
        let mut store = MockRecordStore::new();
        store
            .expect_find_one_and_update()
            .returning(|_, _, _, _| Ok(None));
        store
            .expect_find_one()
            .returning(|_, _| Err(StoreError::Unavailable("offline".to_string())));
        let flag = LockdownFlag::new(Arc::new(store));

        flag.set(true, &actor()).await.unwrap();
        tokio::time::advance(LOCKDOWN_TTL + Duration::from_secs(1)).await;
        assert!(flag.get().await);
    }

    #[test]
    fn test_allow_list() {
        assert!(allowed_while_locked("status"));
        assert!(allowed_while_locked("unlock"));
        assert!(!allowed_while_locked("ban"));
    }
}
