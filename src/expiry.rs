//! Durable expiry of timed mutes and bans.
//!
//! Each timed sanction writes a `ScheduledReversal` with its `expires_at`.
//! A sleep task fires it on time while the process lives. A periodic sweep
//! applies anything overdue, which covers reversals whose task was lost to a
//! restart. Claiming flips the state from `scheduled` to `completed` in the
//! store first, so the timer and the sweep never both apply one reversal.

use crate::audit::{AuditLog, kind};
use crate::platform::Gateway;
use crate::store::{Filter, RecordStore, StoreResult, Update, from_document, to_document};
use chrono::{DateTime, Utc};
use derive_more::Display;
use poise::serenity_prelude::{GuildId, RoleId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const REVERSAL_COLLECTION: &str = "reversals";
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReversalKind {
    Unmute { role_id: u64 },
    Unban,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalState {
    #[display("scheduled")]
    Scheduled,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReversal {
    #[serde(rename = "_id")]
    pub id: String,
    pub guild_id: u64,
    pub user_id: u64,
    pub kind: ReversalKind,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub state: ReversalState,
}

impl ScheduledReversal {
    #[must_use]
    pub fn new(
        guild: GuildId,
        user: UserId,
        kind: ReversalKind,
        reason: impl Into<String>,
        after: Duration,
    ) -> Self {
        let expires_at = chrono::Duration::from_std(after)
            .ok()
            .and_then(|after| Utc::now().checked_add_signed(after))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: Uuid::new_v4().to_string(),
            guild_id: guild.get(),
            user_id: user.get(),
            kind,
            reason: reason.into(),
            expires_at,
            state: ReversalState::Scheduled,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == ReversalState::Scheduled && self.expires_at <= now
    }

    fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or_default()
    }
}

/// Persists and applies scheduled reversals.
pub struct ExpiryScheduler {
    store: Arc<dyn RecordStore>,
    audit: AuditLog,
    sweep_started: AtomicBool,
}

impl ExpiryScheduler {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, audit: AuditLog) -> Self {
        Self {
            store,
            audit,
            sweep_started: AtomicBool::new(false),
        }
    }

    /// Persist a reversal and arm a timer for it.
    ///
    /// # Errors
    ///
    /// Returns the store error when the reversal cannot be saved.
    pub async fn schedule(
        self: &Arc<Self>,
        gateway: Arc<dyn Gateway>,
        reversal: ScheduledReversal,
    ) -> StoreResult<()> {
        self.store
            .create(REVERSAL_COLLECTION, to_document(&reversal)?)
            .await?;
        info!(
            "Scheduled {:?} for user {} in guild {} at {}",
            reversal.kind, reversal.user_id, reversal.guild_id, reversal.expires_at
        );

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(reversal.remaining()).await;
            if let Err(e) = scheduler.fire(gateway.as_ref(), &reversal.id).await {
                error!("Failed to apply reversal {}: {e}", reversal.id);
            }
        });
        Ok(())
    }

    /// Start the periodic sweep. Later calls are no-ops (the ready event can fire more than once).
    pub fn start_sweep(self: &Arc<Self>, gateway: Arc<dyn Gateway>) {
        if self.sweep_started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Starting reversal sweep with {}s interval", SWEEP_INTERVAL.as_secs());
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                match scheduler.sweep(gateway.as_ref()).await {
                    Ok(0) => {}
                    Ok(applied) => info!("Reversal sweep applied {applied} overdue reversal(s)"),
                    Err(e) => error!("Error in reversal sweep: {e}"),
                }
            }
        });
    }

    /// Reversals still waiting to be applied.
    ///
    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn scheduled(&self) -> StoreResult<Vec<ScheduledReversal>> {
        self.store
            .find(
                REVERSAL_COLLECTION,
                &Filter::new().field("state", ReversalState::Scheduled.to_string()),
            )
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Apply every overdue reversal, returning how many this call applied.
    ///
    /// # Errors
    ///
    /// Returns the store error when listing reversals fails.
    pub async fn sweep(&self, gateway: &dyn Gateway) -> StoreResult<usize> {
        let now = Utc::now();
        let mut applied = 0;
        for reversal in self.scheduled().await? {
            if !reversal.is_due(now) {
                continue;
            }
            match self.fire(gateway, &reversal.id).await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => error!("Failed to apply reversal {}: {e}", reversal.id),
            }
        }
        Ok(applied)
    }

    /// Claim and apply one reversal. Returns `false` if someone else claimed it first.
    async fn fire(&self, gateway: &dyn Gateway, id: &str) -> StoreResult<bool> {
        let claimed = self
            .store
            .find_one_and_update(
                REVERSAL_COLLECTION,
                &Filter::by_id(id).field("state", ReversalState::Scheduled.to_string()),
                &Update::new().set("state", ReversalState::Completed.to_string()),
                false,
            )
            .await?;
        let Some(claimed) = claimed else {
            return Ok(false);
        };
        let reversal: ScheduledReversal = from_document(claimed)?;
        let guild = GuildId::new(reversal.guild_id);
        let user = UserId::new(reversal.user_id);

        let (result, audit_kind) = match reversal.kind {
            ReversalKind::Unmute { role_id } => (
                gateway
                    .remove_role(guild, user, RoleId::new(role_id), "Mute expired")
                    .await,
                kind::UNMUTE,
            ),
            ReversalKind::Unban => (gateway.unban(guild, user).await, kind::UNBAN),
        };

        match result {
            Ok(()) => {
                info!("Applied {audit_kind} for user {user} in guild {guild}");
                self.audit
                    .record(
                        audit_kind,
                        json!({
                            "user_id": user.to_string(),
                            "guild_id": guild.to_string(),
                            "reason": reversal.reason,
                            "automatic": true,
                        }),
                    )
                    .await?;
            }
            Err(e) => {
                warn!("Reversal {id} could not be applied: {e}");
                self.store
                    .find_one_and_update(
                        REVERSAL_COLLECTION,
                        &Filter::by_id(id),
                        &Update::new()
                            .set("state", ReversalState::Failed.to_string())
                            .set("error", e.to_string()),
                        false,
                    )
                    .await?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{GatewayError, MockGateway};
    use crate::store::MemoryRecordStore;

    fn scheduler(store: Arc<MemoryRecordStore>) -> Arc<ExpiryScheduler> {
        let audit = AuditLog::new(store.clone());
        Arc::new(ExpiryScheduler::new(store, audit))
    }

    async fn insert(store: &MemoryRecordStore, reversal: &ScheduledReversal) {
        store
            .create(REVERSAL_COLLECTION, to_document(reversal).unwrap())
            .await
            .unwrap();
    }

    fn overdue(kind: ReversalKind) -> ScheduledReversal {
        let mut reversal =
            ScheduledReversal::new(GuildId::new(1), UserId::new(2), kind, "spam", Duration::ZERO);
        reversal.expires_at = Utc::now() - chrono::Duration::seconds(5);
        reversal
    }

    #[tokio::test]
    async fn test_sweep_applies_overdue_unban_once() {
        let store = Arc::new(MemoryRecordStore::new());
        let scheduler = scheduler(store.clone());
        insert(&store, &overdue(ReversalKind::Unban)).await;

        let mut gateway = MockGateway::new();
        gateway
            .expect_unban()
            .withf(|guild, user| *guild == GuildId::new(1) && *user == UserId::new(2))
            .times(1)
            .returning(|_, _| Ok(()));

        assert_eq!(scheduler.sweep(&gateway).await.unwrap(), 1);
        assert_eq!(scheduler.sweep(&gateway).await.unwrap(), 0);
        assert!(scheduler.scheduled().await.unwrap().is_empty());

        let audit = AuditLog::new(store.clone());
        assert_eq!(audit.of_kind(kind::UNBAN).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_future_reversals() {
        let store = Arc::new(MemoryRecordStore::new());
        let scheduler = scheduler(store.clone());
        let future = ScheduledReversal::new(
            GuildId::new(1),
            UserId::new(2),
            ReversalKind::Unban,
            "spam",
            Duration::from_secs(3_600),
        );
        insert(&store, &future).await;

        let gateway = MockGateway::new();
        assert_eq!(scheduler.sweep(&gateway).await.unwrap(), 0);
        assert_eq!(scheduler.scheduled().await.unwrap(), vec![future]);
    }

    #[tokio::test]
    async fn test_failed_unmute_is_marked_failed() {
        let store = Arc::new(MemoryRecordStore::new());
        let scheduler = scheduler(store.clone());
        let reversal = overdue(ReversalKind::Unmute { role_id: 9 });
        insert(&store, &reversal).await;

        let mut gateway = MockGateway::new();
        gateway
            .expect_remove_role()
            .times(1)
            .returning(|_, _, _, _| Err(GatewayError::Rejected("missing permissions".into())));

        assert_eq!(scheduler.sweep(&gateway).await.unwrap(), 1);
        let stored = store
            .find_one(REVERSAL_COLLECTION, &Filter::by_id(&reversal.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["state"], serde_json::json!("failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_duration() {
        let store = Arc::new(MemoryRecordStore::new());
        let scheduler = scheduler(store.clone());

        let mut gateway = MockGateway::new();
        gateway
            .expect_remove_role()
            .withf(|_, _, role, _| *role == RoleId::new(9))
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let gateway: Arc<dyn Gateway> = Arc::new(gateway);

        let reversal = ScheduledReversal::new(
            GuildId::new(1),
            UserId::new(2),
            ReversalKind::Unmute { role_id: 9 },
            "spam",
            Duration::from_secs(60),
        );
        scheduler.schedule(gateway, reversal).await.unwrap();
        assert_eq!(scheduler.scheduled().await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(scheduler.scheduled().await.unwrap().is_empty());
    }
}
