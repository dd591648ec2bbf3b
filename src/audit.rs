//! Append-only audit log, the bot's durable history of moderation events.

use crate::store::{Filter, RecordStore, StoreResult, from_document};
use crate::{AUDIT_TARGET, store::to_document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const AUDIT_COLLECTION: &str = "audit_logs";

/// Kinds written by the bot.
pub mod kind {
    pub const WARN: &str = "warn";
    pub const KICK: &str = "kick";
    pub const MUTE: &str = "mute";
    pub const BAN: &str = "ban";
    pub const NOTE: &str = "note";
    pub const UNMUTE: &str = "unmute";
    pub const UNBAN: &str = "unban";
    pub const STRIKE_ISSUED: &str = "strike_issued";
    pub const STRIKE_APPROVED: &str = "strike_approved";
    pub const STRIKE_DENIED: &str = "strike_denied";
    pub const LOCKDOWN_CHANGED: &str = "lockdown_changed";
    pub const MODPANEL_OPENED: &str = "modpanel_opened";
    pub const HELP_USED: &str = "help_used";
    pub const ANTI_RAID: &str = "anti_raid_trigger";
    pub const AUTO_MUTE: &str = "auto_mute";
    pub const ANTI_NUKE: &str = "anti_nuke_trigger";
    pub const SESSION_ANNIHILATED: &str = "session_annihilated";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub kind: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Subject of the record, when the payload names one.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.payload.get("user_id").and_then(Value::as_str)
    }
}

#[derive(Serialize)]
struct NewAuditRecord<'a> {
    kind: &'a str,
    payload: &'a Value,
}

#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn RecordStore>,
}

impl AuditLog {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Append a record.
    ///
    /// # Errors
    ///
    /// Returns the store error when the write fails.
    pub async fn record(&self, kind: &str, payload: Value) -> StoreResult<AuditRecord> {
        let document = to_document(&NewAuditRecord {
            kind,
            payload: &payload,
        })?;
        let created = self.store.create(AUDIT_COLLECTION, document).await?;
        info!(target: AUDIT_TARGET, kind = %kind, payload = %payload, "Audit record written");
        from_document(created)
    }

    /// Records naming `user_id` as their subject, newest first.
    ///
    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn for_user(&self, user_id: &str) -> StoreResult<Vec<AuditRecord>> {
        let filter = Filter::new().field("payload.user_id", user_id);
        let mut records = self
            .store
            .find(AUDIT_COLLECTION, &filter)
            .await?
            .into_iter()
            .map(from_document)
            .collect::<StoreResult<Vec<AuditRecord>>>()?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Every record of a kind.
    ///
    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn of_kind(&self, kind: &str) -> StoreResult<Vec<AuditRecord>> {
        self.store
            .find(AUDIT_COLLECTION, &Filter::new().field("kind", kind))
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }
}

/// Count records per kind, sorted by kind.
#[must_use]
pub fn count_by_kind(records: &[AuditRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.kind.as_str()).or_insert(0) += 1;
    }
    counts
}
