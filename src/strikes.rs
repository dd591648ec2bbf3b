//! Strike records and the approval state machine.
//!
//! A strike starts unapproved, is approved exactly once or deleted by denial.
//! Reaching `DISCIPLINE_THRESHOLD` approved strikes is derived on every approval.

use crate::store::{Filter, RecordStore, StoreResult, Update, from_document, to_document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const STRIKE_COLLECTION: &str = "strikes";
pub const DISCIPLINE_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub guild_id: String,
    pub reason: String,
    pub issued_by: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct NewStrike<'a> {
    user_id: &'a str,
    guild_id: &'a str,
    reason: &'a str,
    issued_by: &'a str,
    approved: bool,
}

/// Result of an approval attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    NotFound,
    AlreadyApproved,
    Approved {
        strike: StrikeRecord,
        /// All approved strikes of the subject in the guild, oldest first.
        approved: Vec<StrikeRecord>,
    },
}

impl ApprovalOutcome {
    /// Whether the approval pushed the subject to or past the discipline threshold.
    #[must_use]
    pub fn triggers_discipline(&self) -> bool {
        matches!(self, Self::Approved { approved, .. } if approved.len() >= DISCIPLINE_THRESHOLD)
    }
}

#[derive(Clone)]
pub struct StrikeBook {
    store: Arc<dyn RecordStore>,
}

impl StrikeBook {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create a strike.
    ///
    /// # Errors
    ///
    /// Returns the store error when the write fails.
    pub async fn issue(
        &self,
        guild_id: &str,
        user_id: &str,
        reason: &str,
        issued_by: &str,
        approved: bool,
    ) -> StoreResult<StrikeRecord> {
        let document = to_document(&NewStrike {
            user_id,
            guild_id,
            reason,
            issued_by,
            approved,
        })?;
        from_document(self.store.create(STRIKE_COLLECTION, document).await?)
    }

    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn get(&self, id: &str) -> StoreResult<Option<StrikeRecord>> {
        self.store
            .find_one(STRIKE_COLLECTION, &Filter::by_id(id))
            .await?
            .map(from_document)
            .transpose()
    }

    /// Approve a pending strike.
    ///
    /// # Errors
    ///
    /// Returns the store error when a read or write fails.
    pub async fn approve(&self, id: &str) -> StoreResult<ApprovalOutcome> {
        let Some(existing) = self.get(id).await? else {
            return Ok(ApprovalOutcome::NotFound);
        };
        if existing.approved {
            return Ok(ApprovalOutcome::AlreadyApproved);
        }

        // Conditional on `approved == false` so two racing approvals flip it once.
        let updated = self
            .store
            .find_one_and_update(
                STRIKE_COLLECTION,
                &Filter::by_id(id).field("approved", false),
                &Update::new().set("approved", true),
                false,
            )
            .await?;
        let Some(updated) = updated else {
            return Ok(if self.get(id).await?.is_some() {
                ApprovalOutcome::AlreadyApproved
            } else {
                ApprovalOutcome::NotFound
            });
        };
        let strike: StrikeRecord = from_document(updated)?;
        let approved = self.approved_for(&strike.guild_id, &strike.user_id).await?;
        Ok(ApprovalOutcome::Approved { strike, approved })
    }

    /// Delete a strike, returning the removed record.
    ///
    /// # Errors
    ///
    /// Returns the store error when the delete fails.
    pub async fn deny(&self, id: &str) -> StoreResult<Option<StrikeRecord>> {
        self.store
            .find_one_and_delete(STRIKE_COLLECTION, &Filter::by_id(id))
            .await?
            .map(from_document)
            .transpose()
    }

    /// Approved strikes of a subject, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn approved_for(&self, guild_id: &str, user_id: &str) -> StoreResult<Vec<StrikeRecord>> {
        let filter = Filter::new()
            .field("guild_id", guild_id)
            .field("user_id", user_id)
            .field("approved", true);
        let mut strikes = self
            .store
            .find(STRIKE_COLLECTION, &filter)
            .await?
            .into_iter()
            .map(from_document)
            .collect::<StoreResult<Vec<StrikeRecord>>>()?;
        strikes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(strikes)
    }

    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn count_approved(&self, guild_id: &str, user_id: &str) -> StoreResult<u64> {
        let filter = Filter::new()
            .field("guild_id", guild_id)
            .field("user_id", user_id)
            .field("approved", true);
        self.store.count_documents(STRIKE_COLLECTION, &filter).await
    }

    /// Unapproved strikes in a guild whose id starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn pending(&self, guild_id: &str, prefix: &str) -> StoreResult<Vec<StrikeRecord>> {
        let filter = Filter::new()
            .field("guild_id", guild_id)
            .field("approved", false);
        Ok(self
            .store
            .find(STRIKE_COLLECTION, &filter)
            .await?
            .into_iter()
            .map(from_document::<StrikeRecord>)
            .collect::<StoreResult<Vec<_>>>()?
            .into_iter()
            .filter(|strike| strike.id.starts_with(prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;

    fn book() -> StrikeBook {
        StrikeBook::new(Arc::new(MemoryRecordStore::new()))
    }

    #[tokio::test]
    async fn test_threshold_reached_on_third_approval() {
        let book = book();
        let mut outcomes = Vec::new();
        for n in 0..4 {
            let strike = book
                .issue("g", "u", &format!("reason {n}"), "mod", false)
                .await
                .unwrap();
            outcomes.push(book.approve(&strike.id).await.unwrap());
        }
        let triggers: Vec<bool> = outcomes.iter().map(ApprovalOutcome::triggers_discipline).collect();
        assert_eq!(triggers, vec![false, false, true, true]);
        match &outcomes[3] {
            ApprovalOutcome::Approved { approved, .. } => assert_eq!(approved.len(), 4),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_approve_twice_reports_already_approved() {
        let book = book();
        let strike = book.issue("g", "u", "r", "mod", false).await.unwrap();
        assert!(matches!(
            book.approve(&strike.id).await.unwrap(),
            ApprovalOutcome::Approved { .. }
        ));
        assert_eq!(
            book.approve(&strike.id).await.unwrap(),
            ApprovalOutcome::AlreadyApproved
        );
    }

    #[tokio::test]
    async fn test_denied_strike_is_not_found() {
        let book = book();
        let strike = book.issue("g", "u", "r", "mod", false).await.unwrap();
        let removed = book.deny(&strike.id).await.unwrap().unwrap();
        assert_eq!(removed.reason, "r");
        assert_eq!(book.approve(&strike.id).await.unwrap(), ApprovalOutcome::NotFound);
        assert!(book.deny(&strike.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_counts_are_per_subject_and_guild() {
        let book = book();
        book.issue("g", "u", "a", "mod", true).await.unwrap();
        book.issue("g", "u", "b", "mod", false).await.unwrap();
        book.issue("g", "v", "c", "mod", true).await.unwrap();
        book.issue("h", "u", "d", "mod", true).await.unwrap();
        assert_eq!(book.count_approved("g", "u").await.unwrap(), 1);
        assert_eq!(book.pending("g", "").await.unwrap().len(), 1);
    }
}
