//! In-memory store bridging the steps of a moderation confirmation flow.
//!
//! Entries live only as long as the process. A second initiation for the same
//! subject and action kind replaces the first.

use dashmap::DashMap;
use derive_more::Display;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Moderation actions that go through a multi-step flow.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[display("warn")]
    Warn,
    #[display("kick")]
    Kick,
    #[display("mute")]
    Mute,
    #[display("ban")]
    Ban,
    #[display("note")]
    Note,
}

impl ActionKind {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "warn" => Some(Self::Warn),
            "kick" => Some(Self::Kick),
            "mute" => Some(Self::Mute),
            "ban" => Some(Self::Ban),
            "note" => Some(Self::Note),
            _ => None,
        }
    }

    /// Text shown when a confirmation arrives after its pending entry is gone.
    #[must_use]
    pub fn expired_message(self) -> &'static str {
        match self {
            Self::Warn => "⚠️ Warn session expired or missing.",
            Self::Kick => "⚠️ Kick data expired or missing.",
            Self::Mute => "⚠️ Mute session expired or missing.",
            Self::Ban => "⚠️ Ban session expired or missing.",
            Self::Note => "⚠️ Note session expired or missing.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub kind: ActionKind,
    pub guild_id: GuildId,
    pub subject: UserId,
}

impl PendingKey {
    #[must_use]
    pub const fn new(kind: ActionKind, guild_id: GuildId, subject: UserId) -> Self {
        Self {
            kind,
            guild_id,
            subject,
        }
    }
}

/// Payload collected from the moderator between the prompt and the confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub subject: UserId,
    pub kind: ActionKind,
    pub moderator_id: UserId,
    pub moderator_tag: String,
    pub reason: String,
    /// `None` means permanent.
    pub duration: Option<Duration>,
    /// What the moderator typed, kept for notices and audit records.
    pub duration_text: Option<String>,
    pub origin_channel: ChannelId,
    /// Outcome of a direct message sent before confirmation (kick pre-step).
    pub dm_sent: Option<bool>,
}

impl PendingAction {
    /// Human readable duration, `Permanent` when none was given.
    #[must_use]
    pub fn duration_label(&self) -> String {
        match (&self.duration_text, self.duration) {
            (Some(text), Some(_)) => text.clone(),
            (None, Some(duration)) => crate::duration::describe(duration),
            _ => "Permanent".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PendingActionStore {
    entries: DashMap<PendingKey, PendingAction>,
}

impl PendingActionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an action, returning the one it replaced.
    pub fn stage(&self, key: PendingKey, action: PendingAction) -> Option<PendingAction> {
        self.entries.insert(key, action)
    }

    #[must_use]
    pub fn peek(&self, key: &PendingKey) -> Option<PendingAction> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Remove and return the entry. Only one caller can win a given entry.
    pub fn take(&self, key: &PendingKey) -> Option<PendingAction> {
        self.entries.remove(key).map(|(_, action)| action)
    }

    pub fn discard(&self, key: &PendingKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Modify an entry in place. Returns `false` when there is nothing to modify.
    pub fn update<F>(&self, key: &PendingKey, apply: F) -> bool
    where
        F: FnOnce(&mut PendingAction),
    {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                apply(entry.value_mut());
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
