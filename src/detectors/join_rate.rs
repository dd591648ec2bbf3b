//! Raid detection: too many members joining one guild in a short window.

use super::DetectorContext;
use crate::EVENT_TARGET;
use crate::audit::kind;
use crate::commands::COLOUR_DANGER;
use crate::store::StoreResult;
use dashmap::DashMap;
use poise::serenity_prelude::{CreateEmbed, CreateMessage, GuildId, Timestamp};
use serde_json::json;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

pub const JOIN_WINDOW: Duration = Duration::from_secs(10);
pub const RAID_THRESHOLD: usize = 5;

#[derive(Debug, Default)]
pub struct JoinRateDetector {
    joins: DashMap<GuildId, VecDeque<Instant>>,
}

impl JoinRateDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop joins older than the window and forget guilds left with none.
    pub fn prune(&self, now: Instant) {
        self.joins.retain(|_, window| {
            window.retain(|joined| now.duration_since(*joined) <= JOIN_WINDOW);
            !window.is_empty()
        });
    }

    /// Record a join and return the window size when it reaches the raid threshold.
    pub fn record(&self, guild: GuildId, now: Instant) -> Option<usize> {
        self.prune(now);
        let mut window = self.joins.entry(guild).or_default();
        window.push_back(now);
        (window.len() >= RAID_THRESHOLD).then_some(window.len())
    }

    /// Handle a member joining `guild`. Returns whether a raid was reported.
    ///
    /// # Errors
    ///
    /// Returns the store error when the audit record cannot be written.
    pub async fn on_member_join(
        &self,
        ctx: &DetectorContext<'_>,
        guild: GuildId,
        guild_name: &str,
    ) -> StoreResult<bool> {
        let Some(total) = self.record(guild, Instant::now()) else {
            return Ok(false);
        };
        warn!(target: EVENT_TARGET, guild_id = %guild, total_joins = total, "Possible raid detected");

        let embed = CreateEmbed::new()
            .title("🚨 Possible Raid Detected")
            .description(format!(
                "{RAID_THRESHOLD}+ users joined **{guild_name}** in under {} seconds.",
                JOIN_WINDOW.as_secs()
            ))
            .field("Joins in window", total.to_string(), true)
            .colour(COLOUR_DANGER)
            .timestamp(Timestamp::now());
        ctx.notify(CreateMessage::new().embed(embed)).await;

        ctx.audit
            .record(
                kind::ANTI_RAID,
                json!({
                    "guild_id": guild.to_string(),
                    "total_joins": total,
                    "trigger": "5+ joins in 10s",
                }),
            )
            .await?;
        Ok(true)
    }
}
