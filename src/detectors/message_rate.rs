//! Spam detection over each member's recent messages.
//!
//! Rules are checked in order and the first match wins: message rate,
//! duplicates, mentions, capitals, links. A match mutes the author, deletes
//! the message and records an `auto_mute`.

use super::DetectorContext;
use crate::EVENT_TARGET;
use crate::audit::kind;
use crate::commands::COLOUR_DANGER;
use crate::store::StoreResult;
use dashmap::DashMap;
use derive_more::Display;
use once_cell::sync::Lazy;
use poise::serenity_prelude::{
    ChannelId, CreateEmbed, CreateMessage, GuildId, MessageId, Timestamp, UserId,
};
use regex::Regex;
use serde_json::json;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

pub const SPAM_WINDOW: Duration = Duration::from_secs(7);
pub const MAX_MESSAGES: usize = 5;
pub const MAX_DUPLICATES: usize = 3;
pub const MAX_MENTIONS: usize = 5;
pub const MAX_CAPS_RATIO: f64 = 0.7;
pub const MIN_CAPS_LETTERS: usize = 10;
pub const MAX_LINKS: usize = 3;

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://").expect("link pattern is valid"));

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SpamRule {
    #[display("Spamming messages too quickly")]
    TooManyMessages,
    #[display("Repeated duplicate messages")]
    Duplicates,
    #[display("Mention spam detected")]
    MentionSpam,
    #[display("Excessive capital letters")]
    ExcessiveCaps,
    #[display("Link spam detected")]
    LinkSpam,
}

/// A guild message as the detector sees it.
#[derive(Debug, Clone)]
pub struct ObservedMessage {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub message: MessageId,
    pub author: UserId,
    pub author_bot: bool,
    pub content: String,
    /// Distinct users mentioned in the message.
    pub mentioned_users: usize,
}

#[derive(Debug)]
struct Sent {
    content: String,
    at: Instant,
}

#[derive(Debug, Default)]
pub struct MessageRateDetector {
    recent: DashMap<UserId, VecDeque<Sent>>,
}

fn shouts(content: &str) -> bool {
    let letters = content.chars().filter(char::is_ascii_alphabetic).count();
    if letters <= MIN_CAPS_LETTERS {
        return false;
    }
    let caps = content.chars().filter(char::is_ascii_uppercase).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = caps as f64 / letters as f64;
    ratio > MAX_CAPS_RATIO
}

impl MessageRateDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop messages older than the window and forget authors left with none.
    pub fn prune(&self, now: Instant) {
        self.recent.retain(|_, window| {
            window.retain(|sent| now.duration_since(sent.at) < SPAM_WINDOW);
            !window.is_empty()
        });
    }

    /// Record a message and return the first rule it breaks.
    pub fn evaluate(
        &self,
        author: UserId,
        content: &str,
        mentioned_users: usize,
        now: Instant,
    ) -> Option<SpamRule> {
        self.prune(now);
        let (sent, duplicates) = {
            let mut window = self.recent.entry(author).or_default();
            window.push_back(Sent {
                content: content.to_string(),
                at: now,
            });
            let duplicates = window.iter().filter(|sent| sent.content == content).count();
            (window.len(), duplicates)
        };

        if sent > MAX_MESSAGES {
            Some(SpamRule::TooManyMessages)
        } else if duplicates > MAX_DUPLICATES {
            Some(SpamRule::Duplicates)
        } else if mentioned_users >= MAX_MENTIONS {
            Some(SpamRule::MentionSpam)
        } else if shouts(content) {
            Some(SpamRule::ExcessiveCaps)
        } else if LINK_RE.find_iter(content).count() >= MAX_LINKS {
            Some(SpamRule::LinkSpam)
        } else {
            None
        }
    }

    /// Handle a guild message. Returns the rule that fired, if any.
    ///
    /// # Errors
    ///
    /// Returns the store error when the audit record cannot be written.
    pub async fn on_message(
        &self,
        ctx: &DetectorContext<'_>,
        message: &ObservedMessage,
    ) -> StoreResult<Option<SpamRule>> {
        if message.author_bot {
            return Ok(None);
        }
        let Some(rule) = self.evaluate(
            message.author,
            &message.content,
            message.mentioned_users,
            Instant::now(),
        ) else {
            return Ok(None);
        };
        info!(
            target: EVENT_TARGET,
            user_id = %message.author,
            guild_id = %message.guild,
            "Auto-mute triggered: {rule}"
        );
        self.mute(ctx, message, rule).await;

        if let Err(e) = ctx
            .gateway
            .delete_message(message.channel, message.message)
            .await
        {
            warn!(target: EVENT_TARGET, "Could not delete spam message {}: {e}", message.message);
        }

        let embed = CreateEmbed::new()
            .title("🔇 Auto-Mute Triggered")
            .colour(COLOUR_DANGER)
            .field("User", format!("<@{0}> ({0})", message.author), false)
            .field("Reason", rule.to_string(), false)
            .field("Channel", format!("<#{}>", message.channel), false)
            .timestamp(Timestamp::now());
        ctx.notify(CreateMessage::new().embed(embed)).await;

        ctx.audit
            .record(
                kind::AUTO_MUTE,
                json!({
                    "user_id": message.author.to_string(),
                    "reason": rule.to_string(),
                    "channel_id": message.channel.to_string(),
                    "guild_id": message.guild.to_string(),
                    "triggered_by": "anti_spam",
                }),
            )
            .await?;
        Ok(Some(rule))
    }

    async fn mute(&self, ctx: &DetectorContext<'_>, message: &ObservedMessage, rule: SpamRule) {
        let muted = ctx.config.muted_role_id;
        let member = match ctx.gateway.member(message.guild, message.author).await {
            Ok(Some(member)) => member,
            Ok(None) => return,
            Err(e) => {
                warn!(target: EVENT_TARGET, "Could not look up {}: {e}", message.author);
                return;
            }
        };
        if member.has_role(muted) {
            return;
        }
        let reason = format!("[AutoMute] {rule}");
        if let Err(e) = ctx
            .gateway
            .add_role(message.guild, message.author, muted, &reason)
            .await
        {
            warn!(target: EVENT_TARGET, "Could not mute {}: {e}", message.author);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::store::MemoryRecordStore;
    use crate::testing::{self, CHANNEL, Call, FakeGateway, GUILD, MUTED_ROLE};
    use std::sync::Arc;

    const AUTHOR: UserId = UserId::new(5);

    #[test]
    fn test_sixth_message_in_window_triggers() {
        let detector = MessageRateDetector::new();
        let start = Instant::now();
        for i in 0..5u64 {
            let at = start + Duration::from_millis(i * 1_000);
            assert_eq!(detector.evaluate(AUTHOR, &format!("hello {i}"), 0, at), None);
        }
        assert_eq!(
            detector.evaluate(AUTHOR, "hello 5", 0, start + Duration::from_millis(6_000)),
            Some(SpamRule::TooManyMessages)
        );
    }

    #[test]
    fn test_messages_spread_over_eight_seconds_do_not_trigger() {
        let detector = MessageRateDetector::new();
        let start = Instant::now();
        for i in 0..6u64 {
            let at = start + Duration::from_millis(i * 1_600);
            assert_eq!(detector.evaluate(AUTHOR, &format!("hello {i}"), 0, at), None);
        }
    }

    #[test]
    fn test_quiet_authors_are_forgotten() {
        let detector = MessageRateDetector::new();
        let start = Instant::now();
        detector.evaluate(AUTHOR, "hi", 0, start);
        detector.evaluate(UserId::new(6), "hi", 0, start + Duration::from_secs(4));
        assert_eq!(detector.recent.len(), 2);

        detector.evaluate(UserId::new(6), "again", 0, start + Duration::from_secs(8));
        assert_eq!(detector.recent.len(), 1);
        assert!(detector.recent.get(&AUTHOR).is_none());

        detector.prune(start + Duration::from_secs(20));
        assert!(detector.recent.is_empty());
    }

    #[test]
    fn test_fourth_duplicate_triggers() {
        let detector = MessageRateDetector::new();
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(detector.evaluate(AUTHOR, "buy now", 0, now), None);
        }
        assert_eq!(
            detector.evaluate(AUTHOR, "buy now", 0, now),
            Some(SpamRule::Duplicates)
        );
    }

    #[test]
    fn test_single_message_rules() {
        let now = Instant::now();
        let check = |content: &str, mentions: usize| {
            MessageRateDetector::new().evaluate(AUTHOR, content, mentions, now)
        };
        assert_eq!(check("hi all", 5), Some(SpamRule::MentionSpam));
        assert_eq!(check("hi all", 4), None);
        assert_eq!(check("THIS IS SO LOUD", 0), Some(SpamRule::ExcessiveCaps));
        assert_eq!(check("LOUD NOISES", 0), None);
        assert_eq!(check("ABCDEFGHIJKLmnopqrst", 0), None);
        assert_eq!(
            check("http://a.example https://b.example http://c.example", 0),
            Some(SpamRule::LinkSpam)
        );
        assert_eq!(check("https://a.example https://b.example", 0), None);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let now = Instant::now();
        let detector = MessageRateDetector::new();
        assert_eq!(
            detector.evaluate(AUTHOR, "HTTP://A HTTP://B HTTPS://C AND MORE", 6, now),
            Some(SpamRule::MentionSpam)
        );
    }

    fn observed(content: &str) -> ObservedMessage {
        ObservedMessage {
            guild: GUILD,
            channel: CHANNEL,
            message: MessageId::new(77),
            author: AUTHOR,
            author_bot: false,
            content: content.to_string(),
            mentioned_users: 0,
        }
    }

    #[tokio::test]
    async fn test_trigger_mutes_deletes_and_audits() {
        let audit = AuditLog::new(Arc::new(MemoryRecordStore::new()));
        let config = testing::config();
        let gateway = FakeGateway::new().with_member(AUTHOR.get(), &[], 1);
        let ctx = DetectorContext {
            gateway: &gateway,
            audit: &audit,
            config: &config,
        };
        let detector = MessageRateDetector::new();

        let fired = detector
            .on_message(&ctx, &observed("STOP SHOUTING AT ME"))
            .await
            .unwrap();
        assert_eq!(fired, Some(SpamRule::ExcessiveCaps));
        assert_eq!(gateway.roles_of(AUTHOR.get()), vec![MUTED_ROLE]);
        assert!(
            gateway
                .calls()
                .contains(&Call::DeleteMessage(CHANNEL, MessageId::new(77)))
        );
        let records = audit.of_kind(kind::AUTO_MUTE).await.unwrap();
        assert_eq!(records[0].payload["reason"], "Excessive capital letters");

        let again = detector
            .on_message(&ctx, &observed("STILL SHOUTING AT YOU"))
            .await
            .unwrap();
        assert_eq!(again, Some(SpamRule::ExcessiveCaps));
        let role_adds = gateway
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::AddRole(..)))
            .count();
        assert_eq!(role_adds, 1);
    }

    #[tokio::test]
    async fn test_bots_are_ignored() {
        let audit = AuditLog::new(Arc::new(MemoryRecordStore::new()));
        let config = testing::config();
        let gateway = FakeGateway::new();
        let ctx = DetectorContext {
            gateway: &gateway,
            audit: &audit,
            config: &config,
        };
        let mut message = observed("STOP SHOUTING AT ME");
        message.author_bot = true;
        let fired = MessageRateDetector::new().on_message(&ctx, &message).await.unwrap();
        assert_eq!(fired, None);
        assert!(gateway.calls().is_empty());
    }
}
