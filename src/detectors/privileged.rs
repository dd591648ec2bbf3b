//! Anti-nuke: strip the roles of anyone performing destructive guild actions.

use super::DetectorContext;
use crate::EVENT_TARGET;
use crate::audit::kind;
use crate::store::StoreResult;
use derive_more::Display;
use poise::serenity_prelude::{CreateEmbed, CreateMessage, GuildId, RoleId, Timestamp, UserId};
use serde_json::json;
use tracing::{info, warn};

const COLOUR_DARK_RED: u32 = 0x99_2D_22;
pub const STRIP_REASON: &str = "⚠️ Auto-stripped by anti-nuke";

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegedAction {
    #[display("channel_delete")]
    ChannelDelete,
    #[display("role_delete")]
    RoleDelete,
    #[display("emoji_delete")]
    EmojiDelete,
    #[display("ban_add")]
    BanAdd,
}

/// An audit log entry for one of the watched actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegedActionEvent {
    pub guild: GuildId,
    pub action: PrivilegedAction,
    pub executor: UserId,
    pub target_id: Option<u64>,
}

/// What the detector did about an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NukeResponse {
    pub manageable: bool,
    pub roles_removed: Vec<RoleId>,
}

#[derive(Debug, Default)]
pub struct PrivilegedActionDetector;

impl PrivilegedActionDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Handle a watched audit log entry.
    ///
    /// Returns `None` when the executor is exempt (the owner or a bot) or unknown.
    ///
    /// # Errors
    ///
    /// Returns the store error when the audit record cannot be written.
    pub async fn on_audit_entry(
        &self,
        ctx: &DetectorContext<'_>,
        event: &PrivilegedActionEvent,
    ) -> StoreResult<Option<NukeResponse>> {
        if event.executor == ctx.config.owner_id {
            return Ok(None);
        }
        let executor = match ctx.gateway.user(event.executor).await {
            Ok(user) => user,
            Err(e) => {
                warn!(target: EVENT_TARGET, "Could not resolve executor {}: {e}", event.executor);
                return Ok(None);
            }
        };
        if executor.bot {
            return Ok(None);
        }
        warn!(
            target: EVENT_TARGET,
            guild_id = %event.guild,
            user_id = %executor.id,
            "Privileged action {} detected",
            event.action
        );

        let response = self.strip(ctx, event).await;

        ctx.audit
            .record(
                kind::ANTI_NUKE,
                json!({
                    "action": event.action.to_string(),
                    "executor_id": executor.id.to_string(),
                    "executor_tag": executor.tag,
                    "user_id": executor.id.to_string(),
                    "target_id": event.target_id.map(|id| id.to_string()),
                    "guild_id": event.guild.to_string(),
                    "manageable": response.manageable,
                    "roles_removed": response
                        .roles_removed
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>(),
                }),
            )
            .await?;

        let removed = response
            .roles_removed
            .iter()
            .map(|role| format!("<@&{role}>"))
            .collect::<Vec<_>>()
            .join(", ");
        let title = if response.manageable {
            "🚨 Nuke Action Blocked"
        } else {
            "🚨 Nuke Action Detected"
        };
        let embed = CreateEmbed::new()
            .title(title)
            .colour(COLOUR_DARK_RED)
            .field(
                "Executor",
                format!("<@{}> ({})", executor.id, executor.tag),
                true,
            )
            .field("Action Type", event.action.to_string(), true)
            .field(
                "Target",
                event
                    .target_id
                    .map_or_else(|| "Unknown".to_string(), |id| id.to_string()),
                false,
            )
            .field(
                "Removed Roles",
                if removed.is_empty() { "None".to_string() } else { removed },
                false,
            )
            .timestamp(Timestamp::now());
        let embed = if response.manageable {
            embed
        } else {
            embed.description("⚠️ I can't manage this member, so no roles were removed.")
        };
        ctx.notify(CreateMessage::new().embed(embed)).await;

        Ok(Some(response))
    }

    async fn strip(&self, ctx: &DetectorContext<'_>, event: &PrivilegedActionEvent) -> NukeResponse {
        let untouched = NukeResponse {
            manageable: false,
            roles_removed: Vec::new(),
        };
        let member = match ctx.gateway.member(event.guild, event.executor).await {
            Ok(Some(member)) => member,
            Ok(None) => return untouched,
            Err(e) => {
                warn!(target: EVENT_TARGET, "Could not fetch executor {}: {e}", event.executor);
                return untouched;
            }
        };
        match ctx.gateway.can_manage(event.guild, event.executor).await {
            Ok(true) => {}
            Ok(false) => return untouched,
            Err(e) => {
                warn!(target: EVENT_TARGET, "Could not check hierarchy for {}: {e}", event.executor);
                return untouched;
            }
        }
        match ctx
            .gateway
            .set_roles(event.guild, event.executor, Vec::new(), STRIP_REASON)
            .await
        {
            Ok(()) => {
                info!(target: EVENT_TARGET, "Stripped {} roles from {}", member.roles.len(), event.executor);
                NukeResponse {
                    manageable: true,
                    roles_removed: member.roles,
                }
            }
            Err(e) => {
                warn!(target: EVENT_TARGET, "Could not strip roles from {}: {e}", event.executor);
                NukeResponse {
                    manageable: true,
                    roles_removed: Vec::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::platform::{MemberSummary, MockGateway, UserSummary};
    use crate::store::MemoryRecordStore;
    use crate::testing::{self, ADMIN_ROLE, Call, FakeGateway, GUILD, LOG_CHANNEL, OWNER};
    use std::sync::Arc;

    fn event(executor: u64) -> PrivilegedActionEvent {
        PrivilegedActionEvent {
            guild: GUILD,
            action: PrivilegedAction::ChannelDelete,
            executor: UserId::new(executor),
            target_id: Some(555),
        }
    }

    #[tokio::test]
    async fn test_executor_is_stripped_and_reported() {
        let audit = AuditLog::new(Arc::new(MemoryRecordStore::new()));
        let config = testing::config();
        let gateway = FakeGateway::new().with_member(7, &[ADMIN_ROLE], 5);
        let ctx = DetectorContext {
            gateway: &gateway,
            audit: &audit,
            config: &config,
        };

        let response = PrivilegedActionDetector::new()
            .on_audit_entry(&ctx, &event(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.roles_removed, vec![ADMIN_ROLE]);
        assert!(gateway.roles_of(7).is_empty());
        assert!(gateway.calls().contains(&Call::SetRoles(UserId::new(7), Vec::new())));

        let records = audit.of_kind(kind::ANTI_NUKE).await.unwrap();
        assert_eq!(records[0].payload["action"], "channel_delete");
        assert_eq!(records[0].payload["target_id"], "555");
        assert_eq!(records[0].payload["manageable"], true);
        let posts = gateway.posts_to(LOG_CHANNEL);
        assert_eq!(posts[0]["embeds"][0]["title"], "🚨 Nuke Action Blocked");
    }

    #[tokio::test]
    async fn test_unmanageable_executor_is_still_reported() {
        let audit = AuditLog::new(Arc::new(MemoryRecordStore::new()));
        let config = testing::config();
        let gateway = FakeGateway::new()
            .with_member(7, &[ADMIN_ROLE], 5)
            .with_protected(7);
        let ctx = DetectorContext {
            gateway: &gateway,
            audit: &audit,
            config: &config,
        };

        let response = PrivilegedActionDetector::new()
            .on_audit_entry(&ctx, &event(7))
            .await
            .unwrap()
            .unwrap();
        assert!(!response.manageable);
        assert!(response.roles_removed.is_empty());
        assert_eq!(gateway.roles_of(7), vec![ADMIN_ROLE]);

        let records = audit.of_kind(kind::ANTI_NUKE).await.unwrap();
        assert_eq!(records[0].payload["manageable"], false);
        assert_eq!(records[0].payload["roles_removed"], json!([]));
        assert_eq!(gateway.posts_to(LOG_CHANNEL).len(), 1);
    }

    #[tokio::test]
    async fn test_owner_and_bots_are_exempt() {
        let audit = AuditLog::new(Arc::new(MemoryRecordStore::new()));
        let config = testing::config();
        let gateway = FakeGateway::new().with_bot(8);
        let ctx = DetectorContext {
            gateway: &gateway,
            audit: &audit,
            config: &config,
        };
        let detector = PrivilegedActionDetector::new();

        assert_eq!(detector.on_audit_entry(&ctx, &event(OWNER.get())).await.unwrap(), None);
        assert_eq!(detector.on_audit_entry(&ctx, &event(8)).await.unwrap(), None);
        assert!(gateway.calls().is_empty());
        assert!(audit.of_kind(kind::ANTI_NUKE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_strip_reports_no_roles_removed() {
        let audit = AuditLog::new(Arc::new(MemoryRecordStore::new()));
        let config = testing::config();
        let mut gateway = MockGateway::new();
        let executor = UserSummary {
            id: UserId::new(7),
            tag: "rogue".to_string(),
            bot: false,
            avatar_url: String::new(),
        };
        let summary = executor.clone();
        gateway
            .expect_user()
            .returning(move |_| Ok(summary.clone()));
        gateway.expect_member().returning(move |_, _| {
            Ok(Some(MemberSummary {
                user: executor.clone(),
                roles: vec![ADMIN_ROLE],
                top_role_position: 5,
            }))
        });
        gateway.expect_can_manage().returning(|_, _| Ok(true));
        gateway.expect_set_roles().times(1).returning(|_, _, _, _| {
            Err(crate::platform::GatewayError::Rejected("Missing Permissions".to_string()))
        });
        gateway.expect_post().times(1).returning(|_, _| Ok(poise::serenity_prelude::MessageId::new(1)));
        let ctx = DetectorContext {
            gateway: &gateway,
            audit: &audit,
            config: &config,
        };

        let response = PrivilegedActionDetector::new()
            .on_audit_entry(&ctx, &event(7))
            .await
            .unwrap()
            .unwrap();
        assert!(response.roles_removed.is_empty());
        let records = audit.of_kind(kind::ANTI_NUKE).await.unwrap();
        assert_eq!(records[0].payload["executor_tag"], "rogue");
    }
}
