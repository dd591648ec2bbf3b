//! `/lockdown`, `/unlock` and `/status`.

use super::{COLOUR_DANGER, COLOUR_SUCCESS};
use crate::audit::kind;
use crate::error::ModerationResult;
use crate::platform::Reply;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    CommandOptionType, CreateCommand, CreateCommandOption, CreateEmbed, Timestamp,
};
use serde_json::json;

pub const LOCKED_STATUS: &str = "🔒 Bot is in **lockdown**.";
pub const UNLOCKED_STATUS: &str = "🔓 Bot is **unlocked**.";
const NO_REASON: &str = "No reason provided";

pub fn lockdown_handler() -> CommandHandler {
    CommandHandler::new("lockdown", lockdown_definition, run_lockdown)
}

pub fn unlock_handler() -> CommandHandler {
    CommandHandler::new("unlock", unlock_definition, run_unlock)
}

pub fn status_handler() -> CommandHandler {
    CommandHandler::new("status", status_definition, run_status)
}

fn lockdown_definition() -> CreateCommand {
    CreateCommand::new("lockdown")
        .description("DEV ONLY: Lock the bot (disable all commands for non-devs)")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "reason",
            "Why locking",
        ))
}

fn unlock_definition() -> CreateCommand {
    CreateCommand::new("unlock")
        .description("DEV ONLY: Lift the global lockdown")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "reason",
            "Why unlocking",
        ))
}

fn status_definition() -> CreateCommand {
    CreateCommand::new("status").description("Show bot status (lockdown)")
}

fn run_lockdown(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    switch(inv, true).boxed()
}

fn run_unlock(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    switch(inv, false).boxed()
}

fn run_status(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    status(inv).boxed()
}

async fn switch(inv: Invocation<'_>, enabled: bool) -> ModerationResult<()> {
    inv.guild()?;
    inv.require_dev().await?;
    let reason = inv
        .options
        .string("reason")
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .unwrap_or(NO_REASON);
    let actor = inv.actor();

    inv.data.lockdown.set(enabled, actor).await?;
    inv.data
        .audit
        .record(
            kind::LOCKDOWN_CHANGED,
            json!({
                "enabled": enabled,
                "actor_id": actor.id.to_string(),
                "actor_tag": actor.tag,
                "reason": reason,
            }),
        )
        .await?;

    let embed = if enabled {
        CreateEmbed::new()
            .title("🔒 Global Lockdown Enabled")
            .description("All commands/components are now disabled for non-devs.")
            .colour(COLOUR_DANGER)
    } else {
        CreateEmbed::new()
            .title("🔓 Global Lockdown Lifted")
            .description("Commands and components are available to everyone again.")
            .colour(COLOUR_SUCCESS)
    };
    let embed = embed
        .field("By", format!("<@{}>", actor.id), true)
        .field("Reason", reason, false)
        .timestamp(Timestamp::now());
    inv.respond(Reply::default().embed(embed)).await
}

async fn status(inv: Invocation<'_>) -> ModerationResult<()> {
    let text = if inv.data.lockdown.get().await {
        LOCKED_STATUS
    } else {
        UNLOCKED_STATUS
    };
    inv.respond(Reply::ephemeral(text)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::CommandOptions;
    use crate::router::{MAINTENANCE_NOTICE, route};
    use crate::testing::{self, DEV_ROLE, FakeGateway, FakeResponder};

    #[tokio::test]
    async fn test_dev_locks_and_unlocks() {
        let data = testing::data();
        let (_, gateway) = testing::shared(
            FakeGateway::new()
                .with_member(6, &[DEV_ROLE], 2)
                .with_member(7, &[], 1),
        );

        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(6, "lockdown", CommandOptions::new())).await;
        assert_eq!(responder.replies().len(), 1);
        assert!(data.lockdown.get().await);

        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(7, "status", CommandOptions::new())).await;
        assert_eq!(responder.messages(), vec![LOCKED_STATUS.to_string()]);

        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(7, "help", CommandOptions::new())).await;
        assert_eq!(responder.messages(), vec![MAINTENANCE_NOTICE.to_string()]);

        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(6, "unlock", CommandOptions::new())).await;
        assert!(!data.lockdown.get().await);

        let changes = data.audit.of_kind(kind::LOCKDOWN_CHANGED).await.unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.payload["reason"] == NO_REASON));
    }

    #[tokio::test]
    async fn test_members_cannot_lock() {
        let data = testing::data();
        let (_, gateway) = testing::shared(FakeGateway::new().with_member(7, &[], 1));
        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(7, "lockdown", CommandOptions::new())).await;
        assert_eq!(responder.messages(), vec![crate::registry::NOT_DEV.to_string()]);
        assert!(!data.lockdown.get().await);
    }
}
