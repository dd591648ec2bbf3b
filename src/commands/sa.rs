//! `/sa`: DM a user a council message and echo it to the channel as hex.

use super::{COLOUR_DANGER, notify, post_log, truncate};
use crate::audit::kind;
use crate::error::{ModerationError, ModerationResult};
use crate::platform::Reply;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    CommandOptionType, CreateCommand, CreateCommandOption, CreateEmbed, CreateMessage, Timestamp,
};
use serde_json::json;

pub const DM_FAILED: &str = "⚠️ Could not DM the user (they may have DMs off).";
const EMPTY_MESSAGE: &str = "❌ The message cannot be empty.";
const MAX_HEX: usize = 2000;

pub fn handler() -> CommandHandler {
    CommandHandler::new("sa", definition, execute)
}

fn definition() -> CreateCommand {
    CreateCommand::new("sa")
        .description("ADMIN: DM a user a council message and post it obfuscated")
        .add_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "Target user").required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "message", "Message to send")
                .required(true),
        )
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    annihilate(inv).boxed()
}

/// Lowercase hex of the UTF-8 bytes, cut to `max` digits.
fn obfuscate(message: &str, max: usize) -> String {
    let mut hex: String = message.bytes().map(|byte| format!("{byte:02x}")).collect();
    hex.truncate(max);
    hex
}

async fn annihilate(inv: Invocation<'_>) -> ModerationResult<()> {
    inv.guild()?;
    inv.require_admin().await?;
    let target = inv.subject().await?;
    let message = inv
        .options
        .string("message")
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .ok_or_else(|| ModerationError::invalid(EMPTY_MESSAGE))?;
    let hex = obfuscate(message, MAX_HEX);
    let actor = inv.actor();

    inv.respond(Reply::public(format!("📡 <@{}>: `{hex}`", target.id)))
        .await?;

    let dm = CreateEmbed::new()
        .title("💀 Council message")
        .description(truncate(message, 4000))
        .colour(COLOUR_DANGER)
        .timestamp(Timestamp::now());
    if !notify(&inv, target.id, dm).await {
        inv.respond(Reply::ephemeral(DM_FAILED)).await?;
    }

    inv.data
        .audit
        .record(
            kind::SESSION_ANNIHILATED,
            json!({
                "user_id": target.id.to_string(),
                "admin_id": actor.id.to_string(),
                "channel_id": inv.interaction.channel_id.to_string(),
                "original": message,
                "hex": hex,
            }),
        )
        .await?;

    let embed = CreateEmbed::new()
        .title("💀 Session Annihilated")
        .colour(COLOUR_DANGER)
        .field("User", format!("<@{}> ({})", target.id, target.tag), false)
        .field("By Admin", format!("<@{}>", actor.id), true)
        .field("Channel", format!("<#{}>", inv.interaction.channel_id), true)
        .field("Message (DM)", truncate(message, 1024), false)
        .field("Obfuscated (Chat)", truncate(&hex, 1024), false)
        .timestamp(Timestamp::now());
    post_log(&inv, CreateMessage::new().embed(embed)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{CommandOptions, OptionValue};
    use crate::registry::NOT_ADMIN;
    use crate::router::route;
    use crate::testing::{self, ADMIN_ROLE, Call, FakeGateway, FakeResponder, LOG_CHANNEL};
    use poise::serenity_prelude::UserId;

    fn options(user: u64, message: &str) -> CommandOptions {
        CommandOptions::new()
            .with("user", OptionValue::User(UserId::new(user)))
            .with("message", OptionValue::String(message.to_string()))
    }

    #[test]
    fn test_obfuscate_is_hex_of_utf8() {
        assert_eq!(obfuscate("Hi", MAX_HEX), "4869");
        assert_eq!(obfuscate("é", MAX_HEX), "c3a9");
        assert_eq!(obfuscate("abc", 4), "6162");
    }

    #[tokio::test]
    async fn test_admin_sends_council_message() {
        let data = testing::data();
        let (fake, gateway) = testing::shared(
            FakeGateway::new()
                .with_member(5, &[ADMIN_ROLE], 3)
                .with_member(9, &[], 1),
        );
        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(5, "sa", options(9, "Hi"))).await;

        assert_eq!(responder.messages(), vec!["📡 <@9>: `4869`".to_string()]);
        assert!(!responder.replies()[0].ephemeral);
        assert!(fake.calls().contains(&Call::DirectMessage(UserId::new(9))));

        let records = data.audit.of_kind(kind::SESSION_ANNIHILATED).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["hex"], "4869");
        assert_eq!(records[0].payload["admin_id"], "5");
        let logs = fake.posts_to(LOG_CHANNEL);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["embeds"][0]["title"], "💀 Session Annihilated");
    }

    #[tokio::test]
    async fn test_closed_dms_are_reported_privately() {
        let data = testing::data();
        let (_, gateway) = testing::shared(
            FakeGateway::new()
                .with_member(5, &[ADMIN_ROLE], 3)
                .with_user(9)
                .with_closed_dms(9),
        );
        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(5, "sa", options(9, "Hi"))).await;

        assert_eq!(responder.follow_up_contents(), vec![DM_FAILED.to_string()]);
        let replies = responder.replies();
        assert!(replies[1].ephemeral);
        assert_eq!(
            data.audit.of_kind(kind::SESSION_ANNIHILATED).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_members_cannot_send_council_messages() {
        let data = testing::data();
        let (fake, gateway) = testing::shared(
            FakeGateway::new()
                .with_member(7, &[], 1)
                .with_member(9, &[], 1),
        );
        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(7, "sa", options(9, "Hi"))).await;

        assert_eq!(responder.messages(), vec![NOT_ADMIN.to_string()]);
        assert!(fake.calls().is_empty());
        assert!(data.audit.of_kind(kind::SESSION_ANNIHILATED).await.unwrap().is_empty());
    }
}
