use super::{COLOUR_INFO, post_log};
use crate::audit::kind;
use crate::error::ModerationResult;
use crate::platform::Reply;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    CreateCommand, CreateEmbed, CreateEmbedFooter, CreateMessage, Timestamp,
};
use serde_json::json;

pub fn handler() -> CommandHandler {
    CommandHandler::new("help", definition, execute)
}

fn definition() -> CreateCommand {
    CreateCommand::new("help").description("List all bot commands and features.")
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    show(inv).boxed()
}

fn moderation_lines(owner: bool) -> String {
    let mut lines = vec![
        "`/modpanel <user>` - Open mod panel with buttons",
        "`/warn <user>` `/kick <user>` `/mute <user>` `/ban <user>` - Sanction with confirmation",
        "`/note <user>` - Add a staff note",
        "`/strike <user> <reason>` - Issue a strike for approval",
        "`/history <user>` - View a user's moderation history",
        "`/sa <user> <message>` - DM a council message, echo it as hex",
    ];
    if owner {
        lines.push("`/approve <strike_id>` - Approve a strike");
        lines.push("`/deny <strike_id>` - Deny a strike");
    }
    lines.join("\n")
}

async fn show(inv: Invocation<'_>) -> ModerationResult<()> {
    let actor = inv.actor();
    let embed = CreateEmbed::new()
        .title("📖 Bot Help")
        .colour(COLOUR_INFO)
        .description("Here are the available commands:")
        .field("🛡️ Moderation", moderation_lines(inv.is_owner()), false)
        .field(
            "📦 Utilities",
            [
                "`/help` - Show this help panel",
                "`/whois [user|id]` - Paged profile of a user",
                "`/status` - Show whether the bot is locked down",
                "`/selfroles add|remove|publish` - Manage the self roles panel",
                "`/lockdown` `/unlock` - Toggle maintenance mode (developers)",
                "`/devupdate <update>` - Post a developer update (developers)",
            ]
            .join("\n"),
            false,
        )
        .field(
            "🕵️ Security (Automatic)",
            [
                "• Raid detection (5+ joins in 10s)",
                "• Spam auto-mute (rate, duplicates, mentions, caps, links)",
                "• Anti-nuke protection (strips roles)",
                "• All actions are logged to the log channel",
            ]
            .join("\n"),
            false,
        )
        .footer(CreateEmbedFooter::new(format!("Requested by {}", actor.tag)))
        .timestamp(Timestamp::now());
    inv.respond(Reply::default().embed(embed).private()).await?;

    inv.data
        .audit
        .record(
            kind::HELP_USED,
            json!({
                "user_id": actor.id.to_string(),
                "user_tag": actor.tag,
            }),
        )
        .await?;

    let log = CreateEmbed::new()
        .title("📘 Help Command Used")
        .colour(COLOUR_INFO)
        .field("User", format!("<@{}> ({})", actor.id, actor.tag), true)
        .footer(CreateEmbedFooter::new("Help Panel Accessed"))
        .timestamp(Timestamp::now());
    post_log(&inv, CreateMessage::new().embed(log)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::CommandOptions;
    use crate::router::route;
    use crate::testing::{self, FakeGateway, FakeResponder, LOG_CHANNEL};

    #[test]
    fn test_owner_sees_approval_commands() {
        assert!(moderation_lines(true).contains("/approve"));
        assert!(!moderation_lines(false).contains("/approve"));
    }

    #[tokio::test]
    async fn test_help_is_private_and_audited() {
        let data = testing::data();
        let (fake, gateway) = testing::shared(FakeGateway::new());
        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(5, "help", CommandOptions::new())).await;

        let replies = responder.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].ephemeral);
        assert_eq!(data.audit.for_user("5").await.unwrap()[0].kind, kind::HELP_USED);
        assert_eq!(fake.posts_to(LOG_CHANNEL).len(), 1);
    }
}
