//! `/modpanel`: buttons that run the moderation commands against one user.

use super::{COLOUR_INFO, post_log};
use crate::audit::kind;
use crate::custom_id::mod_panel_id;
use crate::error::ModerationResult;
use crate::platform::Reply;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    ButtonStyle, CommandOptionType, CreateActionRow, CreateButton, CreateCommand,
    CreateCommandOption, CreateEmbed, CreateEmbedFooter, CreateMessage, Timestamp, UserId,
};
use serde_json::json;

pub fn handler() -> CommandHandler {
    CommandHandler::new("modpanel", definition, execute)
}

fn definition() -> CreateCommand {
    CreateCommand::new("modpanel")
        .description("Open an interactive moderation panel for a user")
        .add_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "The user to moderate")
                .required(true),
        )
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    open(inv).boxed()
}

fn panel_button(action: &str, subject: UserId, label: &str, style: ButtonStyle) -> CreateButton {
    CreateButton::new(mod_panel_id(action, subject))
        .label(label)
        .style(style)
}

#[must_use]
pub fn panel_rows(subject: UserId) -> Vec<CreateActionRow> {
    vec![
        CreateActionRow::Buttons(vec![
            panel_button("warn", subject, "⚠️ Warn", ButtonStyle::Primary),
            panel_button("kick", subject, "👢 Kick", ButtonStyle::Secondary),
            panel_button("mute", subject, "🔇 Mute", ButtonStyle::Secondary),
            panel_button("ban", subject, "🔨 Ban", ButtonStyle::Danger),
            panel_button("note", subject, "📝 Note", ButtonStyle::Success),
        ]),
        CreateActionRow::Buttons(vec![panel_button(
            "history",
            subject,
            "📖 View History",
            ButtonStyle::Secondary,
        )]),
    ]
}

async fn open(inv: Invocation<'_>) -> ModerationResult<()> {
    inv.guild()?;
    inv.require_admin().await?;
    let subject = inv.subject().await?;
    let actor = inv.actor();

    inv.data
        .audit
        .record(
            kind::MODPANEL_OPENED,
            json!({
                "user_id": subject.id.to_string(),
                "user_tag": subject.tag,
                "moderator_id": actor.id.to_string(),
                "moderator_tag": actor.tag,
                "channel_id": inv.interaction.channel_id.to_string(),
            }),
        )
        .await?;

    let log = CreateEmbed::new()
        .title("📟 Mod Panel Opened")
        .colour(COLOUR_INFO)
        .field("User", format!("<@{}> ({})", subject.id, subject.tag), true)
        .field("Moderator", format!("<@{}> ({})", actor.id, actor.tag), true)
        .field("Channel", format!("<#{}>", inv.interaction.channel_id), false)
        .timestamp(Timestamp::now());
    post_log(&inv, CreateMessage::new().embed(log)).await;

    let panel = CreateEmbed::new()
        .title("🔧 Moderation Panel")
        .description(format!("Take action on <@{}>", subject.id))
        .field("User", format!("{} ({})", subject.tag, subject.id), false)
        .colour(COLOUR_INFO)
        .footer(CreateEmbedFooter::new(format!("Requested by {}", actor.tag)))
        .timestamp(Timestamp::now());
    inv.respond(
        Reply::default()
            .embed(panel)
            .components(panel_rows(subject.id))
            .private(),
    )
    .await
}
