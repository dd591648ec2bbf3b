//! `/note`: attach a private staff note to a user's history.

use super::{COLOUR_INFO, moderation, post_log};
use crate::audit::kind;
use crate::custom_id::ComponentId;
use crate::error::{ModerationError, ModerationResult};
use crate::pending::ActionKind;
use crate::platform::Reply;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{CreateCommand, CreateEmbed, CreateMessage, Timestamp};
use serde_json::json;

pub fn handler() -> CommandHandler {
    CommandHandler::new("note", definition, execute)
        .opens_modal()
        .modal_submit(submit)
}

fn definition() -> CreateCommand {
    moderation::definition(ActionKind::Note, "Add a staff note to a user's history")
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::open(inv, ActionKind::Note).boxed()
}

fn submit(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    save(inv).boxed()
}

async fn save(inv: Invocation<'_>) -> ModerationResult<()> {
    let guild = inv.guild()?;
    inv.require_admin().await?;
    let subject = inv
        .component
        .and_then(ComponentId::subject)
        .ok_or_else(|| ModerationError::StaleSession(ActionKind::Note.expired_message().into()))?;
    let note = inv
        .field(moderation::REASON_FIELD)
        .map(str::trim)
        .filter(|note| !note.is_empty())
        .ok_or_else(|| ModerationError::invalid("⚠️ The note can't be empty."))?;

    let actor = inv.actor();
    inv.data
        .audit
        .record(
            kind::NOTE,
            json!({
                "user_id": subject.to_string(),
                "moderator_id": actor.id.to_string(),
                "moderator_tag": actor.tag,
                "note": note,
                "reason": note,
                "guild_id": guild.to_string(),
                "channel_id": inv.interaction.channel_id.to_string(),
            }),
        )
        .await?;

    let embed = CreateEmbed::new()
        .title("📝 Note added")
        .colour(COLOUR_INFO)
        .field("User", format!("<@{subject}>"), true)
        .field("Moderator", format!("<@{}>", actor.id), true)
        .field("Note", note, false)
        .timestamp(Timestamp::now());
    post_log(&inv, CreateMessage::new().embed(embed)).await;

    inv.respond(Reply::ephemeral(format!("📝 Note saved for <@{subject}>.")))
        .await
}
