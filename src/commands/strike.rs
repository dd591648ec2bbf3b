//! `/strike`, `/approve` and `/deny`.
//!
//! Staff issue unapproved strikes. Only the owner approves or denies them, and
//! every approval re-checks the discipline threshold.

use super::{COLOUR_DANGER, COLOUR_WARNING, post_log, truncate};
use crate::EVENT_TARGET;
use crate::audit::kind;
use crate::error::{ModerationError, ModerationResult};
use crate::platform::{Reply, Suggestion};
use crate::registry::{CommandHandler, Invocation};
use crate::strikes::{ApprovalOutcome, StrikeRecord};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    CommandOptionType, CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedFooter,
    CreateMessage, Timestamp,
};
use serde_json::json;
use tracing::warn;

pub const NOT_FOUND: &str = "❌ Strike not found.";
pub const ALREADY_APPROVED: &str = "⚠️ This strike has already been approved.";
const MAX_SUGGESTIONS: usize = 25;

pub fn strike_handler() -> CommandHandler {
    CommandHandler::new("strike", strike_definition, run_strike)
}

pub fn approve_handler() -> CommandHandler {
    CommandHandler::new("approve", approve_definition, run_approve).autocomplete(autocomplete)
}

pub fn deny_handler() -> CommandHandler {
    CommandHandler::new("deny", deny_definition, run_deny).autocomplete(autocomplete)
}

fn run_strike(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    issue(inv).boxed()
}

fn run_approve(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    approve(inv).boxed()
}

fn run_deny(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    deny(inv).boxed()
}

fn autocomplete(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    suggest_pending(inv).boxed()
}

fn strike_definition() -> CreateCommand {
    CreateCommand::new("strike")
        .description("Issue a strike to a user (requires owner approval)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "User to strike")
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "reason", "Reason for the strike")
                .required(true)
                .max_length(1000),
        )
}

fn id_option() -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, "id", "Strike ID")
        .required(true)
        .set_autocomplete(true)
}

fn approve_definition() -> CreateCommand {
    CreateCommand::new("approve")
        .description("Approve a pending strike")
        .add_option(id_option())
}

fn deny_definition() -> CreateCommand {
    CreateCommand::new("deny")
        .description("Deny a pending strike")
        .add_option(id_option())
}

async fn issue(inv: Invocation<'_>) -> ModerationResult<()> {
    let guild = inv.guild()?;
    inv.require_admin().await?;
    let subject = inv.subject().await?;
    let reason = inv
        .options
        .string("reason")
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .ok_or_else(|| ModerationError::invalid("⚠️ A reason is required."))?;
    let actor = inv.actor();

    let strike = inv
        .data
        .strikes
        .issue(
            &guild.to_string(),
            &subject.id.to_string(),
            reason,
            &actor.id.to_string(),
            false,
        )
        .await?;
    inv.data
        .audit
        .record(
            kind::STRIKE_ISSUED,
            json!({
                "strike_id": strike.id,
                "user_id": strike.user_id,
                "user_tag": subject.tag,
                "moderator_id": actor.id.to_string(),
                "moderator_tag": actor.tag,
                "reason": reason,
                "approved": false,
                "channel_id": inv.interaction.channel_id.to_string(),
            }),
        )
        .await?;

    let embed = CreateEmbed::new()
        .title("⚠️ Strike Issued (Pending Approval)")
        .colour(COLOUR_WARNING)
        .field("User", format!("<@{}> ({})", subject.id, subject.tag), true)
        .field("Moderator", format!("<@{}> ({})", actor.id, actor.tag), true)
        .field("Reason", reason, false)
        .field("Strike ID", &strike.id, false)
        .field("Approved", "❌ No (requires owner)", false)
        .timestamp(Timestamp::now());
    post_log(&inv, CreateMessage::new().embed(embed)).await;

    inv.respond(Reply::ephemeral(format!(
        "✅ Strike `{}` issued to {}. Awaiting approval.",
        strike.id, subject.tag
    )))
    .await
}

fn strike_id<'a>(inv: &Invocation<'a>) -> ModerationResult<&'a str> {
    inv.options
        .string("id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ModerationError::invalid(NOT_FOUND))
}

async fn approve(inv: Invocation<'_>) -> ModerationResult<()> {
    inv.require_owner()?;
    let id = strike_id(&inv)?;

    let outcome = inv.data.strikes.approve(id).await?;
    let (strike, approved) = match &outcome {
        ApprovalOutcome::NotFound => return inv.respond(Reply::ephemeral(NOT_FOUND)).await,
        ApprovalOutcome::AlreadyApproved => {
            return inv.respond(Reply::ephemeral(ALREADY_APPROVED)).await;
        }
        ApprovalOutcome::Approved { strike, approved } => (strike, approved),
    };
    if outcome.triggers_discipline() {
        post_discipline(&inv, &strike.user_id, approved).await;
    }

    let actor = inv.actor();
    inv.data
        .audit
        .record(
            kind::STRIKE_APPROVED,
            json!({
                "strike_id": strike.id,
                "user_id": strike.user_id,
                "reason": strike.reason,
                "approved_by": { "id": actor.id.to_string(), "tag": actor.tag },
                "approved_count": approved.len(),
            }),
        )
        .await?;

    inv.respond(Reply::public(format!(
        "✅ Strike `{}` approved by <@{}>. <@{}> now has **{}** approved strike(s).",
        strike.id,
        actor.id,
        strike.user_id,
        approved.len()
    )))
    .await
}

/// Summary of every approved strike, sent to the discipline channel.
fn discipline_embed(user_id: &str, approved: &[StrikeRecord]) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("🚨 Discipline Triggered")
        .description(format!(
            "<@{user_id}> has received {} approved strikes.",
            approved.len()
        ))
        .colour(COLOUR_DANGER)
        .footer(CreateEmbedFooter::new("StrikeGuard Auto Discipline"))
        .timestamp(Timestamp::now());
    for (n, strike) in approved.iter().enumerate().take(25) {
        embed = embed.field(
            format!("Strike {}", n + 1),
            format!(
                "**Reason:** {}\n**Date:** <t:{}:f>",
                truncate(&strike.reason, 900),
                strike.created_at.timestamp()
            ),
            false,
        );
    }
    embed
}

async fn post_discipline(inv: &Invocation<'_>, user_id: &str, approved: &[StrikeRecord]) {
    let channel = inv.data.config.discipline_channel_id;
    let message = CreateMessage::new().embed(discipline_embed(user_id, approved));
    if let Err(e) = inv.gateway.post(channel, message).await {
        warn!(
            target: EVENT_TARGET,
            "Failed to post discipline notice to {channel}: {e}"
        );
    }
}

async fn deny(inv: Invocation<'_>) -> ModerationResult<()> {
    inv.require_owner()?;
    let id = strike_id(&inv)?;
    let Some(strike) = inv.data.strikes.deny(id).await? else {
        return inv.respond(Reply::ephemeral(NOT_FOUND)).await;
    };

    let actor = inv.actor();
    inv.data
        .audit
        .record(
            kind::STRIKE_DENIED,
            json!({
                "strike_id": strike.id,
                "user_id": strike.user_id,
                "denied_by": { "id": actor.id.to_string(), "tag": actor.tag },
                "strike": strike,
            }),
        )
        .await?;

    inv.respond(Reply::public(format!(
        "❌ Strike `{}` has been denied and removed.",
        strike.id
    )))
    .await
}

/// Pending strike ids of this guild matching what the owner typed.
async fn suggest_pending(inv: Invocation<'_>) -> ModerationResult<()> {
    let (Ok(guild), true) = (inv.guild(), inv.is_owner()) else {
        inv.responder.suggest(Vec::new()).await?;
        return Ok(());
    };
    let typed = inv.options.focused().map_or("", |(_, value)| value.trim());
    let choices = inv
        .data
        .strikes
        .pending(&guild.to_string(), typed)
        .await?
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|strike| Suggestion {
            name: truncate(&format!("{} • {}", strike.id, strike.reason), 100),
            value: strike.id,
        })
        .collect();
    inv.responder.suggest(choices).await?;
    Ok(())
}
