//! Confirm flow shared by warn, kick, mute and ban.
//!
//! The command opens a reason modal for the chosen subject. The submitted
//! modal stages a `PendingAction` and answers with confirm and cancel
//! buttons. Confirm claims the pending entry, notifies the subject, applies
//! the sanction, schedules a timed reversal and writes the audit record.

use super::{COLOUR_DANGER, COLOUR_WARNING, notify, post_log, truncate};
use crate::EVENT_TARGET;
use crate::audit::kind;
use crate::custom_id::ComponentId;
use crate::duration::parse_duration;
use crate::error::{ModerationError, ModerationResult};
use crate::expiry::{ReversalKind, ScheduledReversal};
use crate::pending::{ActionKind, PendingAction, PendingKey};
use crate::platform::{MemberSummary, Reply, UserSummary};
use crate::registry::Invocation;
use crate::router::BUTTON_NOT_WIRED;
use poise::serenity_prelude::{
    ButtonStyle, CommandOptionType, CreateActionRow, CreateButton, CreateCommand,
    CreateCommandOption, CreateEmbed, CreateInputText, CreateMessage, CreateModal, GuildId,
    InputTextStyle, Timestamp, UserId,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const REASON_FIELD: &str = "reason";
pub const DURATION_FIELD: &str = "duration";
pub const INVALID_DURATION: &str = "❌ Invalid duration format.";
pub const REASON_REQUIRED: &str = "⚠️ A reason is required.";
pub const NOT_IN_GUILD: &str = "❌ That user is not in this server.";

#[must_use]
pub fn title(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Warn => "Warn",
        ActionKind::Kick => "Kick",
        ActionKind::Mute => "Mute",
        ActionKind::Ban => "Ban",
        ActionKind::Note => "Note",
    }
}

fn past_tense(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Warn => "warned",
        ActionKind::Kick => "kicked",
        ActionKind::Mute => "muted",
        ActionKind::Ban => "banned",
        ActionKind::Note => "noted",
    }
}

fn audit_kind(action: ActionKind) -> &'static str {
    match action {
        ActionKind::Warn => kind::WARN,
        ActionKind::Kick => kind::KICK,
        ActionKind::Mute => kind::MUTE,
        ActionKind::Ban => kind::BAN,
        ActionKind::Note => kind::NOTE,
    }
}

fn stale(kind: ActionKind) -> ModerationError {
    ModerationError::StaleSession(kind.expired_message().to_string())
}

/// `/<kind> user:<member>`
#[must_use]
pub fn definition(kind: ActionKind, description: &str) -> CreateCommand {
    CreateCommand::new(kind.to_string())
        .description(description)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::User,
                "user",
                format!("The user to {kind}"),
            )
            .required(true),
        )
}

/// Modal asking for the reason, and a duration where the kind takes one.
#[must_use]
pub fn reason_modal(kind: ActionKind, subject: &UserSummary) -> CreateModal {
    let custom_id = ComponentId::new(&kind.to_string())
        .action("modal")
        .id(subject.id.get())
        .to_string();
    let label = if kind == ActionKind::Note { "Note" } else { "Reason" };
    let mut rows = vec![CreateActionRow::InputText(
        CreateInputText::new(InputTextStyle::Paragraph, label, REASON_FIELD)
            .required(true)
            .max_length(1000),
    )];
    match kind {
        ActionKind::Mute => rows.push(CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "Duration (e.g. 10m, 2h, 1d)", DURATION_FIELD)
                .required(true)
                .max_length(16),
        )),
        ActionKind::Ban => rows.push(CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "Duration (blank for permanent)", DURATION_FIELD)
                .required(false)
                .max_length(16),
        )),
        _ => {}
    }
    CreateModal::new(
        custom_id,
        truncate(&format!("{} {}", title(kind), subject.tag), 45),
    )
    .components(rows)
}

/// Step one: check the actor and subject, then open the reason modal.
///
/// # Errors
///
/// Permission, subject and hierarchy failures, or a failed acknowledgement.
pub async fn open(inv: Invocation<'_>, kind: ActionKind) -> ModerationResult<()> {
    let guild = inv.guild()?;
    inv.require_admin().await?;
    let subject = inv.subject().await?;
    if kind != ActionKind::Note {
        check_target(&inv, guild, &subject, kind).await?;
    }
    inv.responder.show_modal(reason_modal(kind, &subject)).await?;
    Ok(())
}

/// Refuse sanctions against bots, the actor, the owner and anyone the
/// actor or the bot does not outrank.
async fn check_target(
    inv: &Invocation<'_>,
    guild: GuildId,
    subject: &UserSummary,
    kind: ActionKind,
) -> ModerationResult<()> {
    if subject.bot {
        return Err(ModerationError::denied(format!("🤖 You can't {kind} a bot.")));
    }
    if subject.id == inv.actor().id {
        return Err(ModerationError::denied(format!("❌ You can't {kind} yourself.")));
    }
    if subject.id == inv.data.config.owner_id {
        return Err(ModerationError::denied(format!("🚫 You can't {kind} the bot owner.")));
    }

    let Some(target) = inv.gateway.member(guild, subject.id).await? else {
        return Err(ModerationError::invalid(NOT_IN_GUILD));
    };
    if !inv.is_owner() {
        let actor = inv.gateway.member(guild, inv.actor().id).await?;
        if actor.is_none_or(|actor| target.top_role_position >= actor.top_role_position) {
            return Err(ModerationError::denied(format!(
                "⚠️ You can't {kind} a member with an equal or higher role."
            )));
        }
    }
    if kind != ActionKind::Warn && !inv.gateway.can_manage(guild, subject.id).await? {
        return Err(ModerationError::denied(format!(
            "⚠️ I can't {kind} that member because their role is above mine."
        )));
    }
    Ok(())
}

fn prompt(action: &PendingAction) -> String {
    let mut text = format!(
        "Do you want to {} <@{}>?\n\n**Reason:** {}",
        action.kind, action.subject, action.reason
    );
    if matches!(action.kind, ActionKind::Mute | ActionKind::Ban) {
        text.push_str(&format!("\n**Duration:** {}", action.duration_label()));
    }
    if action.kind == ActionKind::Kick {
        text.push_str("\n\nChoose whether to DM them first, then confirm.");
    }
    text
}

fn decision_button(kind: ActionKind, action: &str, subject: UserId) -> CreateButton {
    CreateButton::new(
        ComponentId::new(&kind.to_string())
            .action(action)
            .id(subject.get())
            .to_string(),
    )
}

/// Confirm and cancel buttons, plus the DM choice for kicks.
#[must_use]
pub fn decision_rows(kind: ActionKind, subject: UserId) -> Vec<CreateActionRow> {
    let mut rows = Vec::new();
    if kind == ActionKind::Kick {
        rows.push(CreateActionRow::Buttons(vec![
            decision_button(kind, "dm", subject)
                .label("📨 DM user")
                .style(ButtonStyle::Primary),
            decision_button(kind, "nodm", subject)
                .label("🙈 Don't DM")
                .style(ButtonStyle::Secondary),
        ]));
    }
    rows.push(CreateActionRow::Buttons(vec![
        decision_button(kind, "confirm", subject)
            .label(format!("Confirm {}", title(kind)))
            .style(ButtonStyle::Danger),
        decision_button(kind, "cancel", subject)
            .label("Cancel")
            .style(ButtonStyle::Secondary),
    ]));
    rows
}

/// Step two: stage the submitted modal and ask for confirmation.
///
/// # Errors
///
/// Missing reason, an invalid mute duration, or a failed acknowledgement.
pub async fn stage(inv: Invocation<'_>, kind: ActionKind) -> ModerationResult<()> {
    let guild = inv.guild()?;
    inv.require_admin().await?;
    let subject = inv
        .component
        .and_then(ComponentId::subject)
        .ok_or_else(|| stale(kind))?;
    let reason = inv
        .field(REASON_FIELD)
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .ok_or_else(|| ModerationError::invalid(REASON_REQUIRED))?;

    // Anything that does not parse is permanent, except for mutes which need a length.
    let typed = inv
        .field(DURATION_FIELD)
        .map(str::trim)
        .filter(|text| !text.is_empty());
    let duration = typed.and_then(parse_duration);
    if kind == ActionKind::Mute && duration.is_none() {
        return Err(ModerationError::invalid(INVALID_DURATION));
    }

    let actor = inv.actor();
    let action = PendingAction {
        subject,
        kind,
        moderator_id: actor.id,
        moderator_tag: actor.tag.clone(),
        reason: reason.to_string(),
        duration,
        duration_text: duration.and(typed).map(String::from),
        origin_channel: inv.interaction.channel_id,
        dm_sent: None,
    };
    let text = prompt(&action);
    if inv
        .data
        .pending
        .stage(PendingKey::new(kind, guild, subject), action)
        .is_some()
    {
        debug!(target: EVENT_TARGET, "Replaced pending {kind} for {subject}");
    }
    inv.respond(Reply::ephemeral(text).components(decision_rows(kind, subject)))
        .await
}

/// Step three: a decision button was pressed.
///
/// # Errors
///
/// `StaleSession` when the pending entry is gone, otherwise whatever the
/// sanction or the store reports.
pub async fn decide(inv: Invocation<'_>, kind: ActionKind) -> ModerationResult<()> {
    let guild = inv.guild()?;
    inv.require_admin().await?;
    let component = inv
        .component
        .ok_or_else(|| ModerationError::HandlerMissing(BUTTON_NOT_WIRED.to_string()))?;
    let subject = component.subject().ok_or_else(|| stale(kind))?;
    let key = PendingKey::new(kind, guild, subject);

    match component.action.as_deref() {
        Some("confirm") => confirm(&inv, key).await,
        Some("cancel") => {
            if !inv.data.pending.discard(&key) {
                return Err(stale(kind));
            }
            inv.respond(Reply::ephemeral(format!("❌ {} cancelled.", title(kind))))
                .await
        }
        Some("dm") if kind == ActionKind::Kick => send_kick_notice(&inv, key).await,
        Some("nodm") if kind == ActionKind::Kick => {
            if !inv.data.pending.update(&key, |action| action.dm_sent = Some(false)) {
                return Err(stale(kind));
            }
            inv.respond(Reply::ephemeral(
                "🙈 They will not be messaged. Confirm to kick.",
            ))
            .await
        }
        _ => Err(ModerationError::HandlerMissing(BUTTON_NOT_WIRED.to_string())),
    }
}

/// DM the kick notice now, so the subject gets it while still in the server.
async fn send_kick_notice(inv: &Invocation<'_>, key: PendingKey) -> ModerationResult<()> {
    let action = inv.data.pending.peek(&key).ok_or_else(|| stale(key.kind))?;
    let sent = notify(inv, action.subject, subject_notice(&action, None)).await;
    if !inv.data.pending.update(&key, |action| action.dm_sent = Some(sent)) {
        return Err(stale(key.kind));
    }
    let text = if sent {
        "📨 They have been messaged. Confirm to kick."
    } else {
        "⚠️ Could not DM the user. You can still confirm the kick."
    };
    inv.respond(Reply::ephemeral(text)).await
}

/// Embed DMed to the subject.
fn subject_notice(action: &PendingAction, strikes: Option<u64>) -> CreateEmbed {
    let title = match action.kind {
        ActionKind::Warn => "⚠️ You have received a warning".to_string(),
        kind => format!("You have been {}", past_tense(kind)),
    };
    let mut embed = CreateEmbed::new()
        .title(title)
        .colour(COLOUR_WARNING)
        .field("Reason", &action.reason, false)
        .timestamp(Timestamp::now());
    if matches!(action.kind, ActionKind::Mute | ActionKind::Ban) {
        embed = embed.field("Duration", action.duration_label(), true);
    }
    if let Some(strikes) = strikes {
        embed = embed.field("Approved strikes", strikes.to_string(), true);
    }
    embed
}

async fn confirm(inv: &Invocation<'_>, key: PendingKey) -> ModerationResult<()> {
    let kind = key.kind;
    let guild = key.guild_id;
    let action = inv.data.pending.take(&key).ok_or_else(|| stale(kind))?;
    let subject = inv.resolve_user(action.subject).await?;
    let member = inv.gateway.member(guild, subject.id).await?;
    if member.is_none() {
        return Err(ModerationError::external(NOT_IN_GUILD));
    }

    let strikes = if kind == ActionKind::Warn {
        let (guild_id, user_id) = (guild.to_string(), subject.id.to_string());
        inv.data
            .strikes
            .issue(&guild_id, &user_id, &action.reason, &action.moderator_id.to_string(), true)
            .await?;
        Some(inv.data.strikes.count_approved(&guild_id, &user_id).await?)
    } else {
        None
    };

    let dm_sent = match kind {
        ActionKind::Kick => action.dm_sent.unwrap_or(false),
        _ => notify(inv, subject.id, subject_notice(&action, strikes)).await,
    };

    apply_sanction(inv, guild, &action, member.as_ref()).await?;
    schedule_reversal(inv, guild, &action).await;

    inv.data
        .audit
        .record(
            audit_kind(kind),
            json!({
                "user_id": subject.id.to_string(),
                "user_tag": subject.tag,
                "moderator_id": action.moderator_id.to_string(),
                "moderator_tag": action.moderator_tag,
                "reason": action.reason,
                "duration": action.duration.map(|_| action.duration_label()),
                "guild_id": guild.to_string(),
                "channel_id": action.origin_channel.to_string(),
                "dm_sent": dm_sent,
                "approved_strikes": strikes,
            }),
        )
        .await?;

    post_log(inv, log_message(inv, &action, &subject, dm_sent, strikes)).await;

    let mut text = match strikes {
        Some(count) => format!(
            "✅ Warned <@{}>. They now have **{count}** approved strike(s).",
            subject.id
        ),
        None => format!("✅ <@{}> has been {}.", subject.id, past_tense(kind)),
    };
    if action.duration.is_some() {
        text.push_str(&format!(" Duration: {}.", action.duration_label()));
    }
    if kind != ActionKind::Kick && !dm_sent {
        text.push_str("\n⚠️ Could not DM the user.");
    }
    inv.respond(Reply::ephemeral(text)).await
}

async fn apply_sanction(
    inv: &Invocation<'_>,
    guild: GuildId,
    action: &PendingAction,
    member: Option<&MemberSummary>,
) -> ModerationResult<()> {
    let reason = truncate(
        &format!("{} by {}: {}", title(action.kind), action.moderator_tag, action.reason),
        512,
    );
    let result = match action.kind {
        ActionKind::Kick => inv.gateway.kick(guild, action.subject, &reason).await,
        ActionKind::Ban => inv.gateway.ban(guild, action.subject, &reason).await,
        ActionKind::Mute => {
            let muted = inv.data.config.muted_role_id;
            if member.is_some_and(|member| member.has_role(muted)) {
                Ok(())
            } else {
                inv.gateway
                    .add_role(guild, action.subject, muted, &reason)
                    .await
            }
        }
        ActionKind::Warn | ActionKind::Note => Ok(()),
    };
    result.map_err(|e| {
        warn!(target: EVENT_TARGET, "Failed to {} {}: {e}", action.kind, action.subject);
        ModerationError::external(format!("❌ Failed to {} the user.", action.kind))
    })
}

/// Persist the reversal of a timed mute or ban. A failure here is logged,
/// the sanction itself already happened.
async fn schedule_reversal(inv: &Invocation<'_>, guild: GuildId, action: &PendingAction) {
    let reversal = match (action.kind, action.duration) {
        (ActionKind::Mute, Some(after)) => Some((
            ReversalKind::Unmute {
                role_id: inv.data.config.muted_role_id.get(),
            },
            after,
        )),
        (ActionKind::Ban, Some(after)) => Some((ReversalKind::Unban, after)),
        _ => None,
    };
    let Some((reversal, after)) = reversal else {
        return;
    };
    let reversal = ScheduledReversal::new(
        guild,
        action.subject,
        reversal,
        format!("{} expired", title(action.kind)),
        after,
    );
    if let Err(e) = inv
        .data
        .expiry
        .schedule(Arc::clone(inv.gateway), reversal)
        .await
    {
        error!(
            target: EVENT_TARGET,
            "Failed to schedule reversal of {} for {}: {e}", action.kind, action.subject
        );
    }
}

fn log_message(
    inv: &Invocation<'_>,
    action: &PendingAction,
    subject: &UserSummary,
    dm_sent: bool,
    strikes: Option<u64>,
) -> CreateMessage {
    let mut embed = CreateEmbed::new()
        .title(format!("🔨 Member {}", past_tense(action.kind)))
        .colour(COLOUR_DANGER)
        .field("User", format!("<@{}> ({})", subject.id, subject.tag), true)
        .field(
            "Moderator",
            format!("<@{}> ({})", action.moderator_id, action.moderator_tag),
            true,
        )
        .field("Reason", &action.reason, false)
        .field("DM sent", if dm_sent { "Yes" } else { "No" }, true)
        .timestamp(Timestamp::now());
    if matches!(action.kind, ActionKind::Mute | ActionKind::Ban) {
        embed = embed.field("Duration", action.duration_label(), true);
    }
    if let Some(strikes) = strikes {
        embed = embed.field("Approved strikes", strikes.to_string(), true);
    }

    let message = CreateMessage::new().embed(embed);
    match (action.kind, inv.data.config.staff_role_id) {
        (ActionKind::Warn, Some(staff)) => message.content(format!("<@&{staff}>")),
        _ => message,
    }
}
