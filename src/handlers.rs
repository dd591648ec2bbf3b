use crate::data::Data;
use crate::discord::{self, SerenityGateway};
use crate::platform::Gateway;
use crate::{ERROR_TARGET, EVENT_TARGET, Error};
use poise::serenity_prelude::{self as serenity, FullEvent, GuildId};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Guild name for notices, falling back to the id when the guild isn't cached.
fn guild_name(ctx: &serenity::Context, guild: GuildId) -> String {
    ctx.cache
        .guild(guild)
        .map_or_else(|| guild.to_string(), |guild| guild.name.clone())
}

/// Forward gateway events to the router and the detectors.
///
/// # Errors
///
/// Never fails; detector and routing failures are logged where they happen.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            let user_name = &data_about_bot.user.name;
            let shard_id = ctx.shard_id;
            info!(target: EVENT_TARGET, "Connected as {user_name}, shard {shard_id}");
            data.expiry
                .start_sweep(Arc::new(SerenityGateway::new(ctx)));
        }
        FullEvent::CacheReady { guilds } => {
            let guild_count_cache = ctx.cache.guild_count();
            let guild_count = guilds.len();
            if guild_count != guild_count_cache {
                warn!(
                    target: EVENT_TARGET,
                    "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
                );
            }
            info!(target: EVENT_TARGET, "Cache ready! The bot is in {guild_count} guild(s)");
        }
        FullEvent::InteractionCreate { interaction } => {
            discord::handle_interaction(ctx, data, interaction).await;
        }
        FullEvent::GuildMemberAddition { new_member } => {
            let gateway = SerenityGateway::new(ctx);
            let detectors = data.detector_context(&gateway as &dyn Gateway);
            let name = guild_name(ctx, new_member.guild_id);
            if let Err(e) = data
                .detectors
                .join_rate
                .on_member_join(&detectors, new_member.guild_id, &name)
                .await
            {
                error!(target: ERROR_TARGET, "Join-rate detector failed: {e}");
            }
        }
        FullEvent::Message { new_message } => {
            let Some(message) = discord::observed_message(new_message) else {
                return Ok(());
            };
            let gateway = SerenityGateway::new(ctx);
            let detectors = data.detector_context(&gateway as &dyn Gateway);
            if let Err(e) = data
                .detectors
                .message_rate
                .on_message(&detectors, &message)
                .await
            {
                error!(target: ERROR_TARGET, "Message-rate detector failed: {e}");
            }
        }
        FullEvent::GuildAuditLogEntryCreate { entry, guild_id } => {
            let Some(privileged) = discord::privileged_event(entry, *guild_id) else {
                return Ok(());
            };
            let gateway = SerenityGateway::new(ctx);
            let detectors = data.detector_context(&gateway as &dyn Gateway);
            if let Err(e) = data
                .detectors
                .privileged
                .on_audit_entry(&detectors, &privileged)
                .await
            {
                error!(target: ERROR_TARGET, "Privileged-action detector failed: {e}");
            }
        }
        _ => {}
    }
    Ok(())
}
