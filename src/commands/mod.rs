//! Slash commands and their component hooks.

pub mod ban;
pub mod devupdate;
pub mod help;
pub mod history;
pub mod kick;
pub mod lockdown;
pub mod moderation;
pub mod modpanel;
pub mod mute;
pub mod note;
pub mod sa;
pub mod selfroles;
pub mod strike;
pub mod warn;
pub mod whois;

use crate::EVENT_TARGET;
use crate::registry::{CommandHandler, Invocation};
use poise::serenity_prelude::{CreateEmbed, CreateMessage, UserId};
use tracing::{info, warn};

pub const COLOUR_DANGER: u32 = 0xE7_4C_3C;
pub const COLOUR_WARNING: u32 = 0xF1_C4_0F;
pub const COLOUR_INFO: u32 = 0x34_98_DB;
pub const COLOUR_SUCCESS: u32 = 0x2E_CC_71;

/// Every command the bot registers.
#[must_use]
pub fn all() -> Vec<CommandHandler> {
    vec![
        warn::handler(),
        kick::handler(),
        mute::handler(),
        ban::handler(),
        note::handler(),
        strike::strike_handler(),
        strike::approve_handler(),
        strike::deny_handler(),
        lockdown::lockdown_handler(),
        lockdown::unlock_handler(),
        lockdown::status_handler(),
        modpanel::handler(),
        history::handler(),
        help::handler(),
        selfroles::handler(),
        whois::handler(),
        devupdate::handler(),
        sa::handler(),
    ]
}

/// Post to the staff log channel. Failures are logged, never surfaced.
pub(crate) async fn post_log(inv: &Invocation<'_>, message: CreateMessage) {
    let channel = inv.data.config.log_channel_id;
    if let Err(e) = inv.gateway.post(channel, message).await {
        warn!(target: EVENT_TARGET, "Failed to post to log channel {channel}: {e}");
    }
}

/// DM a user, reporting whether it arrived.
pub(crate) async fn notify(inv: &Invocation<'_>, user: UserId, embed: CreateEmbed) -> bool {
    match inv.gateway.direct_message(user, embed).await {
        Ok(()) => true,
        Err(e) => {
            info!(target: EVENT_TARGET, "Could not DM {user}: {e}");
            false
        }
    }
}

/// Cut `text` to at most `max` characters.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
