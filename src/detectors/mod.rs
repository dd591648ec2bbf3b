//! Background rules evaluated on gateway events, outside the interaction router.

pub mod join_rate;
pub mod message_rate;
pub mod privileged;

pub use join_rate::JoinRateDetector;
pub use message_rate::{MessageRateDetector, ObservedMessage, SpamRule};
pub use privileged::{PrivilegedAction, PrivilegedActionDetector, PrivilegedActionEvent};

use crate::EVENT_TARGET;
use crate::audit::AuditLog;
use crate::config::BotConfig;
use crate::platform::Gateway;
use poise::serenity_prelude::CreateMessage;
use tracing::warn;

/// Collaborators a detector reports through.
#[derive(Clone, Copy)]
pub struct DetectorContext<'a> {
    pub gateway: &'a dyn Gateway,
    pub audit: &'a AuditLog,
    pub config: &'a BotConfig,
}

impl DetectorContext<'_> {
    /// Post to the log channel, logging instead of failing.
    pub(crate) async fn notify(&self, message: CreateMessage) {
        let channel = self.config.log_channel_id;
        if let Err(e) = self.gateway.post(channel, message).await {
            warn!(target: EVENT_TARGET, "Failed to post detector notice to {channel}: {e}");
        }
    }
}

/// Detector state shared by every event.
#[derive(Default)]
pub struct Detectors {
    pub join_rate: JoinRateDetector,
    pub message_rate: MessageRateDetector,
    pub privileged: PrivilegedActionDetector,
}
