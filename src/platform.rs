//! Seams between the moderation core and the Discord platform.
//!
//! `Gateway` covers the REST side effects (roles, bans, messages) and
//! `Responder` covers answering a single interaction. Both have serenity
//! implementations in `discord` and recording fakes in tests.

use async_trait::async_trait;
use poise::serenity_prelude::{
    ChannelId, CreateActionRow, CreateEmbed, CreateMessage, CreateModal, GuildId, MessageId,
    RoleId, UserId,
};
use thiserror::Error;

/// Errors from platform side effects.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// The platform refused the request, usually for lack of permission.
    #[error("Rejected by Discord: {0}")]
    Rejected(String),

    #[error("Discord API error: {0}")]
    Discord(#[from] Box<serenity::Error>),
}

impl From<serenity::Error> for GatewayError {
    fn from(error: serenity::Error) -> Self {
        Self::Discord(Box::new(error))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from answering an interaction.
#[derive(Debug, Error)]
pub enum AckError {
    /// The interaction already received its primary response.
    #[error("Interaction has already been acknowledged")]
    AlreadyAcknowledged,

    /// The interaction token is unknown or expired.
    #[error("Unknown or expired interaction")]
    UnknownInteraction,

    #[error("Failed to respond to interaction: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub tag: String,
    pub bot: bool,
    /// Avatar, or the default avatar when none is set.
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub user: UserSummary,
    pub roles: Vec<RoleId>,
    /// Position of the member's highest role, 0 for `@everyone` only.
    pub top_role_position: u16,
}

impl MemberSummary {
    #[must_use]
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// Platform side effects used by commands and detectors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn user(&self, user: UserId) -> GatewayResult<UserSummary>;

    /// Current membership, `None` when the user is not in the guild.
    async fn member(&self, guild: GuildId, user: UserId) -> GatewayResult<Option<MemberSummary>>;

    async fn direct_message(&self, user: UserId, embed: CreateEmbed) -> GatewayResult<()>;

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> GatewayResult<()>;

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> GatewayResult<()>;

    /// Replace the member's role list.
    async fn set_roles(
        &self,
        guild: GuildId,
        user: UserId,
        roles: Vec<RoleId>,
        reason: &str,
    ) -> GatewayResult<()>;

    async fn kick(&self, guild: GuildId, user: UserId, reason: &str) -> GatewayResult<()>;

    async fn ban(&self, guild: GuildId, user: UserId, reason: &str) -> GatewayResult<()>;

    async fn unban(&self, guild: GuildId, user: UserId) -> GatewayResult<()>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> GatewayResult<()>;

    async fn post(&self, channel: ChannelId, message: CreateMessage) -> GatewayResult<MessageId>;

    /// Whether the bot outranks the member and may edit their roles.
    async fn can_manage(&self, guild: GuildId, user: UserId) -> GatewayResult<bool>;
}

/// A message answer to an interaction, used for both replies and follow-ups.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub content: Option<String>,
    pub embeds: Vec<CreateEmbed>,
    pub components: Vec<CreateActionRow>,
    pub ephemeral: bool,
}

impl Reply {
    #[must_use]
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ephemeral: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn embed(mut self, embed: CreateEmbed) -> Self {
        self.embeds.push(embed);
        self
    }

    #[must_use]
    pub fn components(mut self, components: Vec<CreateActionRow>) -> Self {
        self.components = components;
        self
    }

    #[must_use]
    pub fn private(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// An autocomplete choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub name: String,
    pub value: String,
}

/// Answers one interaction.
///
/// `reply`, `defer_update`, `show_modal` and `suggest` are primary responses;
/// exactly one may succeed per interaction. `follow_up` requires a primary
/// response to have been sent.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, reply: Reply) -> Result<(), AckError>;

    /// Acknowledge a component without sending a new message.
    async fn defer_update(&self) -> Result<(), AckError>;

    async fn show_modal(&self, modal: CreateModal) -> Result<(), AckError>;

    async fn suggest(&self, choices: Vec<Suggestion>) -> Result<(), AckError>;

    async fn follow_up(&self, reply: Reply) -> Result<(), AckError>;

    /// Replace the message the interaction came from, after `defer_update`.
    async fn edit_original(&self, reply: Reply) -> Result<(), AckError>;

    fn is_acknowledged(&self) -> bool;
}

/// Reply when nothing was sent yet, otherwise follow up.
///
/// # Errors
///
/// Propagates the responder's failure.
pub async fn respond(responder: &dyn Responder, reply: Reply) -> Result<(), AckError> {
    if responder.is_acknowledged() {
        responder.follow_up(reply).await
    } else {
        responder.reply(reply).await
    }
}

/// Defer-update a component unless it was already acknowledged.
///
/// # Errors
///
/// Fails when the interaction expired. A duplicate acknowledgement is not an error.
pub async fn ack_component_once(responder: &dyn Responder) -> Result<(), AckError> {
    if responder.is_acknowledged() {
        return Ok(());
    }
    match responder.defer_update().await {
        Ok(()) | Err(AckError::AlreadyAcknowledged) => Ok(()),
        Err(e) => Err(e),
    }
}
