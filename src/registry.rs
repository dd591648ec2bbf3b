//! Command registry: the single source of slash command definitions and of
//! the hooks that component and modal interactions are routed to.

use crate::commands;
use crate::custom_id::ComponentId;
use crate::data::Data;
use crate::error::{ModerationError, ModerationResult};
use crate::interaction::{Actor, CommandOptions, InboundInteraction, InteractionKind};
use crate::platform::{Gateway, MemberSummary, Reply, Responder, UserSummary, respond};
use futures::future::BoxFuture;
use poise::serenity_prelude::{CreateCommand, GuildId, UserId};
use std::collections::HashMap;
use std::sync::Arc;

pub const GUILD_ONLY: &str = "❌ This command can only be used in a server.";
pub const NOT_ADMIN: &str = "🚫 You need the admin role to use this.";
pub const NOT_OWNER: &str = "🚫 Only the bot owner can use this.";
pub const NOT_DEV: &str = "🚫 Only the owner or developers can use this.";
pub const UNRESOLVED_TARGET: &str = "❌ Could not resolve the target user.";

/// Everything a handler needs to serve one interaction.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    pub data: &'a Data,
    pub gateway: &'a Arc<dyn Gateway>,
    pub responder: &'a dyn Responder,
    pub interaction: &'a InboundInteraction,
    pub options: &'a CommandOptions,
    /// Parsed identifier of the button, select or modal, if any.
    pub component: Option<&'a ComponentId>,
}

pub type HandlerFn = for<'a> fn(Invocation<'a>) -> BoxFuture<'a, ModerationResult<()>>;

impl<'a> Invocation<'a> {
    #[must_use]
    pub fn actor(&self) -> &'a Actor {
        &self.interaction.actor
    }

    /// # Errors
    ///
    /// Fails outside a guild.
    pub fn guild(&self) -> ModerationResult<GuildId> {
        self.interaction
            .guild_id
            .ok_or_else(|| ModerationError::denied(GUILD_ONLY))
    }

    /// A submitted modal field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'a str> {
        match &self.interaction.kind {
            InteractionKind::Modal { fields, .. } => {
                fields.get(name).map(String::as_str)
            }
            _ => None,
        }
    }

    /// Chosen select menu values.
    #[must_use]
    pub fn values(&self) -> &'a [String] {
        match &self.interaction.kind {
            InteractionKind::Select { values, .. } => values,
            _ => &[],
        }
    }

    /// Reply, or follow up if the interaction was already acknowledged.
    ///
    /// # Errors
    ///
    /// Propagates acknowledgement failures.
    pub async fn respond(&self, reply: Reply) -> ModerationResult<()> {
        respond(self.responder, reply).await?;
        Ok(())
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.actor().id == self.data.config.owner_id
    }

    async fn actor_member(&self) -> ModerationResult<Option<MemberSummary>> {
        let guild = self.guild()?;
        Ok(self.gateway.member(guild, self.actor().id).await?)
    }

    /// # Errors
    ///
    /// `PermissionDenied` unless the actor is the owner.
    pub fn require_owner(&self) -> ModerationResult<()> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(ModerationError::denied(NOT_OWNER))
        }
    }

    /// # Errors
    ///
    /// `PermissionDenied` unless the actor is the owner or holds the admin role.
    pub async fn require_admin(&self) -> ModerationResult<()> {
        if self.is_owner() {
            return Ok(());
        }
        let admin = self.data.config.admin_role_id;
        match self.actor_member().await? {
            Some(member) if member.has_role(admin) => Ok(()),
            _ => Err(ModerationError::denied(NOT_ADMIN)),
        }
    }

    /// # Errors
    ///
    /// `PermissionDenied` unless the actor is the owner or holds the dev role.
    pub async fn require_dev(&self) -> ModerationResult<()> {
        if self.is_owner() {
            return Ok(());
        }
        let dev = self.data.config.dev_role_id;
        match self.actor_member().await? {
            Some(member) if member.has_role(dev) => Ok(()),
            _ => Err(ModerationError::denied(NOT_DEV)),
        }
    }

    /// Resolve a user id to a platform user.
    ///
    /// # Errors
    ///
    /// `ExternalAction` when the lookup fails.
    pub async fn resolve_user(&self, user: UserId) -> ModerationResult<UserSummary> {
        self.gateway
            .user(user)
            .await
            .map_err(|_| ModerationError::external(UNRESOLVED_TARGET))
    }

    /// The `user` option, resolved.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the option is missing, `ExternalAction` when it can't be resolved.
    pub async fn subject(&self) -> ModerationResult<UserSummary> {
        let user = self
            .options
            .user("user")
            .ok_or_else(|| ModerationError::invalid("❌ Please choose a user."))?;
        self.resolve_user(user).await
    }
}

/// Capability record for one command.
#[derive(Clone, Copy)]
pub struct CommandHandler {
    pub name: &'static str,
    pub definition: fn() -> CreateCommand,
    /// `execute` answers with a modal, so callers must not acknowledge first.
    pub opens_modal: bool,
    pub execute: HandlerFn,
    pub autocomplete: Option<HandlerFn>,
    pub modal_submit: Option<HandlerFn>,
    pub button: Option<HandlerFn>,
    pub select: Option<HandlerFn>,
}

impl CommandHandler {
    #[must_use]
    pub fn new(name: &'static str, definition: fn() -> CreateCommand, execute: HandlerFn) -> Self {
        Self {
            name,
            definition,
            opens_modal: false,
            execute,
            autocomplete: None,
            modal_submit: None,
            button: None,
            select: None,
        }
    }

    #[must_use]
    pub fn opens_modal(mut self) -> Self {
        self.opens_modal = true;
        self
    }

    #[must_use]
    pub fn autocomplete(mut self, hook: HandlerFn) -> Self {
        self.autocomplete = Some(hook);
        self
    }

    #[must_use]
    pub fn modal_submit(mut self, hook: HandlerFn) -> Self {
        self.modal_submit = Some(hook);
        self
    }

    #[must_use]
    pub fn button(mut self, hook: HandlerFn) -> Self {
        self.button = Some(hook);
        self
    }

    #[must_use]
    pub fn select(mut self, hook: HandlerFn) -> Self {
        self.select = Some(hook);
        self
    }
}

/// Handlers keyed by command name, populated once at startup.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, CommandHandler>,
}

impl CommandRegistry {
    /// Registry holding every command the bot ships.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::default();
        for handler in commands::all() {
            registry.register(handler);
        }
        registry
    }

    /// Add a handler, replacing any with the same name.
    pub fn register(&mut self, handler: CommandHandler) {
        self.handlers.insert(handler.name, handler);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CommandHandler> {
        self.handlers.get(name)
    }

    /// Slash command definitions sorted by name, for registration with Discord.
    #[must_use]
    pub fn definitions(&self) -> Vec<CreateCommand> {
        let mut handlers: Vec<&CommandHandler> = self.handlers.values().collect();
        handlers.sort_by_key(|handler| handler.name);
        handlers.into_iter().map(|handler| (handler.definition)()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_definitions_match_handler_names() {
        let registry = CommandRegistry::standard();
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), registry.len());

        let mut names = HashSet::new();
        for definition in &definitions {
            let json = serde_json::to_value(definition).unwrap();
            let name = json["name"].as_str().unwrap().to_string();
            assert!(registry.get(&name).is_some(), "no handler for {name}");
            assert!(!json["description"].as_str().unwrap().is_empty());
            assert!(names.insert(name), "duplicate command name");
        }
    }

    #[test]
    fn test_modal_commands_declare_it() {
        let registry = CommandRegistry::standard();
        for name in ["warn", "kick", "mute", "ban", "note"] {
            let handler = registry.get(name).unwrap();
            assert!(handler.opens_modal, "{name} should open a modal");
            assert!(handler.modal_submit.is_some(), "{name} needs a modal hook");
        }
        assert!(!registry.get("history").unwrap().opens_modal);
        assert!(registry.get("approve").unwrap().autocomplete.is_some());
        assert!(registry.get("selfroles").unwrap().select.is_some());
    }

    #[test]
    fn test_unknown_command() {
        assert!(CommandRegistry::standard().get("nope").is_none());
    }
}
