//! Entry point for every inbound interaction.
//!
//! The router applies the lockdown gate, finds the handler for the
//! interaction's logical command name and turns failures into at most one
//! user-visible message. Whatever happens, the interaction gets exactly one
//! primary response.

use crate::custom_id::{ComponentId, CustomId, CustomIdError};
use crate::data::Data;
use crate::error::{ModerationError, ModerationResult};
use crate::interaction::{CommandOptions, InboundInteraction, InteractionKind};
use crate::lockdown::allowed_while_locked;
use crate::logging::{log_interaction_end, log_interaction_error, log_interaction_start};
use crate::platform::{AckError, Gateway, Reply, Responder, ack_component_once, respond};
use crate::registry::{CommandHandler, HandlerFn, Invocation, UNRESOLVED_TARGET};
use crate::EVENT_TARGET;
use poise::serenity_prelude::UserId;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub const MAINTENANCE_NOTICE: &str = "🛠️ The bot is in **maintenance mode** right now.";
pub const MODAL_NOT_WIRED: &str = "❌ This modal isn't wired to a handler.";
pub const BUTTON_NOT_WIRED: &str = "❌ This button isn't wired to a handler.";
pub const SELECT_NOT_WIRED: &str = "❌ This selection isn't wired to a handler.";
pub const ACTION_UNAVAILABLE: &str = "❌ This moderation action is not available.";
pub const STALE_CONTROL: &str = "This control is outdated. Use `/selfroles publish` to refresh the panel.";

/// Commands a moderator panel button may run against its subject.
pub const PANEL_ACTIONS: [&str; 6] = ["warn", "kick", "mute", "ban", "note", "history"];

/// Parsed form of the interaction's custom id, when it carries one.
fn parse_custom_id(kind: &InteractionKind) -> Option<Result<CustomId, CustomIdError>> {
    match kind {
        InteractionKind::Modal { custom_id, .. }
        | InteractionKind::Button { custom_id }
        | InteractionKind::Select { custom_id, .. } => Some(CustomId::parse(custom_id)),
        InteractionKind::Slash { .. } | InteractionKind::Autocomplete { .. } => None,
    }
}

/// Name the lockdown allow-list and the logs see.
fn logical_name<'a>(
    kind: &'a InteractionKind,
    parsed: Option<&'a Result<CustomId, CustomIdError>>,
) -> Option<&'a str> {
    match kind {
        InteractionKind::Slash { command, .. } | InteractionKind::Autocomplete { command, .. } => {
            Some(command)
        }
        _ => match parsed {
            Some(Ok(id)) => Some(id.command_name()),
            _ => None,
        },
    }
}

/// Handle one interaction end to end.
pub async fn route(
    data: &Data,
    gateway: &Arc<dyn Gateway>,
    responder: &dyn Responder,
    interaction: &InboundInteraction,
) {
    let started = Instant::now();
    let parsed = parse_custom_id(&interaction.kind);
    let name = logical_name(&interaction.kind, parsed.as_ref());
    log_interaction_start(interaction, name);

    if is_locked_out(data, gateway, interaction, name).await {
        debug!(target: EVENT_TARGET, "Interaction blocked by lockdown");
        notify_maintenance(responder, &interaction.kind).await;
        log_interaction_end(interaction, name, started);
        return;
    }

    let empty = CommandOptions::new();
    let router = Router {
        data,
        gateway,
        responder,
        interaction,
        empty: &empty,
    };
    if let Err(failure) = router.dispatch(parsed.as_ref()).await {
        report_failure(responder, interaction, name, failure).await;
    }
    log_interaction_end(interaction, name, started);
}

/// Whether the lockdown gate turns this interaction away.
async fn is_locked_out(
    data: &Data,
    gateway: &Arc<dyn Gateway>,
    interaction: &InboundInteraction,
    name: Option<&str>,
) -> bool {
    if name.is_some_and(allowed_while_locked) {
        return false;
    }
    if !data.lockdown.get().await {
        return false;
    }
    !is_privileged(data, gateway, interaction).await
}

/// Owner, or a member holding the dev role.
async fn is_privileged(data: &Data, gateway: &Arc<dyn Gateway>, interaction: &InboundInteraction) -> bool {
    if interaction.actor.id == data.config.owner_id {
        return true;
    }
    let Some(guild) = interaction.guild_id else {
        return false;
    };
    match gateway.member(guild, interaction.actor.id).await {
        Ok(Some(member)) => member.has_role(data.config.dev_role_id),
        Ok(None) => false,
        Err(e) => {
            warn!(target: EVENT_TARGET, "Could not check roles of {}: {e}", interaction.actor.id);
            false
        }
    }
}

async fn notify_maintenance(responder: &dyn Responder, kind: &InteractionKind) {
    let result = match kind {
        InteractionKind::Autocomplete { .. } => responder.suggest(Vec::new()).await,
        InteractionKind::Button { .. } | InteractionKind::Select { .. } => {
            match ack_component_once(responder).await {
                Ok(()) => responder.follow_up(Reply::ephemeral(MAINTENANCE_NOTICE)).await,
                Err(e) => Err(e),
            }
        }
        InteractionKind::Slash { .. } | InteractionKind::Modal { .. } => {
            responder.reply(Reply::ephemeral(MAINTENANCE_NOTICE)).await
        }
    };
    if let Err(e) = result {
        debug!(target: EVENT_TARGET, "Could not deliver maintenance notice: {e}");
    }
}

struct Router<'a> {
    data: &'a Data,
    gateway: &'a Arc<dyn Gateway>,
    responder: &'a dyn Responder,
    interaction: &'a InboundInteraction,
    empty: &'a CommandOptions,
}

impl<'a> Router<'a> {
    fn invocation<'b>(
        &'b self,
        options: &'b CommandOptions,
        component: Option<&'b ComponentId>,
    ) -> Invocation<'b> {
        Invocation {
            data: self.data,
            gateway: self.gateway,
            responder: self.responder,
            interaction: self.interaction,
            options,
            component,
        }
    }

    fn handler(&self, name: &str) -> Option<&'a CommandHandler> {
        self.data.registry.get(name)
    }

    /// Hook for a parsed command identifier, or the "not wired" failure.
    fn hook(
        &self,
        parsed: Option<&'a Result<CustomId, CustomIdError>>,
        select_hook: fn(&CommandHandler) -> Option<HandlerFn>,
        missing: &str,
    ) -> ModerationResult<(HandlerFn, &'a ComponentId)> {
        let Some(Ok(CustomId::Command(component))) = parsed else {
            return Err(ModerationError::HandlerMissing(missing.to_string()));
        };
        self.handler(&component.command)
            .and_then(select_hook)
            .map(|hook| (hook, component))
            .ok_or_else(|| ModerationError::HandlerMissing(missing.to_string()))
    }

    async fn dispatch(
        &self,
        parsed: Option<&'a Result<CustomId, CustomIdError>>,
    ) -> ModerationResult<()> {
        match &self.interaction.kind {
            InteractionKind::Slash { command, options } => {
                let Some(handler) = self.handler(command) else {
                    debug!(target: EVENT_TARGET, "No handler for command {command}");
                    return Ok(());
                };
                (handler.execute)(self.invocation(options, None)).await
            }
            InteractionKind::Autocomplete { command, options } => {
                let Some(hook) = self.handler(command).and_then(|h| h.autocomplete) else {
                    return Ok(());
                };
                if let Err(e) = hook(self.invocation(options, None)).await {
                    warn!(target: EVENT_TARGET, "Autocomplete for {command} failed: {e}");
                }
                Ok(())
            }
            InteractionKind::Modal { .. } => {
                let (hook, component) = self.hook(parsed, |h| h.modal_submit, MODAL_NOT_WIRED)?;
                hook(self.invocation(self.empty, Some(component))).await
            }
            InteractionKind::Button { .. } => {
                if let Some(Ok(CustomId::ModPanel { action, subject })) = parsed {
                    return self.panel_action(action, *subject).await;
                }
                ack_component_once(self.responder).await?;
                let (hook, component) = self.hook(parsed, |h| h.button, BUTTON_NOT_WIRED)?;
                hook(self.invocation(self.empty, Some(component))).await
            }
            InteractionKind::Select { .. } => {
                ack_component_once(self.responder).await?;
                let (hook, component) = self.hook(parsed, |h| h.select, SELECT_NOT_WIRED)?;
                hook(self.invocation(self.empty, Some(component))).await
            }
        }
    }

    /// Run a command against the subject of a moderator panel button.
    ///
    /// Commands that answer with a modal must see the interaction
    /// unacknowledged, every other one is deferred up front.
    async fn panel_action(&self, action: &str, subject: UserId) -> ModerationResult<()> {
        let handler = PANEL_ACTIONS
            .contains(&action)
            .then(|| self.handler(action))
            .flatten()
            .ok_or_else(|| ModerationError::invalid(ACTION_UNAVAILABLE))?;
        if !handler.opens_modal {
            ack_component_once(self.responder).await?;
        }
        let user = self
            .gateway
            .user(subject)
            .await
            .map_err(|_| ModerationError::external(UNRESOLVED_TARGET))?;
        let options = self.empty.with_user(user.id);
        (handler.execute)(self.invocation(&options, None)).await
    }
}

/// Turn a handler failure into at most one message for the actor.
async fn report_failure(
    responder: &dyn Responder,
    interaction: &InboundInteraction,
    name: Option<&str>,
    failure: ModerationError,
) {
    match &failure {
        ModerationError::Acknowledgement(AckError::AlreadyAcknowledged) => {
            debug!(target: EVENT_TARGET, "Interaction was already acknowledged");
            return;
        }
        ModerationError::Acknowledgement(AckError::UnknownInteraction) => {
            warn!(target: EVENT_TARGET, "Interaction expired before it could be answered");
            if interaction.kind.is_component() && !responder.is_acknowledged() {
                if let Err(e) = responder.reply(Reply::ephemeral(STALE_CONTROL)).await {
                    debug!(target: EVENT_TARGET, "Could not deliver stale notice: {e}");
                }
            }
            return;
        }
        _ => log_interaction_error(interaction, name, &failure),
    }

    if let Some(message) = failure.user_message() {
        if let Err(e) = respond(responder, Reply::ephemeral(message)).await {
            debug!(target: EVENT_TARGET, "Could not deliver error message: {e}");
        }
    }
}
