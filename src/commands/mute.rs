//! `/mute` adds the configured muted role and schedules its removal.

use super::moderation;
use crate::error::ModerationResult;
use crate::pending::ActionKind;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::CreateCommand;

pub fn handler() -> CommandHandler {
    CommandHandler::new("mute", definition, execute)
        .opens_modal()
        .modal_submit(submit)
        .button(decide)
}

fn definition() -> CreateCommand {
    moderation::definition(ActionKind::Mute, "Mute a member for a set time")
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::open(inv, ActionKind::Mute).boxed()
}

fn submit(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::stage(inv, ActionKind::Mute).boxed()
}

fn decide(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::decide(inv, ActionKind::Mute).boxed()
}
