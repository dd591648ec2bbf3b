//! `/kick`. Between the modal and the confirmation the moderator picks
//! whether the member is DMed, since a kicked member can no longer be reached.

use super::moderation;
use crate::error::ModerationResult;
use crate::pending::ActionKind;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::CreateCommand;

pub fn handler() -> CommandHandler {
    CommandHandler::new("kick", definition, execute)
        .opens_modal()
        .modal_submit(submit)
        .button(decide)
}

fn definition() -> CreateCommand {
    moderation::definition(ActionKind::Kick, "Kick a member from the server")
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::open(inv, ActionKind::Kick).boxed()
}

fn submit(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::stage(inv, ActionKind::Kick).boxed()
}

fn decide(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::decide(inv, ActionKind::Kick).boxed()
}
