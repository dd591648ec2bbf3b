use super::moderation;
use crate::error::ModerationResult;
use crate::pending::ActionKind;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::CreateCommand;

pub fn handler() -> CommandHandler {
    CommandHandler::new("warn", definition, execute)
        .opens_modal()
        .modal_submit(submit)
        .button(decide)
}

fn definition() -> CreateCommand {
    moderation::definition(ActionKind::Warn, "Warn a member and record an approved strike")
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::open(inv, ActionKind::Warn).boxed()
}

fn submit(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::stage(inv, ActionKind::Warn).boxed()
}

fn decide(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::decide(inv, ActionKind::Warn).boxed()
}
