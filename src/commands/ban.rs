//! `/ban`. A blank or unparsable duration bans permanently, anything else
//! schedules an unban.

use super::moderation;
use crate::error::ModerationResult;
use crate::pending::ActionKind;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::CreateCommand;

pub fn handler() -> CommandHandler {
    CommandHandler::new("ban", definition, execute)
        .opens_modal()
        .modal_submit(submit)
        .button(decide)
}

fn definition() -> CreateCommand {
    moderation::definition(ActionKind::Ban, "Ban a user, optionally for a limited time")
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::open(inv, ActionKind::Ban).boxed()
}

fn submit(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::stage(inv, ActionKind::Ban).boxed()
}

fn decide(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    moderation::decide(inv, ActionKind::Ban).boxed()
}
