//! Serenity implementations of the platform seams.

mod convert;
mod gateway;
mod responder;

pub use convert::{inbound, observed_message, privileged_event};
pub use gateway::SerenityGateway;
pub use responder::{ResponseTarget, SerenityResponder};

use crate::data::Data;
use crate::platform::Gateway;
use crate::router::route;
use std::sync::Arc;

/// Route one gateway interaction through the bot.
pub async fn handle_interaction(
    ctx: &serenity::client::Context,
    data: &Data,
    interaction: &poise::serenity_prelude::Interaction,
) {
    let Some((inbound, target)) = inbound(interaction) else {
        return;
    };
    let gateway: Arc<dyn Gateway> = Arc::new(SerenityGateway::new(ctx));
    let responder = SerenityResponder::new(Arc::clone(&ctx.http), target);
    route(data, &gateway, &responder, &inbound).await;
}
