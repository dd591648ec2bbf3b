//! `/devupdate`: developers post changelog notes to the updates channel.

use crate::error::{ModerationError, ModerationResult};
use crate::platform::Reply;
use crate::registry::{CommandHandler, Invocation};
use crate::store::to_document;
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    CommandOptionType, CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedFooter,
    CreateMessage, Timestamp,
};
use serde::Serialize;

pub const DEV_UPDATE_COLLECTION: &str = "dev_updates";
pub const POSTED: &str = "✅ Developer update posted successfully.";
pub const CHANNEL_INVALID: &str = "⚠️ Dev updates channel is invalid or not text-based.";
const EMPTY_UPDATE: &str = "❌ The update text cannot be empty.";
const COLOUR_UPDATE: u32 = 0x58_65_F2;

#[derive(Serialize)]
struct NewDevUpdate<'a> {
    author_id: String,
    author_tag: &'a str,
    content: &'a str,
}

pub fn handler() -> CommandHandler {
    CommandHandler::new("devupdate", definition, execute)
}

fn definition() -> CreateCommand {
    CreateCommand::new("devupdate")
        .description("Post a developer update (owner/dev only)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "update", "Update text")
                .required(true),
        )
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    post_update(inv).boxed()
}

async fn post_update(inv: Invocation<'_>) -> ModerationResult<()> {
    inv.guild()?;
    inv.require_dev().await?;
    let update = inv
        .options
        .string("update")
        .map(str::trim)
        .filter(|update| !update.is_empty())
        .ok_or_else(|| ModerationError::invalid(EMPTY_UPDATE))?;
    let actor = inv.actor();
    let config = &inv.data.config;
    let channel = config.dev_updates_channel_id.unwrap_or(config.log_channel_id);

    let embed = CreateEmbed::new()
        .title("🛠️ Developer Update")
        .description(super::truncate(update, 4000))
        .field("👤 Posted by", format!("<@{}>", actor.id), true)
        .field(
            "🕒 Timestamp",
            format!("<t:{}:F>", Timestamp::now().unix_timestamp()),
            true,
        )
        .colour(COLOUR_UPDATE)
        .footer(CreateEmbedFooter::new(format!("By {}", actor.tag)))
        .timestamp(Timestamp::now());
    inv.gateway
        .post(channel, CreateMessage::new().embed(embed))
        .await
        .map_err(|_| ModerationError::external(CHANNEL_INVALID))?;

    let document = to_document(&NewDevUpdate {
        author_id: actor.id.to_string(),
        author_tag: &actor.tag,
        content: update,
    })?;
    inv.data.store.create(DEV_UPDATE_COLLECTION, document).await?;

    inv.respond(Reply::ephemeral(POSTED)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{CommandOptions, OptionValue};
    use crate::registry::NOT_DEV;
    use crate::router::route;
    use crate::store::Filter;
    use crate::testing::{self, DEV_ROLE, DEV_UPDATES_CHANNEL, FakeGateway, FakeResponder};

    fn update(text: &str) -> CommandOptions {
        CommandOptions::new().with("update", OptionValue::String(text.to_string()))
    }

    #[tokio::test]
    async fn test_dev_posts_and_records_update() {
        let data = testing::data();
        let (fake, gateway) = testing::shared(FakeGateway::new().with_member(6, &[DEV_ROLE], 2));
        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(6, "devupdate", update(" Shipped v2 "))).await;

        assert_eq!(responder.messages(), vec![POSTED.to_string()]);
        assert!(responder.replies()[0].ephemeral);
        let posts = fake.posts_to(DEV_UPDATES_CHANNEL);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["embeds"][0]["description"], "Shipped v2");
        assert_eq!(posts[0]["embeds"][0]["fields"][0]["value"], "<@6>");

        let stored = data
            .store
            .find(DEV_UPDATE_COLLECTION, &Filter::new())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["author_id"], "6");
        assert_eq!(stored[0]["content"], "Shipped v2");
    }

    #[tokio::test]
    async fn test_members_cannot_post_updates() {
        let data = testing::data();
        let (fake, gateway) = testing::shared(FakeGateway::new().with_member(7, &[], 1));
        let responder = FakeResponder::new();
        route(&data, &gateway, &responder, &testing::slash(7, "devupdate", update("hi"))).await;

        assert_eq!(responder.messages(), vec![NOT_DEV.to_string()]);
        assert!(fake.calls().is_empty());
        let stored = data
            .store
            .count_documents(DEV_UPDATE_COLLECTION, &Filter::new())
            .await
            .unwrap();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn test_blank_update_is_rejected() {
        let data = testing::data();
        let (fake, gateway) = testing::shared(FakeGateway::new());
        let responder = FakeResponder::new();
        let owner = testing::OWNER.get();
        route(&data, &gateway, &responder, &testing::slash(owner, "devupdate", update("   "))).await;

        assert_eq!(responder.messages(), vec![EMPTY_UPDATE.to_string()]);
        assert!(fake.calls().is_empty());
    }
}
