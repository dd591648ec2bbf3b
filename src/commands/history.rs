//! `/history`: a user's audit trail, newest first.

use super::truncate;
use crate::audit::{AuditRecord, count_by_kind, kind};
use crate::error::ModerationResult;
use crate::platform::Reply;
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    CommandOptionType, CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedFooter,
    Timestamp,
};
use serde_json::Value;

const SHOWN: usize = 15;
const COLOUR_HISTORY: u32 = 0x71_36_8A;

pub fn handler() -> CommandHandler {
    CommandHandler::new("history", definition, execute)
}

fn definition() -> CreateCommand {
    CreateCommand::new("history")
        .description("View all moderation history for a user")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::User,
                "user",
                "The user to view moderation history for",
            )
            .required(true),
        )
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    show(inv).boxed()
}

fn text<'a>(record: &'a AuditRecord, field: &str) -> Option<&'a str> {
    record.payload.get(field).and_then(Value::as_str)
}

fn entry(index: usize, record: &AuditRecord) -> String {
    let moderator = match (text(record, "moderator_tag"), text(record, "moderator_id")) {
        (Some(tag), Some(id)) => format!("{tag} ({id})"),
        (None, Some(id)) => id.to_string(),
        _ => "Unknown".to_string(),
    };
    let mut line = format!(
        "`#{}` • **{}** • <t:{}:f>\n",
        index + 1,
        record.kind.to_uppercase(),
        record.created_at.timestamp()
    );
    match record.kind.as_str() {
        kind::WARN | kind::MUTE | kind::BAN => {
            line.push_str(&format!(
                "> Reason: {}\n> Moderator: {moderator}\n> Duration: {}\n",
                text(record, "reason").unwrap_or("N/A"),
                text(record, "duration").unwrap_or("N/A"),
            ));
        }
        kind::KICK | kind::STRIKE_ISSUED => {
            line.push_str(&format!(
                "> Reason: {}\n> Moderator: {moderator}\n",
                text(record, "reason").unwrap_or("N/A")
            ));
        }
        kind::NOTE => {
            line.push_str(&format!(
                "> Note: {}\n> Moderator: {moderator}\n",
                text(record, "note").unwrap_or("N/A")
            ));
        }
        _ => {
            if let Some(reason) = text(record, "reason") {
                line.push_str(&format!("> Reason: {reason}\n"));
            }
        }
    }
    line
}

/// Footer with the total and a count per kind.
fn summary(records: &[AuditRecord]) -> String {
    let counts = count_by_kind(records);
    let mut footer = format!("Total: {} logs", records.len());
    for (kind, count) in counts {
        footer.push_str(&format!(" | {}: {count}", kind.to_uppercase()));
    }
    footer
}

async fn show(inv: Invocation<'_>) -> ModerationResult<()> {
    inv.guild()?;
    inv.require_admin().await?;
    let subject = inv.subject().await?;
    let records = inv.data.audit.for_user(&subject.id.to_string()).await?;

    if records.is_empty() {
        return inv
            .respond(Reply::ephemeral(format!(
                "📂 No moderation history found for <@{}>.",
                subject.id
            )))
            .await;
    }

    let details: Vec<String> = records
        .iter()
        .take(SHOWN)
        .enumerate()
        .map(|(index, record)| entry(index, record))
        .collect();
    let embed = CreateEmbed::new()
        .title(format!("📑 History for {}", subject.tag))
        .description(truncate(&details.join("\n"), 4000))
        .colour(COLOUR_HISTORY)
        .footer(CreateEmbedFooter::new(summary(&records)))
        .timestamp(Timestamp::now());
    inv.respond(Reply::default().embed(embed).private()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{CommandOptions, OptionValue};
    use crate::router::route;
    use crate::testing::{self, FakeGateway, FakeResponder, OWNER};
    use poise::serenity_prelude::UserId;
    use serde_json::json;

    #[tokio::test]
    async fn test_history_lists_newest_first_with_counts() {
        let data = testing::data();
        data.audit
            .record(kind::WARN, json!({"user_id": "9", "reason": "first"}))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        data.audit
            .record(kind::NOTE, json!({"user_id": "9", "note": "second"}))
            .await
            .unwrap();

        let records = data.audit.for_user("9").await.unwrap();
        assert_eq!(records[0].kind, kind::NOTE);
        assert_eq!(summary(&records), "Total: 2 logs | NOTE: 1 | WARN: 1");
        assert!(entry(0, &records[0]).contains("> Note: second"));

        let (_, gateway) = testing::shared(FakeGateway::new().with_member(9, &[], 0));
        let responder = FakeResponder::new();
        let options = CommandOptions::new().with("user", OptionValue::User(UserId::new(9)));
        route(&data, &gateway, &responder, &testing::slash(OWNER.get(), "history", options)).await;
        assert_eq!(responder.replies()[0].embeds.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_history() {
        let data = testing::data();
        let (_, gateway) = testing::shared(FakeGateway::new().with_member(9, &[], 0));
        let responder = FakeResponder::new();
        let options = CommandOptions::new().with("user", OptionValue::User(UserId::new(9)));
        route(&data, &gateway, &responder, &testing::slash(OWNER.get(), "history", options)).await;
        assert_eq!(
            responder.messages(),
            vec!["📂 No moderation history found for <@9>.".to_string()]
        );
    }
}
