//! `/selfroles`: an admin-managed panel members use to toggle their own roles.
//!
//! The panel is one document per guild. Every publish bumps its version and
//! the version is embedded in the panel's component ids, so controls on an
//! older message are recognised and turned away.

use super::COLOUR_INFO;
use crate::EVENT_TARGET;
use crate::custom_id::ComponentId;
use crate::error::{ModerationError, ModerationResult};
use crate::platform::Reply;
use crate::registry::{CommandHandler, Invocation};
use crate::router::STALE_CONTROL;
use crate::store::{Filter, RecordStore, StoreResult, Update, from_document, to_document};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    ButtonStyle, ChannelId, CommandOptionType, CreateActionRow, CreateButton, CreateCommand,
    CreateCommandOption, CreateEmbed, CreateEmbedFooter, CreateMessage, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption, GuildId, MessageId, RoleId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const PANEL_COLLECTION: &str = "selfrole_panels";
const COMMAND: &str = "selfroles";
const MAX_ROLES: usize = 25;
const OTHER_GUILD: &str = "This control is for another server and can't be used here.";
const REFRESH_HINT: &str = "Run `/selfroles publish` to refresh the panel.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelRole {
    pub role_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfRolePanel {
    pub guild_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub roles: Vec<PanelRole>,
}

impl SelfRolePanel {
    fn has_role(&self, role: RoleId) -> bool {
        let role = role.to_string();
        self.roles.iter().any(|r| r.role_id == role)
    }

    fn posted_at(&self) -> Option<(ChannelId, MessageId)> {
        let channel = self.channel_id.as_deref()?.parse::<u64>().ok()?;
        let message = self.message_id.as_deref()?.parse::<u64>().ok()?;
        (channel != 0 && message != 0).then(|| (ChannelId::new(channel), MessageId::new(message)))
    }
}

async fn load(store: &dyn RecordStore, guild: GuildId) -> StoreResult<SelfRolePanel> {
    let filter = Filter::new().field("guild_id", guild.to_string());
    match store.find_one(PANEL_COLLECTION, &filter).await? {
        Some(document) => from_document(document),
        None => Ok(SelfRolePanel {
            guild_id: guild.to_string(),
            ..SelfRolePanel::default()
        }),
    }
}

async fn save(store: &dyn RecordStore, panel: &SelfRolePanel) -> StoreResult<()> {
    let update = to_document(panel)?
        .into_iter()
        .fold(Update::new(), |update, (field, value)| update.set(&field, value));
    let filter = Filter::new().field("guild_id", panel.guild_id.as_str());
    store
        .find_one_and_update(PANEL_COLLECTION, &filter, &update, true)
        .await?;
    Ok(())
}

pub fn handler() -> CommandHandler {
    CommandHandler::new(COMMAND, definition, execute)
        .select(select)
        .button(button)
}

fn definition() -> CreateCommand {
    CreateCommand::new(COMMAND)
        .description("Admin controls for the self roles panel")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "add",
                "Add a selectable role to the panel",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::Role, "role", "Role users can pick")
                    .required(true),
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::String, "label", "Label shown in the menu")
                    .required(true)
                    .max_length(100),
            ),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "remove",
                "Remove a role from the panel",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::Role, "role", "Role to remove")
                    .required(true),
            ),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "publish",
            "Post a fresh panel message",
        ))
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    manage(inv).boxed()
}

fn select(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    toggle(inv).boxed()
}

fn button(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    delete_panel(inv).boxed()
}

fn select_id(guild: GuildId, version: u64) -> String {
    ComponentId::new(COMMAND)
        .id(guild.get())
        .extra(version)
        .to_string()
}

fn delete_id(guild: GuildId, version: u64) -> String {
    ComponentId::new(COMMAND)
        .action("delete")
        .id(guild.get())
        .extra(version)
        .to_string()
}

/// The panel message: an embed, the role menu and the admin row.
fn panel_message(guild: GuildId, panel: &SelfRolePanel) -> CreateMessage {
    let mut options: Vec<CreateSelectMenuOption> = panel
        .roles
        .iter()
        .take(MAX_ROLES)
        .map(|role| {
            CreateSelectMenuOption::new(role.label.as_str(), role.role_id.as_str())
                .description(format!("Toggle {}", role.label))
        })
        .collect();
    let choices = options.len();
    if options.is_empty() {
        options.push(
            CreateSelectMenuOption::new("No roles configured yet", "none")
                .description("Ask an admin to add roles"),
        );
    }
    let max_values = u8::try_from(choices.clamp(1, MAX_ROLES)).unwrap_or(1);
    let menu = CreateSelectMenu::new(
        select_id(guild, panel.version),
        CreateSelectMenuKind::String { options },
    )
    .placeholder("Pick your roles, toggle anytime")
    .min_values(1)
    .max_values(max_values);

    let embed = CreateEmbed::new()
        .title("Self Roles")
        .description(
            "Use the menu below to **opt in** to roles.\n\
             Select a role you already have to **remove** it.",
        )
        .colour(COLOUR_INFO)
        .footer(CreateEmbedFooter::new("Pick your vibes. Change anytime."));

    CreateMessage::new().embed(embed).components(vec![
        CreateActionRow::SelectMenu(menu),
        CreateActionRow::Buttons(vec![
            CreateButton::new(delete_id(guild, panel.version))
                .label("Delete Panel")
                .style(ButtonStyle::Danger),
        ]),
    ])
}

async fn manage(inv: Invocation<'_>) -> ModerationResult<()> {
    let guild = inv.guild()?;
    inv.require_admin().await?;
    let store = inv.data.store.as_ref();
    let mut panel = load(store, guild).await?;

    match inv.options.subcommand() {
        Some("add") => {
            let role = inv
                .options
                .role("role")
                .ok_or_else(|| ModerationError::invalid("❌ Please choose a role."))?;
            let label = inv
                .options
                .string("label")
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .ok_or_else(|| ModerationError::invalid("❌ Please give the role a label."))?;
            if panel.has_role(role) {
                return Err(ModerationError::invalid("That role is already on the panel."));
            }
            if panel.roles.len() >= MAX_ROLES {
                return Err(ModerationError::invalid("The panel can hold at most 25 roles."));
            }
            panel.roles.push(PanelRole {
                role_id: role.to_string(),
                label: label.to_string(),
            });
            save(store, &panel).await?;
            inv.respond(Reply::ephemeral(format!(
                "➕ Added **{label}** (<@&{role}>). {REFRESH_HINT}"
            )))
            .await
        }
        Some("remove") => {
            let role = inv
                .options
                .role("role")
                .ok_or_else(|| ModerationError::invalid("❌ Please choose a role."))?;
            if !panel.has_role(role) {
                return Err(ModerationError::invalid("That role wasn't on the panel."));
            }
            let id = role.to_string();
            panel.roles.retain(|r| r.role_id != id);
            save(store, &panel).await?;
            inv.respond(Reply::ephemeral(format!("➖ Removed <@&{role}>. {REFRESH_HINT}")))
                .await
        }
        Some("publish") => publish(&inv, guild, panel).await,
        _ => Err(ModerationError::invalid("❌ Unknown subcommand.")),
    }
}

async fn publish(
    inv: &Invocation<'_>,
    guild: GuildId,
    mut panel: SelfRolePanel,
) -> ModerationResult<()> {
    if let Some((channel, message)) = panel.posted_at() {
        if let Err(e) = inv.gateway.delete_message(channel, message).await {
            debug!(target: EVENT_TARGET, "Previous self roles panel already gone: {e}");
        }
    }

    let channel = inv.interaction.channel_id;
    panel.version += 1;
    let message = inv
        .gateway
        .post(channel, panel_message(guild, &panel))
        .await
        .map_err(|_| {
            ModerationError::external(format!(
                "Couldn't publish in <#{channel}>. Check my permissions."
            ))
        })?;
    panel.channel_id = Some(channel.to_string());
    panel.message_id = Some(message.to_string());
    save(inv.data.store.as_ref(), &panel).await?;
    info!(target: EVENT_TARGET, guild_id = %guild, version = panel.version, "Self roles panel published");

    inv.respond(Reply::ephemeral(format!("📣 Panel published in <#{channel}>.")))
        .await
}

/// Guild and version a panel control was issued for, checked against the stored panel.
async fn current_panel(inv: &Invocation<'_>) -> ModerationResult<(GuildId, SelfRolePanel)> {
    let guild = inv.guild()?;
    let component = inv
        .component
        .ok_or_else(|| ModerationError::StaleSession(STALE_CONTROL.to_string()))?;
    if component.id != Some(guild.get()) {
        return Err(ModerationError::invalid(OTHER_GUILD));
    }
    let version = component
        .extra
        .first()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or_default();
    let panel = load(inv.data.store.as_ref(), guild).await?;
    if version < panel.version {
        return Err(ModerationError::StaleSession(STALE_CONTROL.to_string()));
    }
    Ok((guild, panel))
}

async fn toggle(inv: Invocation<'_>) -> ModerationResult<()> {
    let (guild, panel) = current_panel(&inv).await?;
    let actor = inv.actor();
    let member = inv
        .gateway
        .member(guild, actor.id)
        .await?
        .ok_or_else(|| ModerationError::invalid("❌ You are not a member of this server."))?;

    let mut results = Vec::new();
    for value in inv.values() {
        let Some(role) = value.parse::<u64>().ok().filter(|id| *id != 0).map(RoleId::new) else {
            continue;
        };
        if !panel.has_role(role) {
            results.push(format!("❓ <@&{role}> (not on this panel)"));
            continue;
        }
        let outcome = if member.has_role(role) {
            inv.gateway
                .remove_role(guild, actor.id, role, "Self-roles: toggle off")
                .await
                .map(|()| format!("➖ <@&{role}>"))
        } else {
            inv.gateway
                .add_role(guild, actor.id, role, "Self-roles: toggle on")
                .await
                .map(|()| format!("➕ <@&{role}>"))
        };
        results.push(outcome.unwrap_or_else(|e| {
            debug!(target: EVENT_TARGET, "Self role toggle of {role} failed: {e}");
            format!("⚠️ <@&{role}> (failed to modify)")
        }));
    }

    let text = if results.is_empty() {
        "No changes.".to_string()
    } else {
        results.join("\n")
    };
    inv.respond(Reply::ephemeral(text)).await
}

async fn delete_panel(inv: Invocation<'_>) -> ModerationResult<()> {
    let component_is_delete = inv.component.is_some_and(|c| c.action_is("delete"));
    if !component_is_delete {
        return Err(ModerationError::HandlerMissing(
            crate::router::BUTTON_NOT_WIRED.to_string(),
        ));
    }
    inv.require_admin().await?;
    let (_, mut panel) = current_panel(&inv).await?;
    let Some((channel, message)) = panel.posted_at() else {
        return Err(ModerationError::external(
            "I couldn't find that panel message. Delete it manually.",
        ));
    };
    inv.gateway.delete_message(channel, message).await.map_err(|_| {
        ModerationError::external(
            "I couldn't delete that message. Check my permissions, or delete it manually.",
        )
    })?;
    panel.message_id = None;
    save(inv.data.store.as_ref(), &panel).await?;
    inv.respond(Reply::ephemeral(format!(
        "🗑️ Panel message deleted. {REFRESH_HINT}"
    )))
    .await
}
