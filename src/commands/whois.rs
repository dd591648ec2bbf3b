//! `/whois`: a paged profile of a user, switched with buttons or a menu.
//!
//! Every control id carries a nonce (`whois:<page>:<user>:<nonce>`) so two
//! open profiles never share ids.

use super::truncate;
use crate::custom_id::ComponentId;
use crate::error::{ModerationError, ModerationResult};
use crate::platform::{MemberSummary, Reply, UserSummary};
use crate::registry::{CommandHandler, Invocation};
use futures::FutureExt;
use futures::future::BoxFuture;
use poise::serenity_prelude::{
    ButtonStyle, CommandOptionType, CreateActionRow, CreateButton, CreateCommand,
    CreateCommandOption, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption, Timestamp, UserId,
};
use uuid::Uuid;

const COMMAND: &str = "whois";
const SHOWN_ROLES: usize = 15;
const COLOUR_PROFILE: u32 = 0x58_65_F2;
const COLOUR_SECURITY: u32 = 0xED_42_45;
const COLOUR_ASSETS: u32 = 0x57_F2_87;
pub const INVALID_ID: &str = "❌ That is not a valid user id.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Roles,
    Security,
    Assets,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Overview, Page::Roles, Page::Security, Page::Assets];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Page::Overview => "overview",
            Page::Roles => "roles",
            Page::Security => "security",
            Page::Assets => "assets",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Page::Overview => "Overview",
            Page::Roles => "Roles",
            Page::Security => "Security",
            Page::Assets => "Assets",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|page| page.key() == key)
    }
}

pub fn handler() -> CommandHandler {
    CommandHandler::new(COMMAND, definition, execute)
        .button(button)
        .select(select)
}

fn definition() -> CreateCommand {
    CreateCommand::new(COMMAND)
        .description("Profile of a user: overview, roles, security, assets")
        .add_option(CreateCommandOption::new(
            CommandOptionType::User,
            "user",
            "Target user (mention or pick)",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "id",
            "Target by ID (if not in server)",
        ))
}

fn execute(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    open(inv).boxed()
}

fn button(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    turn_page(inv, None).boxed()
}

fn select(inv: Invocation<'_>) -> BoxFuture<'_, ModerationResult<()>> {
    let page = inv
        .values()
        .first()
        .and_then(|value| Page::from_key(value))
        .unwrap_or(Page::Overview);
    turn_page(inv, Some(page)).boxed()
}

/// A fresh control id for `action` on `subject`'s profile.
fn control_id(action: &str, subject: UserId) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    ComponentId::new(COMMAND)
        .action(action)
        .id(subject.get())
        .extra(&nonce[..8])
        .to_string()
}

/// Page buttons (the current one highlighted) and the jump menu.
#[must_use]
pub fn controls(subject: UserId, current: Page) -> Vec<CreateActionRow> {
    let buttons = Page::ALL
        .into_iter()
        .map(|page| {
            let style = if page == current {
                ButtonStyle::Primary
            } else {
                ButtonStyle::Secondary
            };
            CreateButton::new(control_id(page.key(), subject))
                .label(page.label())
                .style(style)
        })
        .collect();
    let options = Page::ALL
        .into_iter()
        .map(|page| CreateSelectMenuOption::new(page.label(), page.key()))
        .collect();
    let menu = CreateSelectMenu::new(
        control_id("select", subject),
        CreateSelectMenuKind::String { options },
    )
    .placeholder("Jump to…");
    vec![
        CreateActionRow::Buttons(buttons),
        CreateActionRow::SelectMenu(menu),
    ]
}

fn role_list(member: Option<&MemberSummary>) -> (String, usize) {
    let Some(member) = member else {
        return ("None".to_string(), 0);
    };
    if member.roles.is_empty() {
        return ("None".to_string(), 0);
    }
    let shown: Vec<String> = member
        .roles
        .iter()
        .take(SHOWN_ROLES)
        .map(|role| format!("<@&{role}>"))
        .collect();
    let mut text = shown.join(" ");
    if member.roles.len() > SHOWN_ROLES {
        text.push_str(&format!(" … (+{} more)", member.roles.len() - SHOWN_ROLES));
    }
    (text, member.roles.len())
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

struct Profile {
    user: UserSummary,
    member: Option<MemberSummary>,
    manageable: bool,
}

impl Profile {
    async fn load(inv: &Invocation<'_>, subject: UserId) -> ModerationResult<Self> {
        let user = inv.resolve_user(subject).await?;
        let (member, manageable) = match inv.interaction.guild_id {
            Some(guild) => match inv.gateway.member(guild, subject).await? {
                Some(member) => {
                    let manageable = inv.gateway.can_manage(guild, subject).await?;
                    (Some(member), manageable)
                }
                None => (None, false),
            },
            None => (None, false),
        };
        Ok(Self {
            user,
            member,
            manageable,
        })
    }

    fn embed(&self, inv: &Invocation<'_>, page: Page) -> CreateEmbed {
        match page {
            Page::Overview => self.overview(),
            Page::Roles => self.roles(),
            Page::Security => self.security(inv),
            Page::Assets => self.assets(),
        }
    }

    fn overview(&self) -> CreateEmbed {
        let user = &self.user;
        let name = if user.bot {
            format!("{} • 🤖", user.tag)
        } else {
            user.tag.clone()
        };
        let created = user.id.created_at().unix_timestamp();
        let (roles, _) = role_list(self.member.as_ref());
        CreateEmbed::new()
            .author(CreateEmbedAuthor::new(name).icon_url(&user.avatar_url))
            .title("👤 Overview")
            .field("ID", format!("`{}`", user.id), true)
            .field("Created", format!("<t:{created}:F>"), true)
            .field("In server", yes_no(self.member.is_some()), true)
            .field("Top roles", truncate(&roles, 1024), false)
            .thumbnail(&user.avatar_url)
            .colour(COLOUR_PROFILE)
            .footer(CreateEmbedFooter::new("User Overview"))
            .timestamp(Timestamp::now())
    }

    fn roles(&self) -> CreateEmbed {
        let (roles, count) = role_list(self.member.as_ref());
        CreateEmbed::new()
            .title("📜 Roles")
            .description(truncate(&roles, 4000))
            .colour(COLOUR_PROFILE)
            .footer(CreateEmbedFooter::new(format!("Total roles: {count}")))
            .timestamp(Timestamp::now())
    }

    fn security(&self, inv: &Invocation<'_>) -> CreateEmbed {
        let config = &inv.data.config;
        let has = |role| self.member.as_ref().is_some_and(|member| member.has_role(role));
        let top = self
            .member
            .as_ref()
            .map_or_else(|| "None".to_string(), |member| member.top_role_position.to_string());
        CreateEmbed::new()
            .title("🛡️ Security")
            .field("Highest role position", top, true)
            .field("Manageable by bot", yes_no(self.manageable), true)
            .field("Muted", yes_no(has(config.muted_role_id)), true)
            .field("Admin", yes_no(has(config.admin_role_id)), true)
            .field("Developer", yes_no(has(config.dev_role_id)), true)
            .colour(COLOUR_SECURITY)
            .timestamp(Timestamp::now())
    }

    fn assets(&self) -> CreateEmbed {
        let avatar = &self.user.avatar_url;
        CreateEmbed::new()
            .title("🖼️ Assets")
            .description(format!("**Avatar:** [Open]({avatar})"))
            .thumbnail(avatar)
            .colour(COLOUR_ASSETS)
            .timestamp(Timestamp::now())
    }
}

/// The `user` option, then the `id` option, then the actor.
fn target(inv: &Invocation<'_>) -> ModerationResult<UserId> {
    if let Some(user) = inv.options.user("user") {
        return Ok(user);
    }
    match inv.options.string("id").map(str::trim) {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(UserId::new)
            .ok_or_else(|| ModerationError::invalid(INVALID_ID)),
        None => Ok(inv.actor().id),
    }
}

async fn open(inv: Invocation<'_>) -> ModerationResult<()> {
    let subject = target(&inv)?;
    let profile = Profile::load(&inv, subject).await?;
    let reply = Reply::default()
        .embed(profile.embed(&inv, Page::Overview))
        .components(controls(subject, Page::Overview));
    inv.respond(reply).await
}

/// Redraw the profile on `page`, or on the page named by the button.
async fn turn_page(inv: Invocation<'_>, page: Option<Page>) -> ModerationResult<()> {
    let Some(component) = inv.component else {
        return Ok(());
    };
    let Some(subject) = component.subject() else {
        return Ok(());
    };
    let page = match page {
        Some(page) => page,
        None => match component.action.as_deref().and_then(Page::from_key) {
            Some(page) => page,
            None => return Ok(()),
        },
    };
    let profile = Profile::load(&inv, subject).await?;
    let reply = Reply::default()
        .embed(profile.embed(&inv, page))
        .components(controls(subject, page));
    inv.responder.edit_original(reply).await?;
    Ok(())
}
