//! Translation of serenity models into the bot's platform-neutral types.

use super::responder::ResponseTarget;
use crate::detectors::{ObservedMessage, PrivilegedAction, PrivilegedActionEvent};
use crate::interaction::{Actor, CommandOptions, InboundInteraction, InteractionKind, OptionValue};
use poise::serenity_prelude::{
    ActionRowComponent, ComponentInteractionDataKind, GuildId, Interaction, Message,
    ResolvedOption, ResolvedValue, User,
};
use serenity::model::guild::audit_log::{
    Action, AuditLogEntry, ChannelAction, EmojiAction, MemberAction, RoleAction,
};
use std::collections::HashMap;

fn actor(user: &User) -> Actor {
    Actor {
        id: user.id,
        tag: user.tag(),
        bot: user.bot,
    }
}

/// Flatten resolved options, descending into a subcommand or group.
fn collect_options(resolved: Vec<ResolvedOption<'_>>, mut options: CommandOptions) -> CommandOptions {
    for option in resolved {
        let value = match option.value {
            ResolvedValue::SubCommand(nested) | ResolvedValue::SubCommandGroup(nested) => {
                options = collect_options(nested, options.with_subcommand(option.name));
                continue;
            }
            ResolvedValue::Autocomplete { value, .. } => {
                options = options.with_focused(option.name);
                OptionValue::String(value.to_string())
            }
            ResolvedValue::String(value) => OptionValue::String(value.to_string()),
            ResolvedValue::Integer(value) => OptionValue::Integer(value),
            ResolvedValue::Boolean(value) => OptionValue::Boolean(value),
            ResolvedValue::User(user, _) => OptionValue::User(user.id),
            ResolvedValue::Role(role) => OptionValue::Role(role.id),
            ResolvedValue::Channel(channel) => OptionValue::Channel(channel.id),
            _ => continue,
        };
        options = options.with(option.name, value);
    }
    options
}

/// Split a gateway interaction into what the router sees and what answers it.
///
/// Returns `None` for interaction types the bot does not handle.
#[must_use]
pub fn inbound(interaction: &Interaction) -> Option<(InboundInteraction, ResponseTarget)> {
    match interaction {
        Interaction::Command(command) => {
            let kind = InteractionKind::Slash {
                command: command.data.name.clone(),
                options: collect_options(command.data.options(), CommandOptions::new()),
            };
            Some((
                InboundInteraction {
                    actor: actor(&command.user),
                    guild_id: command.guild_id,
                    channel_id: command.channel_id,
                    kind,
                },
                ResponseTarget::Command(Box::new(command.clone())),
            ))
        }
        Interaction::Autocomplete(command) => {
            let kind = InteractionKind::Autocomplete {
                command: command.data.name.clone(),
                options: collect_options(command.data.options(), CommandOptions::new()),
            };
            Some((
                InboundInteraction {
                    actor: actor(&command.user),
                    guild_id: command.guild_id,
                    channel_id: command.channel_id,
                    kind,
                },
                ResponseTarget::Command(Box::new(command.clone())),
            ))
        }
        Interaction::Component(component) => {
            let custom_id = component.data.custom_id.clone();
            let kind = match &component.data.kind {
                ComponentInteractionDataKind::Button => InteractionKind::Button { custom_id },
                ComponentInteractionDataKind::StringSelect { values } => InteractionKind::Select {
                    custom_id,
                    values: values.clone(),
                },
                ComponentInteractionDataKind::RoleSelect { values } => InteractionKind::Select {
                    custom_id,
                    values: values.iter().map(ToString::to_string).collect(),
                },
                ComponentInteractionDataKind::UserSelect { values } => InteractionKind::Select {
                    custom_id,
                    values: values.iter().map(ToString::to_string).collect(),
                },
                _ => return None,
            };
            Some((
                InboundInteraction {
                    actor: actor(&component.user),
                    guild_id: component.guild_id,
                    channel_id: component.channel_id,
                    kind,
                },
                ResponseTarget::Component(Box::new(component.clone())),
            ))
        }
        Interaction::Modal(modal) => {
            let mut fields = HashMap::new();
            for row in &modal.data.components {
                for component in &row.components {
                    if let ActionRowComponent::InputText(input) = component {
                        let value: Option<String> = input.value.clone().into();
                        fields.insert(input.custom_id.clone(), value.unwrap_or_default());
                    }
                }
            }
            Some((
                InboundInteraction {
                    actor: actor(&modal.user),
                    guild_id: modal.guild_id,
                    channel_id: modal.channel_id,
                    kind: InteractionKind::Modal {
                        custom_id: modal.data.custom_id.clone(),
                        fields,
                    },
                },
                ResponseTarget::Modal(Box::new(modal.clone())),
            ))
        }
        _ => None,
    }
}

/// A guild message for the spam detector. Direct messages yield `None`.
#[must_use]
pub fn observed_message(message: &Message) -> Option<ObservedMessage> {
    Some(ObservedMessage {
        guild: message.guild_id?,
        channel: message.channel_id,
        message: message.id,
        author: message.author.id,
        author_bot: message.author.bot,
        content: message.content.clone(),
        mentioned_users: message.mentions.len(),
    })
}

/// Map an audit log entry onto a watched privileged action.
#[must_use]
pub fn privileged_event(entry: &AuditLogEntry, guild: GuildId) -> Option<PrivilegedActionEvent> {
    let action = match entry.action {
        Action::Channel(ChannelAction::Delete) => PrivilegedAction::ChannelDelete,
        Action::Role(RoleAction::Delete) => PrivilegedAction::RoleDelete,
        Action::Emoji(EmojiAction::Delete) => PrivilegedAction::EmojiDelete,
        Action::Member(MemberAction::BanAdd) => PrivilegedAction::BanAdd,
        _ => return None,
    };
    Some(PrivilegedActionEvent {
        guild,
        action,
        executor: entry.user_id,
        target_id: entry.target_id.map(|target| target.get()),
    })
}
