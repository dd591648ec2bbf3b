//! Platform-neutral view of an inbound interaction.

use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};
use std::collections::HashMap;

/// Who invoked the interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub tag: String,
    pub bot: bool,
}

#[derive(Debug, Clone)]
pub struct InboundInteraction {
    pub actor: Actor,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub kind: InteractionKind,
}

#[derive(Debug, Clone)]
pub enum InteractionKind {
    Slash {
        command: String,
        options: CommandOptions,
    },
    Autocomplete {
        command: String,
        options: CommandOptions,
    },
    Modal {
        custom_id: String,
        fields: HashMap<String, String>,
    },
    Button {
        custom_id: String,
    },
    Select {
        custom_id: String,
        values: Vec<String>,
    },
}

impl InteractionKind {
    /// Short label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Slash { .. } => "slash",
            Self::Autocomplete { .. } => "autocomplete",
            Self::Modal { .. } => "modal",
            Self::Button { .. } => "button",
            Self::Select { .. } => "select",
        }
    }

    #[must_use]
    pub fn is_component(&self) -> bool {
        matches!(self, Self::Button { .. } | Self::Select { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    User(UserId),
    Role(RoleId),
    Channel(ChannelId),
}

/// Resolved slash command options, flattened past a single subcommand level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOptions {
    subcommand: Option<String>,
    values: HashMap<String, OptionValue>,
    focused: Option<String>,
}

impl CommandOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: OptionValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_subcommand(mut self, name: &str) -> Self {
        self.subcommand = Some(name.to_string());
        self
    }

    /// Mark the option the user is typing into (autocomplete).
    #[must_use]
    pub fn with_focused(mut self, name: &str) -> Self {
        self.focused = Some(name.to_string());
        self
    }

    /// A copy whose `user` option is the given subject.
    ///
    /// Lets a panel button run a command as if the subject had been picked in
    /// the slash command. The receiver is left untouched.
    #[must_use]
    pub fn with_user(&self, user: UserId) -> Self {
        self.clone().with("user", OptionValue::User(user))
    }

    #[must_use]
    pub fn subcommand(&self) -> Option<&str> {
        self.subcommand.as_deref()
    }

    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::String(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(OptionValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(OptionValue::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn user(&self, name: &str) -> Option<UserId> {
        match self.values.get(name) {
            Some(OptionValue::User(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn role(&self, name: &str) -> Option<RoleId> {
        match self.values.get(name) {
            Some(OptionValue::Role(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn channel(&self, name: &str) -> Option<ChannelId> {
        match self.values.get(name) {
            Some(OptionValue::Channel(value)) => Some(*value),
            _ => None,
        }
    }

    /// The focused option's name and current text.
    #[must_use]
    pub fn focused(&self) -> Option<(&str, &str)> {
        let name = self.focused.as_deref()?;
        Some((name, self.string(name).unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let options = CommandOptions::new()
            .with("user", OptionValue::User(UserId::new(4)))
            .with("reason", OptionValue::String("spam".to_string()))
            .with("days", OptionValue::Integer(3));
        assert_eq!(options.user("user"), Some(UserId::new(4)));
        assert_eq!(options.string("reason"), Some("spam"));
        assert_eq!(options.integer("days"), Some(3));
        assert_eq!(options.string("user"), None);
        assert_eq!(options.role("missing"), None);
    }

    #[test]
    fn test_with_user_leaves_original_untouched() {
        let original = CommandOptions::new().with("user", OptionValue::User(UserId::new(1)));
        let overlay = original.with_user(UserId::new(2));
        assert_eq!(overlay.user("user"), Some(UserId::new(2)));
        assert_eq!(original.user("user"), Some(UserId::new(1)));
    }

    #[test]
    fn test_focused_option() {
        let options = CommandOptions::new()
            .with("id", OptionValue::String("ab".to_string()))
            .with_focused("id");
        assert_eq!(options.focused(), Some(("id", "ab")));
        assert_eq!(CommandOptions::new().focused(), None);
    }
}
