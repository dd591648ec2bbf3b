//! Structured identifiers attached to buttons, select menus and modals.
//!
//! Identifiers follow `<command>[:|_]<segments...>`. The moderator panel uses
//! the reserved shape `mod_<action>_<subjectId>`, where the action names the
//! command to run against the subject.

use poise::serenity_prelude::UserId;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Reserved first segment of moderator panel buttons.
pub const MOD_PANEL_PREFIX: &str = "mod";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomIdError {
    #[error("component identifier is empty")]
    Empty,
    #[error("malformed moderator panel identifier: {0}")]
    MalformedModPanel(String),
}

/// A parsed component identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomId {
    /// `mod_<action>_<subjectId>`
    ModPanel { action: String, subject: UserId },
    /// Any other `<command>:...` identifier
    Command(ComponentId),
}

/// `<command>[:<action>][:<id>][:<extra>...]`
///
/// The first segment after the command is the action when it is not numeric.
/// The first numeric segment after that is the id, anything left is extra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentId {
    pub command: String,
    pub action: Option<String>,
    pub id: Option<u64>,
    pub extra: Vec<String>,
}

impl CustomId {
    /// Parse a raw identifier.
    ///
    /// # Errors
    ///
    /// Rejects empty identifiers and `mod` identifiers without an action and a numeric subject.
    pub fn parse(raw: &str) -> Result<Self, CustomIdError> {
        let parts: Vec<&str> = raw
            .split([':', '_'])
            .filter(|part| !part.is_empty())
            .collect();
        let Some((command, rest)) = parts.split_first() else {
            return Err(CustomIdError::Empty);
        };

        if *command == MOD_PANEL_PREFIX {
            return match rest {
                [action, subject] => subject
                    .parse::<u64>()
                    .ok()
                    .filter(|id| *id != 0)
                    .map(|id| Self::ModPanel {
                        action: (*action).to_string(),
                        subject: UserId::new(id),
                    })
                    .ok_or_else(|| CustomIdError::MalformedModPanel(raw.to_string())),
                _ => Err(CustomIdError::MalformedModPanel(raw.to_string())),
            };
        }

        let mut rest = rest.iter().peekable();
        let action = match rest.peek() {
            Some(segment) if segment.parse::<u64>().is_err() => {
                rest.next().map(|s| (*s).to_string())
            }
            _ => None,
        };
        let id = match rest.peek().and_then(|s| s.parse::<u64>().ok()) {
            Some(id) => {
                rest.next();
                Some(id)
            }
            None => None,
        };
        let extra = rest.map(|s| (*s).to_string()).collect();

        Ok(Self::Command(ComponentId {
            command: (*command).to_string(),
            action,
            id,
            extra,
        }))
    }

    /// Name used to look the handler up in the command registry.
    #[must_use]
    pub fn command_name(&self) -> &str {
        match self {
            Self::ModPanel { action, .. } => action,
            Self::Command(component) => &component.command,
        }
    }
}

impl ComponentId {
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            action: None,
            id: None,
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    #[must_use]
    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn extra(mut self, extra: impl ToString) -> Self {
        self.extra.push(extra.to_string());
        self
    }

    #[must_use]
    pub fn action_is(&self, action: &str) -> bool {
        self.action.as_deref() == Some(action)
    }

    /// The id segment as a user, for identifiers that carry a subject.
    #[must_use]
    pub fn subject(&self) -> Option<UserId> {
        self.id.filter(|id| *id != 0).map(UserId::new)
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(action) = &self.action {
            write!(f, ":{action}")?;
        }
        if let Some(id) = self.id {
            write!(f, ":{id}")?;
        }
        for extra in &self.extra {
            write!(f, ":{extra}")?;
        }
        Ok(())
    }
}

/// Identifier of a moderator panel button.
#[must_use]
pub fn mod_panel_id(action: &str, subject: UserId) -> String {
    format!("{MOD_PANEL_PREFIX}_{action}_{subject}")
}
