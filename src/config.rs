//! Process configuration read from the environment at startup.

use poise::serenity_prelude::{ChannelId, RoleId, UserId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is not set.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Variable is set but is not a Discord snowflake.
    #[error("Environment variable {name} is not a valid id: {value:?}")]
    InvalidId { name: String, value: String },
}

/// Everything the bot needs to know about its deployment.
#[derive(Clone)]
pub struct BotConfig {
    pub token: String,
    /// Directory holding the YAML record collections.
    pub storage_path: PathBuf,
    pub owner_id: UserId,
    pub admin_role_id: RoleId,
    pub dev_role_id: RoleId,
    pub muted_role_id: RoleId,
    /// Optional role pinged on staff log posts.
    pub staff_role_id: Option<RoleId>,
    pub log_channel_id: ChannelId,
    pub discipline_channel_id: ChannelId,
    /// Where `/devupdate` posts. Falls back to the log channel.
    pub dev_updates_channel_id: Option<ChannelId>,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("storage_path", &self.storage_path)
            .field("owner_id", &self.owner_id)
            .field("admin_role_id", &self.admin_role_id)
            .field("dev_role_id", &self.dev_role_id)
            .field("muted_role_id", &self.muted_role_id)
            .field("staff_role_id", &self.staff_role_id)
            .field("log_channel_id", &self.log_channel_id)
            .field("discipline_channel_id", &self.discipline_channel_id)
            .field("dev_updates_channel_id", &self.dev_updates_channel_id)
            .finish()
    }
}

impl BotConfig {
    /// Load `.env` (if present) and read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first variable that is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine, the variables may come from the real environment.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first variable that is missing or malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
        };
        let snowflake = |name: &str| -> Result<u64, ConfigError> {
            let value = required(name)?;
            parse_snowflake(name, &value)
        };

        let optional = |name: &str| -> Result<Option<u64>, ConfigError> {
            match lookup(name).map(|v| v.trim().to_string()) {
                Some(value) if !value.is_empty() => parse_snowflake(name, &value).map(Some),
                _ => Ok(None),
            }
        };

        Ok(Self {
            token: required("DISCORD_TOKEN")?,
            storage_path: PathBuf::from(required("STORAGE_PATH")?),
            owner_id: UserId::new(snowflake("OWNER_ID")?),
            admin_role_id: RoleId::new(snowflake("ADMIN_ROLE_ID")?),
            dev_role_id: RoleId::new(snowflake("DEV_ROLE_ID")?),
            muted_role_id: RoleId::new(snowflake("MUTED_ROLE_ID")?),
            staff_role_id: optional("STAFF_ROLE_ID")?.map(RoleId::new),
            log_channel_id: ChannelId::new(snowflake("LOG_CHANNEL_ID")?),
            discipline_channel_id: ChannelId::new(snowflake("DISCIPLINE_CHANNEL_ID")?),
            dev_updates_channel_id: optional("DEV_UPDATES_CHANNEL_ID")?.map(ChannelId::new),
        })
    }
}

fn parse_snowflake(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| ConfigError::InvalidId {
            name: name.to_string(),
            value: value.to_string(),
        })
}
