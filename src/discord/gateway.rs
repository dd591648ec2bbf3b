//! `Gateway` over serenity's HTTP client and cache.

use crate::platform::{Gateway, GatewayError, GatewayResult, MemberSummary, UserSummary};
use async_trait::async_trait;
use poise::serenity_prelude::{
    Cache, ChannelId, CreateEmbed, CreateMessage, EditMember, GuildId, Http, Member, MessageId,
    RoleId, UserId,
};
use serenity::http::HttpError;
use std::sync::Arc;

/// Discord error codes for missing guild members and users.
const UNKNOWN_MEMBER: isize = 10007;
const UNKNOWN_USER: isize = 10013;
const MISSING_PERMISSIONS: isize = 50013;

fn discord_code(error: &serenity::Error) -> Option<isize> {
    match error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            Some(response.error.code)
        }
        _ => None,
    }
}

fn classify(error: serenity::Error) -> GatewayError {
    match discord_code(&error) {
        Some(MISSING_PERMISSIONS) => GatewayError::Rejected(error.to_string()),
        Some(UNKNOWN_MEMBER | UNKNOWN_USER) => GatewayError::NotFound(error.to_string()),
        _ => GatewayError::from(error),
    }
}

#[derive(Clone)]
pub struct SerenityGateway {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityGateway {
    #[must_use]
    pub fn new(ctx: &serenity::client::Context) -> Self {
        Self {
            http: Arc::clone(&ctx.http),
            cache: Arc::clone(&ctx.cache),
        }
    }

    fn cache_http(&self) -> (&Arc<Cache>, &Http) {
        (&self.cache, self.http.as_ref())
    }

    /// Highest cached role position among `roles`, 0 when the guild isn't cached.
    fn top_position(&self, guild: GuildId, roles: &[RoleId]) -> u16 {
        self.cache
            .guild(guild)
            .and_then(|guild| {
                roles
                    .iter()
                    .filter_map(|role| guild.roles.get(role))
                    .map(|role| role.position)
                    .max()
            })
            .unwrap_or(0)
    }

    fn summarize(&self, guild: GuildId, member: &Member) -> MemberSummary {
        MemberSummary {
            user: UserSummary {
                id: member.user.id,
                tag: member.user.tag(),
                bot: member.user.bot,
                avatar_url: member.user.face(),
            },
            roles: member.roles.clone(),
            top_role_position: self.top_position(guild, &member.roles),
        }
    }

    fn is_guild_owner(&self, guild: GuildId, user: UserId) -> bool {
        self.cache
            .guild(guild)
            .is_some_and(|guild| guild.owner_id == user)
    }
}

#[async_trait]
impl Gateway for SerenityGateway {
    async fn user(&self, user: UserId) -> GatewayResult<UserSummary> {
        let user = user.to_user(self.cache_http()).await.map_err(classify)?;
        Ok(UserSummary {
            id: user.id,
            tag: user.tag(),
            bot: user.bot,
            avatar_url: user.face(),
        })
    }

    async fn member(&self, guild: GuildId, user: UserId) -> GatewayResult<Option<MemberSummary>> {
        match guild.member(self.cache_http(), user).await {
            Ok(member) => Ok(Some(self.summarize(guild, &member))),
            Err(e) => match classify(e) {
                GatewayError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn direct_message(&self, user: UserId, embed: CreateEmbed) -> GatewayResult<()> {
        user.direct_message(self.cache_http(), CreateMessage::new().embed(embed))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> GatewayResult<()> {
        self.http
            .add_member_role(guild, user, role, Some(reason))
            .await
            .map_err(classify)
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> GatewayResult<()> {
        self.http
            .remove_member_role(guild, user, role, Some(reason))
            .await
            .map_err(classify)
    }

    async fn set_roles(
        &self,
        guild: GuildId,
        user: UserId,
        roles: Vec<RoleId>,
        reason: &str,
    ) -> GatewayResult<()> {
        guild
            .edit_member(
                self.http.as_ref(),
                user,
                EditMember::new().roles(roles).audit_log_reason(reason),
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn kick(&self, guild: GuildId, user: UserId, reason: &str) -> GatewayResult<()> {
        guild
            .kick_with_reason(self.http.as_ref(), user, reason)
            .await
            .map_err(classify)
    }

    async fn ban(&self, guild: GuildId, user: UserId, reason: &str) -> GatewayResult<()> {
        guild
            .ban_with_reason(self.http.as_ref(), user, 0, reason)
            .await
            .map_err(classify)
    }

    async fn unban(&self, guild: GuildId, user: UserId) -> GatewayResult<()> {
        guild.unban(self.http.as_ref(), user).await.map_err(classify)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> GatewayResult<()> {
        channel
            .delete_message(self.http.as_ref(), message)
            .await
            .map_err(classify)
    }

    async fn post(&self, channel: ChannelId, message: CreateMessage) -> GatewayResult<MessageId> {
        let sent = channel
            .send_message(self.http.as_ref(), message)
            .await
            .map_err(classify)?;
        Ok(sent.id)
    }

    async fn can_manage(&self, guild: GuildId, user: UserId) -> GatewayResult<bool> {
        if self.is_guild_owner(guild, user) {
            return Ok(false);
        }
        let bot = self.cache.current_user().id;
        let Some(own) = self.member(guild, bot).await? else {
            return Ok(false);
        };
        let Some(target) = self.member(guild, user).await? else {
            return Ok(false);
        };
        Ok(own.top_role_position > target.top_role_position)
    }
}
