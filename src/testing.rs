//! Recording fakes for the platform seams, shared by unit tests.

use crate::config::BotConfig;
use crate::data::Data;
use crate::interaction::{Actor, CommandOptions, InboundInteraction, InteractionKind};
use crate::platform::{
    AckError, Gateway, GatewayError, GatewayResult, MemberSummary, Reply, Responder, Suggestion,
    UserSummary,
};
use crate::store::MemoryRecordStore;
use async_trait::async_trait;
use poise::serenity_prelude::{
    ChannelId, CreateEmbed, CreateMessage, CreateModal, GuildId, MessageId, RoleId, UserId,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const GUILD: GuildId = GuildId::new(10);
pub const CHANNEL: ChannelId = ChannelId::new(20);
pub const OWNER: UserId = UserId::new(1);
pub const ADMIN_ROLE: RoleId = RoleId::new(100);
pub const DEV_ROLE: RoleId = RoleId::new(101);
pub const MUTED_ROLE: RoleId = RoleId::new(102);
pub const STAFF_ROLE: RoleId = RoleId::new(103);
pub const LOG_CHANNEL: ChannelId = ChannelId::new(200);
pub const DISCIPLINE_CHANNEL: ChannelId = ChannelId::new(201);
pub const DEV_UPDATES_CHANNEL: ChannelId = ChannelId::new(202);

pub fn config() -> BotConfig {
    BotConfig {
        token: "token".to_string(),
        storage_path: PathBuf::from("data"),
        owner_id: OWNER,
        admin_role_id: ADMIN_ROLE,
        dev_role_id: DEV_ROLE,
        muted_role_id: MUTED_ROLE,
        staff_role_id: Some(STAFF_ROLE),
        log_channel_id: LOG_CHANNEL,
        discipline_channel_id: DISCIPLINE_CHANNEL,
        dev_updates_channel_id: Some(DEV_UPDATES_CHANNEL),
    }
}

/// Bot state over an in-memory store.
pub fn data() -> Data {
    Data::new(config(), Arc::new(MemoryRecordStore::new()))
}

pub fn actor(id: u64) -> Actor {
    Actor {
        id: UserId::new(id),
        tag: format!("user{id}"),
        bot: false,
    }
}

pub fn interaction(actor_id: u64, kind: InteractionKind) -> InboundInteraction {
    InboundInteraction {
        actor: actor(actor_id),
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        kind,
    }
}

pub fn slash(actor_id: u64, command: &str, options: CommandOptions) -> InboundInteraction {
    interaction(
        actor_id,
        InteractionKind::Slash {
            command: command.to_string(),
            options,
        },
    )
}

pub fn button(actor_id: u64, custom_id: &str) -> InboundInteraction {
    interaction(
        actor_id,
        InteractionKind::Button {
            custom_id: custom_id.to_string(),
        },
    )
}

pub fn modal(actor_id: u64, custom_id: &str, fields: &[(&str, &str)]) -> InboundInteraction {
    interaction(
        actor_id,
        InteractionKind::Modal {
            custom_id: custom_id.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        },
    )
}

/// A primary response recorded by `FakeResponder`.
#[derive(Debug, Clone)]
pub enum Primary {
    Reply(Reply),
    DeferUpdate,
    Modal(Value),
    Suggest(Vec<Suggestion>),
}

/// Responder that records what was sent and enforces the one-primary rule.
#[derive(Debug, Default)]
pub struct FakeResponder {
    acked: AtomicBool,
    expired: bool,
    duplicates: AtomicUsize,
    primaries: Mutex<Vec<Primary>>,
    follow_ups: Mutex<Vec<Reply>>,
    edits: Mutex<Vec<Reply>>,
}

impl FakeResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A responder whose interaction token is already gone.
    pub fn expired() -> Self {
        Self {
            expired: true,
            ..Self::default()
        }
    }

    fn primary(&self, primary: Primary) -> Result<(), AckError> {
        if self.expired {
            return Err(AckError::UnknownInteraction);
        }
        if self.acked.swap(true, Ordering::SeqCst) {
            self.duplicates.fetch_add(1, Ordering::SeqCst);
            return Err(AckError::AlreadyAcknowledged);
        }
        self.primaries.lock().unwrap().push(primary);
        Ok(())
    }

    pub fn primary_count(&self) -> usize {
        self.primaries.lock().unwrap().len()
    }

    /// Primary responses attempted after the first one.
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.load(Ordering::SeqCst)
    }

    pub fn primaries(&self) -> Vec<Primary> {
        self.primaries.lock().unwrap().clone()
    }

    pub fn follow_up_contents(&self) -> Vec<String> {
        self.follow_ups
            .lock()
            .unwrap()
            .iter()
            .filter_map(|reply| reply.content.clone())
            .collect()
    }

    /// Every text the actor saw, replies and follow-ups in order.
    pub fn messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = self
            .primaries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|primary| match primary {
                Primary::Reply(reply) => reply.content.clone(),
                _ => None,
            })
            .collect();
        messages.extend(self.follow_up_contents());
        messages
    }

    pub fn last_message(&self) -> Option<String> {
        self.messages().pop()
    }

    /// Every reply or follow-up, for inspecting embeds and components.
    pub fn replies(&self) -> Vec<Reply> {
        let mut replies: Vec<Reply> = self
            .primaries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|primary| match primary {
                Primary::Reply(reply) => Some(reply.clone()),
                _ => None,
            })
            .collect();
        replies.extend(self.follow_ups.lock().unwrap().iter().cloned());
        replies
    }

    /// Custom id of the modal shown, if any.
    pub fn modal_id(&self) -> Option<String> {
        self.primaries
            .lock()
            .unwrap()
            .iter()
            .find_map(|primary| match primary {
                Primary::Modal(modal) => modal["custom_id"].as_str().map(String::from),
                _ => None,
            })
    }

    pub fn suggestions(&self) -> Option<Vec<Suggestion>> {
        self.primaries
            .lock()
            .unwrap()
            .iter()
            .find_map(|primary| match primary {
                Primary::Suggest(choices) => Some(choices.clone()),
                _ => None,
            })
    }

    /// Replacements of the original message, oldest first.
    pub fn edits(&self) -> Vec<Reply> {
        self.edits.lock().unwrap().clone()
    }

    pub fn deferred(&self) -> bool {
        self.primaries
            .lock()
            .unwrap()
            .iter()
            .any(|primary| matches!(primary, Primary::DeferUpdate))
    }
}

#[async_trait]
impl Responder for FakeResponder {
    async fn reply(&self, reply: Reply) -> Result<(), AckError> {
        self.primary(Primary::Reply(reply))
    }

    async fn defer_update(&self) -> Result<(), AckError> {
        self.primary(Primary::DeferUpdate)
    }

    async fn show_modal(&self, modal: CreateModal) -> Result<(), AckError> {
        let modal = serde_json::to_value(&modal).map_err(|e| AckError::Platform(e.to_string()))?;
        self.primary(Primary::Modal(modal))
    }

    async fn suggest(&self, choices: Vec<Suggestion>) -> Result<(), AckError> {
        self.primary(Primary::Suggest(choices))
    }

    async fn follow_up(&self, reply: Reply) -> Result<(), AckError> {
        if !self.acked.load(Ordering::SeqCst) {
            return Err(AckError::Platform("follow-up before acknowledgement".to_string()));
        }
        self.follow_ups.lock().unwrap().push(reply);
        Ok(())
    }

    async fn edit_original(&self, reply: Reply) -> Result<(), AckError> {
        if !self.acked.load(Ordering::SeqCst) {
            return Err(AckError::Platform("edit before acknowledgement".to_string()));
        }
        self.edits.lock().unwrap().push(reply);
        Ok(())
    }

    fn is_acknowledged(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }
}

/// A platform side effect recorded by `FakeGateway`.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    DirectMessage(UserId),
    AddRole(UserId, RoleId),
    RemoveRole(UserId, RoleId),
    SetRoles(UserId, Vec<RoleId>),
    Kick(UserId),
    Ban(UserId),
    Unban(UserId),
    DeleteMessage(ChannelId, MessageId),
    Post(ChannelId, Value),
}

/// In-memory guild that records every side effect.
#[derive(Debug, Default)]
pub struct FakeGateway {
    users: Mutex<HashMap<UserId, UserSummary>>,
    members: Mutex<HashMap<UserId, MemberSummary>>,
    dm_closed: Mutex<HashSet<UserId>>,
    protected: Mutex<HashSet<UserId>>,
    refuse_sanctions: AtomicBool,
    calls: Mutex<Vec<Call>>,
    next_message: AtomicU64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a guild member with the given roles and top role position.
    pub fn with_member(self, id: u64, roles: &[RoleId], top_role_position: u16) -> Self {
        let user = UserSummary {
            id: UserId::new(id),
            tag: format!("user{id}"),
            bot: false,
            avatar_url: format!("https://cdn.discordapp.com/embed/avatars/{}.png", id % 5),
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        self.members.lock().unwrap().insert(
            user.id,
            MemberSummary {
                user,
                roles: roles.to_vec(),
                top_role_position,
            },
        );
        self
    }

    /// Add a bot account that is a guild member.
    pub fn with_bot(self, id: u64) -> Self {
        let gateway = self.with_member(id, &[], 0);
        let user_id = UserId::new(id);
        if let Some(user) = gateway.users.lock().unwrap().get_mut(&user_id) {
            user.bot = true;
        }
        if let Some(member) = gateway.members.lock().unwrap().get_mut(&user_id) {
            member.user.bot = true;
        }
        gateway
    }

    /// Add a user that exists but is not in the guild.
    pub fn with_user(self, id: u64) -> Self {
        let user = UserSummary {
            id: UserId::new(id),
            tag: format!("user{id}"),
            bot: false,
            avatar_url: format!("https://cdn.discordapp.com/embed/avatars/{}.png", id % 5),
        };
        self.users.lock().unwrap().insert(user.id, user);
        self
    }

    pub fn with_closed_dms(self, id: u64) -> Self {
        self.dm_closed.lock().unwrap().insert(UserId::new(id));
        self
    }

    /// Mark a member as outranking the bot.
    pub fn with_protected(self, id: u64) -> Self {
        self.protected.lock().unwrap().insert(UserId::new(id));
        self
    }

    /// Make kicks, bans and role changes fail.
    pub fn refusing_sanctions(self) -> Self {
        self.refuse_sanctions.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Messages posted to a channel, serialized.
    pub fn posts_to(&self, channel: ChannelId) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Post(target, message) if target == channel => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn roles_of(&self, id: u64) -> Vec<RoleId> {
        self.members
            .lock()
            .unwrap()
            .get(&UserId::new(id))
            .map(|member| member.roles.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn sanction(&self, call: Call) -> GatewayResult<()> {
        if self.refuse_sanctions.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("Missing Permissions".to_string()));
        }
        self.record(call);
        Ok(())
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn user(&self, user: UserId) -> GatewayResult<UserSummary> {
        self.users
            .lock()
            .unwrap()
            .get(&user)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("user {user}")))
    }

    async fn member(&self, _guild: GuildId, user: UserId) -> GatewayResult<Option<MemberSummary>> {
        Ok(self.members.lock().unwrap().get(&user).cloned())
    }

    async fn direct_message(&self, user: UserId, _embed: CreateEmbed) -> GatewayResult<()> {
        if self.dm_closed.lock().unwrap().contains(&user) {
            return Err(GatewayError::Rejected("Cannot send messages to this user".to_string()));
        }
        self.record(Call::DirectMessage(user));
        Ok(())
    }

    async fn add_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: RoleId,
        _reason: &str,
    ) -> GatewayResult<()> {
        self.sanction(Call::AddRole(user, role))?;
        if let Some(member) = self.members.lock().unwrap().get_mut(&user) {
            if !member.roles.contains(&role) {
                member.roles.push(role);
            }
        }
        Ok(())
    }

    async fn remove_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: RoleId,
        _reason: &str,
    ) -> GatewayResult<()> {
        self.sanction(Call::RemoveRole(user, role))?;
        if let Some(member) = self.members.lock().unwrap().get_mut(&user) {
            member.roles.retain(|r| *r != role);
        }
        Ok(())
    }

    async fn set_roles(
        &self,
        _guild: GuildId,
        user: UserId,
        roles: Vec<RoleId>,
        _reason: &str,
    ) -> GatewayResult<()> {
        self.sanction(Call::SetRoles(user, roles.clone()))?;
        if let Some(member) = self.members.lock().unwrap().get_mut(&user) {
            member.roles = roles;
        }
        Ok(())
    }

    async fn kick(&self, _guild: GuildId, user: UserId, _reason: &str) -> GatewayResult<()> {
        self.sanction(Call::Kick(user))?;
        self.members.lock().unwrap().remove(&user);
        Ok(())
    }

    async fn ban(&self, _guild: GuildId, user: UserId, _reason: &str) -> GatewayResult<()> {
        self.sanction(Call::Ban(user))?;
        self.members.lock().unwrap().remove(&user);
        Ok(())
    }

    async fn unban(&self, _guild: GuildId, user: UserId) -> GatewayResult<()> {
        self.sanction(Call::Unban(user))
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> GatewayResult<()> {
        self.record(Call::DeleteMessage(channel, message));
        Ok(())
    }

    async fn post(&self, channel: ChannelId, message: CreateMessage) -> GatewayResult<MessageId> {
        let message =
            serde_json::to_value(&message).map_err(|e| GatewayError::Rejected(e.to_string()))?;
        self.record(Call::Post(channel, message));
        Ok(MessageId::new(
            self.next_message.fetch_add(1, Ordering::SeqCst) + 1_000,
        ))
    }

    async fn can_manage(&self, _guild: GuildId, user: UserId) -> GatewayResult<bool> {
        Ok(!self.protected.lock().unwrap().contains(&user))
    }
}

/// Wrap a fake gateway the way the router receives it.
pub fn shared(gateway: FakeGateway) -> (Arc<FakeGateway>, Arc<dyn Gateway>) {
    let gateway = Arc::new(gateway);
    let dynamic: Arc<dyn Gateway> = gateway.clone();
    (gateway, dynamic)
}
