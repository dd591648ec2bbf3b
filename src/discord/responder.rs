//! `Responder` over one serenity interaction.

use crate::platform::{AckError, Reply, Responder, Suggestion};
use async_trait::async_trait;
use poise::serenity_prelude::{
    CommandInteraction, ComponentInteraction, CreateAutocompleteResponse,
    CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateModal, EditInteractionResponse, Http,
    ModalInteraction,
};
use serenity::http::HttpError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const ALREADY_ACKNOWLEDGED: isize = 40060;
const UNKNOWN_INTERACTION: isize = 10062;

/// Map a failed response call onto the races the router tolerates.
pub(crate) fn ack_error(error: serenity::Error) -> AckError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &error {
        match response.error.code {
            ALREADY_ACKNOWLEDGED => return AckError::AlreadyAcknowledged,
            UNKNOWN_INTERACTION => return AckError::UnknownInteraction,
            _ => {}
        }
    }
    AckError::Platform(error.to_string())
}

/// The interaction being answered.
#[derive(Debug, Clone)]
pub enum ResponseTarget {
    Command(Box<CommandInteraction>),
    Component(Box<ComponentInteraction>),
    Modal(Box<ModalInteraction>),
}

pub struct SerenityResponder {
    http: Arc<Http>,
    target: ResponseTarget,
    acknowledged: AtomicBool,
}

impl SerenityResponder {
    #[must_use]
    pub fn new(http: Arc<Http>, target: ResponseTarget) -> Self {
        Self {
            http,
            target,
            acknowledged: AtomicBool::new(false),
        }
    }

    async fn primary(&self, response: CreateInteractionResponse) -> Result<(), AckError> {
        if self.is_acknowledged() {
            return Err(AckError::AlreadyAcknowledged);
        }
        let http = self.http.as_ref();
        let result = match &self.target {
            ResponseTarget::Command(interaction) => interaction.create_response(http, response).await,
            ResponseTarget::Component(interaction) => {
                interaction.create_response(http, response).await
            }
            ResponseTarget::Modal(interaction) => interaction.create_response(http, response).await,
        };
        let result = result.map_err(ack_error);
        if matches!(result, Ok(()) | Err(AckError::AlreadyAcknowledged)) {
            self.acknowledged.store(true, Ordering::SeqCst);
        }
        result
    }
}

fn message(reply: Reply) -> CreateInteractionResponseMessage {
    let mut message = CreateInteractionResponseMessage::new()
        .embeds(reply.embeds)
        .components(reply.components)
        .ephemeral(reply.ephemeral);
    if let Some(content) = reply.content {
        message = message.content(content);
    }
    message
}

fn followup(reply: Reply) -> CreateInteractionResponseFollowup {
    let mut followup = CreateInteractionResponseFollowup::new()
        .embeds(reply.embeds)
        .components(reply.components)
        .ephemeral(reply.ephemeral);
    if let Some(content) = reply.content {
        followup = followup.content(content);
    }
    followup
}

fn edit(reply: Reply) -> EditInteractionResponse {
    let mut edit = EditInteractionResponse::new()
        .embeds(reply.embeds)
        .components(reply.components);
    if let Some(content) = reply.content {
        edit = edit.content(content);
    }
    edit
}

#[async_trait]
impl Responder for SerenityResponder {
    async fn reply(&self, reply: Reply) -> Result<(), AckError> {
        self.primary(CreateInteractionResponse::Message(message(reply)))
            .await
    }

    async fn defer_update(&self) -> Result<(), AckError> {
        let response = match self.target {
            ResponseTarget::Command(_) => CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
            ResponseTarget::Component(_) | ResponseTarget::Modal(_) => {
                CreateInteractionResponse::Acknowledge
            }
        };
        self.primary(response).await
    }

    async fn show_modal(&self, modal: CreateModal) -> Result<(), AckError> {
        self.primary(CreateInteractionResponse::Modal(modal)).await
    }

    async fn suggest(&self, choices: Vec<Suggestion>) -> Result<(), AckError> {
        let response = choices
            .into_iter()
            .fold(CreateAutocompleteResponse::new(), |response, choice| {
                response.add_string_choice(choice.name, choice.value)
            });
        self.primary(CreateInteractionResponse::Autocomplete(response))
            .await
    }

    async fn follow_up(&self, reply: Reply) -> Result<(), AckError> {
        let http = self.http.as_ref();
        let builder = followup(reply);
        let result = match &self.target {
            ResponseTarget::Command(interaction) => interaction.create_followup(http, builder).await,
            ResponseTarget::Component(interaction) => {
                interaction.create_followup(http, builder).await
            }
            ResponseTarget::Modal(interaction) => interaction.create_followup(http, builder).await,
        };
        result.map(|_| ()).map_err(ack_error)
    }

    async fn edit_original(&self, reply: Reply) -> Result<(), AckError> {
        let http = self.http.as_ref();
        let builder = edit(reply);
        let result = match &self.target {
            ResponseTarget::Command(interaction) => interaction.edit_response(http, builder).await,
            ResponseTarget::Component(interaction) => {
                interaction.edit_response(http, builder).await
            }
            ResponseTarget::Modal(interaction) => interaction.edit_response(http, builder).await,
        };
        result.map(|_| ()).map_err(ack_error)
    }

    fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::SeqCst)
    }
}
