//! Error types for interaction handling.
//!
//! Handlers resolve business failures into the user-facing variants. Anything
//! else reaching the router is logged and answered with a generic message.

use crate::platform::{AckError, GatewayError};
use crate::store::StoreError;
use thiserror::Error;

/// Text shown to the actor for failures without a specific message.
pub const GENERIC_FAILURE: &str = "An error occurred while handling that interaction.";

#[derive(Debug, Error)]
pub enum ModerationError {
    /// Actor lacks the required role or ownership.
    #[error("{0}")]
    PermissionDenied(String),

    /// The pending action or interaction state is gone.
    #[error("{0}")]
    StaleSession(String),

    /// Input the actor typed could not be used.
    #[error("{0}")]
    InvalidInput(String),

    /// Discord refused a sanction or lookup.
    #[error("{0}")]
    ExternalAction(String),

    /// No handler wired for a component.
    #[error("{0}")]
    HandlerMissing(String),

    #[error(transparent)]
    Acknowledgement(#[from] AckError),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("Platform failure: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Unhandled error: {0}")]
    Unhandled(String),
}

impl ModerationError {
    pub fn denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalAction(message.into())
    }

    /// Message safe to show to the actor, or `None` for silently swallowed races.
    #[must_use]
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::PermissionDenied(message)
            | Self::StaleSession(message)
            | Self::InvalidInput(message)
            | Self::ExternalAction(message)
            | Self::HandlerMissing(message) => Some(message),
            Self::Acknowledgement(AckError::AlreadyAcknowledged | AckError::UnknownInteraction) => {
                None
            }
            _ => Some(GENERIC_FAILURE),
        }
    }

    /// Whether this failure is expected business flow rather than a bug.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::StaleSession(_)
                | Self::InvalidInput(_)
                | Self::ExternalAction(_)
                | Self::HandlerMissing(_)
        )
    }
}

impl From<String> for ModerationError {
    fn from(message: String) -> Self {
        Self::Unhandled(message)
    }
}

pub type ModerationResult<T> = Result<T, ModerationError>;
