//! Ticket system capability
//!
//! The engine never talks to Jira directly; it goes through the
//! `TicketSystem` trait so plans can run against a real REST client or a
//! scripted fake in tests.

use async_trait::async_trait;
use thiserror::Error;

use serde_json::{Map, Value};

use crate::types::{
    ChangeEntry, CommentAck, CreatedIssue, EditableField, FieldsUpdated, IssueSnapshot,
    NewIssue, TransitionAck,
};

/// Result type for ticket system operations
pub type TicketResult<T> = std::result::Result<T, TicketError>;

/// Typed failures of the ticket system
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("Issue {0} was not found")]
    NotFound(String),

    #[error("Authentication with the ticket system failed: {0}")]
    Auth(String),

    #[error("Transition '{requested}' is not available for {issue_key}")]
    InvalidTransition {
        issue_key: String,
        requested: String,
        available: Vec<String>,
    },

    #[error("The ticket system rejected the request: {0}")]
    Validation(String),

    #[error("Could not reach the ticket system: {0}")]
    Transport(String),
}

impl TicketError {
    /// Short machine-readable code for step reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Auth(_) => "AUTH_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }
}

/// Operations the engine needs from an issue tracker
#[async_trait]
pub trait TicketSystem: Send + Sync {
    /// Fetch a single issue
    async fn get_issue(&self, key: &str) -> TicketResult<IssueSnapshot>;

    /// Add a plain-text comment to an issue
    async fn add_comment(&self, key: &str, text: &str) -> TicketResult<CommentAck>;

    /// Move an issue through its workflow using a transition or status name
    async fn transition_issue(&self, key: &str, transition_name: &str)
        -> TicketResult<TransitionAck>;

    /// Create a new issue
    async fn create_issue(&self, issue: &NewIssue) -> TicketResult<CreatedIssue>;

    /// Field changes of an issue, oldest first
    async fn get_changelog(&self, key: &str) -> TicketResult<Vec<ChangeEntry>>;

    /// Fields the current user may edit on an issue
    async fn editable_fields(&self, key: &str) -> TicketResult<Vec<EditableField>>;

    /// Set raw field values keyed by field id
    async fn update_fields(
        &self,
        key: &str,
        fields: &Map<String, Value>,
    ) -> TicketResult<FieldsUpdated>;
}
