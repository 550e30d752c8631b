//! Conductor failures
//!
//! `RouteError` aborts a request before execution (or a single step, for
//! resolution). `StepError` is anything a step handler can fail with; it
//! always ends up as a FAILED step, never as an aborted plan.

use crate::conductor::types::Intent;
use crate::llm::LLMError;
use crate::prompts::PromptError;
use sdk::ticket::TicketError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("No ticket key available for a {intent} request")]
    MissingKey { intent: Intent },

    #[error("Invalid plan: {0}")]
    PlanInvalid(String),

    #[error("Cannot resolve parameter: {0}")]
    Resolution(String),
}

impl RouteError {
    pub fn code(&self) -> &'static str {
        match self {
            RouteError::MissingKey { .. } => "MISSING_KEY",
            RouteError::PlanInvalid(_) => "PLAN_INVALID",
            RouteError::Resolution(_) => "RESOLUTION_ERROR",
        }
    }

    /// Plain-language text for the caller
    pub fn user_message(&self) -> String {
        match self {
            RouteError::MissingKey { .. } => {
                "Which ticket do you mean? Please include a ticket key such as RB-1234.".to_string()
            }
            RouteError::PlanInvalid(reason) if reason.contains("parent_key") => {
                "A sub-task needs a parent ticket. Which ticket should it go under (for example RB-1234)?"
                    .to_string()
            }
            RouteError::PlanInvalid(reason) => format!(
                "I could not work out a valid set of steps for that request ({}). Could you rephrase it?",
                reason
            ),
            RouteError::Resolution(reason) => {
                format!("A step could not use an earlier result: {}", reason)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error("Language model call failed: {0}")]
    Llm(#[from] LLMError),

    #[error("{0}")]
    InvalidParameters(String),

    #[error("Prompt rendering failed: {0}")]
    Prompt(#[from] PromptError),

    #[error("Step timed out after {0}s")]
    Timeout(u64),

    #[error("Transition '{requested}' is not available for {issue_key}. Available statuses: {}. {}", .available.join(", "), suggestion_text(.suggestion))]
    TransitionUnavailable {
        issue_key: String,
        requested: String,
        available: Vec<String>,
        suggestion: Option<String>,
    },
}

fn suggestion_text(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!("Did you mean '{}'?", s),
        None => "Which status should I use?".to_string(),
    }
}

impl StepError {
    pub fn code(&self) -> &'static str {
        match self {
            StepError::Route(e) => e.code(),
            StepError::Ticket(e) => e.code(),
            StepError::Llm(e) => e.code(),
            StepError::InvalidParameters(_) => "VALIDATION_ERROR",
            StepError::Prompt(_) => "INTERNAL_ERROR",
            StepError::Timeout(_) => "TRANSPORT_ERROR",
            StepError::TransitionUnavailable { .. } => "INVALID_TRANSITION",
        }
    }
}
