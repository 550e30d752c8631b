//! Step handlers
//!
//! One handler per agent tag. The executor hands each handler the resolved
//! parameters of a step plus the plan's ticket key; handlers talk to the
//! ticket system and, where needed, make their own scoped model calls. They
//! never see session memory.

pub mod api_validator;
pub mod issue_insights;
pub mod jira_operations;
pub mod test_agent;

pub use api_validator::ApiValidatorAgent;
pub use issue_insights::IssueInsightsAgent;
pub use jira_operations::JiraOperationsAgent;
pub use test_agent::TestAgent;

use crate::conductor::error::StepError;
use crate::conductor::types::{AgentKind, ResolvedParams};
use crate::llm::LLMProvider;
use async_trait::async_trait;
use sdk::ticket::TicketSystem;
use sdk::types::IssueSnapshot;
use serde_json::Value;
use std::sync::Arc;

/// Successful output of a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Structured value later steps can reference
    pub value: Value,
    /// One-line description for the step report
    pub detail: String,
}

impl StepOutcome {
    /// Text result; the text is both value and detail
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            value: Value::String(text.clone()),
            detail: text,
        }
    }

    pub fn structured(value: Value, detail: impl Into<String>) -> Self {
        Self {
            value,
            detail: detail.into(),
        }
    }
}

#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Agent tag this handler serves
    fn agent(&self) -> AgentKind;

    /// Run one action
    async fn handle(
        &self,
        action: &str,
        params: &ResolvedParams,
        plan_key: Option<&str>,
    ) -> Result<StepOutcome, StepError>;
}

/// Build the default handler set over shared collaborators
pub fn default_handlers(
    tickets: Arc<dyn TicketSystem>,
    llm: Arc<dyn LLMProvider>,
) -> Vec<Arc<dyn StepHandler>> {
    vec![
        Arc::new(JiraOperationsAgent::new(Arc::clone(&tickets), Arc::clone(&llm))),
        Arc::new(ApiValidatorAgent::new(Arc::clone(&tickets), Arc::clone(&llm))),
        Arc::new(TestAgent::new(Arc::clone(&tickets), Arc::clone(&llm))),
        Arc::new(IssueInsightsAgent::new(tickets, llm)),
    ]
}

/// String view of a parameter; numbers and booleans are stringified
pub fn str_param(params: &ResolvedParams, name: &str) -> Option<String> {
    match params.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn required_param(params: &ResolvedParams, name: &str) -> Result<String, StepError> {
    str_param(params, name)
        .ok_or_else(|| StepError::InvalidParameters(format!("missing parameter '{}'", name)))
}

/// The ticket a step acts on: its own `issue_key`, else the plan's
pub fn target_key(params: &ResolvedParams, plan_key: Option<&str>) -> Result<String, StepError> {
    str_param(params, "issue_key")
        .or_else(|| {
            plan_key
                .filter(|k| !k.trim().is_empty())
                .map(str::to_string)
        })
        .map(|k| k.to_uppercase())
        .ok_or_else(|| StepError::InvalidParameters("no ticket key for this step".to_string()))
}

pub fn unsupported(agent: AgentKind, action: &str) -> StepError {
    StepError::InvalidParameters(format!("{} does not support '{}'", agent, action))
}

/// Render comments as `author: body` lines
pub fn render_comments(issue: &IssueSnapshot) -> String {
    if issue.comments.is_empty() {
        return "(none)".to_string();
    }
    issue
        .comments
        .iter()
        .map(|c| format!("{}: {}", c.author, c.body))
        .collect::<Vec<_>>()
        .join("\n")
}
