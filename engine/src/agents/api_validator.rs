//! API ticket validation
//!
//! Picks a prompt by workflow status and asks the model to review the
//! ticket as an API contract.

use super::{target_key, unsupported, StepHandler, StepOutcome};
use crate::conductor::error::StepError;
use crate::conductor::types::{AgentKind, ResolvedParams};
use crate::llm::LLMProvider;
use crate::prompts::{self, PromptError};
use minijinja::context;
use async_trait::async_trait;
use sdk::ticket::TicketSystem;
use sdk::types::IssueSnapshot;
use std::sync::Arc;
use tracing::info;

pub struct ApiValidatorAgent {
    tickets: Arc<dyn TicketSystem>,
    llm: Arc<dyn LLMProvider>,
}

impl ApiValidatorAgent {
    pub fn new(tickets: Arc<dyn TicketSystem>, llm: Arc<dyn LLMProvider>) -> Self {
        Self { tickets, llm }
    }

    async fn validate(&self, key: &str) -> Result<StepOutcome, StepError> {
        let issue = self.tickets.get_issue(key).await?;
        info!("Validating {} with status '{}'", issue.key, issue.status);

        let prompt = validation_prompt(&issue)?;
        let verdict = self.llm.complete(&prompt).await?;
        Ok(StepOutcome::text(verdict.trim()))
    }
}

/// Status-specific guidance, if the status has any
fn status_guidance(status_slug: &str) -> Option<&'static str> {
    match status_slug {
        "open" | "todo" | "backlog" | "new" => Some(prompts::VALIDATE_OPEN),
        "inprogress" | "indevelopment" => Some(prompts::VALIDATE_IN_PROGRESS),
        "inreview" | "review" | "codereview" | "qa" => Some(prompts::VALIDATE_IN_REVIEW),
        "done" | "closed" | "resolved" => Some(prompts::VALIDATE_DONE),
        _ => None,
    }
}

fn validation_prompt(issue: &IssueSnapshot) -> Result<String, PromptError> {
    let general = prompts::render(
        prompts::VALIDATE_GENERAL,
        context! {
            key => &issue.key,
            summary => &issue.summary,
            status => &issue.status,
            description => &issue.description,
        },
    )?;
    Ok(match status_guidance(&issue.status_slug()) {
        Some(guidance) => format!("{}\n\n{}", general, guidance),
        None => general,
    })
}

#[async_trait]
impl StepHandler for ApiValidatorAgent {
    fn agent(&self) -> AgentKind {
        AgentKind::ApiValidator
    }

    async fn handle(
        &self,
        action: &str,
        params: &ResolvedParams,
        plan_key: Option<&str>,
    ) -> Result<StepOutcome, StepError> {
        match action {
            "validate" => self.validate(&target_key(params, plan_key)?).await,
            other => Err(unsupported(self.agent(), other)),
        }
    }
}
