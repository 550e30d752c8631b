//! Test case generation for API tickets

use super::{str_param, target_key, unsupported, StepHandler, StepOutcome};
use crate::conductor::error::StepError;
use crate::conductor::types::{AgentKind, ResolvedParams};
use crate::llm::LLMProvider;
use crate::prompts;
use minijinja::context;
use async_trait::async_trait;
use regex::Regex;
use sdk::ticket::TicketSystem;
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Reply prefix the model uses when tests are already present
const HAS_TESTS: &str = "HAS_TESTS";

static METHOD_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

pub struct TestAgent {
    tickets: Arc<dyn TicketSystem>,
    llm: Arc<dyn LLMProvider>,
}

impl TestAgent {
    pub fn new(tickets: Arc<dyn TicketSystem>, llm: Arc<dyn LLMProvider>) -> Self {
        Self { tickets, llm }
    }

    async fn create_test_cases(
        &self,
        key: &str,
        question: Option<String>,
    ) -> Result<StepOutcome, StepError> {
        let issue = self.tickets.get_issue(key).await?;
        let question = question.unwrap_or_default();

        // An explicit method in the question wins over the ticket text
        let method = detect_method(&question)
            .or_else(|| detect_method(&format!("{}\n{}", issue.summary, issue.description)))
            .unwrap_or("GET");
        info!("Generating {} test cases for {}", method, issue.key);

        let text = format!("{}\n{}\n{}", issue.summary, issue.description, question);
        let prompt = prompts::render(template_for(method), context! { summary => text.trim() })?;
        let reply = self.llm.complete(&prompt).await?;
        let reply = reply.trim();

        if reply.to_uppercase().starts_with(HAS_TESTS) {
            return Ok(StepOutcome::text("Test cases already exist"));
        }
        Ok(StepOutcome::text(reply))
    }
}

/// First HTTP verb mentioned as a whole word
pub fn detect_method(text: &str) -> Option<&'static str> {
    let pattern = METHOD_PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b(GET|POST|PUT|DELETE)\b").ok())
        .as_ref()?;
    let found = pattern.captures(text)?.get(1)?.as_str().to_uppercase();
    match found.as_str() {
        "GET" => Some("GET"),
        "POST" => Some("POST"),
        "PUT" => Some("PUT"),
        "DELETE" => Some("DELETE"),
        _ => None,
    }
}

fn template_for(method: &str) -> &'static str {
    match method {
        "POST" => prompts::TESTS_POST,
        "PUT" => prompts::TESTS_PUT,
        "DELETE" => prompts::TESTS_DELETE,
        _ => prompts::TESTS_GET,
    }
}

#[async_trait]
impl StepHandler for TestAgent {
    fn agent(&self) -> AgentKind {
        AgentKind::TestAgent
    }

    async fn handle(
        &self,
        action: &str,
        params: &ResolvedParams,
        plan_key: Option<&str>,
    ) -> Result<StepOutcome, StepError> {
        match action {
            "create_test_cases" => {
                let key = target_key(params, plan_key)?;
                self.create_test_cases(&key, str_param(params, "question"))
                    .await
            }
            other => Err(unsupported(self.agent(), other)),
        }
    }
}
