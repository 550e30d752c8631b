//! Free-form questions about a ticket
//!
//! `ask` answers from the issue fields and comments, adding the change
//! history when the question is about what happened to the ticket over time.

use super::{render_comments, str_param, target_key, unsupported, StepHandler, StepOutcome};
use crate::conductor::error::StepError;
use crate::conductor::types::{AgentKind, ResolvedParams};
use crate::llm::LLMProvider;
use crate::prompts;
use minijinja::context;
use async_trait::async_trait;
use sdk::ticket::TicketSystem;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_QUESTION: &str = "Tell me about this issue";

/// Phrases that make a question about the ticket's past
const HISTORY_HINTS: &[&str] = &[
    "history",
    "changed",
    "changes",
    "changelog",
    "who moved",
    "who updated",
    "when was",
    "when did",
    "previous",
    "timeline",
];

/// Explicit `include_history` wins; otherwise look for history phrasing
fn wants_history(params: &ResolvedParams, question: &str) -> bool {
    match str_param(params, "include_history")
        .map(|v| v.to_lowercase())
        .as_deref()
    {
        Some("true" | "yes" | "1") => true,
        Some("false" | "no" | "0") => false,
        _ => {
            let question = question.to_lowercase();
            HISTORY_HINTS.iter().any(|hint| question.contains(hint))
        }
    }
}

pub struct IssueInsightsAgent {
    tickets: Arc<dyn TicketSystem>,
    llm: Arc<dyn LLMProvider>,
}

impl IssueInsightsAgent {
    pub fn new(tickets: Arc<dyn TicketSystem>, llm: Arc<dyn LLMProvider>) -> Self {
        Self { tickets, llm }
    }

    async fn ask(
        &self,
        key: &str,
        question: &str,
        include_history: bool,
    ) -> Result<StepOutcome, StepError> {
        let issue = self.tickets.get_issue(key).await?;
        let comments = render_comments(&issue);
        let history = if include_history {
            let entries = self.tickets.get_changelog(key).await?;
            debug!("Including {} change(s) of {}", entries.len(), key);
            if entries.is_empty() {
                "(no changes recorded)".to_string()
            } else {
                entries
                    .iter()
                    .map(|entry| entry.describe())
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        } else {
            String::new()
        };
        let prompt = prompts::render(
            prompts::INSIGHTS,
            context! {
                key => &issue.key,
                summary => &issue.summary,
                issue_type => &issue.issue_type,
                status => &issue.status,
                description => &issue.description,
                comments => comments,
                history => history,
                question => question,
            },
        )?;
        let answer = self.llm.complete(&prompt).await?;
        Ok(StepOutcome::text(answer.trim()))
    }

    async fn summarize(&self, key: &str) -> Result<StepOutcome, StepError> {
        let issue = self.tickets.get_issue(key).await?;
        let prompt = prompts::render(
            prompts::ISSUE_SUMMARY,
            context! {
                key => &issue.key,
                summary => &issue.summary,
                description => &issue.description,
            },
        )?;
        let summary = self.llm.complete(&prompt).await?;
        Ok(StepOutcome::text(summary.trim()))
    }
}

#[async_trait]
impl StepHandler for IssueInsightsAgent {
    fn agent(&self) -> AgentKind {
        AgentKind::IssueInsights
    }

    async fn handle(
        &self,
        action: &str,
        params: &ResolvedParams,
        plan_key: Option<&str>,
    ) -> Result<StepOutcome, StepError> {
        match action {
            "ask" => {
                let key = target_key(params, plan_key)?;
                let question =
                    str_param(params, "question").unwrap_or_else(|| DEFAULT_QUESTION.to_string());
                let include_history = wants_history(params, &question);
                self.ask(&key, &question, include_history).await
            }
            "summarize" => self.summarize(&target_key(params, plan_key)?).await,
            other => Err(unsupported(self.agent(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{FakeTickets, ScriptedLLM};

    #[tokio::test]
    async fn test_ask_includes_issue_and_comments() {
        let tickets = Arc::new(FakeTickets::with_issue("RB-3", "In Progress", "Adds SSO"));
        let llm = Arc::new(ScriptedLLM::new(vec!["It is in progress."]));
        let agent = IssueInsightsAgent::new(tickets, llm.clone());

        let outcome = agent
            .handle("ask", &ResolvedParams::new(), Some("RB-3"))
            .await
            .unwrap();

        assert_eq!(outcome.value, serde_json::json!("It is in progress."));
        let prompt = llm.prompt(0);
        assert!(prompt.contains("Status: In Progress"));
        assert!(prompt.contains("Dana: please check the 404 case"));
        assert!(prompt.contains(DEFAULT_QUESTION));
        assert!(!prompt.contains("Change history"));
    }

    #[tokio::test]
    async fn test_history_question_reads_changelog() {
        let tickets = Arc::new(FakeTickets::with_issue("RB-3", "In Review", ""));
        let llm = Arc::new(ScriptedLLM::new(vec!["Sam moved it on March 1st."]));
        let agent = IssueInsightsAgent::new(tickets.clone(), llm.clone());

        let params: ResolvedParams = [(
            "question".to_string(),
            serde_json::json!("Who moved it to review?"),
        )]
        .into_iter()
        .collect();
        agent.handle("ask", &params, Some("RB-3")).await.unwrap();

        assert_eq!(tickets.calls(), vec!["get RB-3", "changelog RB-3"]);
        assert!(llm
            .prompt(0)
            .contains("2024-03-01T09:00:00.000+0000 Sam: status Open -> In Review"));
    }

    #[tokio::test]
    async fn test_include_history_flag_overrides_phrasing() {
        let tickets = Arc::new(FakeTickets::with_issue("RB-3", "Open", ""));
        let agent = IssueInsightsAgent::new(
            tickets.clone(),
            Arc::new(ScriptedLLM::new(vec!["a", "b"])),
        );

        let forced: ResolvedParams = [
            ("question".to_string(), serde_json::json!("What is left?")),
            ("include_history".to_string(), serde_json::json!(true)),
        ]
        .into_iter()
        .collect();
        agent.handle("ask", &forced, Some("RB-3")).await.unwrap();

        let skipped: ResolvedParams = [
            ("question".to_string(), serde_json::json!("What changed?")),
            ("include_history".to_string(), serde_json::json!("no")),
        ]
        .into_iter()
        .collect();
        agent.handle("ask", &skipped, Some("RB-3")).await.unwrap();

        assert_eq!(
            tickets.calls(),
            vec!["get RB-3", "changelog RB-3", "get RB-3"]
        );
    }

    #[tokio::test]
    async fn test_summarize_uses_summary_and_description() {
        let tickets = Arc::new(FakeTickets::with_issue("RB-3", "Open", "Adds SSO via OIDC"));
        let llm = Arc::new(ScriptedLLM::new(vec!["  Adds OIDC single sign-on.  "]));
        let agent = IssueInsightsAgent::new(tickets, llm.clone());

        let outcome = agent
            .handle("summarize", &ResolvedParams::new(), Some("RB-3"))
            .await
            .unwrap();

        assert_eq!(outcome.detail, "Adds OIDC single sign-on.");
        let prompt = llm.prompt(0);
        assert!(prompt.contains("one or two sentences"));
        assert!(prompt.contains("Summary: Summary of RB-3"));
        assert!(prompt.contains("Adds SSO via OIDC"));
    }

    #[tokio::test]
    async fn test_unknown_action_rejected() {
        let tickets = Arc::new(FakeTickets::with_issue("RB-3", "Open", ""));
        let agent = IssueInsightsAgent::new(tickets, Arc::new(ScriptedLLM::new(vec![])));
        let err = agent
            .handle("history", &ResolvedParams::new(), Some("RB-3"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
