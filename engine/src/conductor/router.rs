//! Request router
//!
//! Drives one request through RECEIVED -> CLASSIFIED -> PLANNED ->
//! EXECUTING -> RESPONDED, or into ERROR when no ticket key is available or
//! the plan is invalid. Every request gets an answer.
//!
//! Requests within a session are serialized on that session's memory lock.
//! Distinct sessions run concurrently.

use crate::agents::default_handlers;
use crate::conductor::classifier::Classifier;
use crate::conductor::error::RouteError;
use crate::conductor::executor::Executor;
use crate::conductor::memory::{MemoryStore, RecordOutcome};
use crate::conductor::planner::Planner;
use crate::conductor::types::{AgentKind, Intent, Plan, StepReportEntry, StepResult};
use crate::config::{Config, MemoryConfig};
use crate::llm::LLMProvider;
use crate::prompts;
use minijinja::context;
use regex::Regex;
use sdk::ticket::TicketSystem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};

pub const DEFAULT_SESSION: &str = "default";

const MEMORY_CLEARED: &str = "Memory cleared.";
const NOT_RETAINED_NOTICE: &str = "(conversation not retained)";
const LIMIT_NOTICE: &str =
    "(This conversation reached its turn limit, so I have started a new one.)";

static KEY_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static FORGET_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Answer plus one report line per executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub step_report: Vec<StepReportEntry>,
}

impl AskResponse {
    fn text(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            step_report: Vec::new(),
        }
    }
}

/// Pipeline stage, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Classified,
    Planned,
    Executing,
    Responded,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "RECEIVED",
            Stage::Classified => "CLASSIFIED",
            Stage::Planned => "PLANNED",
            Stage::Executing => "EXECUTING",
            Stage::Responded => "RESPONDED",
            Stage::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Per-session memory, created on first use
pub struct SessionRegistry {
    config: MemoryConfig,
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<MemoryStore>>>>,
}

impl SessionRegistry {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self, id: &str) -> Arc<tokio::sync::Mutex<MemoryStore>> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(sessions.entry(id.to_string()).or_insert_with(|| {
            debug!("Creating session {}", id);
            Arc::new(tokio::sync::Mutex::new(MemoryStore::new(self.config.clone())))
        }))
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct RequestRouter {
    llm: Arc<dyn LLMProvider>,
    classifier: Classifier,
    planner: Planner,
    executor: Executor,
    sessions: SessionRegistry,
    projects: Vec<String>,
    narrate_results: bool,
}

impl RequestRouter {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        executor: Executor,
        memory: MemoryConfig,
        projects: Vec<String>,
        narrate_results: bool,
    ) -> Self {
        Self {
            classifier: Classifier::new(Arc::clone(&llm)),
            planner: Planner::new(Arc::clone(&llm)),
            llm,
            executor,
            sessions: SessionRegistry::new(memory),
            projects,
            narrate_results,
        }
    }

    /// Wire the default handlers over the given collaborators
    pub fn from_config(
        config: &Config,
        llm: Arc<dyn LLMProvider>,
        tickets: Arc<dyn TicketSystem>,
    ) -> Self {
        let handlers = default_handlers(tickets, Arc::clone(&llm));
        let executor = Executor::new(handlers, config.execution.step_timeout());
        Self::new(
            llm,
            executor,
            config.memory.clone(),
            config.jira.projects.clone(),
            config.execution.narrate_results,
        )
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Handle one request in the given session (default session if `None`)
    pub async fn ask(&self, request: &str, session_id: Option<&str>) -> AskResponse {
        let session_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_SESSION);
        let session = self.sessions.session(session_id);
        let mut memory = session.lock().await;
        stage(session_id, Stage::Received);

        let mut request = request.trim().to_string();
        if let Some(rest) = strip_forget(&request) {
            memory.forget();
            info!("Memory cleared for session {}", session_id);
            if !rest.chars().any(char::is_alphanumeric) {
                stage(session_id, Stage::Responded);
                return unrecorded(&memory, MEMORY_CLEARED.to_string());
            }
            request = rest;
        }

        let context = memory.context();
        let intent = self.classifier.classify(&request, &context).await;
        stage(session_id, Stage::Classified);

        let key = extract_issue_key(&request, &self.projects)
            .or_else(|| memory.recall().map(str::to_string));
        debug!("Intent {} with ticket key {:?}", intent, key);

        if intent == Intent::Unknown && key.is_none() {
            let answer = self.direct_answer(&request, &context).await;
            return self
                .finish(session_id, &mut memory, &request, answer, Vec::new(), None)
                .await;
        }

        if intent.requires_key() && key.is_none() {
            return reject(session_id, &memory, RouteError::MissingKey { intent });
        }

        let plan = match self
            .planner
            .plan(&request, intent, &context, key.as_deref())
            .await
        {
            Ok(plan) => plan,
            Err(e) => return reject(session_id, &memory, e),
        };
        stage(session_id, Stage::Planned);

        stage(session_id, Stage::Executing);
        let results = self.executor.execute(&plan).await;
        let answer = self.synthesize(&request, &plan, &results).await;

        let remembered = plan.issue_key.clone().or_else(|| created_key(&results));
        let report = results.iter().map(StepReportEntry::from).collect();
        self.finish(session_id, &mut memory, &request, answer, report, remembered)
            .await
    }

    async fn finish(
        &self,
        session_id: &str,
        memory: &mut MemoryStore,
        request: &str,
        mut answer: String,
        step_report: Vec<StepReportEntry>,
        key: Option<String>,
    ) -> AskResponse {
        if let Some(key) = key {
            memory.remember_key(key);
        }

        match memory.record(request, &answer, self.llm.as_ref()).await {
            RecordOutcome::Recorded => {}
            RecordOutcome::Disabled => append_notice(&mut answer, NOT_RETAINED_NOTICE),
            RecordOutcome::LimitReached => {
                warn!("Session {} reached its turn limit; resetting", session_id);
                memory.forget();
                append_notice(&mut answer, LIMIT_NOTICE);
            }
        }

        stage(session_id, Stage::Responded);
        AskResponse {
            answer,
            step_report,
        }
    }

    /// Best-effort answer for requests that involve no ticket
    async fn direct_answer(&self, request: &str, context: &str) -> String {
        let context = if context.is_empty() { "(none)" } else { context };
        let reply = match prompts::render(
            prompts::DIRECT_ANSWER,
            context! { context => context, request => request },
        ) {
            Ok(prompt) => self.llm.complete(&prompt).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match reply {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => prompts::HELP.to_string(),
            Err(e) => {
                warn!("Direct answer failed, falling back to help: {}", e);
                prompts::HELP.to_string()
            }
        }
    }

    async fn synthesize(&self, request: &str, plan: &Plan, results: &[StepResult]) -> String {
        if let [only] = results {
            return only.detail.clone();
        }

        let steps = describe_steps(results);
        if !self.narrate_results {
            return steps;
        }

        let narrated = match prompts::render(
            prompts::NARRATE,
            context! {
                request => request,
                issue_key => plan.issue_key.as_deref().unwrap_or("(none)"),
                steps => &steps,
            },
        ) {
            Ok(prompt) => self.llm.complete(&prompt).await.ok(),
            Err(e) => {
                warn!("Narration prompt failed to render: {}", e);
                None
            }
        };
        match narrated {
            Some(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            _ => {
                warn!("Narration unavailable; returning the step list");
                steps
            }
        }
    }
}

fn stage(session_id: &str, stage: Stage) {
    debug!("[session {}] {}", session_id, stage);
}

fn reject(session_id: &str, memory: &MemoryStore, error: RouteError) -> AskResponse {
    warn!("Request rejected ({}): {}", error.code(), error);
    stage(session_id, Stage::Error);
    unrecorded(memory, error.user_message())
}

/// Answer for a turn that is not written to memory
fn unrecorded(memory: &MemoryStore, mut answer: String) -> AskResponse {
    if !memory.is_enabled() {
        append_notice(&mut answer, NOT_RETAINED_NOTICE);
    }
    AskResponse::text(answer)
}

fn append_notice(answer: &mut String, notice: &str) {
    answer.push_str("\n\n");
    answer.push_str(notice);
}

/// One line per step, failures with their code
pub fn describe_steps(results: &[StepResult]) -> String {
    results
        .iter()
        .map(|result| {
            let entry = StepReportEntry::from(result);
            if result.succeeded() {
                format!(
                    "Step {} ({}.{}): {}",
                    entry.index, entry.agent, entry.action, entry.detail
                )
            } else {
                format!(
                    "Step {} ({}.{}) failed: {}",
                    entry.index, entry.agent, entry.action, entry.detail
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Key of an issue created by the plan, if any
fn created_key(results: &[StepResult]) -> Option<String> {
    results
        .iter()
        .filter(|r| {
            r.succeeded() && r.agent == AgentKind::JiraOperations && r.action == "create_issue"
        })
        .find_map(|r| r.value.get("key").and_then(|k| k.as_str()).map(str::to_string))
}

/// First ticket key in `text`, preferring configured project prefixes
pub fn extract_issue_key(text: &str, projects: &[String]) -> Option<String> {
    let pattern = KEY_PATTERN
        .get_or_init(|| Regex::new(r"\b[A-Za-z][A-Za-z0-9]+-\d+\b").ok())
        .as_ref()?;

    let candidates: Vec<String> = pattern
        .find_iter(text)
        .map(|m| m.as_str().to_uppercase())
        .collect();

    candidates
        .iter()
        .find(|key| {
            projects.iter().any(|project| {
                key.split_once('-')
                    .is_some_and(|(prefix, _)| prefix.eq_ignore_ascii_case(project.trim()))
            })
        })
        .or_else(|| candidates.first())
        .cloned()
}

/// Remove a whole-word `forget`; `None` when the request has none
pub fn strip_forget(request: &str) -> Option<String> {
    let pattern = FORGET_PATTERN
        .get_or_init(|| Regex::new(r"(?i)\bforget\b").ok())
        .as_ref()?;
    if !pattern.is_match(request) {
        return None;
    }
    let rest = pattern.replace_all(request, " ");
    Some(rest.split_whitespace().collect::<Vec<_>>().join(" "))
}
