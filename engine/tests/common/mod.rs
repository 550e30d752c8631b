//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use sdk::ticket::{TicketError, TicketResult, TicketSystem};
use sdk::types::{
    ChangeEntry, CommentAck, CreatedIssue, EditableField, FieldsUpdated, IssueSnapshot, NewIssue,
    TransitionAck,
};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticketeer_engine::agents::default_handlers;
use ticketeer_engine::conductor::{Executor, RequestRouter};
use ticketeer_engine::config::MemoryConfig;
use ticketeer_engine::llm::{LLMError, LLMProvider, Message};

/// Replies in order and records every prompt
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn generate(&self, messages: &[Message]) -> ticketeer_engine::llm::Result<String> {
        let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LLMError::NetworkError("script exhausted".to_string()))
    }
}

/// In-memory Jira with two workflow transitions
pub struct InMemoryTickets {
    issues: Mutex<HashMap<String, IssueSnapshot>>,
    calls: Mutex<Vec<String>>,
    next_id: Mutex<u32>,
}

impl InMemoryTickets {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            issues: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: Mutex::new(100),
        })
    }

    pub fn with_issue(self: Arc<Self>, key: &str, status: &str, description: &str) -> Arc<Self> {
        self.issues.lock().unwrap().insert(
            key.to_string(),
            IssueSnapshot {
                key: key.to_string(),
                summary: format!("Summary of {}", key),
                description: description.to_string(),
                status: status.to_string(),
                issue_type: "Story".to_string(),
                comments: Vec::new(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn ensure_exists(&self, key: &str) -> TicketResult<()> {
        if self.issues.lock().unwrap().contains_key(key) {
            Ok(())
        } else {
            Err(TicketError::NotFound(key.to_string()))
        }
    }
}

#[async_trait]
impl TicketSystem for InMemoryTickets {
    async fn get_issue(&self, key: &str) -> TicketResult<IssueSnapshot> {
        self.log(format!("get {}", key));
        self.issues
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| TicketError::NotFound(key.to_string()))
    }

    async fn add_comment(&self, key: &str, text: &str) -> TicketResult<CommentAck> {
        self.log(format!("comment {} {}", key, text));
        self.ensure_exists(key)?;
        Ok(CommentAck {
            issue_key: key.to_string(),
            comment_id: "20001".to_string(),
        })
    }

    async fn transition_issue(&self, key: &str, name: &str) -> TicketResult<TransitionAck> {
        self.log(format!("transition {} {}", key, name));
        self.ensure_exists(key)?;
        let available = vec!["In Progress".to_string(), "Done".to_string()];
        match available.iter().find(|t| t.eq_ignore_ascii_case(name)) {
            Some(t) => Ok(TransitionAck {
                issue_key: key.to_string(),
                transition: t.clone(),
            }),
            None => Err(TicketError::InvalidTransition {
                issue_key: key.to_string(),
                requested: name.to_string(),
                available,
            }),
        }
    }

    async fn create_issue(&self, issue: &NewIssue) -> TicketResult<CreatedIssue> {
        self.log(format!("create {} {} {}", issue.project_key, issue.issue_type, issue.summary));
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let key = format!("{}-{}", issue.project_key, id);
        self.issues.lock().unwrap().insert(
            key.clone(),
            IssueSnapshot {
                key: key.clone(),
                summary: issue.summary.clone(),
                description: issue.description.clone(),
                status: "Open".to_string(),
                issue_type: issue.issue_type.clone(),
                comments: Vec::new(),
            },
        );
        Ok(CreatedIssue {
            key,
            id: id.to_string(),
        })
    }

    async fn get_changelog(&self, key: &str) -> TicketResult<Vec<ChangeEntry>> {
        self.log(format!("changelog {}", key));
        self.ensure_exists(key)?;
        Ok(vec![ChangeEntry {
            author: "Sam".to_string(),
            created: "2024-03-01T09:00:00.000+0000".to_string(),
            field: "status".to_string(),
            from: Some("Open".to_string()),
            to: Some("In Review".to_string()),
        }])
    }

    async fn editable_fields(&self, key: &str) -> TicketResult<Vec<EditableField>> {
        self.log(format!("editmeta {}", key));
        self.ensure_exists(key)?;
        Ok(vec![EditableField {
            id: "customfield_10042".to_string(),
            name: "Acceptance Criteria".to_string(),
            rich_text: true,
        }])
    }

    async fn update_fields(
        &self,
        key: &str,
        fields: &Map<String, Value>,
    ) -> TicketResult<FieldsUpdated> {
        self.log(format!("update {} {}", key, Value::Object(fields.clone())));
        self.ensure_exists(key)?;
        Ok(FieldsUpdated {
            issue_key: key.to_string(),
            fields: fields.keys().cloned().collect(),
        })
    }
}

/// Router over the default handlers with project `RB` configured
pub fn router(
    llm: Arc<ScriptedProvider>,
    tickets: Arc<InMemoryTickets>,
    memory: MemoryConfig,
) -> RequestRouter {
    let executor = Executor::new(
        default_handlers(tickets, llm.clone()),
        Duration::from_secs(5),
    );
    RequestRouter::new(llm, executor, memory, vec!["RB".to_string()], true)
}
