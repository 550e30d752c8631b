//! Ticket read/write operations

use super::{required_param, str_param, target_key, unsupported, StepHandler, StepOutcome};
use crate::conductor::error::StepError;
use crate::conductor::types::{AgentKind, ResolvedParams};
use crate::jira::adf;
use crate::llm::{clean_label, LLMProvider};
use crate::prompts;
use minijinja::context;
use async_trait::async_trait;
use sdk::ticket::{TicketError, TicketSystem};
use sdk::types::{normalize_issue_type, FieldsUpdated, NewIssue};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub struct JiraOperationsAgent {
    tickets: Arc<dyn TicketSystem>,
    llm: Arc<dyn LLMProvider>,
}

impl JiraOperationsAgent {
    pub fn new(tickets: Arc<dyn TicketSystem>, llm: Arc<dyn LLMProvider>) -> Self {
        Self { tickets, llm }
    }

    async fn get_issue(&self, key: &str) -> Result<StepOutcome, StepError> {
        let issue = self.tickets.get_issue(key).await?;
        let detail = format!("{} \"{}\" is {}", issue.key, issue.summary, issue.status);
        let value = serde_json::to_value(&issue)
            .map_err(|e| StepError::InvalidParameters(e.to_string()))?;
        Ok(StepOutcome::structured(value, detail))
    }

    async fn add_comment(&self, key: &str, comment: &str) -> Result<StepOutcome, StepError> {
        let ack = self.tickets.add_comment(key, comment).await?;
        info!("Comment {} added to {}", ack.comment_id, ack.issue_key);
        Ok(StepOutcome::structured(
            json!({ "issue_key": ack.issue_key, "comment_id": ack.comment_id }),
            format!("Comment added to {}", ack.issue_key),
        ))
    }

    async fn transition_issue(&self, key: &str, name: &str) -> Result<StepOutcome, StepError> {
        match self.tickets.transition_issue(key, name).await {
            Ok(ack) => Ok(StepOutcome::structured(
                json!({ "issue_key": ack.issue_key, "transition": ack.transition }),
                format!("{} moved to {}", ack.issue_key, ack.transition),
            )),
            Err(TicketError::InvalidTransition {
                issue_key,
                requested,
                available,
            }) => {
                let suggestion = self.suggest_transition(&requested, &available).await;
                Err(StepError::TransitionUnavailable {
                    issue_key,
                    requested,
                    available,
                    suggestion,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One scoped model call to pick the closest available transition
    async fn suggest_transition(&self, requested: &str, available: &[String]) -> Option<String> {
        if available.is_empty() {
            return None;
        }
        let options = available.join(", ");
        let prompt = match prompts::render(
            prompts::TRANSITION_CHOICE,
            context! { requested => requested, options => options },
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Transition prompt failed to render: {}", e);
                return None;
            }
        };

        match self.llm.complete(&prompt).await {
            Ok(reply) => {
                let choice = clean_label(&reply);
                available
                    .iter()
                    .find(|option| option.eq_ignore_ascii_case(&choice))
                    .cloned()
            }
            Err(e) => {
                warn!("Transition suggestion failed: {}", e);
                None
            }
        }
    }

    async fn create_issue(&self, params: &ResolvedParams) -> Result<StepOutcome, StepError> {
        let project_key = required_param(params, "project_key")?.to_uppercase();
        let summary = required_param(params, "summary")?;
        let issue_type = normalize_issue_type(&str_param(params, "issue_type").unwrap_or_default());

        let mut issue = NewIssue::new(project_key, summary).with_issue_type(issue_type);
        if let Some(description) = str_param(params, "description") {
            issue = issue.with_description(description);
        }
        if let Some(parent) = str_param(params, "parent_key") {
            issue = issue.with_parent(parent.to_uppercase());
        }
        if issue.is_subtask() && issue.parent_key.is_none() {
            return Err(StepError::InvalidParameters(
                "a sub-task needs parent_key".to_string(),
            ));
        }

        let created = self.tickets.create_issue(&issue).await?;
        Ok(StepOutcome::structured(
            json!({ "key": created.key, "id": created.id }),
            format!("Created {} {}", issue.issue_type, created.key),
        ))
    }

    async fn update_fields(
        &self,
        key: &str,
        fields: &Map<String, Value>,
    ) -> Result<StepOutcome, StepError> {
        let ack = self.tickets.update_fields(key, fields).await?;
        info!("Updated {} on {}", ack.fields.join(", "), ack.issue_key);
        Ok(updated_outcome(ack))
    }

    /// Resolve a field by its display label, then set it
    async fn fill_field_by_label(
        &self,
        key: &str,
        label: &str,
        value: &str,
    ) -> Result<StepOutcome, StepError> {
        let editable = self.tickets.editable_fields(key).await?;
        let Some(field) = editable
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(label) || f.id == label)
        else {
            let names: Vec<&str> = editable.iter().map(|f| f.name.as_str()).collect();
            return Err(TicketError::Validation(format!(
                "{} has no editable field '{}' (editable: {})",
                key,
                label,
                names.join(", ")
            ))
            .into());
        };

        let value = if field.rich_text {
            adf::from_plain_text(value)
        } else {
            Value::String(value.to_string())
        };
        let mut fields = Map::new();
        fields.insert(field.id.clone(), value);

        let ack = self.tickets.update_fields(key, &fields).await?;
        Ok(StepOutcome::structured(
            json!({ "issue_key": ack.issue_key, "fields": ack.fields }),
            format!("{} set on {}", field.name, ack.issue_key),
        ))
    }
}

fn updated_outcome(ack: FieldsUpdated) -> StepOutcome {
    let detail = format!("Updated {} on {}", ack.fields.join(", "), ack.issue_key);
    StepOutcome::structured(
        json!({ "issue_key": ack.issue_key, "fields": ack.fields }),
        detail,
    )
}

/// Field map from an object parameter, or a string holding a JSON object
fn field_map(params: &ResolvedParams) -> Result<Map<String, Value>, StepError> {
    let invalid = || StepError::InvalidParameters("'fields' must be a JSON object".to_string());
    match params.get("fields") {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(invalid()),
        },
        Some(_) => Err(invalid()),
        None => Err(StepError::InvalidParameters(
            "missing parameter 'fields'".to_string(),
        )),
    }
}

#[async_trait]
impl StepHandler for JiraOperationsAgent {
    fn agent(&self) -> AgentKind {
        AgentKind::JiraOperations
    }

    async fn handle(
        &self,
        action: &str,
        params: &ResolvedParams,
        plan_key: Option<&str>,
    ) -> Result<StepOutcome, StepError> {
        match action {
            "get_issue" => self.get_issue(&target_key(params, plan_key)?).await,
            "add_comment" => {
                let key = target_key(params, plan_key)?;
                let comment = required_param(params, "comment")?;
                self.add_comment(&key, &comment).await
            }
            "transition_issue" => {
                let key = target_key(params, plan_key)?;
                let name = required_param(params, "transition_name")?;
                self.transition_issue(&key, &name).await
            }
            "create_issue" => self.create_issue(params).await,
            "update_fields" => {
                let key = target_key(params, plan_key)?;
                let fields = field_map(params)?;
                self.update_fields(&key, &fields).await
            }
            "fill_field_by_label" => {
                let key = target_key(params, plan_key)?;
                let label = required_param(params, "field_label")?;
                let value = required_param(params, "value")?;
                self.fill_field_by_label(&key, &label, &value).await
            }
            other => Err(unsupported(self.agent(), other)),
        }
    }
}
