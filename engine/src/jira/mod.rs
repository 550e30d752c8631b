//! Jira REST client
//!
//! Implements [`TicketSystem`] against Jira Cloud REST v3 using basic auth
//! (account e-mail + API token). HTTP statuses are mapped onto the typed
//! [`TicketError`] variants so step handlers can report stable codes.

pub mod adf;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use sdk::ticket::{TicketError, TicketResult, TicketSystem};
use sdk::types::{
    normalize_issue_type, ChangeEntry, CommentAck, CreatedIssue, EditableField, FieldsUpdated,
    IssueComment, IssueSnapshot, NewIssue, TransitionAck,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::JiraConfig;
use sdk::errors::EngineError;
use crate::secrets::{SecretCache, SecretManager, JIRA_API_TOKEN};

/// Fields requested when fetching an issue
const ISSUE_FIELDS: &str = "summary,description,status,issuetype,comment";

/// Jira Cloud client
pub struct JiraClient {
    base_url: String,
    username: String,
    secret_cache: Arc<SecretCache>,
    client: Client,
}

impl JiraClient {
    pub fn new(config: &JiraConfig, secret_cache: Arc<SecretCache>) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EngineError::HttpClient(format!("Jira client: {}", e)))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            secret_cache,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/3/{}", self.base_url, path)
    }

    /// Attach credentials and send, mapping transport and HTTP failures.
    ///
    /// `subject` names the issue for `NotFound`.
    async fn send(&self, request: RequestBuilder, subject: &str) -> TicketResult<Response> {
        let token = self
            .secret_cache
            .get_secret(JIRA_API_TOKEN)
            .map_err(|e| TicketError::Auth(e.to_string()))?;

        let response = request
            .basic_auth(&self.username, Some(token.unsecure()))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TicketError::Transport("request to Jira timed out".to_string())
                } else {
                    TicketError::Transport(SecretManager::scrub(&e.to_string()))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, &body, subject))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> TicketResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| TicketError::Transport(format!("unexpected Jira response: {}", e)))
    }

    async fn list_transitions(&self, key: &str) -> TicketResult<Vec<RawTransition>> {
        let request = self
            .client
            .get(self.url(&format!("issue/{}/transitions", key)));
        let response = self.send(request, key).await?;
        let body: TransitionList = Self::read_json(response).await?;
        Ok(body.transitions)
    }

    /// Confirm the instance is reachable with the configured credentials
    pub async fn ping(&self) -> TicketResult<String> {
        let response = self.send(self.client.get(self.url("myself")), "myself").await?;
        let me: Value = Self::read_json(response).await?;
        Ok(me
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or(&self.username)
            .to_string())
    }
}

#[async_trait]
impl TicketSystem for JiraClient {
    async fn get_issue(&self, key: &str) -> TicketResult<IssueSnapshot> {
        debug!("Jira GET issue {}", key);
        let request = self
            .client
            .get(self.url(&format!("issue/{}", key)))
            .query(&[("fields", ISSUE_FIELDS)]);
        let response = self.send(request, key).await?;
        let raw: RawIssue = Self::read_json(response).await?;
        Ok(raw.into_snapshot(key))
    }

    async fn add_comment(&self, key: &str, text: &str) -> TicketResult<CommentAck> {
        if text.trim().is_empty() {
            return Err(TicketError::Validation("comment text is empty".to_string()));
        }
        info!("Jira adding comment to {}", key);
        let request = self
            .client
            .post(self.url(&format!("issue/{}/comment", key)))
            .json(&json!({ "body": adf::from_plain_text(text) }));
        let response = self.send(request, key).await?;
        let created: Value = Self::read_json(response).await?;

        Ok(CommentAck {
            issue_key: key.to_string(),
            comment_id: created
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn transition_issue(
        &self,
        key: &str,
        transition_name: &str,
    ) -> TicketResult<TransitionAck> {
        let transitions = self.list_transitions(key).await?;
        let wanted = transition_name.trim().to_lowercase();

        let matched = transitions.iter().find(|t| {
            t.name.to_lowercase() == wanted
                || t.to.as_ref().map(|s| s.name.to_lowercase()) == Some(wanted.clone())
                || t.id == wanted
        });

        let Some(transition) = matched else {
            warn!("Transition '{}' not available for {}", transition_name, key);
            return Err(TicketError::InvalidTransition {
                issue_key: key.to_string(),
                requested: transition_name.to_string(),
                available: transitions.iter().map(RawTransition::label).collect(),
            });
        };

        info!("Jira transitioning {} via '{}'", key, transition.name);
        let request = self
            .client
            .post(self.url(&format!("issue/{}/transitions", key)))
            .json(&json!({ "transition": { "id": transition.id } }));
        self.send(request, key).await?;

        Ok(TransitionAck {
            issue_key: key.to_string(),
            transition: transition.label(),
        })
    }

    async fn create_issue(&self, issue: &NewIssue) -> TicketResult<CreatedIssue> {
        let issue_type = normalize_issue_type(&issue.issue_type);
        let mut fields = json!({
            "project": { "key": issue.project_key },
            "summary": issue.summary,
            "issuetype": { "name": issue_type },
        });
        if !issue.description.trim().is_empty() {
            fields["description"] = adf::from_plain_text(&issue.description);
        }
        if issue.is_subtask() {
            let parent = issue
                .parent_key
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| {
                    TicketError::Validation("a sub-task needs a parent issue key".to_string())
                })?;
            fields["parent"] = json!({ "key": parent });
        }

        info!("Jira creating {} in {}", issue_type, issue.project_key);
        let request = self
            .client
            .post(self.url("issue"))
            .json(&json!({ "fields": fields }));
        let response = self.send(request, &issue.project_key).await?;
        let created: CreatedIssue = Self::read_json(response).await?;
        info!("Jira created {}", created.key);
        Ok(created)
    }

    async fn get_changelog(&self, key: &str) -> TicketResult<Vec<ChangeEntry>> {
        debug!("Jira GET changelog {}", key);
        let request = self
            .client
            .get(self.url(&format!("issue/{}", key)))
            .query(&[("expand", "changelog"), ("fields", "summary")]);
        let response = self.send(request, key).await?;
        let raw: RawChangelogIssue = Self::read_json(response).await?;
        Ok(raw.changelog.into_entries())
    }

    async fn editable_fields(&self, key: &str) -> TicketResult<Vec<EditableField>> {
        debug!("Jira GET editmeta {}", key);
        let request = self
            .client
            .get(self.url(&format!("issue/{}/editmeta", key)));
        let response = self.send(request, key).await?;
        let meta: RawEditMeta = Self::read_json(response).await?;
        Ok(meta
            .fields
            .into_iter()
            .map(|(id, field)| EditableField {
                rich_text: field.schema.is_rich_text(),
                name: if field.name.is_empty() { id.clone() } else { field.name },
                id,
            })
            .collect())
    }

    async fn update_fields(
        &self,
        key: &str,
        fields: &Map<String, Value>,
    ) -> TicketResult<FieldsUpdated> {
        if fields.is_empty() {
            return Err(TicketError::Validation("no fields to update".to_string()));
        }
        info!("Jira updating {} field(s) on {}", fields.len(), key);
        let request = self
            .client
            .put(self.url(&format!("issue/{}", key)))
            .json(&json!({ "fields": fields }));
        self.send(request, key).await?;

        Ok(FieldsUpdated {
            issue_key: key.to_string(),
            fields: fields.keys().cloned().collect(),
        })
    }
}

/// Map a non-success HTTP status onto a ticket error
fn map_status(status: StatusCode, body: &str, subject: &str) -> TicketError {
    match status.as_u16() {
        401 | 403 => TicketError::Auth(format!("Jira answered {}", status)),
        404 => TicketError::NotFound(subject.to_string()),
        400 => TicketError::Validation(jira_error_messages(body)),
        _ => TicketError::Transport(format!("Jira answered {}", status)),
    }
}

/// Collect `errorMessages` and per-field `errors` from a Jira error body
fn jira_error_messages(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    let mut messages: Vec<String> = value
        .get("errorMessages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if let Some(errors) = value.get("errors").and_then(Value::as_object) {
        for (field, message) in errors {
            if let Some(message) = message.as_str() {
                messages.push(format!("{}: {}", field, message));
            }
        }
    }

    if messages.is_empty() {
        "request rejected".to_string()
    } else {
        messages.join("; ")
    }
}

#[derive(Debug, Deserialize)]
struct TransitionList {
    #[serde(default)]
    transitions: Vec<RawTransition>,
}

#[derive(Debug, Deserialize)]
struct RawTransition {
    id: String,
    #[serde(default)]
    name: String,
    to: Option<RawNamed>,
}

impl RawTransition {
    fn label(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        self.to
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawNamed {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: Option<String>,
    #[serde(default)]
    fields: RawFields,
}

#[derive(Debug, Default, Deserialize)]
struct RawFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: Value,
    status: Option<RawNamed>,
    issuetype: Option<RawNamed>,
    comment: Option<RawCommentPage>,
}

#[derive(Debug, Deserialize)]
struct RawCommentPage {
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    author: Option<RawAuthor>,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAuthor {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct RawChangelogIssue {
    #[serde(default)]
    changelog: RawChangelog,
}

#[derive(Debug, Default, Deserialize)]
struct RawChangelog {
    #[serde(default)]
    histories: Vec<RawHistory>,
}

#[derive(Debug, Deserialize)]
struct RawHistory {
    author: Option<RawAuthor>,
    #[serde(default)]
    created: String,
    #[serde(default)]
    items: Vec<RawHistoryItem>,
}

#[derive(Debug, Deserialize)]
struct RawHistoryItem {
    #[serde(default)]
    field: String,
    #[serde(rename = "fromString")]
    from: Option<String>,
    #[serde(rename = "toString")]
    to: Option<String>,
}

impl RawChangelog {
    /// Flatten histories into one entry per changed field, oldest first
    fn into_entries(self) -> Vec<ChangeEntry> {
        let mut entries: Vec<ChangeEntry> = self
            .histories
            .into_iter()
            .flat_map(|history| {
                let author = history
                    .author
                    .map(|a| a.display_name)
                    .unwrap_or_default();
                let created = history.created;
                history.items.into_iter().map(move |item| ChangeEntry {
                    author: author.clone(),
                    created: created.clone(),
                    field: item.field,
                    from: item.from,
                    to: item.to,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.created.cmp(&b.created));
        entries
    }
}

#[derive(Debug, Deserialize)]
struct RawEditMeta {
    #[serde(default)]
    fields: BTreeMap<String, RawEditField>,
}

#[derive(Debug, Deserialize)]
struct RawEditField {
    #[serde(default)]
    name: String,
    #[serde(default)]
    schema: RawSchema,
}

#[derive(Debug, Default, Deserialize)]
struct RawSchema {
    system: Option<String>,
    custom: Option<String>,
}

impl RawSchema {
    /// Jira v3 takes document-format values for these text fields
    fn is_rich_text(&self) -> bool {
        matches!(self.system.as_deref(), Some("description" | "environment"))
            || self
                .custom
                .as_deref()
                .is_some_and(|c| c.ends_with(":textarea"))
    }
}

impl RawIssue {
    fn into_snapshot(self, requested_key: &str) -> IssueSnapshot {
        let fields = self.fields;
        IssueSnapshot {
            key: self.key.unwrap_or_else(|| requested_key.to_string()),
            summary: fields.summary,
            description: adf::to_plain_text(&fields.description),
            status: fields.status.map(|s| s.name).unwrap_or_default(),
            issue_type: fields.issuetype.map(|t| t.name).unwrap_or_default(),
            comments: fields
                .comment
                .map(|page| page.comments)
                .unwrap_or_default()
                .into_iter()
                .map(|c| IssueComment {
                    author: c.author.map(|a| a.display_name).unwrap_or_default(),
                    body: adf::to_plain_text(&c.body),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            map_status(StatusCode::UNAUTHORIZED, "", "RB-1").code(),
            "AUTH_ERROR"
        );
        assert_eq!(
            map_status(StatusCode::FORBIDDEN, "", "RB-1").code(),
            "AUTH_ERROR"
        );
        assert_eq!(
            map_status(StatusCode::NOT_FOUND, "", "RB-1"),
            TicketError::NotFound("RB-1".to_string())
        );
        assert_eq!(
            map_status(StatusCode::BAD_GATEWAY, "", "RB-1").code(),
            "TRANSPORT_ERROR"
        );
    }

    #[test]
    fn test_validation_collects_jira_messages() {
        let body = r#"{"errorMessages":["Project is archived"],"errors":{"summary":"Summary is required"}}"#;
        let err = map_status(StatusCode::BAD_REQUEST, body, "RB");
        assert_eq!(
            err,
            TicketError::Validation("Project is archived; summary: Summary is required".into())
        );
    }

    #[test]
    fn test_raw_issue_into_snapshot() {
        let raw: RawIssue = serde_json::from_value(json!({
            "key": "RB-7",
            "fields": {
                "summary": "Login endpoint",
                "description": {"type": "doc", "version": 1, "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "POST /login"}]}
                ]},
                "status": {"name": "In Review"},
                "issuetype": {"name": "Story"},
                "comment": {"comments": [
                    {"author": {"displayName": "Dana"}, "body": "looks fine"}
                ]}
            }
        }))
        .unwrap();

        let snapshot = raw.into_snapshot("RB-7");
        assert_eq!(snapshot.description, "POST /login");
        assert_eq!(snapshot.status, "In Review");
        assert_eq!(snapshot.status_slug(), "inreview");
        assert_eq!(snapshot.comments[0].author, "Dana");
    }

    #[test]
    fn test_transition_label_falls_back_to_target_status() {
        let t = RawTransition {
            id: "31".into(),
            name: String::new(),
            to: Some(RawNamed {
                name: "Done".into(),
            }),
        };
        assert_eq!(t.label(), "Done");
    }

    #[test]
    fn test_changelog_flattens_items_oldest_first() {
        let raw: RawChangelogIssue = serde_json::from_value(json!({
            "key": "RB-7",
            "changelog": {"histories": [
                {
                    "author": {"displayName": "Sam"},
                    "created": "2024-03-02T09:00:00.000+0000",
                    "items": [{"field": "status", "fromString": "Open", "toString": "In Progress"}]
                },
                {
                    "author": {"displayName": "Dana"},
                    "created": "2024-03-01T09:00:00.000+0000",
                    "items": [
                        {"field": "summary", "fromString": "Login", "toString": "Login endpoint"},
                        {"field": "assignee", "fromString": null, "toString": "Sam"}
                    ]
                }
            ]}
        }))
        .unwrap();

        let entries = raw.changelog.into_entries();
        let fields: Vec<&str> = entries.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["summary", "assignee", "status"]);
        assert_eq!(entries[1].from, None);
        assert_eq!(entries[2].author, "Sam");
    }

    #[test]
    fn test_rich_text_schema_detection() {
        let meta: RawEditMeta = serde_json::from_value(json!({
            "fields": {
                "description": {"name": "Description", "schema": {"type": "string", "system": "description"}},
                "customfield_10042": {"name": "Acceptance Criteria", "schema": {
                    "type": "string",
                    "custom": "com.atlassian.jira.plugin.system.customfieldtypes:textarea"
                }},
                "summary": {"name": "Summary", "schema": {"type": "string", "system": "summary"}}
            }
        }))
        .unwrap();

        assert!(meta.fields["description"].schema.is_rich_text());
        assert!(meta.fields["customfield_10042"].schema.is_rich_text());
        assert!(!meta.fields["summary"].schema.is_rich_text());
    }
}
