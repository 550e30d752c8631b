//! Ticket system data types

use serde::{Deserialize, Serialize};

/// A comment on an issue, flattened to plain text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueComment {
    pub author: String,
    pub body: String,
}

/// Read-only view of an issue as returned by the ticket system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueSnapshot {
    /// Issue key, e.g. `RB-1234`
    pub key: String,

    pub summary: String,

    /// Description flattened from Atlassian document format
    #[serde(default)]
    pub description: String,

    /// Workflow status name, e.g. `In Progress`
    #[serde(default)]
    pub status: String,

    /// Issue type name, e.g. `Story`, `Sub-task`
    #[serde(default)]
    pub issue_type: String,

    #[serde(default)]
    pub comments: Vec<IssueComment>,
}

impl IssueSnapshot {
    /// Status normalized for prompt lookup: lowercase with spaces removed
    pub fn status_slug(&self) -> String {
        self.status.replace(' ', "").to_lowercase()
    }
}

/// Fields for creating a new issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIssue {
    pub project_key: String,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
}

impl NewIssue {
    /// Create a new issue of type `Task`
    pub fn new(project_key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            summary: summary.into(),
            description: String::new(),
            issue_type: default_issue_type(),
            parent_key: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the issue type
    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = issue_type.into();
        self
    }

    /// Set the parent issue (required for sub-tasks)
    pub fn with_parent(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = Some(parent_key.into());
        self
    }

    /// Whether this issue is a sub-task and therefore needs a parent
    pub fn is_subtask(&self) -> bool {
        is_subtask_type(&self.issue_type)
    }
}

/// Result of a successful issue creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedIssue {
    pub key: String,
    pub id: String,
}

/// Acknowledgement of an added comment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentAck {
    pub issue_key: String,
    pub comment_id: String,
}

/// Acknowledgement of a workflow transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionAck {
    pub issue_key: String,
    /// Transition name as known to the ticket system
    pub transition: String,
}

/// One field change from an issue's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEntry {
    pub author: String,
    /// Timestamp as reported by the ticket system
    pub created: String,
    pub field: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

impl ChangeEntry {
    /// `created author: field from -> to`
    pub fn describe(&self) -> String {
        format!(
            "{} {}: {} {} -> {}",
            self.created,
            self.author,
            self.field,
            self.from.as_deref().unwrap_or("(empty)"),
            self.to.as_deref().unwrap_or("(empty)")
        )
    }
}

/// A field that can be edited on an issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditableField {
    /// Field id, e.g. `customfield_10042`
    pub id: String,
    /// Display label, e.g. `Acceptance Criteria`
    pub name: String,
    /// Value must be sent as a rich-text document rather than a plain string
    #[serde(default)]
    pub rich_text: bool,
}

/// Acknowledgement of a field update
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldsUpdated {
    pub issue_key: String,
    /// Ids of the fields sent in the update
    pub fields: Vec<String>,
}

/// Normalize a free-form issue type name
///
/// `"sub task"`, `"subtask"` and `"Sub-Task"` all become `Sub-task`; other
/// names get title case per hyphenated word.
pub fn normalize_issue_type(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default_issue_type();
    }
    if is_subtask_type(trimmed) {
        return "Sub-task".to_string();
    }
    trimmed
        .replace(' ', "-")
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

/// Whether `issue_type` names a sub-task
pub fn is_subtask_type(issue_type: &str) -> bool {
    let compact: String = issue_type
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    compact == "subtask"
}

fn default_issue_type() -> String {
    "Task".to_string()
}
