//! Conductor data model
//!
//! Intents, plans and step results shared by the classifier, planner,
//! resolver, executor and router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// What the caller wants done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Validate,
    Operate,
    Insight,
    Test,
    Create,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::Validate,
        Intent::Operate,
        Intent::Insight,
        Intent::Test,
        Intent::Create,
        Intent::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Validate => "VALIDATE",
            Intent::Operate => "OPERATE",
            Intent::Insight => "INSIGHT",
            Intent::Test => "TEST",
            Intent::Create => "CREATE",
            Intent::Unknown => "UNKNOWN",
        }
    }

    /// Exact label match, ignoring case. Anything else is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|intent| intent.label().eq_ignore_ascii_case(label))
    }

    /// Whether the request cannot proceed without a ticket key
    pub fn requires_key(&self) -> bool {
        matches!(
            self,
            Intent::Validate | Intent::Operate | Intent::Insight | Intent::Test
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Capability group a plan step is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    JiraOperations,
    ApiValidator,
    TestAgent,
    IssueInsights,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::JiraOperations => "jira_operations",
            AgentKind::ApiValidator => "api_validator",
            AgentKind::TestAgent => "test_agent",
            AgentKind::IssueInsights => "issue_insights",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "jira_operations" => Some(AgentKind::JiraOperations),
            "api_validator" => Some(AgentKind::ApiValidator),
            "test_agent" => Some(AgentKind::TestAgent),
            "issue_insights" => Some(AgentKind::IssueInsights),
            _ => None,
        }
    }

    /// Actions this agent accepts
    pub fn actions(&self) -> &'static [&'static str] {
        match self {
            AgentKind::JiraOperations => &[
                "get_issue",
                "add_comment",
                "transition_issue",
                "create_issue",
                "update_fields",
                "fill_field_by_label",
            ],
            AgentKind::ApiValidator => &["validate"],
            AgentKind::TestAgent => &["create_test_cases"],
            AgentKind::IssueInsights => &["ask", "summarize"],
        }
    }

    pub fn supports(&self, action: &str) -> bool {
        self.actions().contains(&action)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the output of an earlier step: `$stepN` or `$stepN.a.b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    /// 1-based step index
    pub index: usize,
    /// Object keys to walk, possibly empty
    pub path: Vec<String>,
}

impl StepRef {
    /// Parse a whole parameter value. Surrounding text disqualifies it.
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix("$step")?;
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return None;
        }
        let index: usize = rest[..digits_end].parse().ok()?;
        if index == 0 {
            return None;
        }

        let tail = &rest[digits_end..];
        let path = if tail.is_empty() {
            Vec::new()
        } else {
            let fields = tail.strip_prefix('.')?;
            let parts: Vec<String> = fields.split('.').map(str::to_string).collect();
            let valid = parts.iter().all(|p| {
                !p.is_empty()
                    && p.chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });
            if !valid {
                return None;
            }
            parts
        };

        Some(Self { index, path })
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$step{}", self.index)?;
        for part in &self.path {
            write!(f, ".{}", part)?;
        }
        Ok(())
    }
}

/// A step parameter before resolution
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Literal(Value),
    Ref(StepRef),
}

impl ParamValue {
    /// Classify a planner-supplied value
    pub fn from_json(value: Value) -> Self {
        if let Value::String(s) = &value {
            if let Some(step_ref) = StepRef::parse(s) {
                return ParamValue::Ref(step_ref);
            }
        }
        ParamValue::Literal(value)
    }

    /// A string that is never read as a step reference
    pub fn literal(s: impl Into<String>) -> Self {
        ParamValue::Literal(Value::String(s.into()))
    }

    /// Present and not an empty literal
    pub fn is_provided(&self) -> bool {
        match self {
            ParamValue::Ref(_) => true,
            ParamValue::Literal(Value::Null) => false,
            ParamValue::Literal(Value::String(s)) => !s.trim().is_empty(),
            ParamValue::Literal(_) => true,
        }
    }

    pub fn as_literal_str(&self) -> Option<&str> {
        match self {
            ParamValue::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::from_json(Value::String(s.to_string()))
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::from_json(Value::String(s))
    }
}

pub type Parameters = BTreeMap<String, ParamValue>;
pub type ResolvedParams = BTreeMap<String, Value>;

/// One operation in a plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub index: usize,
    pub agent: AgentKind,
    pub action: String,
    pub parameters: Parameters,
}

impl PlanStep {
    pub fn new(index: usize, agent: AgentKind, action: impl Into<String>) -> Self {
        Self {
            index,
            agent,
            action: action.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    /// Whether the step acts on an existing ticket
    pub fn targets_ticket(&self) -> bool {
        !(self.agent == AgentKind::JiraOperations && self.action == "create_issue")
    }

    /// `agent.action`, for logs and reports
    pub fn label(&self) -> String {
        format!("{}.{}", self.agent, self.action)
    }
}

/// Ordered steps against one (optional) ticket
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub issue_key: Option<String>,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn single(issue_key: Option<String>, step: PlanStep) -> Self {
        Self {
            issue_key,
            steps: vec![step],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Outcome of one executed step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub index: usize,
    pub agent: AgentKind,
    pub action: String,
    pub status: StepStatus,
    /// Structured output; `Null` when the step failed
    pub value: Value,
    /// Human-readable summary or error description
    pub detail: String,
    /// Error code for failed steps
    pub code: Option<String>,
}

impl StepResult {
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// Externally visible line of a step report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReportEntry {
    pub index: usize,
    pub agent: String,
    pub action: String,
    pub status: StepStatus,
    pub detail: String,
}

impl From<&StepResult> for StepReportEntry {
    fn from(result: &StepResult) -> Self {
        let detail = match &result.code {
            Some(code) => format!("{}: {}", code, result.detail),
            None => result.detail.clone(),
        };
        Self {
            index: result.index,
            agent: result.agent.to_string(),
            action: result.action.clone(),
            status: result.status,
            detail,
        }
    }
}

/// A completed question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub request: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(request: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            response: response.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_labels() {
        assert_eq!(Intent::from_label("validate"), Some(Intent::Validate));
        assert_eq!(Intent::from_label("Create"), Some(Intent::Create));
        assert_eq!(Intent::from_label("VALIDATION"), None);
        assert!(Intent::Test.requires_key());
        assert!(!Intent::Create.requires_key());
        assert!(!Intent::Unknown.requires_key());
    }

    #[test]
    fn test_agent_actions() {
        assert_eq!(AgentKind::parse("test_agent"), Some(AgentKind::TestAgent));
        assert_eq!(AgentKind::parse("shell"), None);
        assert!(AgentKind::JiraOperations.supports("transition_issue"));
        assert!(!AgentKind::ApiValidator.supports("add_comment"));
        assert!(AgentKind::JiraOperations.supports("fill_field_by_label"));
        assert!(AgentKind::IssueInsights.supports("summarize"));
        assert!(!AgentKind::IssueInsights.supports("update_fields"));
    }

    #[test]
    fn test_step_ref_grammar() {
        assert_eq!(
            StepRef::parse("$step2"),
            Some(StepRef {
                index: 2,
                path: vec![]
            })
        );
        assert_eq!(
            StepRef::parse("$step1.fields.key"),
            Some(StepRef {
                index: 1,
                path: vec!["fields".into(), "key".into()]
            })
        );
        assert_eq!(StepRef::parse("$step0"), None);
        assert_eq!(StepRef::parse("$step"), None);
        assert_eq!(StepRef::parse("$step1."), None);
        assert_eq!(StepRef::parse("$step1..key"), None);
        assert_eq!(StepRef::parse("see $step1"), None);
        assert_eq!(StepRef::parse("$step1 please"), None);
        assert_eq!(StepRef::parse("$stepx"), None);
    }

    #[test]
    fn test_step_ref_display_round_trip() {
        let r = StepRef::parse("$step3.key").unwrap();
        assert_eq!(r.to_string(), "$step3.key");
    }

    #[test]
    fn test_param_value_classification() {
        assert!(matches!(ParamValue::from_json(json!("$step1.key")), ParamValue::Ref(_)));
        assert!(matches!(
            ParamValue::from_json(json!("cost is $step1")),
            ParamValue::Literal(_)
        ));
        assert!(!ParamValue::from_json(json!("  ")).is_provided());
        assert!(!ParamValue::from_json(Value::Null).is_provided());
        assert!(ParamValue::from_json(json!(3)).is_provided());
    }

    #[test]
    fn test_create_issue_does_not_target_ticket() {
        let create = PlanStep::new(1, AgentKind::JiraOperations, "create_issue");
        let comment = PlanStep::new(2, AgentKind::JiraOperations, "add_comment");
        assert!(!create.targets_ticket());
        assert!(comment.targets_ticket());
    }

    #[test]
    fn test_report_entry_serialization() {
        let result = StepResult {
            index: 1,
            agent: AgentKind::JiraOperations,
            action: "get_issue".into(),
            status: StepStatus::Failed,
            value: Value::Null,
            detail: "Issue RB-1 was not found".into(),
            code: Some("NOT_FOUND".into()),
        };
        let entry = StepReportEntry::from(&result);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["agent"], "jira_operations");
        assert_eq!(json["detail"], "NOT_FOUND: Issue RB-1 was not found");
    }
}
