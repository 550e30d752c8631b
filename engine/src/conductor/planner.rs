//! Step Planner
//!
//! Single-purpose intents get a one-step plan without a model call. Anything
//! that changes tickets, creates them, or chains several actions is planned
//! by the model as strict JSON, which is then validated and never repaired.

use crate::conductor::error::RouteError;
use crate::conductor::types::{AgentKind, Intent, ParamValue, Plan, PlanStep};
use crate::llm::{extract_json_object, LLMProvider};
use crate::prompts;
use minijinja::context;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Wording that signals more than one action
const MULTI_ACTION_MARKERS: &[&str] = &[
    " and then ",
    " then ",
    " after that ",
    " afterwards ",
    " and also ",
    "; ",
    " and move ",
    " and add ",
    " and transition ",
    " and comment ",
];

pub struct Planner {
    llm: Arc<dyn LLMProvider>,
}

/// Intermediate deserialization type for LLM JSON output
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    issue_key: Option<String>,
    plan: Vec<RawPlanStep>,
}

#[derive(Debug, Deserialize)]
struct RawPlanStep {
    agent: String,
    action: String,
    #[serde(default)]
    parameters: Map<String, Value>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    /// Build a validated plan for `request`
    pub async fn plan(
        &self,
        request: &str,
        intent: Intent,
        context: &str,
        default_key: Option<&str>,
    ) -> Result<Plan, RouteError> {
        let default_key = default_key.filter(|k| !k.trim().is_empty());

        if let Some(plan) = direct_plan(request, intent, default_key)? {
            debug!("Planned {} directly: {}", intent, plan.steps[0].label());
            return Ok(plan);
        }

        let prompt = prompts::render(
            prompts::PLAN,
            context! {
                request => request,
                context => context,
                issue_key => default_key.unwrap_or(""),
            },
        )
        .map_err(|e| RouteError::PlanInvalid(format!("the planning prompt failed ({})", e)))?;

        let reply = self.llm.complete(&prompt).await.map_err(|e| {
            warn!("Planner model call failed: {}", e);
            RouteError::PlanInvalid(format!("the planner could not be reached ({})", e.code()))
        })?;

        let plan = parse_plan(&reply, default_key)?;
        info!(
            "Planned {} step(s) for {}: {}",
            plan.steps.len(),
            intent,
            plan.steps
                .iter()
                .map(PlanStep::label)
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(plan)
    }
}

/// Whether the request reads like several chained actions
pub fn is_multi_action(request: &str) -> bool {
    let padded = format!(" {} ", request.to_lowercase());
    MULTI_ACTION_MARKERS.iter().any(|m| padded.contains(m))
}

/// One-step plans that need no model call. `Ok(None)` means "ask the model".
fn direct_plan(
    request: &str,
    intent: Intent,
    default_key: Option<&str>,
) -> Result<Option<Plan>, RouteError> {
    let step = match intent {
        Intent::Operate | Intent::Create => return Ok(None),
        _ if is_multi_action(request) && intent != Intent::Unknown => return Ok(None),
        Intent::Validate => PlanStep::new(1, AgentKind::ApiValidator, "validate"),
        Intent::Test => PlanStep::new(1, AgentKind::TestAgent, "create_test_cases")
            .with_param("question", ParamValue::literal(request)),
        Intent::Insight if is_summary_request(request) => {
            PlanStep::new(1, AgentKind::IssueInsights, "summarize")
        }
        Intent::Insight | Intent::Unknown => {
            PlanStep::new(1, AgentKind::IssueInsights, "ask")
                .with_param("question", ParamValue::literal(request))
        }
    };

    let key = default_key.ok_or(RouteError::MissingKey { intent })?;
    let step = step.with_param("issue_key", ParamValue::literal(key));
    Ok(Some(Plan::single(Some(key.to_string()), step)))
}

fn is_summary_request(request: &str) -> bool {
    let request = request.to_lowercase();
    ["summarize", "summarise", "summary of", "tl;dr"]
        .iter()
        .any(|phrase| request.contains(phrase))
}

/// Parse and validate a model-produced plan
pub fn parse_plan(reply: &str, default_key: Option<&str>) -> Result<Plan, RouteError> {
    let value = extract_json_object(reply)
        .ok_or_else(|| RouteError::PlanInvalid("the planner did not return JSON".to_string()))?;

    let raw: RawPlan = serde_json::from_value(value)
        .map_err(|e| RouteError::PlanInvalid(format!("unexpected plan shape: {}", e)))?;

    let issue_key = raw
        .issue_key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .or_else(|| default_key.map(str::to_string));

    let steps = raw
        .plan
        .into_iter()
        .enumerate()
        .map(|(i, raw_step)| {
            let index = i + 1;
            let agent = AgentKind::parse(&raw_step.agent).ok_or_else(|| {
                RouteError::PlanInvalid(format!(
                    "step {}: unknown agent '{}'",
                    index, raw_step.agent
                ))
            })?;
            let action = raw_step.action.trim().to_string();
            if !agent.supports(&action) {
                return Err(RouteError::PlanInvalid(format!(
                    "step {}: {} has no action '{}'",
                    index, agent, action
                )));
            }

            let mut step = PlanStep::new(index, agent, action);
            for (name, value) in raw_step.parameters {
                step.parameters.insert(name, ParamValue::from_json(value));
            }
            Ok(step)
        })
        .collect::<Result<Vec<_>, RouteError>>()?;

    let plan = Plan { issue_key, steps };
    validate_plan(&plan)?;
    Ok(plan)
}

/// Structural checks every plan must pass before execution
pub fn validate_plan(plan: &Plan) -> Result<(), RouteError> {
    if plan.steps.is_empty() {
        return Err(RouteError::PlanInvalid("the plan has no steps".to_string()));
    }

    let has_plan_key = plan
        .issue_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());

    for step in &plan.steps {
        let missing = |name: &str| !step.param(name).is_some_and(ParamValue::is_provided);
        let invalid = |reason: String| {
            Err(RouteError::PlanInvalid(format!(
                "step {}: {}",
                step.index, reason
            )))
        };

        if step.targets_ticket() && !has_plan_key && missing("issue_key") {
            return invalid(format!("{} needs a ticket key", step.label()));
        }

        match step.action.as_str() {
            "transition_issue" if missing("transition_name") => {
                return invalid("transition_issue needs transition_name".to_string());
            }
            "add_comment" if missing("comment") => {
                return invalid("add_comment needs comment".to_string());
            }
            "update_fields" if missing("fields") => {
                return invalid("update_fields needs fields".to_string());
            }
            "fill_field_by_label" => {
                for field in ["field_label", "value"] {
                    if missing(field) {
                        return invalid(format!("fill_field_by_label needs {}", field));
                    }
                }
            }
            "create_issue" => {
                for field in ["summary", "project_key"] {
                    if missing(field) {
                        return invalid(format!("create_issue needs {}", field));
                    }
                }
                let is_subtask = step
                    .param("issue_type")
                    .and_then(ParamValue::as_literal_str)
                    .is_some_and(sdk::types::is_subtask_type);
                if is_subtask && missing("parent_key") {
                    return invalid("create_issue of a sub-task needs parent_key".to_string());
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_multi_action_detection() {
        assert!(is_multi_action("Add a comment saying done and then move it to Done"));
        assert!(is_multi_action("validate it; write tests"));
        assert!(is_multi_action("Then close it"));
        assert!(!is_multi_action("Validate RB-1234"));
        assert!(!is_multi_action("What happened with the authentication flow?"));
    }

    #[test]
    fn test_direct_validate_plan() {
        let plan = direct_plan("Validate RB-1234", Intent::Validate, Some("RB-1234"))
            .unwrap()
            .unwrap();
        assert_eq!(plan.issue_key.as_deref(), Some("RB-1234"));
        assert_eq!(plan.steps.len(), 1);
        let step = &plan.steps[0];
        assert_eq!(step.index, 1);
        assert_eq!(step.agent, AgentKind::ApiValidator);
        assert_eq!(step.action, "validate");
        assert_eq!(step.parameters.len(), 1);
        assert_eq!(
            step.param("issue_key"),
            Some(&ParamValue::Literal(json!("RB-1234")))
        );
    }

    #[test]
    fn test_summary_request_plans_summarize() {
        let plan = direct_plan("Summarize RB-7 for me", Intent::Insight, Some("RB-7"))
            .unwrap()
            .unwrap();
        assert_eq!(plan.steps[0].agent, AgentKind::IssueInsights);
        assert_eq!(plan.steps[0].action, "summarize");
        assert_eq!(plan.steps[0].param("question"), None);

        let plan = direct_plan("Who changed RB-7?", Intent::Insight, Some("RB-7"))
            .unwrap()
            .unwrap();
        assert_eq!(plan.steps[0].action, "ask");
    }

    #[test]
    fn test_direct_plan_needs_key() {
        let err = direct_plan("validate it", Intent::Validate, None).unwrap_err();
        assert_eq!(err.code(), "MISSING_KEY");
    }

    #[test]
    fn test_operate_and_multi_action_go_to_model() {
        assert!(direct_plan("comment hi", Intent::Operate, Some("RB-1"))
            .unwrap()
            .is_none());
        assert!(direct_plan("validate and then write tests", Intent::Validate, Some("RB-1"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_parse_plan_with_fences_and_default_key() {
        let reply = r#"Here you go:
```json
{"issue_key": "", "plan": [
  {"agent": "jira_operations", "action": "add_comment", "parameters": {"comment": "done"}},
  {"agent": "jira_operations", "action": "transition_issue", "parameters": {"transition_name": "Done"}}
]}
```"#;
        let plan = parse_plan(reply, Some("RB-1234")).unwrap();
        assert_eq!(plan.issue_key.as_deref(), Some("RB-1234"));
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].param("comment"), Some(&ParamValue::from_json(json!("done"))));
        assert_eq!(plan.steps[1].index, 2);
        assert_eq!(plan.steps[1].action, "transition_issue");
    }

    #[test]
    fn test_parse_plan_rejects_unknown_agent_and_action() {
        let reply = r#"{"plan": [{"agent": "shell", "action": "run"}]}"#;
        assert_eq!(parse_plan(reply, Some("RB-1")).unwrap_err().code(), "PLAN_INVALID");

        let reply = r#"{"plan": [{"agent": "api_validator", "action": "delete"}]}"#;
        assert_eq!(parse_plan(reply, Some("RB-1")).unwrap_err().code(), "PLAN_INVALID");
    }

    #[test]
    fn test_parse_plan_rejects_non_json_and_empty() {
        assert!(parse_plan("I cannot help with that", Some("RB-1")).is_err());
        assert!(parse_plan(r#"{"plan": []}"#, Some("RB-1")).is_err());
        assert!(parse_plan(r#"{"steps": []}"#, Some("RB-1")).is_err());
    }

    #[test]
    fn test_subtask_without_parent_is_invalid() {
        let reply = r#"{"issue_key": "", "plan": [{"agent": "jira_operations", "action": "create_issue",
            "parameters": {"project_key": "RB", "summary": "Fix the login bug", "issue_type": "Sub-task"}}]}"#;
        let err = parse_plan(reply, None).unwrap_err();
        assert_eq!(err.code(), "PLAN_INVALID");
        assert!(err.to_string().contains("parent_key"));
    }

    #[test]
    fn test_create_then_reference_needs_no_plan_key() {
        let reply = r#"{"plan": [
            {"agent": "jira_operations", "action": "create_issue", "parameters": {"project_key": "RB", "summary": "New"}},
            {"agent": "jira_operations", "action": "add_comment", "parameters": {"issue_key": "$step1.key", "comment": "hi"}}
        ]}"#;
        let plan = parse_plan(reply, None).unwrap();
        assert_eq!(plan.issue_key, None);
        assert!(matches!(plan.steps[1].param("issue_key"), Some(ParamValue::Ref(_))));
    }

    #[test]
    fn test_targeting_step_without_any_key_is_invalid() {
        let reply = r#"{"plan": [{"agent": "jira_operations", "action": "add_comment", "parameters": {"comment": "hi"}}]}"#;
        assert!(parse_plan(reply, None).is_err());
    }

    #[test]
    fn test_required_parameters() {
        let reply = r#"{"issue_key": "RB-1", "plan": [{"agent": "jira_operations", "action": "transition_issue"}]}"#;
        assert!(parse_plan(reply, None).is_err());

        let reply = r#"{"issue_key": "RB-1", "plan": [{"agent": "jira_operations", "action": "add_comment", "parameters": {"comment": ""}}]}"#;
        assert!(parse_plan(reply, None).is_err());

        let reply = r#"{"plan": [{"agent": "jira_operations", "action": "create_issue", "parameters": {"summary": "x"}}]}"#;
        assert!(parse_plan(reply, None).unwrap_err().to_string().contains("project_key"));

        let reply = r#"{"issue_key": "RB-1", "plan": [{"agent": "jira_operations", "action": "update_fields"}]}"#;
        assert!(parse_plan(reply, None).unwrap_err().to_string().contains("fields"));

        let reply = r#"{"issue_key": "RB-1", "plan": [{"agent": "jira_operations", "action": "fill_field_by_label", "parameters": {"field_label": "Acceptance Criteria"}}]}"#;
        assert!(parse_plan(reply, None).unwrap_err().to_string().contains("value"));
    }

    #[test]
    fn test_update_fields_keeps_object_parameter() {
        let reply = r#"{"issue_key": "RB-1", "plan": [{"agent": "jira_operations", "action": "update_fields",
            "parameters": {"fields": {"summary": "Login endpoint"}}}]}"#;
        let plan = parse_plan(reply, None).unwrap();
        assert_eq!(
            plan.steps[0].param("fields"),
            Some(&ParamValue::Literal(json!({"summary": "Login endpoint"})))
        );
    }
}
