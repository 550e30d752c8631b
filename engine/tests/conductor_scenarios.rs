//! End-to-end request scenarios through the request router
//!
//! Every collaborator is scripted: the language model replies in a fixed
//! order and the ticket system is an in-memory fake.

mod common;

use common::{router, InMemoryTickets, ScriptedProvider};
use ticketeer_engine::conductor::StepStatus;
use ticketeer_engine::config::MemoryConfig;

#[tokio::test]
async fn test_validate_ticket() {
    let llm = ScriptedProvider::new(&["VALIDATE", "The response codes are not documented."]);
    let tickets = InMemoryTickets::new().with_issue("RB-1234", "Open", "GET /users returns users");
    let router = router(llm.clone(), tickets.clone(), MemoryConfig::default());

    let response = router.ask("Validate RB-1234", None).await;

    assert_eq!(response.answer, "The response codes are not documented.");
    assert_eq!(response.step_report.len(), 1);
    let entry = &response.step_report[0];
    assert_eq!(entry.index, 1);
    assert_eq!(entry.agent, "api_validator");
    assert_eq!(entry.action, "validate");
    assert_eq!(entry.status, StepStatus::Succeeded);
    assert_eq!(tickets.calls(), vec!["get RB-1234"]);
    assert!(llm.prompts()[1].contains("GET /users returns users"));
}

#[tokio::test]
async fn test_failed_transition_does_not_undo_comment() {
    let plan = r#"{"issue_key": "RB-1234", "plan": [
        {"agent": "jira_operations", "action": "add_comment", "parameters": {"comment": "Deployed to staging"}},
        {"agent": "jira_operations", "action": "transition_issue", "parameters": {"transition_name": "Finished"}}
    ]}"#;
    let llm = ScriptedProvider::new(&[
        "OPERATE",
        plan,
        "Done",
        "I added the comment, but RB-1234 cannot move to Finished. Did you mean Done?",
    ]);
    let tickets = InMemoryTickets::new().with_issue("RB-1234", "Open", "");
    let router = router(llm.clone(), tickets.clone(), MemoryConfig::default());

    let response = router
        .ask(
            "Add a comment saying Deployed to staging and then move RB-1234 to Finished",
            None,
        )
        .await;

    assert_eq!(response.step_report.len(), 2);
    assert_eq!(response.step_report[0].status, StepStatus::Succeeded);
    assert_eq!(response.step_report[1].status, StepStatus::Failed);
    assert!(response.step_report[1].detail.starts_with("INVALID_TRANSITION: "));
    assert!(response.step_report[1].detail.contains("Did you mean 'Done'?"));
    assert!(response.answer.contains("Did you mean Done?"));

    assert_eq!(
        tickets.calls(),
        vec![
            "comment RB-1234 Deployed to staging",
            "transition RB-1234 Finished"
        ]
    );
    // The narration prompt saw both outcomes
    let narration = llm.prompts().last().cloned().unwrap();
    assert!(narration.contains("Comment added to RB-1234"));
    assert!(narration.contains("failed: INVALID_TRANSITION"));
}

#[tokio::test]
async fn test_subtask_without_parent_asks_for_one() {
    let plan = r#"{"plan": [
        {"agent": "jira_operations", "action": "create_issue",
         "parameters": {"project_key": "RB", "summary": "Fix login bug", "issue_type": "Sub-task"}}
    ]}"#;
    let llm = ScriptedProvider::new(&["CREATE", plan]);
    let tickets = InMemoryTickets::new();
    let router = router(llm, tickets.clone(), MemoryConfig::default());

    let response = router
        .ask("Create a sub-task for fixing the login bug", None)
        .await;

    assert!(response.answer.contains("parent ticket"));
    assert!(response.step_report.is_empty());
    assert!(tickets.calls().is_empty());
}

#[tokio::test]
async fn test_created_issue_is_referenced_and_remembered() {
    let plan = r#"{"issue_key": "", "plan": [
        {"agent": "jira_operations", "action": "create_issue",
         "parameters": {"project_key": "RB", "summary": "Rate limit login", "issue_type": "task"}},
        {"agent": "jira_operations", "action": "add_comment",
         "parameters": {"issue_key": "$step1.key", "comment": "Created from chat"}}
    ]}"#;
    let llm = ScriptedProvider::new(&[
        "CREATE",
        plan,
        "Created RB-101 and commented on it.",
        "VALIDATE",
        "Needs an endpoint path.",
    ]);
    let tickets = InMemoryTickets::new();
    let router = router(llm, tickets.clone(), MemoryConfig::default());

    let created = router
        .ask("Create a task to rate limit login and then comment on it", Some("s1"))
        .await;
    assert_eq!(created.step_report.len(), 2);
    assert!(created
        .step_report
        .iter()
        .all(|entry| entry.status == StepStatus::Succeeded));

    let follow_up = router.ask("validate it", Some("s1")).await;
    assert_eq!(follow_up.answer, "Needs an endpoint path.");

    assert_eq!(
        tickets.calls(),
        vec![
            "create RB Task Rate limit login",
            "comment RB-101 Created from chat",
            "get RB-101",
        ]
    );
}

#[tokio::test]
async fn test_forget_then_missing_key() {
    let llm = ScriptedProvider::new(&["INSIGHT", "It tracks the SSO rollout.", "VALIDATE"]);
    let tickets = InMemoryTickets::new().with_issue("RB-1234", "In Progress", "SSO");
    let router = router(llm, tickets.clone(), MemoryConfig::default());

    router.ask("What is RB-1234 about?", None).await;
    let response = router.ask("Forget that and validate it", None).await;

    assert!(response.answer.contains("Which ticket do you mean?"));
    assert!(response.step_report.is_empty());
    assert_eq!(tickets.calls(), vec!["get RB-1234"]);
}

#[tokio::test]
async fn test_missing_ticket_is_reported_not_thrown() {
    let llm = ScriptedProvider::new(&["INSIGHT"]);
    let tickets = InMemoryTickets::new();
    let router = router(llm, tickets, MemoryConfig::default());

    let response = router.ask("What's the status of RB-404?", None).await;

    assert_eq!(response.step_report.len(), 1);
    assert_eq!(response.step_report[0].status, StepStatus::Failed);
    assert!(response.step_report[0].detail.starts_with("NOT_FOUND"));
}

#[tokio::test]
async fn test_invalid_plan_is_not_executed() {
    let llm = ScriptedProvider::new(&["OPERATE", r#"{"plan": [{"agent": "deployer", "action": "ship"}]}"#]);
    let tickets = InMemoryTickets::new().with_issue("RB-1", "Open", "");
    let router = router(llm, tickets.clone(), MemoryConfig::default());

    let response = router.ask("ship RB-1 to production", None).await;

    assert!(response.answer.contains("could not work out a valid set of steps"));
    assert!(tickets.calls().is_empty());
}

#[tokio::test]
async fn test_fill_field_by_label_plan() {
    let plan = r#"{"issue_key": "RB-1234", "plan": [
        {"agent": "jira_operations", "action": "fill_field_by_label",
         "parameters": {"field_label": "Acceptance Criteria", "value": "Unknown users get 404"}}
    ]}"#;
    let llm = ScriptedProvider::new(&["OPERATE", plan, "Acceptance Criteria is set on RB-1234."]);
    let tickets = InMemoryTickets::new().with_issue("RB-1234", "Open", "");
    let router = router(llm.clone(), tickets.clone(), MemoryConfig::default());

    let response = router
        .ask("Set Acceptance Criteria on RB-1234 to: Unknown users get 404", None)
        .await;

    assert_eq!(response.step_report.len(), 1);
    assert_eq!(response.step_report[0].status, StepStatus::Succeeded);
    assert_eq!(response.step_report[0].action, "fill_field_by_label");
    let calls = tickets.calls();
    assert_eq!(calls[0], "editmeta RB-1234");
    assert!(calls[1].starts_with(r#"update RB-1234 {"customfield_10042":"#));
}

#[tokio::test]
async fn test_history_question_includes_changelog() {
    let llm = ScriptedProvider::new(&["INSIGHT", "Sam moved it to In Review on March 1st."]);
    let tickets = InMemoryTickets::new().with_issue("RB-1234", "In Review", "");
    let router = router(llm.clone(), tickets.clone(), MemoryConfig::default());

    let response = router.ask("When was RB-1234 moved to review?", None).await;

    assert_eq!(response.answer, "Sam moved it to In Review on March 1st.");
    assert_eq!(tickets.calls(), vec!["get RB-1234", "changelog RB-1234"]);
    assert!(llm.prompts()[1].contains("Sam: status Open -> In Review"));
}
