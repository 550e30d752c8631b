//! Prompt templates
//!
//! Templates are rendered with minijinja in strict mode: a placeholder with
//! no value is an error, never an empty string or literal text.

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::sync::OnceLock;

pub use minijinja::Error as PromptError;

static ENVIRONMENT: OnceLock<Environment<'static>> = OnceLock::new();

fn environment() -> &'static Environment<'static> {
    ENVIRONMENT.get_or_init(|| {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env
    })
}

/// Render a template with the given context.
///
/// Substituted values are never evaluated as template syntax.
pub fn render<S: Serialize>(template: &str, ctx: S) -> Result<String, PromptError> {
    environment().render_str(template, ctx)
}

pub const CLASSIFY: &str = "\
You route requests for a Jira assistant. Pick exactly one label:

VALIDATE - check an API ticket for completeness or correctness
OPERATE  - change a ticket: add a comment, move/transition its status
INSIGHT  - answer a question about a ticket (status, summary, history)
TEST     - write or check test cases for a ticket
CREATE   - create a new ticket or sub-task
UNKNOWN  - anything else

Recent conversation:
{{ context }}

Request: {{ request }}

Answer with the label only.";

pub const PLAN: &str = "\
You plan operations for a Jira assistant. Turn the request into an ordered
list of steps. Available agents and actions:

- jira_operations.get_issue {issue_key?}
- jira_operations.add_comment {comment, issue_key?}
- jira_operations.transition_issue {transition_name, issue_key?}
- jira_operations.create_issue {project_key, summary, description?, issue_type?, parent_key?}
- jira_operations.update_fields {fields, issue_key?}  (fields: JSON object keyed by field id)
- jira_operations.fill_field_by_label {field_label, value, issue_key?}
- api_validator.validate {issue_key?}
- test_agent.create_test_cases {question?, issue_key?}
- issue_insights.ask {question, include_history?, issue_key?}
- issue_insights.summarize {issue_key?}

Rules:
- Steps run in order. A parameter may be exactly \"$stepN\" or \"$stepN.field\"
  to reuse the output of an earlier step N (created issues expose \"key\").
- A sub-task needs issue_type \"Sub-task\" and a parent_key.
- Leave out parameters you do not know. Never invent ticket keys.
- The current ticket is \"{{ issue_key }}\" (may be empty).

Recent conversation:
{{ context }}

Request: {{ request }}

Reply with JSON only, in this shape:
{\"issue_key\": \"RB-1\", \"plan\": [{\"agent\": \"jira_operations\", \"action\": \"add_comment\", \"parameters\": {\"comment\": \"text\"}}]}";

pub const SUMMARIZE: &str = "\
Condense this conversation between a user and a Jira assistant into a short
paragraph. Keep ticket keys, decisions and outcomes.

Earlier summary:
{{ summary }}

New turns:
{{ turns }}

Summary:";

pub const NARRATE: &str = "\
You are a Jira assistant. The user asked:
{{ request }}

These steps were run for ticket {{ issue_key }}:
{{ steps }}

Write a short answer for the user. Mention every step and say plainly which
ones failed and why.";

pub const DIRECT_ANSWER: &str = "\
You are a helpful Jira assistant. No ticket is involved in this request.

Recent conversation:
{{ context }}

Request: {{ request }}";

pub const INSIGHTS: &str = "\
You are a Jira assistant. Given the issue below, answer the user's question.

Key: {{ key }}
Summary: {{ summary }}
Type: {{ issue_type }}
Status: {{ status }}
Description:
{{ description }}

Comments:
{{ comments }}
{% if history %}
Change history (oldest first):
{{ history }}
{% endif %}
Question: {{ question }}";

pub const ISSUE_SUMMARY: &str = "\
Summarize the Jira issue below in one or two sentences.

Key: {{ key }}
Summary: {{ summary }}
Description:
{{ description }}";

pub const TRANSITION_CHOICE: &str = "\
A user asked to move a Jira issue to \"{{ requested }}\", which is not an
available transition. Available transitions: {{ options }}.
Reply with the single closest option exactly as written, or NONE.";

pub const VALIDATE_GENERAL: &str = "\
You review Jira tickets that describe HTTP APIs.

Key: {{ key }}
Summary: {{ summary }}
Status: {{ status }}
Description:
{{ description }}

Check that the ticket states the HTTP method, the endpoint path, the request
parameters and body, the expected responses with status codes, and error
handling. List what is present, what is missing, and anything inconsistent.";

pub const VALIDATE_OPEN: &str = "\
The ticket is still open. Focus on whether it is ready to be picked up:
clear acceptance criteria, a defined contract, and no open questions.";

pub const VALIDATE_IN_PROGRESS: &str = "\
The ticket is in progress. Focus on whether the contract is stable enough to
build against and flag anything likely to change.";

pub const VALIDATE_IN_REVIEW: &str = "\
The ticket is in review. Focus on whether a reviewer can verify it: examples
of requests and responses, edge cases and error codes.";

pub const VALIDATE_DONE: &str = "\
The ticket is done. Focus on whether the description matches a finished API
and note any documentation gaps left behind.";

pub const TESTS_GET: &str = "\
Write API test cases for the GET endpoint described below. Cover success,
filtering and pagination, not-found, and authorization failures.
If the text already contains test cases, reply with HAS_TESTS only.

{{ summary }}";

pub const TESTS_POST: &str = "\
Write API test cases for the POST endpoint described below. Cover a valid
create, missing and invalid fields, duplicates, and authorization failures.
If the text already contains test cases, reply with HAS_TESTS only.

{{ summary }}";

pub const TESTS_PUT: &str = "\
Write API test cases for the PUT endpoint described below. Cover a full
update, partial or invalid payloads, unknown ids, and authorization failures.
If the text already contains test cases, reply with HAS_TESTS only.

{{ summary }}";

pub const TESTS_DELETE: &str = "\
Write API test cases for the DELETE endpoint described below. Cover a
successful delete, repeated deletes, unknown ids, and authorization failures.
If the text already contains test cases, reply with HAS_TESTS only.

{{ summary }}";

pub const HELP: &str = "\
I can help with Jira tickets. Try one of these:
- \"Validate RB-1234\"
- \"What is the status of RB-1234?\"
- \"Summarize RB-1234\"
- \"Set Acceptance Criteria on RB-1234 to: returns 404 for unknown users\"
- \"Write test cases for RB-1234\"
- \"Add a comment saying done and then move it to Done\"
- \"Create a sub-task under RB-1234 for fixing the login bug\"
Say \"forget\" to start over.";
