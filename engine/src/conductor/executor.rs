//! Conductor Executor
//!
//! Runs a plan strictly in order. Each step's parameters are resolved
//! against the results so far and dispatched to the handler for its agent.
//! Any failure becomes a FAILED result; the plan always runs to the end.

use crate::agents::StepHandler;
use crate::conductor::error::StepError;
use crate::conductor::resolver;
use crate::conductor::types::{AgentKind, Plan, PlanStep, StepResult, StepStatus};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct Executor {
    handlers: HashMap<AgentKind, Arc<dyn StepHandler>>,
    step_timeout: Duration,
}

impl Executor {
    pub fn new(handlers: Vec<Arc<dyn StepHandler>>, step_timeout: Duration) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.agent(), handler))
            .collect();
        Self {
            handlers,
            step_timeout,
        }
    }

    /// Execute every step; returns exactly one result per step, in order
    pub async fn execute(&self, plan: &Plan) -> Vec<StepResult> {
        let mut steps: Vec<&PlanStep> = plan.steps.iter().collect();
        steps.sort_by_key(|step| step.index);

        let mut results: Vec<StepResult> = Vec::with_capacity(steps.len());
        for step in steps {
            let start = Instant::now();
            debug!("Step {} starting: {}", step.index, step.label());

            let result = match self.run_step(step, plan, &results).await {
                Ok(outcome) => StepResult {
                    index: step.index,
                    agent: step.agent,
                    action: step.action.clone(),
                    status: StepStatus::Succeeded,
                    value: outcome.value,
                    detail: outcome.detail,
                    code: None,
                },
                Err(e) => {
                    warn!("Step {} ({}) failed: {}", step.index, step.label(), e);
                    StepResult {
                        index: step.index,
                        agent: step.agent,
                        action: step.action.clone(),
                        status: StepStatus::Failed,
                        value: Value::Null,
                        detail: e.to_string(),
                        code: Some(e.code().to_string()),
                    }
                }
            };

            info!(
                "Step {} {} in {}ms",
                step.index,
                if result.succeeded() { "succeeded" } else { "failed" },
                start.elapsed().as_millis()
            );
            results.push(result);
        }
        results
    }

    async fn run_step(
        &self,
        step: &PlanStep,
        plan: &Plan,
        prior: &[StepResult],
    ) -> Result<crate::agents::StepOutcome, StepError> {
        let params = resolver::resolve(&step.parameters, prior)?;

        let handler = self.handlers.get(&step.agent).ok_or_else(|| {
            StepError::InvalidParameters(format!("no handler registered for {}", step.agent))
        })?;

        let call = handler.handle(&step.action, &params, plan.issue_key.as_deref());
        match tokio::time::timeout(self.step_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StepError::Timeout(self.step_timeout.as_secs())),
        }
    }
}
