//! Intent classification
//!
//! One model call per request. Replies are matched against the fixed label
//! set; anything else, including a failed call, is `Intent::Unknown`.

use crate::conductor::types::Intent;
use crate::llm::{clean_label, LLMProvider};
use crate::prompts;
use minijinja::context;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Classifier {
    llm: Arc<dyn LLMProvider>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, request: &str, context: &str) -> Intent {
        let prompt = match prompts::render(
            prompts::CLASSIFY,
            context! { request => request, context => context },
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Classification prompt failed to render: {}", e);
                return Intent::Unknown;
            }
        };

        match self.llm.complete(&prompt).await {
            Ok(reply) => {
                let intent = parse_intent(&reply);
                debug!("Classifier reply {:?} -> {}", reply.trim(), intent);
                intent
            }
            Err(e) => {
                warn!("Classification failed, treating request as UNKNOWN: {}", e);
                Intent::Unknown
            }
        }
    }
}

/// Map a raw model reply onto an intent
pub fn parse_intent(reply: &str) -> Intent {
    Intent::from_label(&clean_label(reply)).unwrap_or(Intent::Unknown)
}
