//! Conversation memory
//!
//! One `MemoryStore` per session: a bounded window of recent turns, an
//! optional running summary of evicted turns, and the last ticket key the
//! conversation was about.

use crate::conductor::types::Turn;
use crate::config::MemoryConfig;
use crate::llm::LLMProvider;
use crate::prompts;
use minijinja::context;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// What happened to a recorded turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// Memory is switched off; nothing was kept
    Disabled,
    /// The configured turn limit was reached; the caller should reset
    LimitReached,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    config: MemoryConfig,
    window: VecDeque<Turn>,
    summary: Option<String>,
    last_issue_key: Option<String>,
    turns_recorded: usize,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            window: VecDeque::new(),
            summary: None,
            last_issue_key: None,
            turns_recorded: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Summary first, then the window oldest to newest
    pub fn context(&self) -> String {
        let mut out = String::new();
        if let Some(summary) = &self.summary {
            out.push_str("Summary of earlier conversation: ");
            out.push_str(summary);
            out.push('\n');
        }
        for turn in &self.window {
            out.push_str("User: ");
            out.push_str(&turn.request);
            out.push_str("\nAssistant: ");
            out.push_str(&turn.response);
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    /// Append a turn, evicting (and possibly summarizing) beyond the window.
    ///
    /// At most one summarization call is made per invocation.
    pub async fn record(
        &mut self,
        request: &str,
        response: &str,
        llm: &dyn LLMProvider,
    ) -> RecordOutcome {
        if !self.config.enabled {
            return RecordOutcome::Disabled;
        }

        self.window.push_back(Turn::new(request, response));
        self.turns_recorded += 1;

        let capacity = self.config.window_size.max(1);
        let mut evicted = Vec::new();
        while self.window.len() > capacity {
            if let Some(turn) = self.window.pop_front() {
                evicted.push(turn);
            }
        }

        if !evicted.is_empty() {
            debug!("Evicted {} turn(s) from memory window", evicted.len());
            if self.summarizes() {
                self.fold_into_summary(&evicted, llm).await;
            }
        }

        if self.turns_recorded >= self.config.max_turns {
            RecordOutcome::LimitReached
        } else {
            RecordOutcome::Recorded
        }
    }

    fn summarizes(&self) -> bool {
        self.config.window_size > self.config.summarize_threshold
    }

    async fn fold_into_summary(&mut self, evicted: &[Turn], llm: &dyn LLMProvider) {
        let turns = render_turns(evicted);
        let previous = self.summary.clone().unwrap_or_default();
        let summarized = match prompts::render(
            prompts::SUMMARIZE,
            context! { summary => &previous, turns => &turns },
        ) {
            Ok(prompt) => llm.complete(&prompt).await.ok(),
            Err(e) => {
                warn!("Summary prompt failed to render: {}", e);
                None
            }
        };

        let folded = match summarized {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => {
                warn!("Summarization failed; keeping a plain digest of evicted turns");
                if previous.is_empty() {
                    turns
                } else {
                    format!("{}\n{}", previous, turns)
                }
            }
        };
        self.summary = Some(folded);
    }

    /// Remember the ticket the conversation is about
    pub fn remember_key(&mut self, key: impl Into<String>) {
        if self.config.enabled {
            self.last_issue_key = Some(key.into());
        }
    }

    pub fn recall(&self) -> Option<&str> {
        self.last_issue_key.as_deref()
    }

    /// Clear window, summary, remembered key and the turn counter
    pub fn forget(&mut self) {
        self.window.clear();
        self.summary = None;
        self.last_issue_key = None;
        self.turns_recorded = 0;
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }
}

fn render_turns(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("User: {}\nAssistant: {}", t.request, t.response))
        .collect::<Vec<_>>()
        .join("\n")
}
