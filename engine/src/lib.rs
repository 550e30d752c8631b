//! Ticketeer Engine Library
//!
//! Core of the Ticketeer Jira assistant. Used by the `ticketeer` binary and
//! by integration tests.

/// Step handlers, one per agent
pub mod agents;

/// CLI interface module
pub mod cli;

/// Classification, planning, execution and conversation memory
pub mod conductor;

/// Configuration management module
pub mod config;

/// Command handlers module
pub mod handlers;

/// Jira REST client
pub mod jira;

/// LLM provider abstraction layer
pub mod llm;

/// Prompt templates
pub mod prompts;

/// Secret management module
pub mod secrets;

/// HTTP API
pub mod server;

/// Telemetry and Observability
pub mod telemetry;
