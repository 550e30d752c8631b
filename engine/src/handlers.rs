//! Command handlers for CLI operations
//!
//! - ask: answer one request
//! - chat: interactive loop over one session
//! - serve: HTTP API
//! - doctor: validate configuration and check dependencies
//! - secret / config: keychain and configuration helpers

use anyhow::{anyhow, Context, Result};
use sdk::errors::{EngineError, ErrorExt};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::conductor::{AskResponse, RequestRouter};
use crate::config::Config;
use crate::jira::JiraClient;
use crate::llm::router::LLMRouter;
use crate::secrets::{
    SecretCache, SecretManager, ANTHROPIC_API_KEY, JIRA_API_TOKEN, OPENAI_API_KEY, SERVICE_NAME,
};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Secrets the doctor reports on
const KNOWN_SECRETS: [&str; 3] = [JIRA_API_TOKEN, OPENAI_API_KEY, ANTHROPIC_API_KEY];

/// Everything a request needs, wired from configuration
pub struct Services {
    pub router: Arc<RequestRouter>,
    pub llm: Arc<LLMRouter>,
    pub jira: Arc<JiraClient>,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let manager = Arc::new(SecretManager::new(SERVICE_NAME));
        let secrets = Arc::new(SecretCache::new(manager));

        let llm = Arc::new(LLMRouter::from_config(&config.llm, Arc::clone(&secrets))?);
        let jira = Arc::new(JiraClient::new(&config.jira, secrets)?);
        let router = Arc::new(RequestRouter::from_config(
            config,
            llm.clone(),
            jira.clone(),
        ));

        Ok(Self { router, llm, jira })
    }
}

/// Attach the error's user hint for display on the terminal
pub fn hinted(error: EngineError) -> anyhow::Error {
    anyhow!("{}\nHint: {}", error, error.user_hint())
}

/// Answer a single request
pub async fn handle_ask(
    request: String,
    session: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let services = Services::from_config(config).map_err(hinted)?;
    let response = services.router.ask(&request, session.as_deref()).await;
    print_response(&response, format)
}

/// Read requests from stdin until `exit` or end of input
pub async fn handle_chat(session: Option<String>, config: &Config, format: OutputFormat) -> Result<()> {
    let services = Services::from_config(config).map_err(hinted)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    if matches!(format, OutputFormat::Text) {
        println!("Ticketeer chat. Type 'exit' to quit.");
    }

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        let response = services.router.ask(line, session.as_deref()).await;
        print_response(&response, format)?;
    }
    Ok(())
}

/// Serve the HTTP API
pub async fn handle_serve(addr: Option<String>, config: &Config) -> Result<()> {
    let services = Services::from_config(config).map_err(hinted)?;
    let addr = addr.unwrap_or_else(|| config.server.bind_addr.clone());
    crate::server::serve(services.router, &addr).await
}

/// Run diagnostics: configuration, secrets, providers and Jira
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration".to_string(), "Valid".to_string()));

    let manager = SecretManager::new(SERVICE_NAME);
    for key in KNOWN_SECRETS {
        match manager.get_secret(key) {
            Ok(_) => checks.push((key.to_string(), "Configured".to_string())),
            Err(e) => {
                checks.push((key.to_string(), "Not configured".to_string()));
                if key == JIRA_API_TOKEN || !matches!(e, EngineError::SecretMissing(_)) {
                    issues.push(format!(
                        "{}. {} ({}), or run 'ticketeer secret set {}'.",
                        e,
                        e.user_hint(),
                        SecretManager::env_var_name(key),
                        key
                    ));
                }
            }
        }
    }

    let services = Services::from_config(config).map_err(hinted)?;
    let health = services.llm.check_health_all().await;
    for (name, healthy) in &health {
        let status = if *healthy { "Available" } else { "Not available" };
        checks.push((format!("LLM {}", name), status.to_string()));
    }
    if !health.iter().any(|(_, healthy)| *healthy) {
        issues.push("No LLM providers available. Configure at least one provider.".to_string());
    }

    match services.jira.ping().await {
        Ok(user) => checks.push(("Jira".to_string(), format!("Reachable (as {})", user))),
        Err(e) => {
            checks.push(("Jira".to_string(), "Unreachable".to_string()));
            issues.push(format!("Cannot reach Jira at {}: {}", config.jira.base_url, e));
        }
    }

    match format {
        OutputFormat::Text => {
            println!("Ticketeer Diagnostics");
            println!("=====================");
            println!();
            println!("Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }
            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({ "name": name, "status": status })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Store a secret in the OS keychain, prompting when no value is given
pub fn handle_secret_set(key: String, value: Option<String>) -> Result<()> {
    let manager = SecretManager::new(SERVICE_NAME);
    let value = match value {
        Some(value) => value,
        None => manager.prompt_for_secret(&key).map_err(hinted)?,
    };
    manager.set_secret(&key, &value).map_err(hinted)?;
    println!("Stored '{}' in the OS keychain.", key);
    Ok(())
}

/// Report which known secrets are available
pub fn handle_secret_status(format: OutputFormat) -> Result<()> {
    let manager = SecretManager::new(SERVICE_NAME);
    let status: Vec<(&str, bool)> = KNOWN_SECRETS
        .iter()
        .map(|key| (*key, manager.has_secret(key)))
        .collect();

    match format {
        OutputFormat::Text => {
            for (key, present) in &status {
                println!(
                    "  {:<20} {}",
                    key,
                    if *present { "configured" } else { "missing" }
                );
            }
        }
        OutputFormat::Json => {
            let output: serde_json::Map<String, serde_json::Value> = status
                .iter()
                .map(|(key, present)| (key.to_string(), json!(present)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Print the effective configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
            println!("{}", text);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}

pub fn handle_config_path() -> Result<()> {
    println!("{}", Config::default_config_path().map_err(hinted)?.display());
    Ok(())
}

fn print_response(response: &AskResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{}", response.answer);
            if response.step_report.len() > 1 {
                println!();
                for entry in &response.step_report {
                    println!(
                        "  [{}] {}.{} {:?}: {}",
                        entry.index, entry.agent, entry.action, entry.status, entry.detail
                    );
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(response)?),
    }
    Ok(())
}
