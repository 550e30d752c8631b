//! Configuration management
//!
//! This module handles loading, validation, and management of the Ticketeer
//! configuration. Configuration is stored in TOML format at
//! ~/.ticketeer/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **llm**: LLM provider settings, preferences and call timeout
//! - **jira**: Jira site, account and recognised project keys
//! - **memory**: Conversation window, summarization and turn limit
//! - **execution**: Per-step timeout and answer narration
//! - **server**: HTTP bind address
//!
//! Secrets (Jira API token, provider API keys) never live in this file; see
//! [`crate::secrets`].
//!
//! # Examples
//!
//! ```no_run
//! use ticketeer_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Jira: {}", config.jira.base_url);
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    pub llm: LLMConfig,

    /// Jira connection settings
    pub jira: JiraConfig,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Plan execution configuration
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (ollama, openai, anthropic)
    pub default_provider: String,

    /// Timeout for a single provider call, in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Anthropic provider settings
    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

impl LLMConfig {
    /// Provider call timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,
    // Note: API key comes from OPENAI_API_KEY or the OS keychain
}

/// Anthropic provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Base URL for Anthropic API
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    // Note: API key comes from ANTHROPIC_API_KEY or the OS keychain
}

/// Jira connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Jira site URL, e.g. https://your-domain.atlassian.net
    pub base_url: String,

    /// Account e-mail used for basic authentication
    #[serde(default)]
    pub username: String,

    /// Project key prefixes used to recognise ticket keys in requests.
    /// Empty means any `ABC-123` shaped key is accepted.
    #[serde(default)]
    pub projects: Vec<String>,

    /// Timeout for a single Jira request, in seconds
    #[serde(default = "default_jira_timeout_secs")]
    pub timeout_secs: u64,
}

impl JiraConfig {
    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Retain conversation turns between requests
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of recent turns kept verbatim
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Evicted turns are summarized instead of dropped when
    /// `window_size` exceeds this value
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,

    /// Turns after which the conversation is reset
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: default_window_size(),
            summarize_threshold: default_summarize_threshold(),
            max_turns: default_max_turns(),
        }
    }
}

/// Plan execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Upper bound for a single plan step, in seconds
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    /// Ask the LLM to narrate multi-step results
    #[serde(default = "default_true")]
    pub narrate_results: bool,
}

impl ExecutionConfig {
    /// Step timeout as a `Duration`
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout_secs(),
            narrate_results: true,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_jira_timeout_secs() -> u64 {
    30
}

fn default_step_timeout_secs() -> u64 {
    120
}

fn default_window_size() -> usize {
    5
}

fn default_summarize_threshold() -> usize {
    3
}

fn default_max_turns() -> usize {
    50
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
        }
    }
}

/// Providers accepted as `llm.default_provider`
pub const PROVIDERS: [&str; 3] = ["ollama", "openai", "anthropic"];

impl Config {
    /// Load configuration from the default location (~/.ticketeer/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default_config();
        config.validate()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Wrote default configuration to {:?}", path);

        Ok(config)
    }

    /// Get the default configuration file path (~/.ticketeer/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".ticketeer").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LLMConfig {
                default_provider: "ollama".to_string(),
                timeout_secs: default_llm_timeout_secs(),
                ollama: OllamaConfig::default(),
                openai: OpenAIConfig::default(),
                anthropic: AnthropicConfig::default(),
            },
            jira: JiraConfig {
                base_url: "https://your-domain.atlassian.net".to_string(),
                username: String::new(),
                projects: Vec::new(),
                timeout_secs: default_jira_timeout_secs(),
            },
            memory: MemoryConfig::default(),
            execution: ExecutionConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !PROVIDERS.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                PROVIDERS.join(", ")
            )));
        }

        if self.llm.timeout_secs == 0 || self.jira.timeout_secs == 0 {
            return Err(EngineError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.execution.step_timeout_secs == 0 {
            return Err(EngineError::Config(
                "step_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if !self.jira.base_url.starts_with("http://") && !self.jira.base_url.starts_with("https://")
        {
            return Err(EngineError::Config(format!(
                "jira.base_url must be an http(s) URL, got '{}'",
                self.jira.base_url
            )));
        }

        if self
            .jira
            .projects
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(EngineError::Config(
                "jira.projects entries must be alphanumeric project keys".to_string(),
            ));
        }

        if self.memory.window_size == 0 {
            return Err(EngineError::Config(
                "memory.window_size must be at least 1".to_string(),
            ));
        }

        if self.memory.max_turns == 0 {
            return Err(EngineError::Config(
                "memory.max_turns must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
