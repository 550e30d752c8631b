pub mod cache;
pub mod string;

pub use cache::SecretCache;
pub use string::SecretString;

use keyring::Entry;
use regex::Regex;
use sdk::errors::EngineError;
use std::io::{self, Write};
use std::sync::OnceLock;

/// Keychain service name for Ticketeer secrets
pub const SERVICE_NAME: &str = "ticketeer";

/// Secrets the engine knows how to look up
pub const JIRA_API_TOKEN: &str = "jira_api_token";
pub const OPENAI_API_KEY: &str = "openai_api_key";
pub const ANTHROPIC_API_KEY: &str = "anthropic_api_key";

/// SecretManager resolves secrets from the environment or the OS keychain.
///
/// Lookup order for a key such as `jira_api_token`:
/// 1. The environment variable with the upper-cased name (`JIRA_API_TOKEN`)
/// 2. The OS keychain entry under this manager's service name
///
/// Secrets are stored in:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// The SecretManager also provides secret scrubbing functionality to remove
/// sensitive data from log output and error messages.
pub struct SecretManager {
    service_name: String,
}

/// Regex patterns for detecting common secret formats.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Initializes and returns the secret detection patterns.
///
/// Patterns match:
/// - OpenAI / Anthropic API keys: sk-... / sk-ant-...
/// - Atlassian API tokens: ATATT...
/// - Bearer and Basic authorization values
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"sk-[a-zA-Z0-9\-_]{20,}").expect("Invalid API key pattern"),
            Regex::new(r"ATATT[a-zA-Z0-9\-_=]{20,}").expect("Invalid Atlassian pattern"),
            Regex::new(r"(Bearer|Basic)\s+[^\s]{16,}").expect("Invalid auth header pattern"),
        ]
    })
}

impl SecretManager {
    /// Creates a new SecretManager with the given service name.
    ///
    /// The service name is used to namespace secrets in the OS keychain.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Environment variable consulted for `key`
    pub fn env_var_name(key: &str) -> String {
        key.to_uppercase()
    }

    /// Retrieves a secret from the environment or the OS keychain.
    ///
    /// # Errors
    /// - `EngineError::SecretMissing` if neither source has a value
    /// - `EngineError::KeyringError` if keychain access fails
    pub fn get_secret(&self, key: &str) -> Result<String, EngineError> {
        if let Ok(value) = std::env::var(Self::env_var_name(key)) {
            if !value.trim().is_empty() {
                tracing::debug!("Secret '{}' taken from environment", key);
                return Ok(value.trim().to_string());
            }
        }

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved secret '{}' from keychain", key);
                Ok(secret)
            }
            Err(keyring::Error::NoEntry) => Err(EngineError::SecretMissing(key.to_string())),
            Err(e) => Err(EngineError::KeyringError(format!(
                "Failed to retrieve secret '{}': {}",
                key, e
            ))),
        }
    }

    /// Stores a secret in the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), EngineError> {
        if value.trim().is_empty() {
            return Err(EngineError::KeyringError(
                "Secret cannot be empty".to_string(),
            ));
        }

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        entry.set_password(value.trim()).map_err(|e| {
            EngineError::KeyringError(format!("Failed to store secret '{}': {}", key, e))
        })?;

        tracing::info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    /// Checks whether a secret is available from either source.
    pub fn has_secret(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }

    /// Prompts for a secret value on stderr and reads it from stdin.
    ///
    /// # Errors
    /// - `EngineError::Io` if the terminal cannot be read
    /// - `EngineError::SecretMissing` if the input is empty
    pub fn prompt_for_secret(&self, key: &str) -> Result<String, EngineError> {
        eprint!("Enter value for '{}': ", key);
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        let secret = input.trim().to_string();
        if secret.is_empty() {
            return Err(EngineError::SecretMissing(key.to_string()));
        }
        Ok(secret)
    }

    /// Scrubs secrets from text by replacing them with [REDACTED].
    ///
    /// # Examples
    /// ```
    /// use ticketeer_engine::secrets::SecretManager;
    ///
    /// let scrubbed = SecretManager::scrub("My API key is sk-1234567890abcdefghij");
    /// assert_eq!(scrubbed, "My API key is [REDACTED]");
    /// ```
    pub fn scrub(text: &str) -> String {
        let patterns = get_secret_patterns();
        let mut result = text.to_string();

        for pattern in patterns {
            result = pattern.replace_all(&result, "[REDACTED]").to_string();
        }

        result
    }
}
