//! Error types and handling
//!
//! This module provides the engine-level error type used throughout Ticketeer.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! All error messages are scrubbed to ensure:
//! - No secrets (API keys, tokens) are included
//! - All messages are safe to display to end users

use thiserror::Error;

/// Trait for Ticketeer error extensions
///
/// Provides a user-friendly hint and recoverability information for an error.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require a configuration change.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Secrets**: Keychain and environment lookups
/// - **HTTP client**: The TLS/HTTP stack could not be initialised
/// - **IO**: Terminal and file access outside of configuration loading
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::SecretMissing("jira_api_token".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(!error.is_recoverable());
///
/// let error = EngineError::KeyringError("locked".to_string());
/// assert!(error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Secret errors
    #[error("Secret not found: {0}")]
    SecretMissing(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    // HTTP client construction
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::SecretMissing(_) => {
                "Set the matching environment variable or store it in the system keychain"
            }
            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",

            Self::HttpClient(_) => "Could not initialise the HTTP client. Check the system TLS setup",

            Self::Io(_) => "Terminal or file access failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::SecretMissing(_) | Self::HttpClient(_) => false,

            _ => true,
        }
    }
}
