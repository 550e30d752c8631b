//! CLI interface for Ticketeer
//!
//! Commands and global flags, using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ticketeer Jira assistant
///
/// Ask questions about Jira tickets, validate and test them, and chain
/// ticket operations in plain language.
#[derive(Parser, Debug)]
#[command(name = "ticketeer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a single request
    Ask {
        /// The request, e.g. "Validate RB-1234"
        request: String,

        /// Conversation session to use
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Interactive conversation; type `exit` to quit
    Chat {
        /// Conversation session to use
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Serve the HTTP API
    Serve {
        /// Bind address, overrides `server.bind_addr`
        #[arg(long, value_name = "ADDR")]
        addr: Option<String>,
    },

    /// Run system diagnostics
    Doctor,

    /// Manage API tokens in the OS keychain
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Secret management actions
#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Store a secret (prompts on stdin when no value is given)
    Set {
        /// Secret name, e.g. jira_api_token
        key: String,
        /// Secret value
        value: Option<String>,
    },

    /// Show which known secrets are available
    Status,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the default configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["ticketeer", "doctor"]);
        assert!(matches!(cli.command, Command::Doctor));
        assert!(!cli.json);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["ticketeer", "--json", "--log", "debug", "doctor"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
    }

    #[test]
    fn test_ask_command() {
        let cli = Cli::parse_from(["ticketeer", "ask", "Validate RB-1234", "--session", "s1"]);
        if let Command::Ask { request, session } = cli.command {
            assert_eq!(request, "Validate RB-1234");
            assert_eq!(session.as_deref(), Some("s1"));
        } else {
            panic!("Expected Ask command");
        }
    }

    #[test]
    fn test_serve_addr() {
        let cli = Cli::parse_from(["ticketeer", "serve", "--addr", "0.0.0.0:9000"]);
        if let Command::Serve { addr } = cli.command {
            assert_eq!(addr.as_deref(), Some("0.0.0.0:9000"));
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_secret_set() {
        let cli = Cli::parse_from(["ticketeer", "secret", "set", "jira_api_token"]);
        if let Command::Secret { action } = cli.command {
            if let SecretAction::Set { key, value } = action {
                assert_eq!(key, "jira_api_token");
                assert!(value.is_none());
            } else {
                panic!("Expected SecretAction::Set");
            }
        } else {
            panic!("Expected Secret command");
        }
    }
}
