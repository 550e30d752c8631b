// Ticketeer Jira assistant
// Main entry point for the ticketeer binary

use clap::Parser;
use ticketeer_engine::cli::{Cli, Command, ConfigAction, SecretAction};
use ticketeer_engine::config::Config;
use ticketeer_engine::handlers::{
    handle_ask, handle_chat, handle_config_path, handle_config_show, handle_doctor,
    handle_secret_set, handle_secret_status, handle_serve, hinted, OutputFormat,
};
use ticketeer_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path).map_err(hinted)?
    } else {
        Config::load_or_create().map_err(hinted)?
    };

    // `--log` wins over the configured level; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::debug!("Ticketeer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Ask { request, session } => {
            tracing::info!("Handling request: {}", request);
            handle_ask(request, session, &config, format).await
        }

        Command::Chat { session } => handle_chat(session, &config, format).await,

        Command::Serve { addr } => handle_serve(addr, &config).await,

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }

        Command::Secret { action } => match action {
            SecretAction::Set { key, value } => handle_secret_set(key, value),
            SecretAction::Status => handle_secret_status(format),
        },

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(),
        },
    }
}
