use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use thiserror::Error;

use browserd_core::load_browserd_config;

pub mod commands;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] browserd_core::ConfigError),
    #[error("driver error: {0}")]
    Driver(#[from] browserd_core::DriverError),
    #[error("http error: {0}")]
    Http(#[from] browserd_core::HttpError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "browserd command-line control interface", long_about = None)]
pub struct Cli {
    /// Path to browserd.toml
    #[arg(long, default_value = "configs/browserd.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the browserd daemon until interrupted
    Serve,
    /// Load the configuration and print the effective settings
    CheckConfig,
    /// Launch one browser session, run a command, and tear it down
    Probe(ProbeArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Navigate to this URL instead of the default evaluation probe
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions(args) = &cli.command {
        clap_complete::generate(
            args.shell,
            &mut Cli::command(),
            "browserdctl",
            &mut io::stdout(),
        );
        return Ok(());
    }

    let config = load_browserd_config(&cli.config)?;
    match &cli.command {
        Commands::Serve => commands::serve::run(config).await,
        Commands::CheckConfig => {
            let report = commands::check_config::run(&cli.config, &config);
            render(&report, cli.format)
        }
        Commands::Probe(args) => {
            let report = commands::probe::run(&config, args).await?;
            render(&report, cli.format)
        }
        Commands::Completions(_) => unreachable!("handled above"),
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + TextSummary,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.summary());
            Ok(())
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        }
    }
}

/// Human-readable rendering for `--format text`; JSON output goes through
/// Serialize.
pub(crate) trait TextSummary {
    fn summary(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_config_with_defaults() {
        let cli = Cli::try_parse_from(["browserdctl", "check-config"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("configs/browserd.toml"));
        assert!(matches!(cli.command, Commands::CheckConfig));
    }

    #[test]
    fn parses_probe_url_override() {
        let cli = Cli::try_parse_from([
            "browserdctl",
            "--format",
            "json",
            "probe",
            "--url",
            "https://example.com",
        ])
        .unwrap();
        match cli.command {
            Commands::Probe(args) => {
                assert_eq!(args.url.as_deref(), Some("https://example.com"))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_config_file_is_a_config_error() {
        let cli = Cli::try_parse_from([
            "browserdctl",
            "--config",
            "/nonexistent/browserd.toml",
            "check-config",
        ])
        .unwrap();
        let err = run(cli).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
