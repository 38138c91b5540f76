//! GRGate CLI tool.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use grgate_config::{LogFormat, MainConfig};
use grgate_core::{PlatformKind, RepositoryRef};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "grgate", version)]
#[command(about = "Publish draft releases once their status checks pass", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "GRGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Platform to use: github or gitlab
    #[arg(long, global = true, env = "GRGATE_PLATFORM")]
    platform: Option<PlatformKind>,

    /// Log level or tracing filter directive
    #[arg(long, global = true, env = "GRGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: pretty or json
    #[arg(long, global = true, env = "GRGATE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[arg(long, global = true, env = "GRGATE_GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long, global = true, env = "GRGATE_GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
    github_webhook_secret: Option<String>,

    #[arg(long, global = true, env = "GRGATE_GITLAB_TOKEN", hide_env_values = true)]
    gitlab_token: Option<String>,

    #[arg(long, global = true, env = "GRGATE_GITLAB_WEBHOOK_SECRET", hide_env_values = true)]
    gitlab_webhook_secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish the draft releases of a repository whose statuses succeeded
    Run {
        /// owner/repository or repository URL
        repository: RepositoryRef,
        /// Report what would be published without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Only consider releases whose tag matches
        #[arg(long)]
        tag_regexp: Option<String>,
        /// Status that must succeed, repeatable
        #[arg(short = 's', long = "status")]
        statuses: Vec<String>,
    },
    /// Inspect or attach commit statuses
    Status {
        #[command(subcommand)]
        command: StatusCommands,
    },
    /// Listen for webhooks and process repositories in the background
    Serve,
    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum StatusCommands {
    /// Get a status attached to a commit by name
    Get {
        repository: RepositoryRef,
        #[arg(long)]
        commit: String,
        #[arg(long)]
        name: String,
    },
    /// List statuses attached to a commit
    List {
        repository: RepositoryRef,
        #[arg(long)]
        commit: String,
    },
    /// Attach a status to a commit
    Set {
        repository: RepositoryRef,
        #[arg(long)]
        commit: String,
        #[arg(long)]
        name: String,
        /// Lifecycle, e.g. queued, in_progress or completed
        #[arg(long)]
        status: String,
        /// Outcome, e.g. success or failure
        #[arg(long, default_value = "")]
        state: String,
    },
}

impl Cli {
    /// Layer command line flags and environment variables over the file.
    fn apply_overrides(&self, config: &mut MainConfig) {
        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(token) = &self.github_token {
            config.github.token = Some(token.clone());
        }
        if let Some(secret) = &self.github_webhook_secret {
            config.github.webhook_secret = Some(secret.clone());
        }
        if let Some(token) = &self.gitlab_token {
            config.gitlab.token = Some(token.clone());
        }
        if let Some(secret) = &self.gitlab_webhook_secret {
            config.gitlab.webhook_secret = Some(secret.clone());
        }
    }
}

fn init_tracing(config: &MainConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("grgate {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = MainConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    init_tracing(&config);

    match cli.command {
        Commands::Run {
            repository,
            dry_run,
            tag_regexp,
            statuses,
        } => {
            let options = commands::run::RunOptions {
                dry_run,
                tag_regexp,
                statuses,
            };
            commands::run::run(&config, &repository, options).await?;
        }
        Commands::Status { command } => match command {
            StatusCommands::Get {
                repository,
                commit,
                name,
            } => {
                commands::status::get(&config, &repository, &commit, &name).await?;
            }
            StatusCommands::List { repository, commit } => {
                commands::status::list(&config, &repository, &commit).await?;
            }
            StatusCommands::Set {
                repository,
                commit,
                name,
                status,
                state,
            } => {
                commands::status::set(&config, &repository, &commit, &name, &status, &state)
                    .await?;
            }
        },
        Commands::Serve => {
            commands::serve::serve(config).await?;
        }
        Commands::Version => {}
    }

    Ok(())
}
