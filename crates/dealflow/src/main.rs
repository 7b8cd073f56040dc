use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use dealflow::cli::commands;
use dealflow::{ApiClient, ClientConfig, SessionContext, SessionSnapshot, StreamKind};

/// Dealflow - search and live notifications for the CRM, from the terminal
#[derive(Parser)]
#[command(name = "dealflow")]
#[command(about = "Global search and live account notifications for the Dealflow CRM")]
#[command(version)]
struct Cli {
  /// Configuration file (JSON)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Backend base URL, overrides the config file and DEALFLOW_API_URL
  #[arg(long, global = true)]
  api_url: Option<String>,

  /// Bearer token for the backend
  #[arg(long, env = "DEALFLOW_TOKEN", global = true, hide_env_values = true)]
  token: Option<String>,

  #[arg(long, env = "DEALFLOW_USER", global = true)]
  user: Option<String>,

  #[arg(long = "org", env = "DEALFLOW_ORG", global = true)]
  organization: Option<String>,

  #[arg(long, env = "DEALFLOW_WORKSPACE", global = true)]
  workspace: Option<String>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a global search the way the search overlay does
  Search {
    /// Text to search for
    #[arg(required = true)]
    query: Vec<String>,
  },
  /// Subscribe to live notifications until interrupted
  Listen {
    /// Only the message stream
    #[arg(long, conflicts_with = "status_only")]
    messages_only: bool,

    /// Only the account status stream
    #[arg(long)]
    status_only: bool,
  },
  /// Print the effective configuration
  Config,
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
  let base = match &cli.config {
    Some(path) => ClientConfig::load_from_file(path)?,
    None => ClientConfig::default(),
  };

  let mut config = base.with_overrides(|key| std::env::var(key).ok())?;
  if let Some(url) = &cli.api_url {
    config.base_url = url.clone();
    config.validate()?;
  }
  Ok(config)
}

fn session(cli: &Cli) -> SessionContext {
  SessionContext::new(SessionSnapshot {
    user_id: cli.user.clone(),
    organization_id: cli.organization.clone(),
    workspace_id: cli.workspace.clone(),
    token: cli.token.clone(),
  })
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("dealflow=debug,warn")
  } else {
    EnvFilter::new("dealflow=info,warn")
  };
  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

  let config = load_config(&cli)?;
  let context = Arc::new(session(&cli));

  match &cli.command {
    Commands::Config => commands::show_config(&config),
    Commands::Search { query } => {
      let api = Arc::new(ApiClient::new(config.clone())?);
      commands::run_search(api, context, &config, &query.join(" ")).await
    }
    Commands::Listen { messages_only, status_only } => {
      let kinds = match (*messages_only, *status_only) {
        (true, _) => vec![StreamKind::Messages],
        (_, true) => vec![StreamKind::StatusUpdates],
        _ => vec![StreamKind::Messages, StreamKind::StatusUpdates],
      };
      let api = Arc::new(ApiClient::new(config.clone())?);
      commands::run_listen(api, context, &config, &kinds).await
    }
  }
}
