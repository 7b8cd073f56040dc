use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{info, warn};

use super::display::{format_results, TerminalBell, TerminalToasts};
use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::context::SessionContext;
use crate::notify::{EventDispatcher, NotificationClient, StreamKind, Supervisor};
use crate::search::{SearchBackend, SearchClient, SearchSessionState};

/// Type `query` into a search session one character at a time and report
/// whatever the overlay would end up showing.
pub async fn search(
  backend: Arc<dyn SearchBackend>,
  context: Arc<SessionContext>,
  config: &ClientConfig,
  query: &str,
) -> Result<SearchSessionState> {
  let client = SearchClient::new(backend, context, config);
  let mut updates = client.watch();
  client.open_search();

  let mut typed = String::new();
  for ch in query.chars() {
    typed.push(ch);
    client.set_search_term(typed.clone());
  }

  // Blank input is settled on the spot; anything else settles once a
  // dispatched search has finished or failed.
  let deadline = Instant::now() + config.debounce() + config.timeout() + Duration::from_secs(1);
  while !query.trim().is_empty() {
    let state = client.state();
    if state.has_error || (!state.is_searching && client.last_query().is_some()) {
      break;
    }
    match timeout_at(deadline, updates.changed()).await {
      Ok(Ok(())) => {}
      Ok(Err(_)) => break,
      Err(_) => {
        warn!("search did not finish in time");
        break;
      }
    }
  }

  let state = client.state();
  client.close_search();
  Ok(state)
}

pub async fn run_search(
  backend: Arc<dyn SearchBackend>,
  context: Arc<SessionContext>,
  config: &ClientConfig,
  query: &str,
) -> Result<()> {
  let state = search(backend, context, config, query).await?;
  println!("{}", format_results(&state));

  if state.has_error {
    return Err(anyhow!("search service unavailable"));
  }
  Ok(())
}

/// Stream notifications to the terminal until Ctrl-C
pub async fn run_listen(
  api: Arc<ApiClient>,
  context: Arc<SessionContext>,
  config: &ClientConfig,
  kinds: &[StreamKind],
) -> Result<()> {
  if config.streams_disabled {
    warn!("event streams are disabled; nothing will be received");
  }

  let dispatcher = Arc::new(EventDispatcher::new(
    Arc::new(TerminalToasts),
    Arc::new(TerminalBell),
    config.toast_duration(),
  ));

  let clients: Vec<NotificationClient> = kinds
    .iter()
    .map(|kind| {
      NotificationClient::new(*kind, api.clone(), context.clone(), dispatcher.clone(), config)
    })
    .collect();

  let mut supervisor = Supervisor::spawn(clients, config);
  info!(streams = kinds.len(), "listening for notifications, press Ctrl-C to stop");

  tokio::signal::ctrl_c().await?;
  supervisor.shutdown();
  info!("stopped listening");
  Ok(())
}

pub fn show_config(config: &ClientConfig) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(config)?);
  Ok(())
}
