//! Background retry loop for stream subscriptions
//!
//! One delayed first attempt lets auth state settle, then a fixed-interval
//! tick re-subscribes any client that has dropped back to `Unsubscribed`.
//! There is no backoff and no attempt limit.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::subscription::NotificationClient;
use crate::config::ClientConfig;

pub struct Supervisor {
  clients: Vec<NotificationClient>,
  shutdown: CancellationToken,
  task: Option<JoinHandle<()>>,
}

impl Supervisor {
  /// Start supervising `clients`. Must be called from within a tokio runtime.
  pub fn spawn(clients: Vec<NotificationClient>, config: &ClientConfig) -> Self {
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(supervise(
      clients.clone(),
      config.initial_delay(),
      config.retry_interval(),
      shutdown.clone(),
    ));

    Self { clients, shutdown, task: Some(task) }
  }

  pub fn clients(&self) -> &[NotificationClient] {
    &self.clients
  }

  /// Stop retrying and tear down every subscription
  pub fn shutdown(&mut self) {
    self.shutdown.cancel();
    if let Some(task) = self.task.take() {
      task.abort();
    }
    for client in &self.clients {
      client.unsubscribe();
    }
  }
}

impl Drop for Supervisor {
  fn drop(&mut self) {
    self.shutdown();
  }
}

async fn supervise(
  clients: Vec<NotificationClient>,
  initial_delay: Duration,
  retry_interval: Duration,
  shutdown: CancellationToken,
) {
  tokio::select! {
    _ = shutdown.cancelled() => return,
    _ = tokio::time::sleep(initial_delay) => {}
  }
  attempt(&clients);

  let mut ticker = interval_at(Instant::now() + retry_interval, retry_interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  loop {
    tokio::select! {
      _ = shutdown.cancelled() => return,
      _ = ticker.tick() => attempt(&clients),
    }
  }
}

fn attempt(clients: &[NotificationClient]) {
  for client in clients {
    if client.is_subscribed() {
      continue;
    }
    if !client.is_ready() {
      debug!(kind = %client.kind(), "subscription prerequisites missing");
      continue;
    }
    if client.subscribe() {
      info!(kind = %client.kind(), "subscribing to event stream");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::{Credentials, SessionContext, SessionSnapshot};
  use crate::error::{ClientError, Result};
  use crate::notify::dispatch::{EventDispatcher, Silent, Toast, ToastSink};
  use crate::notify::subscription::{ByteStream, EventSource, Phase, StreamKind};
  use async_trait::async_trait;
  use futures::StreamExt;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  struct Ignore;

  impl ToastSink for Ignore {
    fn show(&self, _toast: Toast) {}
  }

  /// Rejects every token except "fresh"
  #[derive(Default)]
  struct TokenGate {
    opens: AtomicUsize,
  }

  #[async_trait]
  impl EventSource for TokenGate {
    async fn open(&self, _kind: StreamKind, credentials: &Credentials) -> Result<ByteStream> {
      self.opens.fetch_add(1, Ordering::SeqCst);
      if credentials.scope.token != "fresh" {
        return Err(ClientError::Unauthorized);
      }
      Ok(futures::stream::pending().boxed())
    }
  }

  fn setup(token: &str) -> (Arc<TokenGate>, SessionContext, NotificationClient) {
    let source = Arc::new(TokenGate::default());
    let context = SessionContext::new(SessionSnapshot {
      user_id: Some("u-1".into()),
      organization_id: Some("org-1".into()),
      workspace_id: Some("ws-1".into()),
      token: Some(token.into()),
    });
    let dispatcher =
      Arc::new(EventDispatcher::new(Arc::new(Ignore), Arc::new(Silent), Duration::from_secs(1)));
    let client = NotificationClient::new(
      StreamKind::StatusUpdates,
      source.clone(),
      Arc::new(context.clone()),
      dispatcher,
      &ClientConfig::default(),
    );
    (source, context, client)
  }

  #[tokio::test(start_paused = true)]
  async fn test_first_attempt_waits_for_initial_delay() {
    let (source, _context, client) = setup("fresh");
    let _supervisor = Supervisor::spawn(vec![client.clone()], &ClientConfig::default());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(source.opens.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    assert_eq!(client.phase(), Phase::Streaming);
  }

  #[tokio::test(start_paused = true)]
  async fn test_unauthorized_recovers_on_next_tick_with_new_token() {
    let (source, context, client) = setup("stale");
    let _supervisor = Supervisor::spawn(vec![client.clone()], &ClientConfig::default());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    assert!(!client.is_subscribed());

    context.set_token("fresh");
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(source.opens.load(Ordering::SeqCst), 2);
    assert!(client.is_subscribed());
    assert_eq!(client.phase(), Phase::Streaming);
  }

  #[tokio::test(start_paused = true)]
  async fn test_waits_for_missing_context() {
    let (source, context, client) = setup("fresh");
    context.clear_token();
    let _supervisor = Supervisor::spawn(vec![client.clone()], &ClientConfig::default());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(source.opens.load(Ordering::SeqCst), 0);

    context.set_token("fresh");
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.opens.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_shutdown_unsubscribes_and_stops_retrying() {
    let (source, _context, client) = setup("fresh");
    let mut supervisor = Supervisor::spawn(vec![client.clone()], &ClientConfig::default());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(client.is_subscribed());

    supervisor.shutdown();
    assert!(!client.is_subscribed());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    assert_eq!(supervisor.clients().len(), 1);
  }
}
