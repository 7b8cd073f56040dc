//! One self-healing server-push subscription
//!
//! Lifecycle: `Unsubscribed -> Connecting -> Streaming -> Unsubscribed`.
//! Any way a read loop ends other than an explicit unsubscribe puts the
//! client back to `Unsubscribed`, where the supervisor picks it up again.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatch::EventDispatcher;
use super::events::{decode_event, Decoded};
use super::framing::EventFramer;
use crate::config::ClientConfig;
use crate::context::{ContextProvider, Credentials};
use crate::error::Result;

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
  Messages,
  StatusUpdates,
}

impl StreamKind {
  pub fn path(&self) -> &'static str {
    match self {
      StreamKind::Messages => "message-updates",
      StreamKind::StatusUpdates => "status-updates",
    }
  }
}

impl fmt::Display for StreamKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.path())
  }
}

/// Opens the raw byte stream behind a subscription
#[async_trait]
pub trait EventSource: Send + Sync {
  async fn open(&self, kind: StreamKind, credentials: &Credentials) -> Result<ByteStream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Unsubscribed,
  Connecting,
  Streaming,
}

struct SubscriptionState {
  active: bool,
  phase: Phase,
  /// Bumped per subscribe so a finished read loop only resets its own state
  epoch: u64,
  cancel: Option<CancellationToken>,
}

struct Inner {
  kind: StreamKind,
  source: Arc<dyn EventSource>,
  context: Arc<dyn ContextProvider>,
  dispatcher: Arc<EventDispatcher>,
  streams_disabled: bool,
  state: Mutex<SubscriptionState>,
}

/// Handle to one stream subscription; clones share the same subscription.
/// The stream is torn down when the last clone is dropped.
#[derive(Clone)]
pub struct NotificationClient {
  inner: Arc<Inner>,
  _teardown: Arc<Teardown>,
}

/// Owned only by client handles, never by the read task
struct Teardown(Arc<Inner>);

impl Drop for Teardown {
  fn drop(&mut self) {
    self.0.cancel();
  }
}

impl NotificationClient {
  pub fn new(
    kind: StreamKind,
    source: Arc<dyn EventSource>,
    context: Arc<dyn ContextProvider>,
    dispatcher: Arc<EventDispatcher>,
    config: &ClientConfig,
  ) -> Self {
    let state = SubscriptionState { active: false, phase: Phase::Unsubscribed, epoch: 0, cancel: None };
    let inner = Arc::new(Inner {
      kind,
      source,
      context,
      dispatcher,
      streams_disabled: config.streams_disabled,
      state: Mutex::new(state),
    });
    Self { _teardown: Arc::new(Teardown(Arc::clone(&inner))), inner }
  }

  pub fn kind(&self) -> StreamKind {
    self.inner.kind
  }

  pub fn is_subscribed(&self) -> bool {
    self.inner.lock().active
  }

  pub fn phase(&self) -> Phase {
    self.inner.lock().phase
  }

  /// Whether a subscribe attempt right now would get past its preconditions
  pub fn is_ready(&self) -> bool {
    !self.inner.streams_disabled && self.inner.context.snapshot().require_credentials().is_ok()
  }

  /// Start streaming unless already subscribed, disabled, or missing context.
  /// Returns whether a new connection attempt was started.
  pub fn subscribe(&self) -> bool {
    let mut state = self.inner.lock();
    if state.active {
      return false;
    }
    if self.inner.streams_disabled {
      debug!(kind = %self.inner.kind, "event streams are disabled");
      return false;
    }
    let credentials = match self.inner.context.snapshot().require_credentials() {
      Ok(credentials) => credentials,
      Err(err) => {
        debug!(kind = %self.inner.kind, reason = %err, "not subscribing yet");
        return false;
      }
    };

    state.epoch += 1;
    state.active = true;
    state.phase = Phase::Connecting;
    let cancel = CancellationToken::new();
    state.cancel = Some(cancel.clone());
    let epoch = state.epoch;
    drop(state);

    let inner = Arc::clone(&self.inner);
    tokio::spawn(async move {
      inner.run(epoch, credentials, cancel).await;
    });
    true
  }

  /// Abort the in-flight stream, if any. Safe to call at any time.
  pub fn unsubscribe(&self) {
    self.inner.cancel();
  }
}

impl Inner {
  fn lock(&self) -> MutexGuard<'_, SubscriptionState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn cancel(&self) {
    let mut state = self.lock();
    if let Some(cancel) = state.cancel.take() {
      cancel.cancel();
      debug!(kind = %self.kind, "unsubscribed");
    }
    state.active = false;
    state.phase = Phase::Unsubscribed;
  }

  async fn run(&self, epoch: u64, credentials: Credentials, cancel: CancellationToken) {
    let opened = tokio::select! {
      _ = cancel.cancelled() => return,
      opened = self.source.open(self.kind, &credentials) => opened,
    };

    let mut stream = match opened {
      Ok(stream) => stream,
      Err(err) if err.is_unauthorized() => {
        warn!(kind = %self.kind, "stream rejected the auth token; will retry with a fresh one");
        self.reset(epoch);
        return;
      }
      Err(err) => {
        warn!(kind = %self.kind, error = %err, "could not open event stream");
        self.reset(epoch);
        return;
      }
    };

    self.mark_streaming(epoch);
    info!(kind = %self.kind, "event stream connected");

    let mut framer = EventFramer::new();
    loop {
      let next = tokio::select! {
        _ = cancel.cancelled() => {
          debug!(kind = %self.kind, "event stream cancelled");
          return;
        }
        next = stream.next() => next,
      };

      match next {
        Some(Ok(bytes)) => {
          for payload in framer.push(&bytes) {
            self.handle_payload(&payload);
          }
        }
        Some(Err(err)) => {
          warn!(kind = %self.kind, error = %err, "event stream failed");
          break;
        }
        None => {
          info!(kind = %self.kind, "event stream closed by server");
          break;
        }
      }
    }

    self.reset(epoch);
  }

  fn handle_payload(&self, payload: &str) {
    match decode_event(payload) {
      Decoded::Event(event) => self.dispatcher.dispatch(&event),
      Decoded::Unrecognized(kind) => debug!(stream = %self.kind, event_type = %kind, "ignoring event"),
      Decoded::Malformed(reason) => warn!(stream = %self.kind, %reason, "skipping malformed event"),
    }
  }

  fn mark_streaming(&self, epoch: u64) {
    let mut state = self.lock();
    if state.epoch == epoch && state.active {
      state.phase = Phase::Streaming;
    }
  }

  fn reset(&self, epoch: u64) {
    let mut state = self.lock();
    if state.epoch != epoch {
      return;
    }
    state.active = false;
    state.phase = Phase::Unsubscribed;
    state.cancel = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::{SessionContext, SessionSnapshot};
  use crate::notify::dispatch::{Silent, Toast, ToastSink};
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use std::time::Duration;

  #[derive(Default)]
  struct Recorder(Mutex<Vec<Toast>>);

  impl ToastSink for Recorder {
    fn show(&self, toast: Toast) {
      self.0.lock().unwrap().push(toast);
    }
  }

  /// Serves the scripted chunks, then keeps the stream open
  struct Scripted {
    chunks: Vec<&'static str>,
    opens: AtomicUsize,
  }

  #[async_trait]
  impl EventSource for Scripted {
    async fn open(&self, _kind: StreamKind, _credentials: &Credentials) -> Result<ByteStream> {
      self.opens.fetch_add(1, Ordering::SeqCst);
      let chunks: Vec<Result<Bytes>> =
        self.chunks.iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
      Ok(futures::stream::iter(chunks).chain(futures::stream::pending()).boxed())
    }
  }

  /// Flags when the stream it lives in is dropped
  struct ClosedFlag(Arc<AtomicBool>);

  impl Drop for ClosedFlag {
    fn drop(&mut self) {
      self.0.store(true, Ordering::SeqCst);
    }
  }

  /// Keeps the stream open and records when it is closed
  #[derive(Default)]
  struct Tracked {
    closed: Arc<AtomicBool>,
  }

  #[async_trait]
  impl EventSource for Tracked {
    async fn open(&self, _kind: StreamKind, _credentials: &Credentials) -> Result<ByteStream> {
      let flag = ClosedFlag(self.closed.clone());
      Ok(
        futures::stream::pending::<Result<Bytes>>()
          .map(move |chunk| {
            let _open = &flag;
            chunk
          })
          .boxed(),
      )
    }
  }

  fn context() -> Arc<SessionContext> {
    Arc::new(SessionContext::new(SessionSnapshot {
      user_id: Some("u-1".into()),
      organization_id: Some("org-1".into()),
      workspace_id: Some("ws-1".into()),
      token: Some("token".into()),
    }))
  }

  fn client(
    source: Arc<Scripted>,
    context: Arc<SessionContext>,
    config: &ClientConfig,
  ) -> (NotificationClient, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let dispatcher =
      Arc::new(EventDispatcher::new(recorder.clone(), Arc::new(Silent), Duration::from_secs(1)));
    (NotificationClient::new(StreamKind::Messages, source, context, dispatcher, config), recorder)
  }

  fn scripted(chunks: Vec<&'static str>) -> Arc<Scripted> {
    Arc::new(Scripted { chunks, opens: AtomicUsize::new(0) })
  }

  #[tokio::test]
  async fn test_double_subscribe_opens_one_stream() {
    let source = scripted(vec![]);
    let (client, _) = client(source.clone(), context(), &ClientConfig::default());

    assert!(client.subscribe());
    assert!(!client.subscribe());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    assert_eq!(client.phase(), Phase::Streaming);
    client.unsubscribe();
  }

  #[tokio::test]
  async fn test_unsubscribe_when_idle_is_noop() {
    let (client, _) = client(scripted(vec![]), context(), &ClientConfig::default());
    client.unsubscribe();
    client.unsubscribe();
    assert!(!client.is_subscribed());
    assert_eq!(client.phase(), Phase::Unsubscribed);
  }

  #[tokio::test]
  async fn test_kill_switch_blocks_subscribe() {
    let source = scripted(vec![]);
    let config = ClientConfig { streams_disabled: true, ..ClientConfig::default() };
    let (client, _) = client(source.clone(), context(), &config);

    assert!(!client.subscribe());
    assert!(!client.is_ready());
    assert_eq!(source.opens.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_missing_user_is_silent_noop() {
    let context = context();
    context.sign_out();
    let (client, _) = client(scripted(vec![]), context, &ClientConfig::default());

    assert!(!client.subscribe());
    assert!(!client.is_subscribed());
  }

  #[tokio::test]
  async fn test_malformed_chunk_does_not_stop_stream() {
    let source = scripted(vec![
      "data: {\"type\":\"message_update\",\"fromName\":\"A\",\"content\":\"1\"}\n\n",
      "data: {oops\n\n",
      "data: {\"type\":\"message_update\",\"fromName\":\"B\",\"content\":\"2\"}\n\n",
    ]);
    let (client, recorder) = client(source, context(), &ClientConfig::default());

    client.subscribe();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let titles: Vec<String> = recorder.0.lock().unwrap().iter().map(|t| t.title.clone()).collect();
    assert_eq!(titles, vec!["New message from A", "New message from B"]);
    assert!(client.is_subscribed());
    client.unsubscribe();
  }

  #[tokio::test]
  async fn test_stale_loop_does_not_reset_new_subscription() {
    let source = scripted(vec![]);
    let (client, _) = client(source.clone(), context(), &ClientConfig::default());

    client.subscribe();
    client.unsubscribe();
    client.subscribe();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(client.is_subscribed());
    assert_eq!(client.phase(), Phase::Streaming);
    client.unsubscribe();
  }

  #[tokio::test]
  async fn test_dropping_last_handle_closes_stream() {
    let source = Arc::new(Tracked::default());
    let dispatcher =
      Arc::new(EventDispatcher::new(Arc::new(Recorder::default()), Arc::new(Silent), Duration::from_secs(1)));
    let client =
      NotificationClient::new(StreamKind::Messages, source.clone(), context(), dispatcher, &ClientConfig::default());
    let other = client.clone();

    assert!(client.subscribe());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.phase(), Phase::Streaming);

    drop(client);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!source.closed.load(Ordering::SeqCst));
    assert!(other.is_subscribed());

    drop(other);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(source.closed.load(Ordering::SeqCst));
  }
}
