//! Turns push events into toasts and chimes
//!
//! Status notifications are edge-triggered: a toast fires only when the
//! account's status differs from its previous one. The previous status comes
//! from the event itself, or from the last status this dispatcher saw for
//! the account when the backend leaves it out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use super::events::{ConnectionStatus, PushEvent};

const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
  Success,
  Error,
  Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastPosition {
  #[default]
  TopRight,
  TopCenter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
  pub kind: ToastKind,
  pub title: String,
  pub message: String,
  pub duration: Duration,
  pub position: ToastPosition,
}

/// UI collaborator that displays toasts
#[cfg_attr(test, mockall::automock)]
pub trait ToastSink: Send + Sync {
  fn show(&self, toast: Toast);
}

/// UI collaborator that plays the new-message tone
#[cfg_attr(test, mockall::automock)]
pub trait Chime: Send + Sync {
  fn play(&self) -> std::io::Result<()>;
}

/// A chime that never makes a sound
pub struct Silent;

impl Chime for Silent {
  fn play(&self) -> std::io::Result<()> {
    Ok(())
  }
}

pub struct EventDispatcher {
  toasts: Arc<dyn ToastSink>,
  chime: Arc<dyn Chime>,
  duration: Duration,
  last_status: Mutex<HashMap<String, ConnectionStatus>>,
}

impl EventDispatcher {
  pub fn new(toasts: Arc<dyn ToastSink>, chime: Arc<dyn Chime>, duration: Duration) -> Self {
    Self { toasts, chime, duration, last_status: Mutex::new(HashMap::new()) }
  }

  pub fn dispatch(&self, event: &PushEvent) {
    match event {
      PushEvent::MessageUpdate { from_name, content } => {
        info!(from = %from_name, "new message");
        self.show(
          ToastKind::Info,
          format!("New message from {from_name}"),
          preview(content),
          ToastPosition::TopRight,
        );
        if let Err(err) = self.chime.play() {
          debug!(error = %err, "chime unavailable");
        }
      }
      PushEvent::StatusUpdate { account_name, status, previous_status } => {
        let previous = self.remember(account_name, *status, *previous_status);
        match status_toast(account_name, *status, previous) {
          Some((kind, title, message)) => {
            info!(account = %account_name, %status, "connection status changed");
            self.show(kind, title, message, ToastPosition::TopCenter);
          }
          None => debug!(account = %account_name, %status, "status unchanged"),
        }
      }
      PushEvent::ConnectionError { account_name, error } => {
        info!(account = %account_name, %error, "account connection error");
        self.show(
          ToastKind::Error,
          format!("{account_name}: connection error"),
          error.clone(),
          ToastPosition::TopCenter,
        );
      }
    }
  }

  /// Record `status` and return the status to compare it against
  fn remember(
    &self,
    account: &str,
    status: ConnectionStatus,
    reported_previous: Option<ConnectionStatus>,
  ) -> Option<ConnectionStatus> {
    let mut seen = self.last_status.lock().unwrap_or_else(PoisonError::into_inner);
    let observed = seen.insert(account.to_string(), status);
    reported_previous.or(observed)
  }

  fn show(&self, kind: ToastKind, title: String, message: String, position: ToastPosition) {
    self.toasts.show(Toast { kind, title, message, duration: self.duration, position });
  }
}

/// Toast for a status transition, or `None` when nothing changed
pub fn status_toast(
  account: &str,
  status: ConnectionStatus,
  previous: Option<ConnectionStatus>,
) -> Option<(ToastKind, String, String)> {
  if previous == Some(status) {
    return None;
  }

  match status {
    ConnectionStatus::Connected => Some((
      ToastKind::Success,
      format!("{account} connected"),
      "Messages will sync automatically.".to_string(),
    )),
    ConnectionStatus::Disconnected => Some((
      ToastKind::Error,
      format!("{account} disconnected"),
      "Reconnect the account to keep receiving messages.".to_string(),
    )),
    ConnectionStatus::QrReady => Some((
      ToastKind::Info,
      format!("{account} is waiting for pairing"),
      "Scan the QR code to finish connecting.".to_string(),
    )),
    ConnectionStatus::Connecting => Some((
      ToastKind::Info,
      format!("Connecting {account}"),
      "Establishing the connection...".to_string(),
    )),
    ConnectionStatus::Unknown => None,
  }
}

fn preview(content: &str) -> String {
  if content.chars().count() <= PREVIEW_CHARS {
    return content.to_string();
  }
  let mut cut: String = content.chars().take(PREVIEW_CHARS - 1).collect();
  cut.push('…');
  cut
}
