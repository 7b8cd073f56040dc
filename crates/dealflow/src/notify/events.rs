use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const KNOWN_TYPES: [&str; 3] = ["message_update", "status_update", "connection_error"];

/// Connection state of a messaging account as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
  Connected,
  Disconnected,
  QrReady,
  Connecting,
  #[serde(other)]
  Unknown,
}

impl fmt::Display for ConnectionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      ConnectionStatus::Connected => "CONNECTED",
      ConnectionStatus::Disconnected => "DISCONNECTED",
      ConnectionStatus::QrReady => "QR_READY",
      ConnectionStatus::Connecting => "CONNECTING",
      ConnectionStatus::Unknown => "UNKNOWN",
    };
    f.write_str(label)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
  #[serde(rename_all = "camelCase")]
  MessageUpdate { from_name: String, content: String },
  #[serde(rename_all = "camelCase")]
  StatusUpdate {
    account_name: String,
    status: ConnectionStatus,
    #[serde(default)]
    previous_status: Option<ConnectionStatus>,
  },
  #[serde(rename_all = "camelCase")]
  ConnectionError { account_name: String, error: String },
}

/// Outcome of decoding one payload; decoding itself never fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
  Event(PushEvent),
  /// Well-formed JSON with a `type` this client does not handle
  Unrecognized(String),
  Malformed(String),
}

pub fn decode_event(payload: &str) -> Decoded {
  let value: Value = match serde_json::from_str(payload) {
    Ok(value) => value,
    Err(err) => return Decoded::Malformed(err.to_string()),
  };

  let Some(kind) = value.get("type").and_then(Value::as_str) else {
    return Decoded::Malformed("payload has no string `type` field".to_string());
  };
  if !KNOWN_TYPES.contains(&kind) {
    return Decoded::Unrecognized(kind.to_string());
  }

  match serde_json::from_value(value) {
    Ok(event) => Decoded::Event(event),
    Err(err) => Decoded::Malformed(err.to_string()),
  }
}
