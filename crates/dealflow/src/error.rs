use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Request was rejected as unauthorized (HTTP 401)")]
  Unauthorized,

  #[error("Server responded with HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("Request timed out after {0:?}")]
  Timeout(Duration),

  #[error("Response carried no body to stream")]
  MissingBody,

  #[error("Session context is missing {field}")]
  MissingContext { field: &'static str },

  #[error("Failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("Invalid URL: {0}")]
  Url(#[from] url::ParseError),

  #[error("Invalid configuration: {message}")]
  Config { message: String },

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl ClientError {
  pub fn config(message: impl Into<String>) -> Self {
    Self::Config { message: message.into() }
  }

  pub fn missing_context(field: &'static str) -> Self {
    Self::MissingContext { field }
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self, Self::Unauthorized)
  }
}
