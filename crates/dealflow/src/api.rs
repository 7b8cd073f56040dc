//! Bearer-authenticated HTTP wrapper around the CRM backend
//!
//! Thin layer over reqwest: every call carries the caller's token, JSON
//! calls are bounded by the configured timeout, and streaming calls hand the
//! body back as a byte stream for the notification client to frame.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::context::Credentials;
use crate::error::{ClientError, Result};
use crate::notify::{ByteStream, EventSource, StreamKind};
use crate::search::{SearchBackend, SearchRequest, SearchResponse, SearchResult};

const EVENT_STREAM: &str = "text/event-stream";

pub struct ApiClient {
  client: Client,
  base_url: Url,
  config: ClientConfig,
}

impl ApiClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    // No client-wide timeout: event streams stay open indefinitely.
    let client = Client::builder().build()?;
    Self::with_client(client, config)
  }

  pub fn with_client(client: Client, config: ClientConfig) -> Result<Self> {
    let base_url = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))?;
    Ok(Self { client, base_url, config })
  }

  pub fn config(&self) -> &ClientConfig {
    &self.config
  }

  /// Resolve a path relative to the configured base URL
  pub fn endpoint(&self, path: &str) -> Result<Url> {
    Ok(self.base_url.join(path.trim_start_matches('/'))?)
  }

  pub async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
    token: &str,
  ) -> Result<T> {
    let url = self.endpoint(path)?;
    debug!(%url, "GET");

    let limit = self.config.timeout();
    let response = timeout(limit, self.client.get(url).bearer_auth(token).query(query).send())
      .await
      .map_err(|_| ClientError::Timeout(limit))??;

    let response = check_status(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
  }

  /// Open a long-lived `text/event-stream` response
  pub async fn open_stream(
    &self,
    path: &str,
    query: &[(&str, String)],
    token: &str,
  ) -> Result<Response> {
    let url = self.endpoint(path)?;
    debug!(%url, "opening event stream");

    let response = self
      .client
      .get(url)
      .bearer_auth(token)
      .header(ACCEPT, EVENT_STREAM)
      .header(CACHE_CONTROL, "no-cache")
      .query(query)
      .send()
      .await?;

    let response = check_status(response).await?;
    if response.status() == StatusCode::NO_CONTENT {
      return Err(ClientError::MissingBody);
    }
    Ok(response)
  }
}

async fn check_status(response: Response) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  if status == StatusCode::UNAUTHORIZED {
    return Err(ClientError::Unauthorized);
  }

  let body = response.text().await.unwrap_or_default();
  Err(ClientError::Status { status: status.as_u16(), body })
}

#[async_trait]
impl SearchBackend for ApiClient {
  async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
    let response: SearchResponse =
      self.get_json("search/global", &request.query_pairs(), &request.token).await?;
    Ok(response.results)
  }
}

#[async_trait]
impl EventSource for ApiClient {
  async fn open(&self, kind: StreamKind, credentials: &Credentials) -> Result<ByteStream> {
    let path = format!("{}/{}", self.config.stream_domain.trim_matches('/'), kind.path());
    let query = [
      ("organizationId", credentials.scope.organization_id.clone()),
      ("workspaceId", credentials.scope.workspace_id.clone()),
    ];

    let response = self.open_stream(&path, &query, &credentials.scope.token).await?;
    Ok(response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from)).boxed())
  }
}
