//! Debounced global search
//!
//! Keystrokes land in [`SearchClient::set_search_term`]; the remote call is
//! made only once input has been quiet for the configured debounce period.
//! Every dispatch takes a new generation number and a response is applied
//! only while its generation is still the latest one, so a slow answer to an
//! old query never overwrites a fresher result.

mod types;

pub use types::*;

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::context::ContextProvider;
use crate::error::Result;

/// Remote side of the search overlay
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
  async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>>;
}

struct Session {
  view: SearchSessionState,
  generation: u64,
  debounce_ticket: u64,
  pending: Option<JoinHandle<()>>,
  last_query: Option<SearchQuery>,
}

struct Shared {
  backend: Arc<dyn SearchBackend>,
  context: Arc<dyn ContextProvider>,
  debounce: Duration,
  types: Vec<SearchResultType>,
  limit: usize,
  session: Mutex<Session>,
  updates: watch::Sender<SearchSessionState>,
}

/// Owns one search session. Must be used from within a tokio runtime.
pub struct SearchClient {
  shared: Arc<Shared>,
}

impl SearchClient {
  pub fn new(
    backend: Arc<dyn SearchBackend>,
    context: Arc<dyn ContextProvider>,
    config: &ClientConfig,
  ) -> Self {
    let (updates, _) = watch::channel(SearchSessionState::default());
    let session = Session {
      view: SearchSessionState::default(),
      generation: 0,
      debounce_ticket: 0,
      pending: None,
      last_query: None,
    };

    Self {
      shared: Arc::new(Shared {
        backend,
        context,
        debounce: config.debounce(),
        types: config.search_types.clone(),
        limit: config.search_limit,
        session: Mutex::new(session),
        updates,
      }),
    }
  }

  pub fn state(&self) -> SearchSessionState {
    self.shared.lock().view.clone()
  }

  /// Receiver that observes every state change, for rendering
  pub fn watch(&self) -> watch::Receiver<SearchSessionState> {
    self.shared.updates.subscribe()
  }

  /// The most recently dispatched query, if any
  pub fn last_query(&self) -> Option<SearchQuery> {
    self.shared.lock().last_query.clone()
  }

  /// Echo the term immediately and (re)schedule the debounced dispatch
  pub fn set_search_term(&self, term: impl Into<String>) {
    let term = term.into();
    let mut session = self.shared.lock();
    session.view.search_term = term.clone();
    session.debounce_ticket += 1;
    if let Some(pending) = session.pending.take() {
      pending.abort();
    }

    if term.trim().is_empty() {
      Shared::clear_results(&mut session);
      self.shared.publish(&session);
      return;
    }

    let ticket = session.debounce_ticket;
    let shared = Arc::clone(&self.shared);
    session.pending = Some(tokio::spawn(async move {
      tokio::time::sleep(shared.debounce).await;
      {
        let mut session = shared.lock();
        if session.debounce_ticket != ticket {
          return;
        }
        session.pending = None;
      }
      shared.perform(&term).await;
    }));

    self.shared.publish(&session);
  }

  /// Run a search right away, bypassing the debounce
  pub async fn perform_search(&self, term: &str) {
    self.shared.perform(term).await;
  }

  pub fn open_search(&self) {
    let mut session = self.shared.lock();
    session.view.is_open = true;
    self.shared.publish(&session);
  }

  /// Hide the overlay and reset the whole session
  pub fn close_search(&self) {
    let mut session = self.shared.lock();
    session.debounce_ticket += 1;
    if let Some(pending) = session.pending.take() {
      pending.abort();
    }
    session.generation += 1;
    session.view = SearchSessionState::default();
    self.shared.publish(&session);
  }
}

impl Drop for SearchClient {
  fn drop(&mut self) {
    if let Some(pending) = self.shared.lock().pending.take() {
      pending.abort();
    }
  }
}

impl Shared {
  fn lock(&self) -> MutexGuard<'_, Session> {
    self.session.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn publish(&self, session: &Session) {
    self.updates.send_replace(session.view.clone());
  }

  fn clear_results(session: &mut Session) {
    session.generation += 1;
    session.view.results.clear();
    session.view.has_error = false;
    session.view.is_searching = false;
  }

  async fn perform(&self, term: &str) {
    let query = term.trim();

    let (generation, request) = {
      let mut session = self.lock();
      if query.is_empty() {
        Self::clear_results(&mut session);
        self.publish(&session);
        return;
      }

      session.generation += 1;
      let generation = session.generation;

      let scope = match self.context.snapshot().require_scope() {
        Ok(scope) => scope,
        Err(err) => {
          warn!(error = %err, "search skipped");
          session.view.results.clear();
          session.view.is_searching = false;
          session.view.has_error = true;
          self.publish(&session);
          return;
        }
      };

      session.view.is_searching = true;
      session.view.has_error = false;
      session.last_query = Some(SearchQuery::new(query, generation));
      self.publish(&session);

      let request = SearchRequest {
        query: query.to_string(),
        organization_id: scope.organization_id,
        workspace_id: scope.workspace_id,
        token: scope.token,
        types: self.types.clone(),
        limit: self.limit,
      };
      (generation, request)
    };

    debug!(generation, query, "dispatching search");
    let outcome = self.backend.search(&request).await;

    let mut session = self.lock();
    if session.generation != generation {
      debug!(generation, latest = session.generation, "discarding stale search response");
      return;
    }

    session.view.is_searching = false;
    match outcome {
      Ok(results) => {
        debug!(generation, count = results.len(), "search completed");
        session.view.results = results;
      }
      Err(err) => {
        warn!(error = %err, "search service unavailable");
        session.view.results.clear();
        session.view.has_error = true;
      }
    }
    self.publish(&session);
  }
}
