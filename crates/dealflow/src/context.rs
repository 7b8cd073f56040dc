//! Session context handed to the clients at construction time
//!
//! The clients never read ambient state. They ask a [`ContextProvider`] for a
//! fresh [`SessionSnapshot`] each time they need the token or the active
//! organization/workspace, so a refreshed token is picked up on the next
//! attempt without rebuilding anything.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{ClientError, Result};

/// Point-in-time view of the signed-in user's context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
  pub user_id: Option<String>,
  pub organization_id: Option<String>,
  pub workspace_id: Option<String>,
  pub token: Option<String>,
}

/// Organization/workspace pair plus the bearer token that may act on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceScope {
  pub organization_id: String,
  pub workspace_id: String,
  pub token: String,
}

/// Everything a stream subscription needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub user_id: String,
  pub scope: WorkspaceScope,
}

fn present(value: &Option<String>, field: &'static str) -> Result<String> {
  match value.as_deref().map(str::trim) {
    Some(v) if !v.is_empty() => Ok(v.to_string()),
    _ => Err(ClientError::missing_context(field)),
  }
}

impl SessionSnapshot {
  pub fn require_scope(&self) -> Result<WorkspaceScope> {
    Ok(WorkspaceScope {
      token: present(&self.token, "auth token")?,
      organization_id: present(&self.organization_id, "organization")?,
      workspace_id: present(&self.workspace_id, "workspace")?,
    })
  }

  pub fn require_credentials(&self) -> Result<Credentials> {
    let user_id = present(&self.user_id, "user")?;
    Ok(Credentials { user_id, scope: self.require_scope()? })
  }
}

pub trait ContextProvider: Send + Sync {
  fn snapshot(&self) -> SessionSnapshot;
}

/// In-memory context shared between the host UI and the clients
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
  inner: Arc<RwLock<SessionSnapshot>>,
}

impl SessionContext {
  pub fn new(snapshot: SessionSnapshot) -> Self {
    Self { inner: Arc::new(RwLock::new(snapshot)) }
  }

  fn update(&self, apply: impl FnOnce(&mut SessionSnapshot)) {
    let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    apply(&mut guard);
  }

  pub fn set_user(&self, user_id: impl Into<String>) {
    let user_id = user_id.into();
    self.update(|s| s.user_id = Some(user_id));
  }

  pub fn set_organization(&self, organization_id: impl Into<String>) {
    let organization_id = organization_id.into();
    self.update(|s| s.organization_id = Some(organization_id));
  }

  pub fn set_workspace(&self, workspace_id: impl Into<String>) {
    let workspace_id = workspace_id.into();
    self.update(|s| s.workspace_id = Some(workspace_id));
  }

  pub fn set_token(&self, token: impl Into<String>) {
    let token = token.into();
    self.update(|s| s.token = Some(token));
  }

  pub fn clear_token(&self) {
    self.update(|s| s.token = None);
  }

  pub fn sign_out(&self) {
    self.update(|s| *s = SessionSnapshot::default());
  }
}

impl ContextProvider for SessionContext {
  fn snapshot(&self) -> SessionSnapshot {
    self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
  }
}
