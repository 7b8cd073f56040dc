//! Dealflow CRM client core
//!
//! The pieces of the CRM front end that carry real client-side behaviour:
//!
//! - [`search`]: debounced global search with stale-response protection
//! - [`notify`]: self-healing server-push notifications (toasts and chimes)
//! - [`listing`]: in-memory filter/sort/paginate for settings lists
//!
//! Both clients receive their session context explicitly through
//! [`context::ContextProvider`] and talk to the backend through
//! [`api::ApiClient`].

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod listing;
pub mod notify;
pub mod search;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use context::{ContextProvider, SessionContext, SessionSnapshot};
pub use error::{ClientError, Result};
pub use notify::{NotificationClient, StreamKind, Supervisor};
pub use search::SearchClient;
