//! Server-push notifications
//!
//! A [`NotificationClient`] holds one long-lived `text/event-stream`
//! subscription, frames its body into events, and hands each event to an
//! [`EventDispatcher`] that raises toasts and chimes. Transport failures
//! never surface to callers; the [`Supervisor`] simply tries again.

pub mod dispatch;
pub mod events;
pub mod framing;
pub mod subscription;
pub mod supervisor;

pub use dispatch::{Chime, EventDispatcher, Silent, Toast, ToastKind, ToastPosition, ToastSink};
pub use events::{decode_event, ConnectionStatus, Decoded, PushEvent};
pub use framing::EventFramer;
pub use subscription::{ByteStream, EventSource, NotificationClient, Phase, StreamKind};
pub use supervisor::Supervisor;
