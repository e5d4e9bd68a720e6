//! # Event Bus System
//!
//! Broadcasts client state changes to the host UI using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Sessions publish typed [`CoreEvent`]s as they change state; the host
//! subscribes to refresh views (sign-in state, the file table, upload
//! progress bars) without polling.
//!
//! ```text
//! ┌──────────────┐  emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ AuthSession  ├────────>│          ├────────────>│  Host UI   │
//! ├──────────────┤         │ EventBus │             └────────────┘
//! │ FileListing  ├────────>│          │  subscribe  ┌────────────┐
//! ├──────────────┤         │          ├────────────>│  Logger    │
//! │ UploadManager├────────>│          │             └────────────┘
//! └──────────────┘         └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SignedIn { needs_setup: false }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Auth(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving. Upload progress is the chattiest source, so a slow UI may see this.
//! - **`RecvError::Closed`**: the bus was dropped with the client context.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Auth(AuthEvent),
    Files(FilesEvent),
    Upload(UploadEvent),
    Navigation(NavigationEvent),
}

impl CoreEvent {
    /// Short label for status lines and logs.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Files(e) => e.description(),
            CoreEvent::Upload(e) => e.description(),
            CoreEvent::Navigation(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Upload(UploadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::SessionExpired) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::LoginRejected { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Upload(UploadEvent::Completed { .. })
            | CoreEvent::Files(FilesEvent::FileDeleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    SignedIn {
        /// The backend still needs its storage configured.
        needs_setup: bool,
    },
    LoginRejected {
        message: String,
    },
    SignedOut,
    /// The backend rejected the stored token.
    SessionExpired,
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignedIn { .. } => "Signed in",
            AuthEvent::LoginRejected { .. } => "Login rejected",
            AuthEvent::SignedOut => "Signed out",
            AuthEvent::SessionExpired => "Session expired",
        }
    }
}

/// File listing changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FilesEvent {
    PageLoaded { page: u32, items: usize, total: u64 },
    FileDeleted { file_id: String },
}

impl FilesEvent {
    fn description(&self) -> &str {
        match self {
            FilesEvent::PageLoaded { .. } => "File page loaded",
            FilesEvent::FileDeleted { .. } => "File deleted",
        }
    }
}

/// Upload session lifecycle.
///
/// `upload_id` here is the client-side task id, not the backend multipart id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    Started {
        upload_id: String,
        filename: String,
        size: u64,
        multipart: bool,
    },
    Progress {
        upload_id: String,
        percent: u8,
    },
    Completed {
        upload_id: String,
        file_id: String,
        download_url: String,
        short_url: Option<String>,
    },
    Failed {
        upload_id: String,
        message: String,
    },
    Cancelled {
        upload_id: String,
    },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::Started { .. } => "Upload started",
            UploadEvent::Progress { .. } => "Upload in progress",
            UploadEvent::Completed { .. } => "Upload completed",
            UploadEvent::Failed { .. } => "Upload failed",
            UploadEvent::Cancelled { .. } => "Upload cancelled",
        }
    }
}

/// Route changes made by the router or forced by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NavigationEvent {
    Entered { path: String },
    Redirected { requested: String, path: String },
    HardNavigated { path: String },
}

impl NavigationEvent {
    fn description(&self) -> &str {
        match self {
            NavigationEvent::Entered { .. } => "Route entered",
            NavigationEvent::Redirected { .. } => "Route redirected by guard",
            NavigationEvent::HardNavigated { .. } => "Hard navigation",
        }
    }
}

/// Central event broadcaster.
///
/// Cloning is cheap and every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast `event`, returning how many subscribers got it. Fails only
    /// when nobody is subscribed, which callers generally ignore.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let uploads = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Upload(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `Lagged(n)` after `n` events were overwritten before being read;
    /// `Closed` once the client context is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = CoreEvent::Files(FilesEvent::PageLoaded {
            page: 1,
            items: 20,
            total: 45,
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_filter_skips_other_domains() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|e| matches!(e, CoreEvent::Upload(_)));

        bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).unwrap();
        bus.emit(CoreEvent::Upload(UploadEvent::Cancelled {
            upload_id: "u-1".to_string(),
        }))
        .unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Upload(UploadEvent::Cancelled {
                upload_id: "u-1".to_string()
            })
        );
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_reports_missed_events() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for percent in 0..5u8 {
            bus.emit(CoreEvent::Upload(UploadEvent::Progress {
                upload_id: "u-1".to_string(),
                percent,
            }))
            .unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(3))));
    }

    #[test]
    fn test_severity_and_description() {
        let failed = CoreEvent::Upload(UploadEvent::Failed {
            upload_id: "u".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(failed.description(), "Upload failed");

        let expired = CoreEvent::Auth(AuthEvent::SessionExpired);
        assert_eq!(expired.severity(), EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = CoreEvent::Navigation(NavigationEvent::Redirected {
            requested: "/files".to_string(),
            path: "/login".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Navigation");
        assert_eq!(json["payload"]["event"], "Redirected");
        assert_eq!(json["payload"]["path"], "/login");
    }
}
