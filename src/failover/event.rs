//! Failover events and observer dispatch.
//!
//! Every transition produces exactly one [`FailoverEvent`]. It is handed to
//! the registered listener (if any) and published on a broadcast channel for
//! observers that prefer to consume events on their own task.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwapOption;
use serde::{Serialize, Serializer};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::endpoint::Endpoint;

/// Capacity of the event broadcast channel. Slow receivers lose the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Kind of transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailoverKind {
    /// Active endpoint moved to a backup.
    Failover,
    /// Active endpoint moved back to the primary.
    Failback,
    /// Primary answered a recovery check while failed over.
    PrimaryRecovered,
    /// No endpoint answered during a failover scan.
    AllEndpointsDown,
}

impl FailoverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverKind::Failover => "FAILOVER",
            FailoverKind::Failback => "FAILBACK",
            FailoverKind::PrimaryRecovered => "PRIMARY_RECOVERED",
            FailoverKind::AllEndpointsDown => "ALL_ENDPOINTS_DOWN",
        }
    }
}

impl fmt::Display for FailoverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of one transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailoverEvent {
    id: Uuid,
    from: Endpoint,
    to: Option<Endpoint>,
    kind: FailoverKind,
    #[serde(rename = "timestamp_ms", serialize_with = "serialize_epoch_millis")]
    timestamp: SystemTime,
}

impl FailoverEvent {
    pub fn new(from: Endpoint, to: Option<Endpoint>, kind: FailoverKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            kind,
            timestamp: SystemTime::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn from_endpoint(&self) -> &Endpoint {
        &self.from
    }

    pub fn to_endpoint(&self) -> Option<&Endpoint> {
        self.to.as_ref()
    }

    pub fn kind(&self) -> FailoverKind {
        self.kind
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> u64 {
        epoch_millis(self.timestamp)
    }
}

impl fmt::Display for FailoverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.to {
            Some(to) => write!(f, "{}: {} -> {}", self.kind, self.from, to),
            None => write!(f, "{}: {} -> none", self.kind, self.from),
        }
    }
}

fn epoch_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn serialize_epoch_millis<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(epoch_millis(*t))
}

type Listener = Box<dyn Fn(&FailoverEvent) + Send + Sync>;
type ResetCallback = Box<dyn Fn() + Send + Sync>;

/// Registered observers: one listener, one connection-reset callback and the
/// broadcast channel. Registrations replace earlier ones.
pub(crate) struct Observers {
    listener: ArcSwapOption<Listener>,
    reset: ArcSwapOption<ResetCallback>,
    tx: broadcast::Sender<FailoverEvent>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            listener: ArcSwapOption::empty(),
            reset: ArcSwapOption::empty(),
            tx,
        }
    }

    pub(crate) fn set_listener(&self, listener: Listener) {
        self.listener.store(Some(Arc::new(listener)));
    }

    pub(crate) fn set_reset_callback(&self, callback: ResetCallback) {
        self.reset.store(Some(Arc::new(callback)));
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<FailoverEvent> {
        self.tx.subscribe()
    }

    /// Deliver an event. Listener panics are logged and swallowed.
    pub(crate) fn dispatch(&self, event: FailoverEvent) {
        if let Some(listener) = self.listener.load_full() {
            if panic::catch_unwind(AssertUnwindSafe(|| (**listener)(&event))).is_err() {
                tracing::error!(
                    event_id = %event.id(),
                    kind = %event.kind(),
                    "Failover listener panicked"
                );
            }
        }
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    /// Ask the pool owner to re-establish connections. Panics are logged and swallowed.
    pub(crate) fn reset_connections(&self) {
        if let Some(callback) = self.reset.load_full() {
            if panic::catch_unwind(AssertUnwindSafe(|| (**callback)())).is_err() {
                tracing::error!("Connection reset callback panicked");
            }
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("listener", &self.listener.load().is_some())
            .field("reset", &self.reset.load().is_some())
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}
