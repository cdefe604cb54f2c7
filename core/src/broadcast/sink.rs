use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for one live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber closed")]
    Closed,
    #[error("subscriber queue full")]
    Full,
}

/// Non-blocking delivery endpoint for one subscriber.
pub trait FrameSink: Send + Sync {
    fn try_deliver(&self, payload: Arc<str>) -> Result<(), DeliveryError>;
}

impl FrameSink for Sender<Arc<str>> {
    fn try_deliver(&self, payload: Arc<str>) -> Result<(), DeliveryError> {
        self.try_send(payload).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
