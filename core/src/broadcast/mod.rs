//! Fan-out of derived frames to live subscribers.

pub mod buffer;
pub mod hub;
pub mod sink;

pub use buffer::FrameBuffer;
pub use hub::{BroadcastHub, BroadcastReport, DispatchOutcome, HubConfig};
pub use sink::{ConnectionId, DeliveryError, FrameSink};
