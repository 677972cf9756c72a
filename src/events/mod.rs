//! Event types for flow execution.
//!
//! Events are emitted while sessions traverse flows to notify subscribers
//! about progress, outbound messages, pauses and completion.

mod flow;

pub use flow::*;

use crate::flow::NodeId;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Event message carrying the session and node it originates from.
#[derive(Debug, Clone)]
pub struct Message {
    /// Session that generated this event.
    pub session_id: String,
    /// Flow the session was traversing.
    pub flow_id: String,
    /// Contact of the session.
    pub contact_id: String,
    /// Node that generated this event (empty for flow level events).
    pub node_id: NodeId,
    /// The actual event data.
    pub event: FlowEvent,
    /// Timestamp in milliseconds.
    pub timestamp: i64,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl FlowEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, FlowEvent::Completed)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, FlowEvent::Paused(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FlowEvent::MessageFailed { .. } | FlowEvent::Cancelled { .. })
    }
}
