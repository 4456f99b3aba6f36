//! Event sinks.
//!
//! A sink is an ordered, unbounded delivery channel from connection handlers to
//! one consumer. Publishing never blocks and never fails from the caller's
//! point of view: if the consumer has gone away the event is dropped and the
//! connection carries on.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::TcpEvent;

/// Accepts events from connection handlers.
pub trait EventSink: Send + Sync {
    /// Enqueues an event. Events published from one call site are delivered
    /// in publish order.
    fn publish(&self, event: TcpEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, event: TcpEvent) {
        (**self).publish(event)
    }
}

/// Sink backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TcpEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its consumer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TcpEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns true once the consumer has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: TcpEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            trace!(
                connection_id = %event.connection_id(),
                kind = %event.kind(),
                "Event dropped: consumer gone"
            );
        }
    }
}
