//! Event fan-out to the live and durable sinks.
//!
//! Every engine publishes through one [`EventFanout`]. Lifecycle and error
//! events reach both sinks; data events reach the durable sink always and the
//! live sink only when data display is enabled.

use std::sync::Arc;

use netutil_event_log::EventLog;
use netutil_events::{Endpoints, EventSink, TcpEvent};
use netutil_id::ConnectionId;
use tracing::debug;

use crate::config::EventOptions;
use crate::relay::{Direction, Termination};
use crate::RelayError;

/// Shared handle to a live event consumer.
pub type SharedSink = Arc<dyn EventSink>;

pub struct EventFanout {
    live: Option<SharedSink>,
    durable: Option<SharedSink>,
    display_data: bool,
}

impl EventFanout {
    pub fn new(live: Option<SharedSink>, durable: Option<SharedSink>, display_data: bool) -> Self {
        Self {
            live,
            durable,
            display_data,
        }
    }

    /// Delivers one event to every sink that accepts it.
    pub fn publish(&self, event: TcpEvent) {
        if let Some(live) = &self.live {
            if self.display_data || !event.kind().is_data() {
                live.publish(event.clone());
            }
        }
        if let Some(durable) = &self.durable {
            durable.publish(event);
        }
    }

    /// Returns true if any sink would receive a data event.
    pub fn wants_data(&self) -> bool {
        self.durable.is_some() || (self.live.is_some() && self.display_data)
    }
}

impl std::fmt::Debug for EventFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFanout")
            .field("live", &self.live.is_some())
            .field("durable", &self.durable.is_some())
            .field("display_data", &self.display_data)
            .finish()
    }
}

/// Starts the durable log if one is configured and builds the fan-out.
pub(crate) async fn start_event_pipeline(
    options: &EventOptions,
    live: Option<SharedSink>,
) -> Result<(Arc<EventFanout>, Option<EventLog>), RelayError> {
    let (durable, event_log) = match options.event_log_config() {
        Some(config) => {
            let (log, sink) = EventLog::create(config).await?;
            (Some(Arc::new(sink) as SharedSink), Some(log))
        }
        None => (None, None),
    };

    let fanout = EventFanout::new(live, durable, options.display_data);
    debug!(?fanout, "Event pipeline started");
    Ok((Arc::new(fanout), event_log))
}

/// Stops the durable log once every publisher is gone.
pub(crate) async fn stop_event_pipeline(fanout: Arc<EventFanout>, event_log: Option<EventLog>) {
    drop(fanout);
    if let Some(log) = event_log {
        log.shutdown().await;
    }
}

/// Event emitter bound to one connection.
///
/// Construction publishes `Connected`, and [`finish`](Self::finish) consumes
/// the emitter, so each connection reports at most one of each.
#[derive(Debug)]
pub struct ConnectionEvents {
    id: ConnectionId,
    endpoints: Endpoints,
    fanout: Arc<EventFanout>,
}

impl ConnectionEvents {
    /// Publishes `Connected` and returns the emitter for the connection.
    pub fn connect(id: ConnectionId, endpoints: Endpoints, fanout: Arc<EventFanout>) -> Self {
        fanout.publish(TcpEvent::connected(id, &endpoints));
        Self {
            id,
            endpoints,
            fanout,
        }
    }

    /// Publishes a data event, copying `data` only if some sink wants it.
    pub fn data(&self, direction: Direction, data: &[u8]) {
        if !self.fanout.wants_data() {
            return;
        }
        let event = match direction {
            Direction::Outbound => TcpEvent::outbound(self.id, &self.endpoints, data),
            Direction::Inbound => TcpEvent::inbound(self.id, &self.endpoints, data),
        };
        self.fanout.publish(event);
    }

    /// Publishes the terminal event for `termination`.
    pub fn finish(self, termination: &Termination) {
        let event = match termination {
            Termination::Closed | Termination::Cancelled => {
                TcpEvent::disconnected(self.id, &self.endpoints)
            }
            Termination::Failed(e) => TcpEvent::error(self.id, &self.endpoints, e),
        };
        self.fanout.publish(event);
    }
}
