//! Pipeline message kinds and payloads
//!
//! | Kind            | Payload          | Sent by → to                       |
//! |-----------------|------------------|------------------------------------|
//! | `PULL`          | `()`             | Tick/Stage/Sink → upstream         |
//! | `FLOW_RESULT`   | [`Flow<T>`]      | Source/Stage → subscribers         |
//! | `COMPLETE`      | `()`             | Source/Stage → subscribers         |
//! | `SUBSCRIBE`     | `ActorRef`       | wiring → publisher, Accounting     |
//! | `UNSUBSCRIBE`   | `ActorRef`       | wiring → publisher, Accounting     |
//! | `ADD_PROVIDER`  | `ActorRef`       | wiring → Stage/Sink                |
//! | `REMOVE_PROVIDER` | `ActorRef`     | wiring → Stage/Sink                |
//! | `DEMAND`        | [`DemandSample`] | Stage/Sink → Accounting            |
//! | `HEARTBEAT`     | `()`             | anyone → Accounting                |
//! | `SET_TICK_TIME` | `Duration`       | Accounting → Tick                  |
//! | `TICK`          | `()`             | anyone → Tick (fires once)         |
//! | `TICK_STATS`    | `()` (query)     | anyone → Tick, replies [`TickStats`] |

use pulse_actors::MessageKind;
use std::time::Duration;
use tokio::time::Instant;

pub const PULL: MessageKind = MessageKind::new("stream.pull");
pub const FLOW_RESULT: MessageKind = MessageKind::new("stream.flow_result");
pub const COMPLETE: MessageKind = MessageKind::new("stream.complete");
pub const SUBSCRIBE: MessageKind = MessageKind::new("stream.subscribe");
pub const UNSUBSCRIBE: MessageKind = MessageKind::new("stream.unsubscribe");
pub const ADD_PROVIDER: MessageKind = MessageKind::new("stream.add_provider");
pub const REMOVE_PROVIDER: MessageKind = MessageKind::new("stream.remove_provider");
pub const DEMAND: MessageKind = MessageKind::new("stream.demand");
pub const HEARTBEAT: MessageKind = MessageKind::new("stream.heartbeat");
pub const SET_TICK_TIME: MessageKind = MessageKind::new("stream.set_tick_time");
pub const TICK: MessageKind = MessageKind::new("stream.tick");
pub const TICK_STATS: MessageKind = MessageKind::new("stream.tick_stats");

/// One published element
#[derive(Debug, Clone)]
pub struct Flow<T> {
    pub value: T,
    /// When the publisher sent it
    pub emitted_at: Instant,
    /// Name of the publishing actor
    pub origin: String,
}

impl<T> Flow<T> {
    pub fn new(value: T, origin: impl Into<String>) -> Self {
        Self {
            value,
            emitted_at: Instant::now(),
            origin: origin.into(),
        }
    }
}

/// Processing latency observed on one demand edge
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSample {
    pub edge: String,
    pub latency: Duration,
}

impl DemandSample {
    pub fn new(edge: impl Into<String>, latency: Duration) -> Self {
        Self {
            edge: edge.into(),
            latency,
        }
    }
}

/// Key of the demand edge from `upstream` to `downstream`
pub fn edge_key(upstream: &str, downstream: &str) -> String {
    format!("{}->{}", upstream, downstream)
}

/// Reply to `TICK_STATS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub interval: Duration,
    /// Timer-driven firings so far
    pub fired: u64,
    /// Firings requested with `TICK`
    pub manual: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_key_format() {
        assert_eq!(edge_key("source", "sink"), "source->sink");
    }
}
