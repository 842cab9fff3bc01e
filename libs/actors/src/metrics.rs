//! System-wide runtime counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by every actor of one system
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub actors_spawned: AtomicU64,
    pub actors_stopped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,
    pub handler_failures: AtomicU64,
    pub unhandled_messages: AtomicU64,
    pub mailbox_full_events: AtomicU64,
    pub forced_stops: AtomicU64,
}

impl SystemMetrics {
    pub fn record_message_handled(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unhandled(&self) {
        self.unhandled_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mailbox_full(&self) {
        self.mailbox_full_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spawn(&self) {
        self.actors_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stop(&self, forced: bool) {
        self.actors_stopped.fetch_add(1, Ordering::Relaxed);
        if forced {
            self.forced_stops.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let processed = self.messages_processed.load(Ordering::Relaxed);
        if processed == 0 {
            return 0.0;
        }
        self.total_processing_time_ns.load(Ordering::Relaxed) as f64 / processed as f64
    }

    pub fn snapshot(&self) -> SystemStats {
        SystemStats {
            actors_spawned: self.actors_spawned.load(Ordering::Relaxed),
            actors_stopped: self.actors_stopped.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            unhandled_messages: self.unhandled_messages.load(Ordering::Relaxed),
            mailbox_full_events: self.mailbox_full_events.load(Ordering::Relaxed),
            forced_stops: self.forced_stops.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
        }
    }
}

/// Point-in-time copy of [`SystemMetrics`]
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub actors_spawned: u64,
    pub actors_stopped: u64,
    pub messages_processed: u64,
    pub handler_failures: u64,
    pub unhandled_messages: u64,
    pub mailbox_full_events: u64,
    pub forced_stops: u64,
    pub avg_processing_time_ns: f64,
}
