//! Runtime defaults
//!
//! Default values shared by the actor runtime, the routers and the demand
//! pipeline. Settings structs fall back to these when a field is absent.

/// Actor runtime defaults
pub mod runtime {
    /// Mailbox capacity (messages)
    pub const MAILBOX_CAPACITY: usize = 10_000;

    /// Upper bound on `stop()` before the dispatch loop is aborted (milliseconds)
    pub const STOP_TIMEOUT_MS: u64 = 10_000;

    /// Dedicated loop domains created at system start
    pub const LOOP_DOMAINS: usize = 0;

    /// Thread name prefix for dedicated loop domains
    pub const DOMAIN_THREAD_PREFIX: &str = "pulse-domain";

    /// Grace period when a loop domain shuts down (milliseconds)
    pub const DOMAIN_SHUTDOWN_GRACE_MS: u64 = 1_000;
}

/// Router defaults
pub mod router {
    /// Routed calls between two reaps of non-running workers
    pub const REAP_INTERVAL: u64 = 100;
}

/// Demand pipeline defaults
pub mod streams {
    /// Initial tick interval (milliseconds)
    pub const TICK_INTERVAL_MS: u64 = 250;

    /// Accounting heartbeat: minimum time between two interval pushes (milliseconds)
    pub const ACCOUNTING_HEARTBEAT_MS: u64 = 30_000;

    /// Lower bound on any computed tick interval (milliseconds)
    pub const MIN_TICK_INTERVAL_MS: u64 = 50;

    /// Samples kept per demand edge
    pub const LATENCY_WINDOW: usize = 3;
}

/// Logging defaults
pub mod logging {
    /// Default `EnvFilter` directive
    pub const LEVEL: &str = "info";

    /// Default output format (`pretty` or `json`)
    pub const FORMAT: &str = "pretty";
}
