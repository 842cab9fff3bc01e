//! Demand-Driven Pipeline
//!
//! Source, Stage and Sink actors linked by pull and publish messages.
//! Nothing flows until someone downstream asks for it: a pull travels up
//! to the source, the produced element travels back down.
//!
//! ```text
//!            PULL               PULL
//!   Tick ──────────► Source ◄────────── Stage ◄────────── Sink
//!    ▲                 │    FLOW_RESULT   │   FLOW_RESULT   ▲
//!    │                 └─────────────────►└─────────────────┘
//!    │ SET_TICK_TIME                      │ DEMAND          │ DEMAND
//!    └──────────────── Accounting ◄───────┴─────────────────┘
//! ```
//!
//! - **Tick** pulls the source on a timer whose interval Accounting adjusts
//! - **Accounting** keeps the last three latency samples per demand edge and
//!   paces the tick to the slowest edge
//! - **Completion** starts at the source when production is exhausted and
//!   is forwarded until every sink has seen it
//!
//! # Examples
//!
//! ```rust,no_run
//! use pulse_actors::ActorSystem;
//! use pulse_streams::{wiring, Sink, Source, Tick};
//! use std::time::Duration;
//!
//! # async fn demo() -> pulse_actors::Result<()> {
//! let system = ActorSystem::new()?;
//! let source = Source::builder().values(1..=3u32).spawn(&system)?;
//! let (sink, mut done) = Sink::builder()
//!     .consume(|value: u32| println!("{}", value))
//!     .spawn(&system)?;
//! wiring::subscribe(source.actor_ref(), sink.actor_ref()).await?;
//!
//! let _tick = Tick::builder()
//!     .source(source.actor_ref().clone())
//!     .interval(Duration::from_millis(10))
//!     .spawn(&system)?;
//! done.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod accounting;
pub mod fanout;
pub mod messages;
pub mod sink;
pub mod source;
pub mod stage;
pub mod tick;
pub mod wiring;

pub use accounting::{next_tick_interval, Accounting, AccountingBuilder, LatencyWindow, WINDOW};
pub use fanout::{FanOut, Providers, Subscribers};
pub use messages::{edge_key, DemandSample, Flow, TickStats};
pub use sink::{Completion, Sink, SinkBuilder};
pub use source::{Emit, Source, SourceBuilder};
pub use stage::{Stage, StageBuilder};
pub use tick::{tick_stats, Tick, TickBuilder};
pub use wiring::{connect, disconnect, subscribe, unsubscribe};
