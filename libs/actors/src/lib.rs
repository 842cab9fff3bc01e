//! In-Process Actor Runtime
//!
//! Isolated units of state that communicate only through queued messages.
//! Each actor owns a bounded FIFO mailbox and a handler table and runs one
//! dispatch loop on a loop domain. Payloads are shared `Arc` values, so
//! messages never serialize.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐      ┌───────────────────────────┐
//! │       ActorSystem        │      │   Loop domain (1 thread)  │
//! │                          │      │                           │
//! │  names · directory ·     │      │  ┌─────────────────────┐  │
//! │  metrics · DomainPool ───┼──────┼─►│ dispatch loop       │  │
//! │                          │      │  │ mailbox → handler   │  │
//! └──────────┬───────────────┘      │  └─────────────────────┘  │
//!            │ tell / ask           │  ┌─────────────────────┐  │
//!            └──────────────────────┼─►│ dispatch loop       │  │
//!                                   │  └─────────────────────┘  │
//!                                   └───────────────────────────┘
//! ```
//!
//! # Messaging
//!
//! - **tell**: enqueue and return; waits only for mailbox capacity
//! - **ask**: enqueue a Query and wait for its reply slot
//! - **Routers** fan work out across a worker pool: round-robin, random or
//!   balancing over one shared queue
//!
//! A failing or panicking handler affects one message: a Query's reply is
//! rejected, a Plain message is logged, and the loop keeps going.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pulse_actors::{payload, ActorSystem, Message, MessageKind};
//!
//! const GREET: MessageKind = MessageKind::new("greet");
//!
//! # async fn demo() -> pulse_actors::Result<()> {
//! let system = ActorSystem::new()?;
//! let greeter = system
//!     .actor_of(())
//!     .name("greeter")
//!     .handler(GREET, |_, msg, _| {
//!         Box::pin(async move {
//!             let name = msg.payload_as::<String>()?;
//!             Ok(payload(format!("Hello, {}!", name)))
//!         })
//!     })
//!     .spawn()?;
//!
//! let reply: String = greeter
//!     .ask_as(Message::query(GREET, "Actor".to_string()))
//!     .await?;
//! assert_eq!(reply, "Hello, Actor!");
//! greeter.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod behavior;
pub mod context;
pub mod domain;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod state;
pub mod system;

pub use actor::{Actor, ActorRef, WeakActorRef};
pub use behavior::{Behavior, HandlerFn, HandlerFuture, HandlerTable};
pub use context::ActorContext;
pub use domain::{Bridged, DomainHandle, DomainPool, LoopDomain, AMBIENT_DOMAIN};
pub use error::{ActorError, Result};
pub use mailbox::SharedQueue;
pub use message::{
    downcast_payload, empty, payload, Delivery, Message, MessageKind, Parcel, Payload,
    ReplyReceiver, ReplySlot,
};
pub use metrics::{SystemMetrics, SystemStats};
pub use registry::{ActorDirectory, ActorId, ActorLookup, NameSequence};
pub use router::{Router, RouterBuilder, RoutingPolicy};
pub use state::ActorState;
pub use system::{ActorBuilder, ActorSystem};

// Re-exported so behaviors can use `#[async_trait]` without a direct dependency
pub use async_trait::async_trait;
