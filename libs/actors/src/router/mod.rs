//! Routers
//!
//! A router fans messages out across a pool of worker actors using one
//! distribution policy:
//!
//! - **Round-robin**: workers are taken in order, the cursor wraps at the end
//! - **Random**: one uniformly sampled worker per call
//! - **Balancing**: workers drain one shared queue; whichever is idle first
//!   handles the message
//!
//! The router is itself an actor. Adding, removing and selecting workers are
//! messages on its mailbox, so mutations are serialized with in-flight
//! routing. Round-robin and random routers drop workers that are no longer
//! running every `reap_interval` routed calls.
//!
//! ```rust,ignore
//! let router = Router::builder(&system, RoutingPolicy::RoundRobin).spawn()?;
//! router.add_actor(&worker).await?;
//! router.route_tell(Message::new(WORK, 7u32)).await?;
//! ```

mod pool;

use self::pool::{RouterCore, Selector};
use crate::actor::ActorRef;
use crate::domain::DomainHandle;
use crate::error::{ActorError, Result};
use crate::mailbox::SharedQueue;
use crate::message::{downcast_payload, Message, MessageKind, Payload};
use crate::state::ActorState;
use crate::system::ActorSystem;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) const ADD_WORKER: MessageKind = MessageKind::new("router.add_worker");
pub(crate) const REMOVE_WORKER: MessageKind = MessageKind::new("router.remove_worker");
pub(crate) const ROUTE: MessageKind = MessageKind::new("router.route");
pub(crate) const BROADCAST: MessageKind = MessageKind::new("router.broadcast");
pub(crate) const COUNT_WORKERS: MessageKind = MessageKind::new("router.count_workers");
pub(crate) const LIST_WORKERS: MessageKind = MessageKind::new("router.list_workers");

/// Distribution policy of a router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    RoundRobin,
    Random,
    Balancing,
}

/// Handle to a router actor
#[derive(Debug, Clone)]
pub struct Router {
    core: ActorRef,
    policy: RoutingPolicy,
    cursor: Option<Arc<AtomicUsize>>,
}

impl Router {
    pub fn builder(system: &ActorSystem, policy: RoutingPolicy) -> RouterBuilder<'_> {
        RouterBuilder {
            system,
            policy,
            name: None,
            domain: None,
            reap_interval: None,
            seed: None,
            queue_capacity: None,
            stop_timeout: None,
        }
    }

    pub fn round_robin(system: &ActorSystem) -> Result<Self> {
        Self::builder(system, RoutingPolicy::RoundRobin).spawn()
    }

    pub fn random(system: &ActorSystem) -> Result<Self> {
        Self::builder(system, RoutingPolicy::Random).spawn()
    }

    pub fn balancing(system: &ActorSystem) -> Result<Self> {
        Self::builder(system, RoutingPolicy::Balancing).spawn()
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// The router's own actor
    pub fn actor_ref(&self) -> &ActorRef {
        &self.core
    }

    /// Add `worker`, starting it first if it is still in Limbo
    pub async fn add_actor(&self, worker: &ActorRef) -> Result<()> {
        if worker.state() == ActorState::Limbo {
            worker.start()?;
        }
        if !worker.is_running() {
            return Err(ActorError::actor_state(
                worker.name(),
                worker.state(),
                "only running actors can join a router",
            ));
        }
        self.core
            .ask(Message::query(ADD_WORKER, worker.clone()))
            .await
            .map(|_| ())
    }

    /// Remove `worker`; returns whether it was part of the pool
    pub async fn remove_actor(&self, worker: &ActorRef) -> Result<bool> {
        self.core
            .ask_as(Message::query(REMOVE_WORKER, worker.clone()))
            .await
    }

    /// Hand `msg` to one worker chosen by the policy
    ///
    /// Returns once the router has accepted the message. A Query routed this
    /// way is answered only through [`route_ask`](Self::route_ask).
    pub async fn route_tell(&self, msg: Message) -> Result<()> {
        self.core.tell(Message::parcel(ROUTE, msg)).await
    }

    /// Route a Query and wait for the chosen worker's reply
    ///
    /// Fails with `NoRoutees` when the pool is empty.
    pub async fn route_ask(&self, mut query: Message) -> Result<Payload> {
        if !query.is_query() {
            return Err(ActorError::expected_query(query.kind()));
        }
        let reply = query.attach_reply();
        self.core.tell(Message::parcel(ROUTE, query)).await?;
        reply.recv().await
    }

    /// [`route_ask`](Self::route_ask), downcasting the reply to `T`
    pub async fn route_ask_as<T: Any + Send + Sync + Clone>(&self, query: Message) -> Result<T> {
        let kind = query.kind();
        let reply = self.route_ask(query).await?;
        downcast_payload(reply, kind)
    }

    /// Deliver a copy of `msg` to every current worker's own mailbox
    ///
    /// Workers that stopped in the meantime are skipped; returns the number
    /// of copies delivered.
    pub async fn broadcast(&self, msg: Message) -> Result<usize> {
        self.core
            .ask_as(Message::query_parcel(BROADCAST, msg))
            .await
    }

    pub async fn num_actors(&self) -> Result<usize> {
        self.core.ask_as(Message::query(COUNT_WORKERS, ())).await
    }

    /// Snapshot of the current workers, in routing order
    pub async fn workers(&self) -> Result<Vec<ActorRef>> {
        self.core.ask_as(Message::query(LIST_WORKERS, ())).await
    }

    /// Index of the next round-robin pick; `None` for other policies
    pub fn current_index(&self) -> Option<usize> {
        self.cursor
            .as_ref()
            .map(|cursor| cursor.load(Ordering::Relaxed))
    }

    /// Stop the router actor
    ///
    /// Workers keep running; stop them through their own references.
    pub async fn stop(&self) -> Result<()> {
        self.core.stop().await
    }
}

/// Options for a router; obtained from [`Router::builder`]
pub struct RouterBuilder<'s> {
    system: &'s ActorSystem,
    policy: RoutingPolicy,
    name: Option<String>,
    domain: Option<DomainHandle>,
    reap_interval: Option<u64>,
    seed: Option<u64>,
    queue_capacity: Option<usize>,
    stop_timeout: Option<Option<Duration>>,
}

impl<'s> RouterBuilder<'s> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn domain(mut self, domain: DomainHandle) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Routed calls between two reaps of stopped workers
    pub fn reap_interval(mut self, calls: u64) -> Self {
        self.reap_interval = Some(calls);
        self
    }

    /// Seed for the random policy's generator
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Capacity of the balancing policy's shared queue
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    pub fn spawn(self) -> Result<Router> {
        let runtime = self.system.runtime_settings();
        let reap_interval = self
            .reap_interval
            .unwrap_or(self.system.router_settings().reap_interval);

        let mut cursor = None;
        let selector = match self.policy {
            RoutingPolicy::RoundRobin => {
                let shared = Arc::new(AtomicUsize::new(0));
                cursor = Some(Arc::clone(&shared));
                Selector::RoundRobin { cursor: shared }
            }
            RoutingPolicy::Random => Selector::Random {
                rng: match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                },
            },
            RoutingPolicy::Balancing => Selector::Balancing {
                queue: Arc::new(SharedQueue::new(
                    self.queue_capacity.unwrap_or(runtime.mailbox_capacity),
                )),
            },
        };

        let mut builder = self
            .system
            .actor_of(RouterCore::new(selector, reap_interval));
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(domain) = self.domain {
            builder = builder.domain(domain);
        }
        if let Some(timeout) = self.stop_timeout {
            builder = builder.stop_timeout(timeout);
        }
        let core = builder.spawn()?.into_ref();

        info!(router = %core.name(), policy = ?self.policy, reap_interval, "Router spawned");
        Ok(Router {
            core,
            policy: self.policy,
            cursor,
        })
    }
}
