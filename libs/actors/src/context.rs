//! Per-actor context handed to handlers and lifecycle hooks

use crate::actor::{ActorRef, WeakActorRef};
use crate::domain::DomainHandle;
use crate::error::Result;
use crate::message::{Message, Payload};
use crate::registry::ActorId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// What a running actor knows about itself
///
/// The context holds only a weak reference to its actor, so an actor nobody
/// references can still be reclaimed while its loop is parked.
pub struct ActorContext {
    myself: WeakActorRef,
    id: ActorId,
    name: Arc<str>,
    domain: DomainHandle,
    stop_requested: AtomicBool,
}

impl ActorContext {
    pub(crate) fn new(myself: WeakActorRef, id: ActorId, name: Arc<str>, domain: DomainHandle) -> Self {
        Self {
            myself,
            id,
            name,
            domain,
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &DomainHandle {
        &self.domain
    }

    pub fn myself(&self) -> Option<ActorRef> {
        self.myself.upgrade()
    }

    pub fn weak_self(&self) -> &WeakActorRef {
        &self.myself
    }

    /// Tell `target`, recording this actor as sender unless one is set
    pub async fn tell(&self, target: &ActorRef, mut msg: Message) -> Result<()> {
        msg.stamp_sender(&self.myself);
        target.tell(msg).await
    }

    /// Ask `target` and wait for its reply
    ///
    /// This actor processes nothing else until the reply arrives; asking
    /// yourself never completes.
    pub async fn ask(&self, target: &ActorRef, mut query: Message) -> Result<Payload> {
        query.stamp_sender(&self.myself);
        target.ask(query).await
    }

    /// Deliver `msg` to this actor after `delay`
    pub fn schedule_once(&self, delay: Duration, msg: Message) -> JoinHandle<()> {
        let target = self.myself.clone();
        self.schedule_to(delay, target, msg)
    }

    /// Deliver `msg` to `target` after `delay`, unless `target` is gone by then
    pub fn schedule_to(&self, delay: Duration, target: WeakActorRef, msg: Message) -> JoinHandle<()> {
        let owner = Arc::clone(&self.name);
        self.domain.spawn(async move {
            tokio::time::sleep(delay).await;
            match target.upgrade() {
                Some(target) => {
                    if let Err(e) = target.tell(msg).await {
                        debug!(actor = %owner, target = %target.name(), error = %e, "Scheduled message not delivered");
                    }
                }
                None => debug!(actor = %owner, "Scheduled message target no longer exists"),
            }
        })
    }

    /// Stop this actor once the current message has been handled
    pub fn stop_self(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("domain", &self.domain.label())
            .finish()
    }
}
