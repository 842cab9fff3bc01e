//! Router behavior: the worker set and the policy state, owned by one actor
//!
//! Worker mutations, selection and broadcast all run as messages on the
//! router's own dispatch loop, so the worker set has a single writer.

use super::{ADD_WORKER, BROADCAST, COUNT_WORKERS, LIST_WORKERS, REMOVE_WORKER, ROUTE};
use crate::actor::ActorRef;
use crate::behavior::{Behavior, HandlerTable};
use crate::context::ActorContext;
use crate::error::{ActorError, Result};
use crate::mailbox::SharedQueue;
use crate::message::{empty, payload, Message, Payload};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Policy state
pub(crate) enum Selector {
    RoundRobin { cursor: Arc<AtomicUsize> },
    Random { rng: StdRng },
    Balancing { queue: Arc<SharedQueue> },
}

impl Selector {
    fn name(&self) -> &'static str {
        match self {
            Selector::RoundRobin { .. } => "round_robin",
            Selector::Random { .. } => "random",
            Selector::Balancing { .. } => "balancing",
        }
    }
}

pub(crate) struct RouterCore {
    workers: Vec<ActorRef>,
    selector: Selector,
    reap_interval: u64,
    routed: u64,
}

impl RouterCore {
    pub(crate) fn new(selector: Selector, reap_interval: u64) -> Self {
        Self {
            workers: Vec::new(),
            selector,
            reap_interval: reap_interval.max(1),
            routed: 0,
        }
    }

    async fn add_worker(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let worker = msg.payload_as::<ActorRef>()?.clone();
        if !worker.is_running() {
            return Err(ActorError::actor_state(
                worker.name(),
                worker.state(),
                "only running actors can join a router",
            ));
        }
        if self.workers.contains(&worker) {
            return Ok(empty());
        }

        if let Selector::Balancing { queue } = &self.selector {
            worker.attach_shared(Arc::clone(queue)).await?;
        }

        debug!(router = %ctx.name(), worker = %worker.name(), "Worker added");
        self.workers.push(worker);
        Ok(empty())
    }

    async fn remove_worker(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let worker = msg.payload_as::<ActorRef>()?;
        let Some(position) = self.workers.iter().position(|w| w == worker) else {
            return Ok(payload(false));
        };
        let removed = self.workers.remove(position);

        match &self.selector {
            Selector::Balancing { .. } => {
                if let Err(e) = removed.detach_shared().await {
                    debug!(router = %ctx.name(), worker = %removed.name(), error = %e, "Worker already gone when detaching");
                }
            }
            Selector::RoundRobin { cursor } => self.rewind(cursor),
            Selector::Random { .. } => {}
        }

        debug!(router = %ctx.name(), worker = %removed.name(), "Worker removed");
        Ok(payload(true))
    }

    async fn route(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let inner: Message = msg.take_parcel()?;
        self.routed = self.routed.wrapping_add(1);
        if self.routed % self.reap_interval == 0 {
            self.reap(ctx);
        }

        if self.workers.is_empty() {
            inner.reject(ActorError::no_routees(ctx.name()));
            return Err(ActorError::no_routees(ctx.name()));
        }

        let worker = match &mut self.selector {
            Selector::Balancing { queue } => {
                // Nobody would ever dequeue it
                if !self.workers.iter().any(ActorRef::is_running) {
                    inner.reject(ActorError::no_routees(ctx.name()));
                    return Err(ActorError::no_routees(ctx.name()));
                }
                queue.push(inner, ctx.name()).await?;
                return Ok(empty());
            }
            Selector::RoundRobin { cursor } => {
                let index = cursor.load(Ordering::Relaxed) % self.workers.len();
                cursor.store((index + 1) % self.workers.len(), Ordering::Relaxed);
                &self.workers[index]
            }
            Selector::Random { rng } => {
                let index = rng.gen_range(0..self.workers.len());
                &self.workers[index]
            }
        };

        // A refused tell has already settled the inner reply slot
        worker.tell(inner).await?;
        Ok(empty())
    }

    async fn broadcast(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let inner: Message = msg.take_parcel()?;
        let mut delivered = 0usize;
        for worker in &self.workers {
            match worker.tell(inner.duplicate()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(router = %ctx.name(), worker = %worker.name(), error = %e, "Broadcast copy not delivered");
                }
            }
        }
        Ok(payload(delivered))
    }

    /// Drop workers that are no longer running
    fn reap(&mut self, ctx: &ActorContext) {
        let before = self.workers.len();
        self.workers.retain(ActorRef::is_running);
        let reaped = before - self.workers.len();
        if reaped > 0 {
            if let Selector::RoundRobin { cursor } = &self.selector {
                self.rewind(cursor);
            }
            info!(router = %ctx.name(), reaped, remaining = self.workers.len(), "Reaped stopped workers");
        }
    }

    fn rewind(&self, cursor: &AtomicUsize) {
        let len = self.workers.len();
        let index = cursor.load(Ordering::Relaxed);
        cursor.store(if len == 0 { 0 } else { index % len }, Ordering::Relaxed);
    }
}

#[async_trait]
impl Behavior for RouterCore {
    fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
        handlers
            .register(ADD_WORKER, |core, msg, ctx| Box::pin(core.add_worker(msg, ctx)))
            .register(REMOVE_WORKER, |core, msg, ctx| Box::pin(core.remove_worker(msg, ctx)))
            .register(ROUTE, |core, msg, ctx| Box::pin(core.route(msg, ctx)))
            .register(BROADCAST, |core, msg, ctx| Box::pin(core.broadcast(msg, ctx)))
            .register(COUNT_WORKERS, |core, _msg, _ctx| {
                let count = core.workers.len();
                Box::pin(async move { Ok(payload(count)) })
            })
            .register(LIST_WORKERS, |core, _msg, _ctx| {
                let workers = core.workers.clone();
                Box::pin(async move { Ok(payload(workers)) })
            });
    }

    async fn pre_start(&mut self, ctx: &ActorContext) -> Result<()> {
        debug!(
            router = %ctx.name(),
            policy = self.selector.name(),
            reap_interval = self.reap_interval,
            "Router ready"
        );
        Ok(())
    }

    async fn post_stop(&mut self, ctx: &ActorContext) {
        if let Selector::Balancing { .. } = self.selector {
            for worker in &self.workers {
                let _ = worker.detach_shared().await;
            }
        }
        debug!(router = %ctx.name(), workers = self.workers.len(), "Router stopped");
        self.workers.clear();
    }
}
