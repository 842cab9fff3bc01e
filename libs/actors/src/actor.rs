//! Actor Core
//!
//! Lifecycle, mailbox delivery and the dispatch loop shared by every actor.
//!
//! ## Lifecycle
//!
//! ```text
//! build ──► Limbo ──start()──► Running ──stop()──► Stopped ──► Terminated
//!                                 │                   ▲
//!                                 └── stop_self() ────┘
//! ```
//!
//! `start()` schedules the dispatch loop on the actor's domain. `stop()`
//! enqueues a poison sentinel behind every message already queued, waits for
//! the loop to drain and exit, and is bounded by the actor's stop timeout.
//!
//! ## Fault containment
//!
//! A handler error or panic affects one message only. For a Query it rejects
//! the reply slot; for a Plain message it is logged and the loop continues.

use crate::behavior::{Behavior, HandlerEntry, HandlerFuture, HandlerTable};
use crate::context::ActorContext;
use crate::domain::DomainHandle;
use crate::error::{ActorError, Result};
use crate::mailbox::{Letter, Mailbox, MailboxReceiver, SharedQueue};
use crate::message::{downcast_payload, Message, MessageKind, Payload};
use crate::metrics::SystemMetrics;
use crate::registry::{ActorDirectory, ActorId};
use crate::state::{ActorState, StateCell};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type Launch = Box<dyn FnOnce(WeakActorRef) -> BoxFuture<'static, ()> + Send>;

/// Start/stop bookkeeping, guarded together so the two never interleave
struct Lifecycle {
    launch: Option<Launch>,
    task: Option<JoinHandle<()>>,
}

pub(crate) struct ActorShared {
    id: ActorId,
    name: Arc<str>,
    state: StateCell,
    mailbox: Mailbox,
    domain: DomainHandle,
    lifecycle: Mutex<Lifecycle>,
    exited: watch::Sender<bool>,
    stop_timeout: Option<Duration>,
    metrics: Arc<SystemMetrics>,
    directory: Weak<ActorDirectory>,
}

/// Construction parameters resolved by the actor system
pub(crate) struct ActorSpec {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) domain: DomainHandle,
    pub(crate) mailbox_capacity: usize,
    pub(crate) stop_timeout: Option<Duration>,
    pub(crate) metrics: Arc<SystemMetrics>,
    pub(crate) directory: Weak<ActorDirectory>,
}

/// Cloneable, thread-safe reference to an actor
#[derive(Clone)]
pub struct ActorRef {
    inner: Arc<ActorShared>,
}

/// Non-owning reference, used for senders and self references
#[derive(Clone, Default)]
pub struct WeakActorRef {
    inner: Weak<ActorShared>,
}

impl WeakActorRef {
    pub fn upgrade(&self) -> Option<ActorRef> {
        self.inner.upgrade().map(|inner| ActorRef { inner })
    }

    /// The actor was dropped
    pub fn is_gone(&self) -> bool {
        self.inner.strong_count() == 0
    }

    pub(crate) fn refers_to(&self, actor: &ActorRef) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&actor.inner))
    }
}

impl fmt::Debug for WeakActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(actor) => write!(f, "WeakActorRef({})", actor.name()),
            None => f.write_str("WeakActorRef(<gone>)"),
        }
    }
}

impl ActorRef {
    /// Build an actor in Limbo; its loop starts on `start()`
    pub(crate) fn create<B: Behavior>(
        spec: ActorSpec,
        behavior: B,
        extra_handlers: HandlerTable<B>,
    ) -> Self {
        let mut handlers = HandlerTable::new();
        behavior.register_handlers(&mut handlers);
        handlers.merge(extra_handlers);

        let (mailbox, receiver) = Mailbox::new(spec.mailbox_capacity);
        let (exited, _) = watch::channel(false);
        let name: Arc<str> = Arc::from(spec.name);

        let launch: Launch = {
            let id = spec.id;
            let name = Arc::clone(&name);
            let domain = spec.domain.clone();
            let metrics = Arc::clone(&spec.metrics);
            Box::new(move |myself: WeakActorRef| -> BoxFuture<'static, ()> {
                let ctx = ActorContext::new(myself, id, name, domain);
                Box::pin(run_loop(behavior, handlers, receiver, ctx, metrics))
            })
        };

        let shared = ActorShared {
            id: spec.id,
            name,
            state: StateCell::new(),
            mailbox,
            domain: spec.domain,
            lifecycle: Mutex::new(Lifecycle {
                launch: Some(launch),
                task: None,
            }),
            exited,
            stop_timeout: spec.stop_timeout,
            metrics: spec.metrics,
            directory: spec.directory,
        };
        shared.state.advance(ActorState::Limbo);
        shared.metrics.record_spawn();

        debug!(
            actor = %shared.name,
            actor_id = %shared.id,
            domain = %shared.domain.label(),
            behavior = std::any::type_name::<B>(),
            "Actor created"
        );

        Self {
            inner: Arc::new(shared),
        }
    }

    pub fn id(&self) -> ActorId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ActorState {
        self.inner.state.load()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ActorState::Running
    }

    pub fn domain(&self) -> &DomainHandle {
        &self.inner.domain
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.inner.mailbox.capacity()
    }

    pub fn downgrade(&self) -> WeakActorRef {
        WeakActorRef {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Schedule the dispatch loop on the actor's domain
    ///
    /// Starting a running actor is a no-op; starting a stopped one fails.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        let state = self.state();
        match state {
            ActorState::Running => {
                debug!(actor = %self.name(), "Start ignored, actor already running");
                return Ok(());
            }
            ActorState::Stopped | ActorState::Terminated => {
                return Err(ActorError::actor_state(
                    self.name(),
                    state,
                    "a stopped actor cannot be started again",
                ));
            }
            ActorState::Created | ActorState::Limbo => {}
        }

        let Some(launch) = lifecycle.launch.take() else {
            return Err(ActorError::actor_state(
                self.name(),
                state,
                "dispatch loop already consumed",
            ));
        };

        lifecycle.task = Some(self.inner.domain.spawn(launch(self.downgrade())));
        self.inner.state.advance(ActorState::Running);

        info!(
            actor = %self.name(),
            actor_id = %self.id(),
            domain = %self.inner.domain.label(),
            "Actor started"
        );
        Ok(())
    }

    /// Stop the actor and wait until it is Terminated
    ///
    /// Messages queued before the call are processed first. Stopping a
    /// stopped actor returns once it is Terminated. If the loop does not exit
    /// within the stop timeout it is aborted and `Timeout` is returned.
    /// Must not be awaited from the actor's own handler; use
    /// [`ActorContext::stop_self`] there.
    pub async fn stop(&self) -> Result<()> {
        let (previous, task) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            let previous = self.inner.state.advance(ActorState::Stopped);
            if previous < ActorState::Running {
                lifecycle.launch = None;
            }
            (previous, lifecycle.task.take())
        };

        if previous < ActorState::Running {
            self.finish(ActorState::Terminated);
            self.inner.metrics.record_stop(false);
            info!(actor = %self.name(), "Actor stopped before it was started");
            return Ok(());
        }

        let mut exited = self.inner.exited.subscribe();
        let drain = async {
            if previous == ActorState::Running {
                // A closed mailbox means the loop is already gone
                let _ = self.inner.mailbox.send(Letter::Poison, &self.inner.metrics).await;
            }
            loop {
                let done = *exited.borrow_and_update();
                if done || exited.changed().await.is_err() {
                    break;
                }
            }
        };

        match self.inner.stop_timeout {
            None => drain.await,
            Some(limit) => {
                if tokio::time::timeout(limit, drain).await.is_err() {
                    let timeout_ms = limit.as_millis() as u64;
                    error!(
                        actor = %self.name(),
                        timeout_ms,
                        "Actor did not stop in time, aborting dispatch loop"
                    );
                    if let Some(task) = &task {
                        task.abort();
                    }
                    self.finish(ActorState::Terminated);
                    self.inner.metrics.record_stop(true);
                    return Err(ActorError::timeout(format!("stop {}", self.name()), timeout_ms));
                }
            }
        }

        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(actor = %self.name(), error = %e, "Dispatch loop ended abnormally");
                }
            }
        }
        Ok(())
    }

    /// Enqueue `msg`, waiting only for mailbox capacity
    pub async fn tell(&self, msg: Message) -> Result<()> {
        let state = self.state();
        if !state.accepts_messages() {
            msg.reject(self.refused(state));
            return Err(self.refused(state));
        }

        self.inner
            .mailbox
            .send(Letter::Deliver(msg), &self.inner.metrics)
            .await
            .map_err(|letter| {
                if let Letter::Deliver(msg) = letter {
                    msg.reject(ActorError::mailbox_closed(self.name()));
                }
                ActorError::mailbox_closed(self.name())
            })
    }

    /// Enqueue `msg` without waiting; fails with `MailboxFull` at capacity
    pub fn try_tell(&self, msg: Message) -> Result<()> {
        let state = self.state();
        if !state.accepts_messages() {
            msg.reject(self.refused(state));
            return Err(self.refused(state));
        }

        self.inner
            .mailbox
            .try_send(Letter::Deliver(msg))
            .map_err(|(letter, full)| {
                let error = || {
                    if full {
                        ActorError::mailbox_full(self.name(), self.mailbox_capacity())
                    } else {
                        ActorError::mailbox_closed(self.name())
                    }
                };
                if full {
                    self.inner.metrics.record_mailbox_full();
                }
                if let Letter::Deliver(msg) = letter {
                    msg.reject(error());
                }
                error()
            })
    }

    /// Enqueue a Query and wait for its reply
    pub async fn ask(&self, mut query: Message) -> Result<Payload> {
        if !query.is_query() {
            return Err(ActorError::expected_query(query.kind()));
        }
        let reply = query.attach_reply();
        self.tell(query).await?;
        reply.recv().await
    }

    /// [`ask`](Self::ask), downcasting the reply to `T`
    pub async fn ask_as<T: Any + Send + Sync + Clone>(&self, query: Message) -> Result<T> {
        let kind = query.kind();
        let reply = self.ask(query).await?;
        downcast_payload(reply, kind)
    }

    pub(crate) async fn install<B: Behavior>(&self, entry: HandlerEntry<B>) -> Result<()> {
        self.send_control(Letter::Install(Box::new(entry))).await
    }

    pub(crate) async fn attach_shared(&self, queue: Arc<SharedQueue>) -> Result<()> {
        self.send_control(Letter::Attach(queue)).await
    }

    pub(crate) async fn detach_shared(&self) -> Result<()> {
        self.send_control(Letter::Detach).await
    }

    async fn send_control(&self, letter: Letter) -> Result<()> {
        let state = self.state();
        if !state.accepts_messages() {
            return Err(self.refused(state));
        }
        self.inner
            .mailbox
            .send(letter, &self.inner.metrics)
            .await
            .map_err(|_| ActorError::mailbox_closed(self.name()))
    }

    fn refused(&self, state: ActorState) -> ActorError {
        ActorError::actor_state(self.name(), state, "actor no longer accepts messages")
    }

    fn finish(&self, state: ActorState) {
        self.inner.state.advance(state);
        if state == ActorState::Terminated {
            if let Some(directory) = self.inner.directory.upgrade() {
                directory.release(self);
            }
            self.inner.exited.send_replace(true);
        }
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Typed handle to an actor running behavior `B`
///
/// Dereferences to [`ActorRef`]; adds handler registration, which needs the
/// behavior type.
pub struct Actor<B: Behavior> {
    actor: ActorRef,
    _behavior: PhantomData<fn() -> B>,
}

impl<B: Behavior> Actor<B> {
    pub(crate) fn new(actor: ActorRef) -> Self {
        Self {
            actor,
            _behavior: PhantomData,
        }
    }

    /// Associate `handler` with `kind`; last registration wins
    ///
    /// The registration travels through the mailbox, so it applies to every
    /// message enqueued after this call returns.
    pub async fn register_handler<F>(&self, kind: MessageKind, handler: F) -> Result<()>
    where
        F: for<'a> Fn(&'a mut B, Message, &'a ActorContext) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.actor.install(HandlerEntry::new(kind, handler)).await
    }

    pub fn actor_ref(&self) -> &ActorRef {
        &self.actor
    }

    pub fn into_ref(self) -> ActorRef {
        self.actor
    }
}

impl<B: Behavior> Deref for Actor<B> {
    type Target = ActorRef;

    fn deref(&self) -> &ActorRef {
        &self.actor
    }
}

impl<B: Behavior> Clone for Actor<B> {
    fn clone(&self) -> Self {
        Self::new(self.actor.clone())
    }
}

impl<B: Behavior> fmt::Debug for Actor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Actor").field(&self.actor).finish()
    }
}

impl<B: Behavior> From<Actor<B>> for ActorRef {
    fn from(actor: Actor<B>) -> Self {
        actor.actor
    }
}

async fn run_loop<B: Behavior>(
    mut behavior: B,
    mut handlers: HandlerTable<B>,
    mut inbox: MailboxReceiver,
    ctx: ActorContext,
    metrics: Arc<SystemMetrics>,
) {
    let task_start = Instant::now();
    let mut processed: u64 = 0;

    let started = match AssertUnwindSafe(behavior.pre_start(&ctx)).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(actor = %ctx.name(), error = %e, "Actor failed to start during pre_start");
            false
        }
        Err(panic) => {
            error!(actor = %ctx.name(), panic = %panic_message(&*panic), "Actor panicked during pre_start");
            false
        }
    };

    if started {
        debug!(actor = %ctx.name(), domain = %ctx.domain().label(), "Entering dispatch loop");

        while let Some(letter) = inbox.recv().await {
            match letter {
                Letter::Deliver(msg) => {
                    dispatch(&mut behavior, &handlers, msg, &ctx, &metrics).await;
                    processed += 1;
                }
                Letter::Poison => {
                    debug!(actor = %ctx.name(), "Poison received");
                    break;
                }
                Letter::Install(entry) => match entry.downcast::<HandlerEntry<B>>() {
                    Ok(entry) => handlers.insert(*entry),
                    Err(_) => warn!(actor = %ctx.name(), "Ignoring handler registered for another behavior type"),
                },
                Letter::Attach(queue) => {
                    debug!(actor = %ctx.name(), "Attached to shared queue");
                    inbox.attach(queue);
                }
                Letter::Detach => {
                    if inbox.is_attached() {
                        debug!(actor = %ctx.name(), "Detached from shared queue");
                    }
                    inbox.detach();
                }
            }

            if ctx.stop_requested() {
                debug!(actor = %ctx.name(), "Actor requested its own stop");
                break;
            }
        }
    }

    // Lifecycle: Stop
    let me = ctx.myself();
    if let Some(me) = &me {
        me.finish(ActorState::Stopped);
    }

    if AssertUnwindSafe(behavior.post_stop(&ctx)).catch_unwind().await.is_err() {
        error!(actor = %ctx.name(), "Actor panicked during post_stop");
    }

    // Undelivered queries are settled with ReplyDropped
    drop(inbox);

    metrics.record_stop(false);
    if let Some(me) = &me {
        me.finish(ActorState::Terminated);
    }

    let total_runtime = task_start.elapsed();
    info!(
        actor = %ctx.name(),
        messages_processed = processed,
        total_runtime_ms = total_runtime.as_millis() as u64,
        "Actor dispatch loop completed"
    );
}

async fn dispatch<B: Behavior>(
    behavior: &mut B,
    handlers: &HandlerTable<B>,
    mut msg: Message,
    ctx: &ActorContext,
    metrics: &SystemMetrics,
) {
    let kind = msg.kind();
    let reply = msg.take_reply();
    let start = Instant::now();

    let outcome = match handlers.get(kind) {
        Some(handler) => AssertUnwindSafe(handler(behavior, msg, ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ActorError::handler(format!(
                    "handler for '{}' panicked: {}",
                    kind,
                    panic_message(&*panic)
                )))
            }),
        None => {
            metrics.record_unhandled();
            Err(ActorError::handler_not_found(ctx.name(), kind))
        }
    };

    let processing_duration = start.elapsed();
    metrics.record_message_handled(processing_duration);

    match (outcome, reply) {
        (Ok(value), Some(slot)) => {
            slot.settle(Ok(value));
        }
        (Ok(_), None) => {}
        (Err(e), Some(slot)) => {
            metrics.record_handler_failure();
            debug!(actor = %ctx.name(), kind = %kind, error = %e, "Query rejected");
            slot.settle(Err(e));
        }
        (Err(e), None) => {
            metrics.record_handler_failure();
            warn!(
                actor = %ctx.name(),
                kind = %kind,
                error = %e,
                error_category = e.category(),
                processing_duration_ns = processing_duration.as_nanos() as u64,
                "Plain message failed, continuing"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
