//! Actor behaviors and handler tables
//!
//! One concrete runtime drives every actor; what an actor *does* is a
//! [`Behavior`]: its state, the handlers it registers for message kinds and
//! two lifecycle hooks. Handlers borrow the behavior mutably for the duration
//! of one message, so behavior state never needs locking.

use crate::context::ActorContext;
use crate::error::Result;
use crate::message::{Message, MessageKind, Payload};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Future returned by a message handler
pub type HandlerFuture<'a> = BoxFuture<'a, Result<Payload>>;

/// Type-erased handler for behavior `B`
pub type HandlerFn<B> =
    dyn for<'a> Fn(&'a mut B, Message, &'a ActorContext) -> HandlerFuture<'a> + Send + Sync;

/// State and hooks of one actor
///
/// ```rust,ignore
/// struct Counter { total: u64 }
///
/// impl Behavior for Counter {
///     fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
///         handlers.register(ADD, |counter, msg, _ctx| Box::pin(async move {
///             counter.total += *msg.payload_as::<u64>()?;
///             Ok(payload(counter.total))
///         }));
///     }
/// }
/// ```
#[async_trait]
pub trait Behavior: Send + Sized + 'static {
    /// Install the handlers this behavior always has
    fn register_handlers(&self, _handlers: &mut HandlerTable<Self>) {}

    /// Runs on the actor's domain before the first message
    ///
    /// An error here ends the actor without processing any message.
    async fn pre_start(&mut self, _ctx: &ActorContext) -> Result<()> {
        Ok(())
    }

    /// Runs on the actor's domain after the dispatch loop exits
    async fn post_stop(&mut self, _ctx: &ActorContext) {}
}

/// Stateless behavior for actors configured purely through handlers
#[async_trait]
impl Behavior for () {}

/// Message-kind → handler map; last registration wins
pub struct HandlerTable<B> {
    handlers: HashMap<MessageKind, Arc<HandlerFn<B>>>,
}

impl<B: Behavior> HandlerTable<B> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Associate `handler` with `kind`, replacing any previous handler
    pub fn register<F>(&mut self, kind: MessageKind, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut B, Message, &'a ActorContext) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.insert(HandlerEntry::new(kind, handler));
        self
    }

    pub fn contains(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered kinds, sorted by name
    pub fn kinds(&self) -> Vec<MessageKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub(crate) fn get(&self, kind: MessageKind) -> Option<&Arc<HandlerFn<B>>> {
        self.handlers.get(&kind)
    }

    pub(crate) fn insert(&mut self, entry: HandlerEntry<B>) {
        if self.handlers.insert(entry.kind, entry.handler).is_some() {
            debug!(kind = %entry.kind, "Handler replaced");
        }
    }

    /// Move every entry of `other` into `self`, overriding on conflict
    pub(crate) fn merge(&mut self, other: HandlerTable<B>) {
        for (kind, handler) in other.handlers {
            self.insert(HandlerEntry { kind, handler });
        }
    }
}

impl<B: Behavior> Default for HandlerTable<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for HandlerTable<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// One registration in flight to a running actor
pub(crate) struct HandlerEntry<B> {
    pub(crate) kind: MessageKind,
    pub(crate) handler: Arc<HandlerFn<B>>,
}

impl<B: Behavior> HandlerEntry<B> {
    pub(crate) fn new<F>(kind: MessageKind, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut B, Message, &'a ActorContext) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Self {
            kind,
            handler: Arc::new(handler),
        }
    }
}
