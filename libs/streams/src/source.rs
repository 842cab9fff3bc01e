//! Source: the head of a pipeline
//!
//! Produces one element per `PULL` from an injected production function and
//! publishes it to its subscribers. When production reports completion the
//! source signals `COMPLETE` to every subscriber and stops itself.

use crate::fanout::{FanOut, Subscribers};
use crate::messages::{Flow, COMPLETE, FLOW_RESULT, PULL, SUBSCRIBE, UNSUBSCRIBE};
use pulse_actors::{
    async_trait, empty, payload, Actor, ActorContext, ActorError, ActorRef, ActorSystem,
    Behavior, DomainHandle, HandlerTable, Message, Payload, Result,
};
use tracing::{debug, info};

/// Outcome of one production call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit<T> {
    Value(T),
    /// Nothing available right now; the pull publishes nothing
    Nothing,
    /// Production is exhausted
    Complete,
}

type Producer<T> = Box<dyn FnMut() -> Emit<T> + Send>;

pub struct Source<T> {
    produce: Producer<T>,
    subscribers: Subscribers,
    produced: u64,
    completed: bool,
}

impl<T: Send + Sync + 'static> Source<T> {
    pub fn builder() -> SourceBuilder<T> {
        SourceBuilder {
            produce: None,
            fan_out: FanOut::default(),
            name: None,
            domain: None,
        }
    }

    async fn on_pull(&mut self, ctx: &ActorContext) -> Result<Payload> {
        if self.completed {
            return Ok(empty());
        }
        if self.subscribers.is_empty() {
            debug!(source = %ctx.name(), "Pull ignored, no subscribers");
            return Ok(empty());
        }

        match (self.produce)() {
            Emit::Value(value) => {
                self.produced += 1;
                let flow = Flow::new(value, ctx.name());
                self.subscribers.publish(ctx, FLOW_RESULT, payload(flow)).await;
            }
            Emit::Nothing => {}
            Emit::Complete => {
                self.completed = true;
                let notified = self.subscribers.broadcast(ctx, COMPLETE, empty()).await;
                info!(source = %ctx.name(), produced = self.produced, notified, "Source exhausted");
                ctx.stop_self();
            }
        }
        Ok(empty())
    }

    async fn on_subscribe(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let subscriber = msg.payload_as::<ActorRef>()?.clone();
        debug!(source = %ctx.name(), subscriber = %subscriber.name(), "Subscriber added");
        Ok(payload(self.subscribers.add(subscriber)))
    }

    async fn on_unsubscribe(&mut self, msg: Message) -> Result<Payload> {
        let subscriber = msg.payload_as::<ActorRef>()?;
        Ok(payload(self.subscribers.remove(subscriber)))
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Behavior for Source<T> {
    fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
        handlers
            .register(PULL, |source, _msg, ctx| Box::pin(source.on_pull(ctx)))
            .register(SUBSCRIBE, |source, msg, ctx| Box::pin(source.on_subscribe(msg, ctx)))
            .register(UNSUBSCRIBE, |source, msg, _ctx| Box::pin(source.on_unsubscribe(msg)));
    }
}

pub struct SourceBuilder<T> {
    produce: Option<Producer<T>>,
    fan_out: FanOut,
    name: Option<String>,
    domain: Option<DomainHandle>,
}

impl<T: Send + Sync + 'static> SourceBuilder<T> {
    /// Production function called once per pull
    pub fn produce<F>(mut self, produce: F) -> Self
    where
        F: FnMut() -> Emit<T> + Send + 'static,
    {
        self.produce = Some(Box::new(produce));
        self
    }

    /// Emit the items of `values` in order, then complete
    pub fn values<I>(self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let mut values = values.into_iter();
        self.produce(move || values.next().map_or(Emit::Complete, Emit::Value))
    }

    pub fn fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn domain(mut self, domain: DomainHandle) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn build(self) -> Result<Source<T>> {
        let produce = self
            .produce
            .ok_or_else(|| ActorError::configuration_missing("Source", "produce"))?;
        Ok(Source {
            produce,
            subscribers: Subscribers::new(self.fan_out),
            produced: 0,
            completed: false,
        })
    }

    pub fn spawn(self, system: &ActorSystem) -> Result<Actor<Source<T>>> {
        let name = self.name.clone();
        let domain = self.domain.clone();
        let source = self.build()?;

        let mut builder = system.actor_of(source);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(domain) = domain {
            builder = builder.domain(domain);
        }
        builder.spawn()
    }
}
