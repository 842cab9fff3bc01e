//! Sink: the terminal consumer of a pipeline
//!
//! Consumes every `FLOW_RESULT` and, when it has providers, pulls the next
//! element right away. Completion of every provider resolves the sink's
//! [`Completion`] and stops the sink.

use crate::accounting::report_latency;
use crate::fanout::Providers;
use crate::messages::{Flow, ADD_PROVIDER, COMPLETE, FLOW_RESULT, PULL, REMOVE_PROVIDER};
use pulse_actors::{
    async_trait, empty, payload, Actor, ActorContext, ActorError, ActorRef, ActorSystem,
    Behavior, DomainHandle, HandlerTable, Message, Payload, Result,
};
use tokio::sync::watch;
use tracing::{debug, info};

type Consumer<T> = Box<dyn FnMut(T) + Send>;

/// Resolves once a sink has seen completion from all of its providers
#[derive(Debug, Clone)]
pub struct Completion {
    rx: watch::Receiver<bool>,
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for completion; returns `false` if the sink went away first
    pub async fn wait(&mut self) -> bool {
        loop {
            if *self.rx.borrow_and_update() {
                return true;
            }
            if self.rx.changed().await.is_err() {
                return *self.rx.borrow();
            }
        }
    }
}

pub struct Sink<T> {
    consume: Consumer<T>,
    providers: Providers,
    accounting: Option<ActorRef>,
    completion: watch::Sender<bool>,
    consumed: u64,
    completions: usize,
}

impl<T: Clone + Send + Sync + 'static> Sink<T> {
    pub fn builder() -> SinkBuilder<T> {
        SinkBuilder {
            consume: None,
            providers: Vec::new(),
            accounting: None,
            name: None,
            domain: None,
        }
    }

    async fn on_flow(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let flow = msg.payload_as::<Flow<T>>()?;
        (self.consume)(flow.value.clone());
        self.consumed += 1;

        if let Some(accounting) = &self.accounting {
            report_latency(ctx, accounting, &flow.origin, flow.emitted_at).await;
        }
        if !self.providers.is_empty() {
            self.providers.pull(ctx, PULL).await;
        }
        Ok(empty())
    }

    async fn on_complete(&mut self, ctx: &ActorContext) -> Result<Payload> {
        self.completions += 1;
        if self.completions < self.providers.len().max(1) {
            debug!(sink = %ctx.name(), completions = self.completions, "Provider completed");
            return Ok(empty());
        }
        info!(sink = %ctx.name(), consumed = self.consumed, "Sink completed");
        self.completion.send_replace(true);
        ctx.stop_self();
        Ok(empty())
    }

    async fn on_add_provider(&mut self, msg: Message) -> Result<Payload> {
        let provider = msg.payload_as::<ActorRef>()?.clone();
        Ok(payload(self.providers.add(provider)))
    }

    async fn on_remove_provider(&mut self, msg: Message) -> Result<Payload> {
        let provider = msg.payload_as::<ActorRef>()?;
        Ok(payload(self.providers.remove(provider)))
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Behavior for Sink<T> {
    fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
        handlers
            .register(FLOW_RESULT, |sink, msg, ctx| Box::pin(sink.on_flow(msg, ctx)))
            .register(COMPLETE, |sink, _msg, ctx| Box::pin(sink.on_complete(ctx)))
            .register(ADD_PROVIDER, |sink, msg, _ctx| Box::pin(sink.on_add_provider(msg)))
            .register(REMOVE_PROVIDER, |sink, msg, _ctx| Box::pin(sink.on_remove_provider(msg)));
    }
}

pub struct SinkBuilder<T> {
    consume: Option<Consumer<T>>,
    providers: Vec<ActorRef>,
    accounting: Option<ActorRef>,
    name: Option<String>,
    domain: Option<DomainHandle>,
}

impl<T: Clone + Send + Sync + 'static> SinkBuilder<T> {
    pub fn consume<F>(mut self, consume: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        self.consume = Some(Box::new(consume));
        self
    }

    /// Upstream actors pulled in turn after each consumed element
    pub fn providers(mut self, providers: impl IntoIterator<Item = ActorRef>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Report per-element latency to `accounting`
    pub fn accounting(mut self, accounting: ActorRef) -> Self {
        self.accounting = Some(accounting);
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

    pub fn build(self) -> Result<(Sink<T>, Completion)> {
        let consume = self
            .consume
            .ok_or_else(|| ActorError::configuration_missing("Sink", "consume"))?;
        let (completion, rx) = watch::channel(false);
        let sink = Sink {
            consume,
            providers: Providers::new(self.providers),
            accounting: self.accounting,
            completion,
            consumed: 0,
            completions: 0,
        };
        Ok((sink, Completion { rx }))
    }

    pub fn spawn(self, system: &ActorSystem) -> Result<(Actor<Sink<T>>, Completion)> {
        let name = self.name.clone();
        let domain = self.domain.clone();
        let (sink, completion) = self.build()?;

        let mut builder = system.actor_of(sink);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(domain) = domain {
            builder = builder.domain(domain);
        }
        Ok((builder.spawn()?, completion))
    }
}
