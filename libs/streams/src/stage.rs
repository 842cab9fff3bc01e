//! Stage: transforms elements between a source and a sink
//!
//! Pulls from its providers in turn when a subscriber pulls, applies the
//! transform to every `FLOW_RESULT` and republishes the output. Completion
//! is forwarded once every provider has completed.

use crate::accounting::report_latency;
use crate::fanout::{FanOut, Providers, Subscribers};
use crate::messages::{
    Flow, ADD_PROVIDER, COMPLETE, FLOW_RESULT, PULL, REMOVE_PROVIDER, SUBSCRIBE, UNSUBSCRIBE,
};
use pulse_actors::{
    async_trait, empty, payload, Actor, ActorContext, ActorError, ActorRef, ActorSystem,
    Behavior, DomainHandle, HandlerTable, Message, Payload, Result,
};
use tracing::{debug, info};

type Transform<I, O> = Box<dyn FnMut(I) -> O + Send>;

pub struct Stage<I, O> {
    transform: Transform<I, O>,
    providers: Providers,
    subscribers: Subscribers,
    accounting: Option<ActorRef>,
    completions: usize,
}

impl<I, O> Stage<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    pub fn builder() -> StageBuilder<I, O> {
        StageBuilder {
            transform: None,
            providers: Vec::new(),
            fan_out: FanOut::default(),
            accounting: None,
            name: None,
            domain: None,
        }
    }

    async fn on_pull(&mut self, ctx: &ActorContext) -> Result<Payload> {
        if !self.providers.pull(ctx, PULL).await {
            debug!(stage = %ctx.name(), "Pull not forwarded, no providers");
        }
        Ok(empty())
    }

    async fn on_flow(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let flow = msg.payload_as::<Flow<I>>()?;
        let output = (self.transform)(flow.value.clone());
        self.subscribers
            .publish(ctx, FLOW_RESULT, payload(Flow::new(output, ctx.name())))
            .await;

        if let Some(accounting) = &self.accounting {
            report_latency(ctx, accounting, &flow.origin, flow.emitted_at).await;
        }
        Ok(empty())
    }

    async fn on_complete(&mut self, ctx: &ActorContext) -> Result<Payload> {
        self.completions += 1;
        if self.completions < self.providers.len().max(1) {
            debug!(stage = %ctx.name(), completions = self.completions, "Provider completed");
            return Ok(empty());
        }
        let notified = self.subscribers.broadcast(ctx, COMPLETE, empty()).await;
        info!(stage = %ctx.name(), notified, "Stage completed");
        ctx.stop_self();
        Ok(empty())
    }

    async fn on_subscribe(&mut self, msg: Message) -> Result<Payload> {
        let subscriber = msg.payload_as::<ActorRef>()?.clone();
        Ok(payload(self.subscribers.add(subscriber)))
    }

    async fn on_unsubscribe(&mut self, msg: Message) -> Result<Payload> {
        let subscriber = msg.payload_as::<ActorRef>()?;
        Ok(payload(self.subscribers.remove(subscriber)))
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
impl<I, O> Behavior for Stage<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
        handlers
            .register(PULL, |stage, _msg, ctx| Box::pin(stage.on_pull(ctx)))
            .register(FLOW_RESULT, |stage, msg, ctx| Box::pin(stage.on_flow(msg, ctx)))
            .register(COMPLETE, |stage, _msg, ctx| Box::pin(stage.on_complete(ctx)))
            .register(SUBSCRIBE, |stage, msg, _ctx| Box::pin(stage.on_subscribe(msg)))
            .register(UNSUBSCRIBE, |stage, msg, _ctx| Box::pin(stage.on_unsubscribe(msg)))
            .register(ADD_PROVIDER, |stage, msg, _ctx| Box::pin(stage.on_add_provider(msg)))
            .register(REMOVE_PROVIDER, |stage, msg, _ctx| {
                Box::pin(stage.on_remove_provider(msg))
            });
    }
}

pub struct StageBuilder<I, O> {
    transform: Option<Transform<I, O>>,
    providers: Vec<ActorRef>,
    fan_out: FanOut,
    accounting: Option<ActorRef>,
    name: Option<String>,
    domain: Option<DomainHandle>,
}

impl<I, O> StageBuilder<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: FnMut(I) -> O + Send + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Upstream actors pulled in turn
    pub fn providers(mut self, providers: impl IntoIterator<Item = ActorRef>) -> Self {
        self.providers.extend(providers);
        self
    }

    pub fn fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
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

    pub fn build(self) -> Result<Stage<I, O>> {
        let transform = self
            .transform
            .ok_or_else(|| ActorError::configuration_missing("Stage", "transform"))?;
        Ok(Stage {
            transform,
            providers: Providers::new(self.providers),
            subscribers: Subscribers::new(self.fan_out),
            accounting: self.accounting,
            completions: 0,
        })
    }

    pub fn spawn(self, system: &ActorSystem) -> Result<Actor<Stage<I, O>>> {
        let name = self.name.clone();
        let domain = self.domain.clone();
        let stage = self.build()?;

        let mut builder = system.actor_of(stage);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(domain) = domain {
            builder = builder.domain(domain);
        }
        builder.spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_requires_transform() {
        let err = Stage::<u32, u32>::builder().build().err().unwrap();
        assert!(matches!(err, ActorError::ConfigurationMissing { field: "transform", .. }));
    }
}
