//! Tick: paces pulls on a source
//!
//! Fires once at start, then re-arms itself with a single-shot timer using
//! the current interval. Only a firing arms the next timer, so one chain is
//! live at a time and an interval change applies from the firing after the
//! pending one.

use crate::messages::{TickStats, PULL, SET_TICK_TIME, TICK, TICK_STATS};
use pulse_actors::{
    async_trait, empty, payload, Actor, ActorContext, ActorError, ActorRef, ActorSystem,
    Behavior, DomainHandle, HandlerTable, Message, MessageKind, Payload, Result,
};
use pulse_config::StreamSettings;
use std::time::Duration;
use tracing::{debug, info};

/// Timer firing
const ARMED: MessageKind = MessageKind::new("stream.tick.armed");

pub struct Tick {
    source: ActorRef,
    interval: Duration,
    limit: Option<u64>,
    fired: u64,
    manual: u64,
}

impl Tick {
    pub fn builder() -> TickBuilder {
        TickBuilder {
            source: None,
            interval: None,
            limit: None,
            settings: StreamSettings::default(),
            name: None,
            domain: None,
        }
    }

    fn stats(&self) -> TickStats {
        TickStats {
            interval: self.interval,
            fired: self.fired,
            manual: self.manual,
        }
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.fired >= limit)
    }

    fn arm(&self, delay: Duration, ctx: &ActorContext) {
        ctx.schedule_once(delay, Message::signal(ARMED));
    }

    /// Pull the source; a source that refuses the pull ends the tick
    async fn pull_source(&mut self, ctx: &ActorContext) -> bool {
        match ctx.tell(&self.source, Message::signal(PULL)).await {
            Ok(()) => true,
            Err(e) => {
                info!(tick = %ctx.name(), source = %self.source.name(), error = %e, "Source gone, tick stopping");
                ctx.stop_self();
                false
            }
        }
    }

    async fn on_armed(&mut self, ctx: &ActorContext) -> Result<Payload> {
        if self.exhausted() {
            return Ok(empty());
        }

        self.fired += 1;
        if !self.pull_source(ctx).await {
            return Ok(empty());
        }
        if self.exhausted() {
            debug!(tick = %ctx.name(), fired = self.fired, "Firing limit reached");
        } else {
            self.arm(self.interval, ctx);
        }
        Ok(empty())
    }

    async fn on_tick(&mut self, ctx: &ActorContext) -> Result<Payload> {
        self.manual += 1;
        self.pull_source(ctx).await;
        Ok(empty())
    }

    async fn on_set_tick_time(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let interval = *msg.payload_as::<Duration>()?;
        if interval == self.interval {
            return Ok(empty());
        }
        debug!(
            tick = %ctx.name(),
            from_ms = self.interval.as_millis() as u64,
            to_ms = interval.as_millis() as u64,
            "Tick interval changed"
        );
        self.interval = interval;
        Ok(empty())
    }
}

#[async_trait]
impl Behavior for Tick {
    fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
        handlers
            .register(ARMED, |tick, _msg, ctx| Box::pin(tick.on_armed(ctx)))
            .register(TICK, |tick, _msg, ctx| Box::pin(tick.on_tick(ctx)))
            .register(SET_TICK_TIME, |tick, msg, ctx| Box::pin(tick.on_set_tick_time(msg, ctx)))
            .register(TICK_STATS, |tick, _msg, _ctx| {
                let stats = tick.stats();
                Box::pin(async move { Ok(payload(stats)) })
            });
    }

    async fn pre_start(&mut self, ctx: &ActorContext) -> Result<()> {
        info!(
            tick = %ctx.name(),
            source = %self.source.name(),
            interval_ms = self.interval.as_millis() as u64,
            limit = ?self.limit,
            "Tick started"
        );
        if self.limit != Some(0) {
            self.arm(Duration::ZERO, ctx);
        }
        Ok(())
    }
}

pub struct TickBuilder {
    source: Option<ActorRef>,
    interval: Option<Duration>,
    limit: Option<u64>,
    settings: StreamSettings,
    name: Option<String>,
    domain: Option<DomainHandle>,
}

impl TickBuilder {
    /// Actor pulled on every firing
    pub fn source(mut self, source: ActorRef) -> Self {
        self.source = Some(source);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Stop re-arming after `firings` timer firings
    pub fn limit(mut self, firings: u64) -> Self {
        self.limit = Some(firings);
        self
    }

    /// Defaults for options not set explicitly
    pub fn settings(mut self, settings: &StreamSettings) -> Self {
        self.settings = settings.clone();
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

    pub fn build(self) -> Result<Tick> {
        let source = self
            .source
            .ok_or_else(|| ActorError::configuration_missing("Tick", "source"))?;
        Ok(Tick {
            source,
            interval: self.interval.unwrap_or_else(|| self.settings.tick_interval()),
            limit: self.limit,
            fired: 0,
            manual: 0,
        })
    }

    pub fn spawn(self, system: &ActorSystem) -> Result<Actor<Tick>> {
        let name = self.name.clone();
        let domain = self.domain.clone();
        let tick = self.build()?;

        let mut builder = system.actor_of(tick);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(domain) = domain {
            builder = builder.domain(domain);
        }
        builder.spawn()
    }
}

/// Current interval and firing counts of a running tick
pub async fn tick_stats(tick: &ActorRef) -> Result<TickStats> {
    tick.ask_as(Message::query(TICK_STATS, ())).await
}
