//! Accounting: turns per-edge latency into a tick interval
//!
//! Keeps the last [`WINDOW`] latency samples of every demand edge. On a
//! heartbeat boundary the slowest edge's window mean, floored at the minimum
//! interval, is pushed to every registered tick as `SET_TICK_TIME`. Windows
//! survive between pushes, so a consumer slower than the heartbeat keeps its
//! weight. An edge silent for [`IDLE_PERIODS`] times the larger of its window
//! mean and the heartbeat is idle and forgotten, so a quiet pipeline falls
//! back to the floor.
//!
//! A heartbeat boundary is crossed when
//! - a `DEMAND` sample arrives at least one heartbeat after the last push,
//! - a `HEARTBEAT` message arrives, or
//! - the internal heartbeat timer fires with no push during its period.

use crate::messages::{
    edge_key, DemandSample, DEMAND, HEARTBEAT, SET_TICK_TIME, SUBSCRIBE, UNSUBSCRIBE,
};
use pulse_actors::{
    async_trait, empty, payload, Actor, ActorContext, ActorRef, ActorSystem, Behavior,
    DomainHandle, HandlerTable, Message, MessageKind, Payload, Result,
};
use pulse_config::StreamSettings;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Samples kept per edge
pub const WINDOW: usize = pulse_config::defaults::streams::LATENCY_WINDOW;

/// Silent periods after which an edge counts as idle
pub const IDLE_PERIODS: u32 = 3;

/// Internal heartbeat timer
const BEAT: MessageKind = MessageKind::new("stream.accounting.beat");

/// The most recent latency samples of one edge
#[derive(Debug, Clone, Default)]
pub struct LatencyWindow {
    samples: VecDeque<Duration>,
}

impl LatencyWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `latency`, evicting the oldest sample once full
    pub fn push(&mut self, latency: Duration) {
        if self.samples.len() == WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(latency);
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Tick interval for a set of edge windows: the largest mean, never below `floor`
pub fn next_tick_interval<'a>(
    windows: impl IntoIterator<Item = &'a LatencyWindow>,
    floor: Duration,
) -> Duration {
    windows
        .into_iter()
        .filter_map(LatencyWindow::mean)
        .fold(floor, Duration::max)
}

#[derive(Debug)]
struct Edge {
    window: LatencyWindow,
    last_sample: Instant,
}

impl Edge {
    fn is_idle(&self, heartbeat: Duration) -> bool {
        let period = self.window.mean().unwrap_or_default().max(heartbeat);
        self.last_sample.elapsed() > period * IDLE_PERIODS
    }
}

pub struct Accounting {
    edges: HashMap<String, Edge>,
    ticks: Vec<ActorRef>,
    heartbeat: Duration,
    floor: Duration,
    last_push: Instant,
    last_interval: Option<Duration>,
}

impl Accounting {
    pub fn builder() -> AccountingBuilder {
        AccountingBuilder {
            ticks: Vec::new(),
            heartbeat: None,
            floor: None,
            settings: StreamSettings::default(),
            name: None,
            domain: None,
        }
    }

    fn record(&mut self, sample: &DemandSample) {
        let edge = self.edges.entry(sample.edge.clone()).or_insert_with(|| Edge {
            window: LatencyWindow::new(),
            last_sample: Instant::now(),
        });
        edge.window.push(sample.latency);
        edge.last_sample = Instant::now();
    }

    /// Recompute the interval and send it to every tick
    async fn push(&mut self, ctx: &ActorContext) -> Duration {
        let heartbeat = self.heartbeat;
        self.edges.retain(|key, edge| {
            let idle = edge.is_idle(heartbeat);
            if idle {
                debug!(accounting = %ctx.name(), edge = %key, "Dropping idle edge");
            }
            !idle
        });
        let interval = next_tick_interval(self.edges.values().map(|edge| &edge.window), self.floor);
        self.last_push = Instant::now();
        if self.last_interval != Some(interval) {
            debug!(
                accounting = %ctx.name(),
                interval_ms = interval.as_millis() as u64,
                previous_ms = ?self.last_interval.map(|d| d.as_millis() as u64),
                "Tick interval changed"
            );
        }
        self.last_interval = Some(interval);

        let mut reachable = Vec::with_capacity(self.ticks.len());
        for tick in std::mem::take(&mut self.ticks) {
            match ctx.tell(&tick, Message::new(SET_TICK_TIME, interval)).await {
                Ok(()) => reachable.push(tick),
                Err(e) => debug!(accounting = %ctx.name(), tick = %tick.name(), error = %e, "Dropping tick"),
            }
        }
        self.ticks = reachable;

        trace!(
            accounting = %ctx.name(),
            edges = self.edges.len(),
            ticks = self.ticks.len(),
            "Tick interval pushed"
        );
        interval
    }

    fn boundary_crossed(&self) -> bool {
        self.last_push.elapsed() >= self.heartbeat
    }

    async fn on_demand(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let sample = msg.payload_as::<DemandSample>()?;
        trace!(edge = %sample.edge, latency_us = sample.latency.as_micros() as u64, "Demand sample");
        self.record(sample);
        if self.boundary_crossed() {
            self.push(ctx).await;
        }
        Ok(empty())
    }

    /// Replies with the interval just pushed
    async fn on_heartbeat(&mut self, ctx: &ActorContext) -> Result<Payload> {
        let interval = self.push(ctx).await;
        Ok(payload(interval))
    }

    async fn on_beat(&mut self, ctx: &ActorContext) -> Result<Payload> {
        if self.boundary_crossed() {
            self.push(ctx).await;
        }
        ctx.schedule_once(self.heartbeat, Message::signal(BEAT));
        Ok(empty())
    }

    async fn on_subscribe(&mut self, msg: Message, ctx: &ActorContext) -> Result<Payload> {
        let tick = msg.payload_as::<ActorRef>()?.clone();
        if self.ticks.contains(&tick) {
            return Ok(payload(false));
        }
        debug!(accounting = %ctx.name(), tick = %tick.name(), "Tick subscribed");
        self.ticks.push(tick);
        Ok(payload(true))
    }

    async fn on_unsubscribe(&mut self, msg: Message) -> Result<Payload> {
        let tick = msg.payload_as::<ActorRef>()?;
        let before = self.ticks.len();
        self.ticks.retain(|t| t != tick);
        Ok(payload(before != self.ticks.len()))
    }
}

#[async_trait]
impl Behavior for Accounting {
    fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
        handlers
            .register(DEMAND, |acc, msg, ctx| Box::pin(acc.on_demand(msg, ctx)))
            .register(HEARTBEAT, |acc, _msg, ctx| Box::pin(acc.on_heartbeat(ctx)))
            .register(BEAT, |acc, _msg, ctx| Box::pin(acc.on_beat(ctx)))
            .register(SUBSCRIBE, |acc, msg, ctx| Box::pin(acc.on_subscribe(msg, ctx)))
            .register(UNSUBSCRIBE, |acc, msg, _ctx| Box::pin(acc.on_unsubscribe(msg)));
    }

    async fn pre_start(&mut self, ctx: &ActorContext) -> Result<()> {
        debug!(
            accounting = %ctx.name(),
            heartbeat_ms = self.heartbeat.as_millis() as u64,
            floor_ms = self.floor.as_millis() as u64,
            "Accounting started"
        );
        self.last_push = Instant::now();
        ctx.schedule_once(self.heartbeat, Message::signal(BEAT));
        Ok(())
    }
}

pub struct AccountingBuilder {
    ticks: Vec<ActorRef>,
    heartbeat: Option<Duration>,
    floor: Option<Duration>,
    settings: StreamSettings,
    name: Option<String>,
    domain: Option<DomainHandle>,
}

impl AccountingBuilder {
    /// Tick that receives every pushed interval
    pub fn tick(mut self, tick: ActorRef) -> Self {
        if !self.ticks.contains(&tick) {
            self.ticks.push(tick);
        }
        self
    }

    pub fn heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Lower bound of every pushed interval
    pub fn floor(mut self, floor: Duration) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Defaults for options not set explicitly
    pub fn with_settings(mut self, settings: &StreamSettings) -> Self {
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

    pub fn build(self) -> Accounting {
        Accounting {
            edges: HashMap::new(),
            ticks: self.ticks,
            heartbeat: self
                .heartbeat
                .unwrap_or_else(|| self.settings.accounting_heartbeat())
                .max(Duration::from_millis(1)),
            floor: self.floor.unwrap_or_else(|| self.settings.min_tick_interval()),
            last_push: Instant::now(),
            last_interval: None,
        }
    }

    pub fn spawn(self, system: &ActorSystem) -> Result<Actor<Accounting>> {
        let name = self.name.clone();
        let domain = self.domain.clone();
        let accounting = self.build();

        let mut builder = system.actor_of(accounting);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(domain) = domain {
            builder = builder.domain(domain);
        }
        builder.spawn()
    }
}

/// Report the latency of one element received from `origin`
///
/// Failures are logged; losing a sample only delays the next adjustment.
pub(crate) async fn report_latency(
    ctx: &ActorContext,
    accounting: &ActorRef,
    origin: &str,
    emitted_at: Instant,
) {
    let sample = DemandSample::new(edge_key(origin, ctx.name()), emitted_at.elapsed());
    if let Err(e) = ctx.tell(accounting, Message::new(DEMAND, sample)).await {
        debug!(reporter = %ctx.name(), error = %e, "Latency sample dropped");
    }
}
