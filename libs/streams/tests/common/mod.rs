//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use pulse_actors::{
    async_trait, empty, Actor, ActorSystem, Behavior, HandlerTable, Message, Payload, Result,
};
use pulse_streams::messages::{DEMAND, SET_TICK_TIME};
use pulse_streams::{Completion, DemandSample, Sink};
use std::sync::Arc;
use std::time::Duration;

/// Values consumed by a collecting sink
#[derive(Clone, Default)]
pub struct Collected(Arc<Mutex<Vec<u32>>>);

impl Collected {
    pub fn values(&self) -> Vec<u32> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Spawn a running sink that appends every value it consumes
pub fn collecting_sink(system: &ActorSystem, name: &str) -> (Actor<Sink<u32>>, Completion, Collected) {
    let collected = Collected::default();
    let store = Arc::clone(&collected.0);
    let (sink, completion) = Sink::builder()
        .consume(move |value: u32| store.lock().push(value))
        .name(name)
        .spawn(system)
        .unwrap();
    (sink, completion, collected)
}

/// Stands in for a tick or an accounting actor and records what reaches it
pub struct Spy {
    intervals: Arc<Mutex<Vec<Duration>>>,
    samples: Arc<Mutex<Vec<DemandSample>>>,
}

#[derive(Clone, Default)]
pub struct SpyLog {
    intervals: Arc<Mutex<Vec<Duration>>>,
    samples: Arc<Mutex<Vec<DemandSample>>>,
}

impl SpyLog {
    /// Every `SET_TICK_TIME` received, in order
    pub fn intervals(&self) -> Vec<Duration> {
        self.intervals.lock().clone()
    }

    /// Every `DEMAND` sample received, in order
    pub fn samples(&self) -> Vec<DemandSample> {
        self.samples.lock().clone()
    }

    pub fn edges(&self) -> Vec<String> {
        let mut edges: Vec<String> = self.samples.lock().iter().map(|s| s.edge.clone()).collect();
        edges.sort();
        edges.dedup();
        edges
    }
}

impl Spy {
    async fn on_interval(&mut self, msg: Message) -> Result<Payload> {
        let interval = *msg.payload_as::<Duration>()?;
        self.intervals.lock().push(interval);
        Ok(empty())
    }

    async fn on_demand(&mut self, msg: Message) -> Result<Payload> {
        let sample = msg.payload_as::<DemandSample>()?.clone();
        self.samples.lock().push(sample);
        Ok(empty())
    }
}

#[async_trait]
impl Behavior for Spy {
    fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
        handlers
            .register(SET_TICK_TIME, |spy, msg, _| Box::pin(spy.on_interval(msg)))
            .register(DEMAND, |spy, msg, _| Box::pin(spy.on_demand(msg)));
    }
}

/// Spawn a running [`Spy`] named `name`
pub fn spawn_spy(system: &ActorSystem, name: &str) -> (Actor<Spy>, SpyLog) {
    let log = SpyLog::default();
    let spy = Spy {
        intervals: Arc::clone(&log.intervals),
        samples: Arc::clone(&log.samples),
    };
    let actor = system.actor_of(spy).name(name).spawn().unwrap();
    (actor, log)
}

/// Poll `condition` until it holds, failing after roughly one second
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pulse_streams=debug,pulse_actors=info")
        .with_test_writer()
        .try_init();
}
