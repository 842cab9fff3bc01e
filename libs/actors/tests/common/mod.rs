//! Shared fixtures for actor runtime integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use pulse_actors::{
    async_trait, empty, payload, Actor, ActorContext, ActorError, ActorRef, ActorSystem, Behavior,
    HandlerTable, Message, MessageKind, Payload, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Record a `u32`
pub const WORK: MessageKind = MessageKind::new("test.work");
/// Reply with the payload
pub const ECHO: MessageKind = MessageKind::new("test.echo");
/// Reply with the handling actor's name
pub const WHO: MessageKind = MessageKind::new("test.who");
/// Fail with a handler error
pub const FAIL: MessageKind = MessageKind::new("test.fail");
/// Panic inside the handler
pub const PANIC: MessageKind = MessageKind::new("test.panic");
/// Sleep for the given number of milliseconds
pub const SLOW: MessageKind = MessageKind::new("test.slow");
/// Ask the actor to stop itself
pub const STOP_SELF: MessageKind = MessageKind::new("test.stop_self");
/// Reply with the sender's name
pub const SENDER: MessageKind = MessageKind::new("test.sender");

/// Behavior recording every `WORK` value it sees
pub struct Recorder {
    seen: Arc<Mutex<Vec<u32>>>,
    stopped: Arc<AtomicBool>,
}

/// Observation side of a [`Recorder`]
#[derive(Clone, Default)]
pub struct Journal {
    seen: Arc<Mutex<Vec<u32>>>,
    stopped: Arc<AtomicBool>,
}

impl Journal {
    pub fn seen(&self) -> Vec<u32> {
        self.seen.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn post_stop_ran(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Recorder {
    pub fn new() -> (Self, Journal) {
        let journal = Journal::default();
        let recorder = Self {
            seen: Arc::clone(&journal.seen),
            stopped: Arc::clone(&journal.stopped),
        };
        (recorder, journal)
    }

    async fn on_work(&mut self, msg: Message) -> Result<Payload> {
        let value = *msg.payload_as::<u32>()?;
        self.seen.lock().push(value);
        Ok(empty())
    }

    async fn on_slow(&mut self, msg: Message) -> Result<Payload> {
        let millis = *msg.payload_as::<u64>()?;
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(empty())
    }

    async fn on_sender(&mut self, msg: Message) -> Result<Payload> {
        let sender = msg
            .sender()
            .map(|actor| actor.name().to_string())
            .ok_or_else(|| ActorError::handler("message carries no sender"))?;
        Ok(payload(sender))
    }
}

#[async_trait]
impl Behavior for Recorder {
    fn register_handlers(&self, handlers: &mut HandlerTable<Self>) {
        handlers
            .register(WORK, |rec, msg, _| Box::pin(rec.on_work(msg)))
            .register(SLOW, |rec, msg, _| Box::pin(rec.on_slow(msg)))
            .register(SENDER, |rec, msg, _| Box::pin(rec.on_sender(msg)))
            .register(ECHO, |_, msg, _| {
                let value = msg.payload().clone();
                Box::pin(async move { Ok(value) })
            })
            .register(WHO, |_, _, ctx| {
                let name = ctx.name().to_string();
                Box::pin(async move { Ok(payload(name)) })
            })
            .register(FAIL, |_, _, _| {
                Box::pin(async { Err(ActorError::handler("requested failure")) })
            })
            .register(PANIC, |_, _, _| Box::pin(async { panic!("requested panic") }))
            .register(STOP_SELF, |_, _, ctx| {
                ctx.stop_self();
                Box::pin(async { Ok(empty()) })
            });
    }

    async fn post_stop(&mut self, _ctx: &ActorContext) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Spawn a running [`Recorder`] named `name`
pub fn spawn_recorder(system: &ActorSystem, name: &str) -> (Actor<Recorder>, Journal) {
    let (recorder, journal) = Recorder::new();
    let actor = system.actor_of(recorder).name(name).spawn().unwrap();
    (actor, journal)
}

/// Wait until every message queued on `actor` before this call is handled
pub async fn settle(actor: &ActorRef) {
    actor.ask(Message::query(ECHO, ())).await.unwrap();
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

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pulse_actors=debug")
        .with_test_writer()
        .try_init();
}
