//! Actor Lifecycle Tests
//!
//! Exercises the lifecycle state machine end to end:
//! - Limbo → Running → Stopped → Terminated, never backwards
//! - Graceful drain of queued messages on stop
//! - Stop escalation when a handler outlives the stop timeout
//! - Self-termination and reclamation of unreferenced actors

mod common;

use common::*;
use pulse_actors::{
    async_trait, ActorContext, ActorError, ActorState, ActorSystem, Behavior, Message, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_start_stop_visits_each_state_once() {
    init_tracing();
    let system = ActorSystem::new().unwrap();
    let (recorder, journal) = Recorder::new();
    let actor = system.actor_of(recorder).name("lifecycle").build();

    assert_eq!(actor.state(), ActorState::Limbo);
    actor.start().unwrap();
    assert_eq!(actor.state(), ActorState::Running);

    // A second start on a running actor is a no-op
    actor.start().unwrap();
    assert_eq!(actor.state(), ActorState::Running);

    actor.stop().await.unwrap();
    assert_eq!(actor.state(), ActorState::Terminated);
    assert!(journal.post_stop_ran());

    // Never back to Running
    assert!(matches!(actor.start(), Err(ActorError::ActorState { .. })));
    assert_eq!(actor.state(), ActorState::Terminated);

    // Stop is idempotent
    actor.stop().await.unwrap();

    let stats = system.stats();
    assert_eq!(stats.actors_spawned, 1);
    assert_eq!(stats.actors_stopped, 1);
}

#[tokio::test]
async fn test_stop_drains_messages_queued_before_it() {
    let system = ActorSystem::new().unwrap();
    let (actor, journal) = spawn_recorder(&system, "drain");

    for i in 0..500u32 {
        actor.tell(Message::new(WORK, i)).await.unwrap();
    }
    actor.stop().await.unwrap();

    assert_eq!(journal.seen(), (0..500).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_stop_before_start_terminates_without_running() {
    let system = ActorSystem::new().unwrap();
    let (recorder, journal) = Recorder::new();
    let actor = system.actor_of(recorder).build();

    actor.stop().await.unwrap();
    assert_eq!(actor.state(), ActorState::Terminated);
    assert!(!journal.post_stop_ran());
    assert!(actor.start().is_err());
}

#[tokio::test]
async fn test_tell_after_stop_is_refused() {
    let system = ActorSystem::new().unwrap();
    let (actor, _journal) = spawn_recorder(&system, "refuses");
    actor.stop().await.unwrap();

    let err = actor.tell(Message::new(WORK, 1u32)).await.unwrap_err();
    assert!(matches!(
        err,
        ActorError::ActorState {
            state: ActorState::Terminated,
            ..
        }
    ));
    assert!(actor.ask(Message::query(ECHO, ())).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_stop_timeout_aborts_stuck_loop() {
    let system = ActorSystem::new().unwrap();
    let (recorder, journal) = Recorder::new();
    let actor = system
        .actor_of(recorder)
        .name("stuck")
        .stop_timeout(Some(Duration::from_millis(50)))
        .spawn()
        .unwrap();

    actor.tell(Message::new(SLOW, 60_000u64)).await.unwrap();
    let err = actor.stop().await.unwrap_err();

    assert!(matches!(err, ActorError::Timeout { timeout_ms: 50, .. }));
    assert_eq!(actor.state(), ActorState::Terminated);
    assert!(!journal.post_stop_ran());
    assert_eq!(system.stats().forced_stops, 1);
}

#[tokio::test]
async fn test_stop_self_ends_loop_after_current_message() {
    let system = ActorSystem::new().unwrap();
    let (actor, journal) = spawn_recorder(&system, "quitter");

    actor.tell(Message::new(WORK, 1u32)).await.unwrap();
    actor.ask(Message::query(STOP_SELF, ())).await.unwrap();

    eventually(|| actor.state() == ActorState::Terminated).await;
    assert!(journal.post_stop_ran());
    assert_eq!(journal.seen(), vec![1]);
}

#[tokio::test]
async fn test_queued_queries_rejected_when_loop_exits() {
    let system = ActorSystem::new().unwrap();
    let (actor, _journal) = spawn_recorder(&system, "abandons");

    actor.tell(Message::new(STOP_SELF, ())).await.unwrap();
    let pending = actor.ask(Message::query(ECHO, 5u32)).await;

    // Either refused at the door or dropped with the mailbox
    assert!(matches!(
        pending,
        Err(ActorError::ReplyDropped { .. })
            | Err(ActorError::ActorState { .. })
            | Err(ActorError::MailboxClosed { .. })
    ));
}

struct FailsToStart;

#[async_trait]
impl Behavior for FailsToStart {
    async fn pre_start(&mut self, _ctx: &ActorContext) -> Result<()> {
        Err(ActorError::configuration_missing("FailsToStart", "upstream"))
    }
}

#[tokio::test]
async fn test_pre_start_failure_terminates_actor() {
    let system = ActorSystem::new().unwrap();
    let actor = system.spawn(FailsToStart).unwrap();

    eventually(|| actor.state() == ActorState::Terminated).await;
    assert!(actor.tell(Message::signal(WORK)).await.is_err());
}

struct Flagged {
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl Behavior for Flagged {
    async fn post_stop(&mut self, _ctx: &ActorContext) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_unreferenced_actor_is_reclaimed() {
    let system = ActorSystem::new().unwrap();
    let stopped = Arc::new(AtomicBool::new(false));
    let actor = system
        .actor_of(Flagged {
            stopped: Arc::clone(&stopped),
        })
        .name("orphan")
        .spawn()
        .unwrap();
    let weak = actor.downgrade();

    drop(actor);

    eventually(|| stopped.load(Ordering::SeqCst)).await;
    assert!(weak.upgrade().is_none());
    assert!(system.lookup("orphan").is_none());
}
