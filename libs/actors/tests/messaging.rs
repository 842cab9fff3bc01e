//! Tell/Ask Messaging Tests
//!
//! Covers the messaging protocol between actors:
//! - Reply correlation under concurrent askers
//! - Fault containment for failing and panicking handlers
//! - Mailbox capacity, FIFO delivery and runtime handler registration
//! - Sender stamping and delayed self-delivery

mod common;

use common::*;
use pulse_actors::{empty, payload, ActorError, ActorSystem, Message, MessageKind};
use std::time::Duration;

#[tokio::test]
async fn test_ask_returns_handler_reply() {
    let system = ActorSystem::new().unwrap();
    let (actor, _journal) = spawn_recorder(&system, "echo");

    let reply: String = actor
        .ask_as(Message::query(ECHO, "ping".to_string()))
        .await
        .unwrap();
    assert_eq!(reply, "ping");

    let name: String = actor.ask_as(Message::query(WHO, ())).await.unwrap();
    assert_eq!(name, "echo");
}

#[tokio::test]
async fn test_ask_rejects_plain_message() {
    let system = ActorSystem::new().unwrap();
    let (actor, _journal) = spawn_recorder(&system, "strict");

    let err = actor.ask(Message::new(ECHO, ())).await.unwrap_err();
    assert!(matches!(err, ActorError::WrongMessageKind { .. }));
}

#[tokio::test]
async fn test_reply_type_mismatch_is_reported() {
    let system = ActorSystem::new().unwrap();
    let (actor, _journal) = spawn_recorder(&system, "typed");

    let err = actor
        .ask_as::<u64>(Message::query(ECHO, "not a number".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ActorError::PayloadType { .. }));
}

#[tokio::test]
async fn test_missing_handler_is_contained() {
    const UNKNOWN: MessageKind = MessageKind::new("test.unknown");
    let system = ActorSystem::new().unwrap();
    let (actor, journal) = spawn_recorder(&system, "partial");

    let err = actor.ask(Message::query(UNKNOWN, ())).await.unwrap_err();
    assert!(matches!(err, ActorError::HandlerNotFound { .. }));

    // A plain message without a handler is logged and swallowed
    actor.tell(Message::signal(UNKNOWN)).await.unwrap();
    actor.tell(Message::new(WORK, 3u32)).await.unwrap();
    settle(&actor).await;

    assert_eq!(journal.seen(), vec![3]);
    assert_eq!(system.stats().unhandled_messages, 2);
}

#[tokio::test]
async fn test_failing_and_panicking_handlers_do_not_stop_the_loop() {
    let system = ActorSystem::new().unwrap();
    let (actor, journal) = spawn_recorder(&system, "fragile");

    let failed = actor.ask(Message::query(FAIL, ())).await.unwrap_err();
    assert!(matches!(failed, ActorError::Handler { .. }));

    let panicked = actor.ask(Message::query(PANIC, ())).await.unwrap_err();
    assert!(panicked.to_string().contains("requested panic"));

    actor.tell(Message::signal(FAIL)).await.unwrap();
    actor.tell(Message::signal(PANIC)).await.unwrap();
    actor.tell(Message::new(WORK, 9u32)).await.unwrap();
    settle(&actor).await;

    assert!(actor.is_running());
    assert_eq!(journal.seen(), vec![9]);
    assert_eq!(system.stats().handler_failures, 4);
}

#[tokio::test]
async fn test_concurrent_askers_get_their_own_replies() {
    let system = ActorSystem::new().unwrap();
    let (actor, _journal) = spawn_recorder(&system, "shared");

    let mut tasks = Vec::new();
    for i in 0..64u32 {
        let actor = actor.actor_ref().clone();
        tasks.push(tokio::spawn(async move {
            let reply: u32 = actor.ask_as(Message::query(ECHO, i)).await.unwrap();
            (i, reply)
        }));
    }

    for task in tasks {
        let (sent, received) = task.await.unwrap();
        assert_eq!(sent, received);
    }
}

#[tokio::test]
async fn test_sequential_tells_are_fifo() {
    let system = ActorSystem::new().unwrap();
    let (actor, journal) = spawn_recorder(&system, "ordered");

    for i in 0..1_000u32 {
        actor.tell(Message::new(WORK, i)).await.unwrap();
    }
    settle(&actor).await;

    assert_eq!(journal.seen(), (0..1_000).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_try_tell_reports_full_mailbox() {
    let system = ActorSystem::new().unwrap();
    let (recorder, journal) = Recorder::new();
    let actor = system.actor_of(recorder).mailbox_capacity(2).build();

    // Limbo actors accept messages; nothing drains them yet
    actor.try_tell(Message::new(WORK, 1u32)).unwrap();
    actor.try_tell(Message::new(WORK, 2u32)).unwrap();
    let err = actor.try_tell(Message::new(WORK, 3u32)).unwrap_err();
    assert!(matches!(err, ActorError::MailboxFull { capacity: 2, .. }));

    actor.start().unwrap();
    settle(&actor).await;
    assert_eq!(journal.seen(), vec![1, 2]);
    assert_eq!(system.stats().mailbox_full_events, 1);
}

#[tokio::test]
async fn test_tell_waits_for_capacity() {
    let system = ActorSystem::new().unwrap();
    let (actor, journal) = {
        let (recorder, journal) = Recorder::new();
        (system.actor_of(recorder).mailbox_capacity(1).spawn().unwrap(), journal)
    };

    for i in 0..50u32 {
        actor.tell(Message::new(WORK, i)).await.unwrap();
    }
    settle(&actor).await;
    assert_eq!(journal.count(), 50);
}

#[tokio::test]
async fn test_registered_handler_applies_to_later_messages() {
    const DOUBLE: MessageKind = MessageKind::new("test.double");
    let system = ActorSystem::new().unwrap();
    let actor = system.spawn(()).unwrap();

    let before = actor.ask(Message::query(DOUBLE, 4u32)).await.unwrap_err();
    assert!(matches!(before, ActorError::HandlerNotFound { .. }));

    actor
        .register_handler(DOUBLE, |_, msg, _| {
            let value = msg.payload_as::<u32>().map(|v| v * 2);
            Box::pin(async move { value.map(payload) })
        })
        .await
        .unwrap();
    let doubled: u32 = actor.ask_as(Message::query(DOUBLE, 4u32)).await.unwrap();
    assert_eq!(doubled, 8);

    // Last registration wins
    actor
        .register_handler(DOUBLE, |_, _, _| Box::pin(async { Ok(payload(0u32)) }))
        .await
        .unwrap();
    let replaced: u32 = actor.ask_as(Message::query(DOUBLE, 4u32)).await.unwrap();
    assert_eq!(replaced, 0);
}

#[tokio::test]
async fn test_context_ask_stamps_sender() {
    const RELAY: MessageKind = MessageKind::new("test.relay");
    let system = ActorSystem::new().unwrap();
    let (target, _journal) = spawn_recorder(&system, "target");

    let relay_target = target.actor_ref().clone();
    let relay = system
        .actor_of(())
        .name("relay")
        .handler(RELAY, move |_, _, ctx| {
            let target = relay_target.clone();
            Box::pin(async move { ctx.ask(&target, Message::query(SENDER, ())).await })
        })
        .spawn()
        .unwrap();

    let sender: String = relay.ask_as(Message::query(RELAY, ())).await.unwrap();
    assert_eq!(sender, "relay");

    // An explicit sender is kept
    let explicit: String = target
        .ask_as(Message::query(SENDER, ()).with_sender(relay.actor_ref()))
        .await
        .unwrap();
    assert_eq!(explicit, "relay");
}

#[tokio::test(start_paused = true)]
async fn test_schedule_once_delivers_after_delay() {
    const LATER: MessageKind = MessageKind::new("test.later");
    let system = ActorSystem::new().unwrap();
    let (actor, journal) = spawn_recorder(&system, "patient");
    actor
        .register_handler(LATER, |_, msg, ctx| {
            let value = msg.payload_as::<u32>().copied();
            let scheduled = value.map(|v| {
                ctx.schedule_once(Duration::from_secs(5), Message::new(WORK, v));
            });
            Box::pin(async move { scheduled.map(|_| empty()) })
        })
        .await
        .unwrap();

    actor.tell(Message::new(LATER, 42u32)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    settle(&actor).await;
    assert!(journal.seen().is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle(&actor).await;
    assert_eq!(journal.seen(), vec![42]);
}
