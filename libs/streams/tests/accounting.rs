//! Accounting Tests
//!
//! The latency feedback loop:
//! - Window mean pushed as the new tick interval on a heartbeat boundary
//! - Slowest edge wins, never below the floor
//! - Windows outlive a heartbeat; edges silent for several periods are
//!   forgotten so the interval returns to the floor
//! - Ticks registered at runtime and ticks that went away

mod common;

use common::*;
use pulse_actors::{Actor, ActorSystem, Message};
use pulse_streams::messages::{DEMAND, HEARTBEAT};
use pulse_streams::{wiring, Accounting, DemandSample};
use std::time::Duration;

async fn sample(accounting: &Actor<Accounting>, edge: &str, latency: Duration) {
    accounting
        .tell(Message::new(DEMAND, DemandSample::new(edge, latency)))
        .await
        .unwrap();
}

async fn heartbeat(accounting: &Actor<Accounting>) -> Duration {
    accounting
        .ask_as::<Duration>(Message::query(HEARTBEAT, ()))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_heartbeat_pushes_window_mean() {
    init_tracing();
    let system = ActorSystem::new().unwrap();
    let (tick, log) = spawn_spy(&system, "tick");
    let accounting = Accounting::builder()
        .tick(tick.actor_ref().clone())
        .heartbeat(Duration::from_secs(3600))
        .floor(ms(10))
        .spawn(&system)
        .unwrap();

    for latency in [100, 200, 300] {
        sample(&accounting, "e1", ms(latency)).await;
    }
    assert_eq!(heartbeat(&accounting).await, ms(200));

    eventually(|| log.intervals() == vec![ms(200)]).await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_boundary_then_idle_returns_to_floor() {
    let system = ActorSystem::new().unwrap();
    let (tick, log) = spawn_spy(&system, "tick");
    let accounting = Accounting::builder()
        .tick(tick.actor_ref().clone())
        .heartbeat(Duration::from_secs(1))
        .floor(ms(50))
        .spawn(&system)
        .unwrap();

    for latency in [100, 200, 300] {
        sample(&accounting, "e1", ms(latency)).await;
    }
    tokio::time::sleep(ms(500)).await;
    assert!(log.intervals().is_empty());

    // Crossing the boundary pushes the mean
    tokio::time::sleep(ms(600)).await;
    assert_eq!(log.intervals(), vec![ms(200)]);

    // The window survives a quiet heartbeat
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(log.intervals(), vec![ms(200), ms(200)]);

    // Three silent heartbeats drop the edge
    tokio::time::sleep(Duration::from_secs(2)).await;
    let intervals = log.intervals();
    assert_eq!(intervals.last(), Some(&ms(50)));
    assert!(intervals.iter().all(|&i| i == ms(200) || i == ms(50)));
}

#[tokio::test(start_paused = true)]
async fn test_latency_above_heartbeat_holds_interval() {
    let system = ActorSystem::new().unwrap();
    let (tick, log) = spawn_spy(&system, "tick");
    let accounting = Accounting::builder()
        .tick(tick.actor_ref().clone())
        .heartbeat(Duration::from_secs(1))
        .floor(ms(50))
        .spawn(&system)
        .unwrap();

    // One slow element every two heartbeats
    for _ in 0..5 {
        sample(&accounting, "e1", Duration::from_secs(2)).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let intervals = log.intervals();
    assert!(intervals.len() >= 5, "pushed {intervals:?}");
    assert!(intervals.iter().all(|&i| i == Duration::from_secs(2)), "pushed {intervals:?}");
}

#[tokio::test]
async fn test_slowest_edge_sets_interval_above_floor() {
    let system = ActorSystem::new().unwrap();
    let accounting = Accounting::builder()
        .heartbeat(Duration::from_secs(3600))
        .floor(ms(50))
        .spawn(&system)
        .unwrap();

    sample(&accounting, "fast", ms(20)).await;
    sample(&accounting, "slow", ms(300)).await;
    sample(&accounting, "slow", ms(100)).await;
    assert_eq!(heartbeat(&accounting).await, ms(200));

    for latency in [1, 2, 3] {
        sample(&accounting, "fast", ms(latency)).await;
    }
    // "slow" keeps its window while quiet for less than a heartbeat
    assert_eq!(heartbeat(&accounting).await, ms(200));
}

#[tokio::test]
async fn test_window_keeps_last_three_samples() {
    let system = ActorSystem::new().unwrap();
    let accounting = Accounting::builder()
        .heartbeat(Duration::from_secs(3600))
        .floor(Duration::ZERO)
        .spawn(&system)
        .unwrap();

    for latency in [900, 100, 200, 300] {
        sample(&accounting, "e1", ms(latency)).await;
    }
    assert_eq!(heartbeat(&accounting).await, ms(200));
}

#[tokio::test]
async fn test_subscribed_ticks_receive_pushes() {
    let system = ActorSystem::new().unwrap();
    let (first, first_log) = spawn_spy(&system, "first");
    let (second, second_log) = spawn_spy(&system, "second");
    let accounting = Accounting::builder()
        .heartbeat(Duration::from_secs(3600))
        .floor(ms(5))
        .spawn(&system)
        .unwrap();

    assert!(wiring::subscribe(accounting.actor_ref(), first.actor_ref()).await.unwrap());
    assert!(!wiring::subscribe(accounting.actor_ref(), first.actor_ref()).await.unwrap());
    assert!(wiring::subscribe(accounting.actor_ref(), second.actor_ref()).await.unwrap());
    heartbeat(&accounting).await;

    // A stopped tick is dropped without failing the push
    first.stop().await.unwrap();
    sample(&accounting, "e1", ms(40)).await;
    assert_eq!(heartbeat(&accounting).await, ms(40));

    eventually(|| second_log.intervals() == vec![ms(5), ms(40)]).await;
    assert_eq!(first_log.intervals(), vec![ms(5)]);

    assert!(wiring::unsubscribe(accounting.actor_ref(), second.actor_ref()).await.unwrap());
    assert!(!wiring::unsubscribe(accounting.actor_ref(), first.actor_ref()).await.unwrap());
}
