//! Wiring helpers for building pipelines out of running actors
//!
//! Each helper asks the actors involved, so the link is in place once the
//! call returns. `subscribe` also registers a tick with an accounting actor.

use crate::messages::{ADD_PROVIDER, REMOVE_PROVIDER, SUBSCRIBE, UNSUBSCRIBE};
use pulse_actors::{ActorRef, Message, Result};
use tracing::debug;

/// Add `subscriber` to `publisher`; `false` if it was already subscribed
pub async fn subscribe(publisher: &ActorRef, subscriber: &ActorRef) -> Result<bool> {
    let added = publisher
        .ask_as::<bool>(Message::query(SUBSCRIBE, subscriber.clone()))
        .await?;
    debug!(publisher = %publisher.name(), subscriber = %subscriber.name(), added, "Subscribe");
    Ok(added)
}

/// Remove `subscriber` from `publisher`; `false` if it was not subscribed
pub async fn unsubscribe(publisher: &ActorRef, subscriber: &ActorRef) -> Result<bool> {
    let removed = publisher
        .ask_as::<bool>(Message::query(UNSUBSCRIBE, subscriber.clone()))
        .await?;
    debug!(publisher = %publisher.name(), subscriber = %subscriber.name(), removed, "Unsubscribe");
    Ok(removed)
}

/// Link `upstream` to `downstream` in both directions
///
/// `downstream` receives what `upstream` publishes and pulls `upstream`
/// after every element it consumes.
pub async fn connect(upstream: &ActorRef, downstream: &ActorRef) -> Result<()> {
    subscribe(upstream, downstream).await?;
    downstream
        .ask_as::<bool>(Message::query(ADD_PROVIDER, upstream.clone()))
        .await?;
    Ok(())
}

/// Undo [`connect`]
pub async fn disconnect(upstream: &ActorRef, downstream: &ActorRef) -> Result<()> {
    downstream
        .ask_as::<bool>(Message::query(REMOVE_PROVIDER, upstream.clone()))
        .await?;
    unsubscribe(upstream, downstream).await?;
    Ok(())
}
