//! Actor Messages
//!
//! A [`Message`] is a kind tag, a shared payload and an optional weak sender
//! reference. Payloads travel as `Arc<dyn Any + Send + Sync>` so a broadcast
//! shares one allocation across every recipient.
//!
//! Two deliveries exist:
//! - **Plain**: fire-and-forget; a handler failure is logged and swallowed
//! - **Query**: carries a [`ReplySlot`] attached by `ask`; the slot is settled
//!   exactly once, by the handler's outcome or, if the message is dropped
//!   unanswered, with [`ActorError::ReplyDropped`]

use crate::actor::{ActorRef, WeakActorRef};
use crate::error::{ActorError, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Name resolving a message to its handler
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKind(&'static str);

impl MessageKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageKind({})", self.0)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Shared, type-erased message payload
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Wrap a value as a payload
pub fn payload<T: Any + Send + Sync>(value: T) -> Payload {
    Arc::new(value)
}

/// The unit payload, used by signals and by handlers with nothing to return
pub fn empty() -> Payload {
    Arc::new(())
}

/// Delivery mode of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Plain,
    Query,
}

/// Single-use payload for values that must be moved out by the receiver
///
/// Shared payloads are read through `&T`; a parcel hands its value to the
/// first [`Message::take_parcel`] call and is empty afterwards.
pub struct Parcel<T>(Mutex<Option<T>>);

impl<T> Parcel<T> {
    pub fn new(value: T) -> Self {
        Self(Mutex::new(Some(value)))
    }

    pub fn take(&self) -> Option<T> {
        self.0.lock().take()
    }
}

/// Sending half of a Query's reply
pub struct ReplySlot {
    kind: MessageKind,
    tx: Option<oneshot::Sender<Result<Payload>>>,
}

impl ReplySlot {
    /// Settle the slot; returns `false` if the asker is no longer waiting
    pub fn settle(mut self, outcome: Result<Payload>) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

impl Drop for ReplySlot {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(ActorError::reply_dropped(self.kind)));
        }
    }
}

impl fmt::Debug for ReplySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySlot")
            .field("kind", &self.kind)
            .field("pending", &self.tx.is_some())
            .finish()
    }
}

/// Receiving half of a Query's reply
#[derive(Debug)]
pub struct ReplyReceiver {
    kind: MessageKind,
    rx: oneshot::Receiver<Result<Payload>>,
}

impl ReplyReceiver {
    /// Wait for the reply slot to be settled
    pub async fn recv(self) -> Result<Payload> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActorError::reply_dropped(self.kind)),
        }
    }
}

/// Downcast a reply payload, cloning only when the payload is still shared
pub fn downcast_payload<T: Any + Send + Sync + Clone>(payload: Payload, kind: MessageKind) -> Result<T> {
    payload
        .downcast::<T>()
        .map(|value| Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()))
        .map_err(|_| ActorError::payload_type::<T>(kind))
}

/// Unit of communication between actors
pub struct Message {
    kind: MessageKind,
    payload: Payload,
    sender: Option<WeakActorRef>,
    delivery: Delivery,
    reply: Option<ReplySlot>,
}

impl Message {
    /// Plain message carrying `value`
    pub fn new<T: Any + Send + Sync>(kind: MessageKind, value: T) -> Self {
        Self::from_payload(kind, payload(value), Delivery::Plain)
    }

    /// Query message carrying `value`
    pub fn query<T: Any + Send + Sync>(kind: MessageKind, value: T) -> Self {
        Self::from_payload(kind, payload(value), Delivery::Query)
    }

    /// Plain message without a payload
    pub fn signal(kind: MessageKind) -> Self {
        Self::from_payload(kind, empty(), Delivery::Plain)
    }

    /// Plain message carrying a single-use [`Parcel`]
    pub fn parcel<T: Send + 'static>(kind: MessageKind, value: T) -> Self {
        Self::from_payload(kind, Arc::new(Parcel::new(value)), Delivery::Plain)
    }

    /// Query message carrying a single-use [`Parcel`]
    pub fn query_parcel<T: Send + 'static>(kind: MessageKind, value: T) -> Self {
        Self::from_payload(kind, Arc::new(Parcel::new(value)), Delivery::Query)
    }

    pub fn from_payload(kind: MessageKind, payload: Payload, delivery: Delivery) -> Self {
        Self {
            kind,
            payload,
            sender: None,
            delivery,
            reply: None,
        }
    }

    /// Record `sender` for reply routing
    pub fn with_sender(mut self, sender: &ActorRef) -> Self {
        self.sender = Some(sender.downgrade());
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn is_query(&self) -> bool {
        self.delivery == Delivery::Query
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The sender, if one was recorded and is still alive
    pub fn sender(&self) -> Option<ActorRef> {
        self.sender.as_ref().and_then(WeakActorRef::upgrade)
    }

    pub fn has_sender(&self) -> bool {
        self.sender.is_some()
    }

    /// Borrow the payload as `T`
    pub fn payload_as<T: Any>(&self) -> Result<&T> {
        self.payload
            .downcast_ref::<T>()
            .ok_or_else(|| ActorError::payload_type::<T>(self.kind))
    }

    /// Move the value out of a [`Parcel`] payload
    pub fn take_parcel<T: Send + 'static>(&self) -> Result<T> {
        self.payload_as::<Parcel<T>>()?
            .take()
            .ok_or_else(|| ActorError::handler(format!("parcel in '{}' already taken", self.kind)))
    }

    /// Copy of this message sharing its payload, without the reply slot
    pub fn duplicate(&self) -> Self {
        Self {
            kind: self.kind,
            payload: Arc::clone(&self.payload),
            sender: self.sender.clone(),
            delivery: self.delivery,
            reply: None,
        }
    }

    /// Whether a reply slot is attached and unsettled
    pub fn awaits_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Settle the reply slot, if any, with `error`
    pub fn reject(mut self, error: ActorError) {
        if let Some(slot) = self.reply.take() {
            slot.settle(Err(error));
        }
    }

    /// Attach a fresh reply slot and return its receiving half
    pub(crate) fn attach_reply(&mut self) -> ReplyReceiver {
        let (tx, rx) = oneshot::channel();
        self.reply = Some(ReplySlot {
            kind: self.kind,
            tx: Some(tx),
        });
        ReplyReceiver {
            kind: self.kind,
            rx,
        }
    }

    pub(crate) fn take_reply(&mut self) -> Option<ReplySlot> {
        self.reply.take()
    }

    /// Record `sender` unless a sender is already set
    pub(crate) fn stamp_sender(&mut self, sender: &WeakActorRef) {
        if self.sender.is_none() {
            self.sender = Some(sender.clone());
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("delivery", &self.delivery)
            .field("has_sender", &self.sender.is_some())
            .field("awaits_reply", &self.reply.is_some())
            .finish()
    }
}
