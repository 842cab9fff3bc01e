//! Actor mailbox
//!
//! Bounded FIFO channel of [`Letter`]s. Besides messages the mailbox carries
//! the control letters that must be serialized with message processing:
//! handler installs, shared-queue attach/detach and the poison sentinel.

use crate::error::{ActorError, Result};
use crate::message::Message;
use crate::metrics::SystemMetrics;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Item travelling through a mailbox
pub(crate) enum Letter {
    Deliver(Message),
    /// Boxed `HandlerEntry<B>` for the receiving behavior
    Install(Box<dyn Any + Send>),
    Attach(Arc<SharedQueue>),
    Detach,
    Poison,
}

/// Sending half, owned by the actor's shared state
#[derive(Debug, Clone)]
pub(crate) struct Mailbox {
    tx: mpsc::Sender<Letter>,
    capacity: usize,
}

/// Receiving half, owned by the dispatch loop
pub(crate) struct MailboxReceiver {
    rx: mpsc::Receiver<Letter>,
    shared: Option<Arc<SharedQueue>>,
}

impl Mailbox {
    pub(crate) fn new(capacity: usize) -> (Self, MailboxReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self { tx, capacity },
            MailboxReceiver { rx, shared: None },
        )
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue, waiting for capacity when the mailbox is full
    ///
    /// On failure the undelivered letter is handed back with the error.
    pub(crate) async fn send(
        &self,
        letter: Letter,
        metrics: &SystemMetrics,
    ) -> std::result::Result<(), Letter> {
        match self.tx.try_send(letter) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(letter)) => {
                metrics.record_mailbox_full();
                self.tx.send(letter).await.map_err(|e| e.0)
            }
            Err(mpsc::error::TrySendError::Closed(letter)) => Err(letter),
        }
    }

    /// Enqueue without waiting
    pub(crate) fn try_send(&self, letter: Letter) -> std::result::Result<(), (Letter, bool)> {
        match self.tx.try_send(letter) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(letter)) => Err((letter, true)),
            Err(mpsc::error::TrySendError::Closed(letter)) => Err((letter, false)),
        }
    }
}

impl MailboxReceiver {
    /// Next letter: own mailbox first, then the attached shared queue
    ///
    /// Returns `None` once every sender of the own mailbox is gone.
    pub(crate) async fn recv(&mut self) -> Option<Letter> {
        loop {
            let Some(queue) = self.shared.clone() else {
                return self.rx.recv().await;
            };

            tokio::select! {
                biased;

                letter = self.rx.recv() => return letter,
                msg = queue.pop() => match msg {
                    Some(msg) => return Some(Letter::Deliver(msg)),
                    // Router dropped the queue; keep serving the own mailbox
                    None => self.shared = None,
                },
            }
        }
    }

    pub(crate) fn attach(&mut self, queue: Arc<SharedQueue>) {
        self.shared = Some(queue);
    }

    pub(crate) fn detach(&mut self) {
        self.shared = None;
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.shared.is_some()
    }
}

/// Multi-consumer queue drained by every worker of a balancing router
///
/// Consumers take turns holding the receiver lock while waiting, so each
/// message is dequeued by exactly one worker. `pop` is cancel-safe: dropping
/// it while waiting releases the lock without losing a message.
#[derive(Debug)]
pub struct SharedQueue {
    tx: mpsc::Sender<Message>,
    rx: Mutex<mpsc::Receiver<Message>>,
    capacity: usize,
}

impl SharedQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    /// Enqueue, waiting for capacity; a rejected message is settled with the error
    pub async fn push(&self, msg: Message, owner: &str) -> Result<()> {
        self.tx.send(msg).await.map_err(|e| {
            e.0.reject(ActorError::mailbox_closed(owner));
            ActorError::mailbox_closed(owner)
        })
    }

    pub async fn pop(&self) -> Option<Message> {
        self.rx.lock().await.recv().await
    }

    /// Messages waiting to be dequeued
    pub fn depth(&self) -> usize {
        self.capacity - self.tx.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    const ITEM: MessageKind = MessageKind::new("test.item");

    fn message_value(letter: Letter) -> u32 {
        match letter {
            Letter::Deliver(msg) => *msg.payload_as::<u32>().unwrap(),
            _ => panic!("expected a message"),
        }
    }

    #[tokio::test]
    async fn test_mailbox_is_fifo() {
        let metrics = SystemMetrics::default();
        let (mailbox, mut receiver) = Mailbox::new(8);
        for i in 0..5u32 {
            assert!(mailbox.send(Letter::Deliver(Message::new(ITEM, i)), &metrics).await.is_ok());
        }
        for i in 0..5u32 {
            assert_eq!(message_value(receiver.recv().await.unwrap()), i);
        }
    }

    #[tokio::test]
    async fn test_try_send_reports_full() {
        let (mailbox, _receiver) = Mailbox::new(1);
        assert!(mailbox.try_send(Letter::Poison).is_ok());
        match mailbox.try_send(Letter::Poison) {
            Err((_, full)) => assert!(full),
            Ok(()) => panic!("second letter should not fit"),
        }
    }

    #[tokio::test]
    async fn test_own_mailbox_preferred_over_shared_queue() {
        let (mailbox, mut receiver) = Mailbox::new(4);
        let queue = Arc::new(SharedQueue::new(4));
        queue.push(Message::new(ITEM, 1u32), "router").await.unwrap();
        receiver.attach(Arc::clone(&queue));

        let metrics = SystemMetrics::default();
        assert!(mailbox.send(Letter::Poison, &metrics).await.is_ok());
        assert!(matches!(receiver.recv().await, Some(Letter::Poison)));
        assert_eq!(message_value(receiver.recv().await.unwrap()), 1);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_closed_mailbox_ends_receiver() {
        let (mailbox, mut receiver) = Mailbox::new(2);
        drop(mailbox);
        assert!(receiver.recv().await.is_none());
    }
}
