//! Subscriber and provider sets with wrap-around cursors

use pulse_actors::{ActorContext, ActorRef, Delivery, Message, MessageKind, Payload};
use tracing::debug;

/// How a publisher spreads each element over its subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOut {
    /// One subscriber per element, in turn
    #[default]
    RoundRobin,
    /// Every subscriber receives every element
    Broadcast,
}

/// Downstream actors of a publisher
#[derive(Debug, Default)]
pub struct Subscribers {
    targets: Vec<ActorRef>,
    cursor: usize,
    fan_out: FanOut,
}

impl Subscribers {
    pub fn new(fan_out: FanOut) -> Self {
        Self {
            targets: Vec::new(),
            cursor: 0,
            fan_out,
        }
    }

    pub fn fan_out(&self) -> FanOut {
        self.fan_out
    }

    /// Add `target`; returns `false` if it was already subscribed
    pub fn add(&mut self, target: ActorRef) -> bool {
        if self.targets.contains(&target) {
            return false;
        }
        self.targets.push(target);
        true
    }

    pub fn remove(&mut self, target: &ActorRef) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| t != target);
        if self.cursor >= self.targets.len() {
            self.cursor = 0;
        }
        before != self.targets.len()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Send `payload` under `kind` according to the fan-out policy
    ///
    /// Subscribers that refuse the message are dropped. Returns the number
    /// of deliveries.
    pub async fn publish(&mut self, ctx: &ActorContext, kind: MessageKind, payload: Payload) -> usize {
        match self.fan_out {
            FanOut::RoundRobin => {
                while !self.targets.is_empty() {
                    let index = self.cursor % self.targets.len();
                    self.cursor = (index + 1) % self.targets.len();
                    let target = self.targets[index].clone();
                    let msg = Message::from_payload(kind, payload.clone(), Delivery::Plain);
                    if self.deliver(ctx, &target, msg).await {
                        return 1;
                    }
                }
                0
            }
            FanOut::Broadcast => self.broadcast(ctx, kind, payload).await,
        }
    }

    /// Send `payload` to every subscriber regardless of the policy
    pub async fn broadcast(&mut self, ctx: &ActorContext, kind: MessageKind, payload: Payload) -> usize {
        let mut delivered = 0;
        for target in self.targets.clone() {
            let msg = Message::from_payload(kind, payload.clone(), Delivery::Plain);
            if self.deliver(ctx, &target, msg).await {
                delivered += 1;
            }
        }
        delivered
    }

    async fn deliver(&mut self, ctx: &ActorContext, target: &ActorRef, msg: Message) -> bool {
        match ctx.tell(target, msg).await {
            Ok(()) => true,
            Err(e) => {
                debug!(publisher = %ctx.name(), subscriber = %target.name(), error = %e, "Dropping subscriber");
                self.remove(target);
                false
            }
        }
    }
}

/// Upstream actors a consumer pulls from, in turn
#[derive(Debug, Default)]
pub struct Providers {
    providers: Vec<ActorRef>,
    cursor: usize,
}

impl Providers {
    pub fn new(providers: Vec<ActorRef>) -> Self {
        let mut set = Self::default();
        for provider in providers {
            set.add(provider);
        }
        set
    }

    pub fn add(&mut self, provider: ActorRef) -> bool {
        if self.providers.contains(&provider) {
            return false;
        }
        self.providers.push(provider);
        true
    }

    pub fn remove(&mut self, provider: &ActorRef) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| p != provider);
        if self.cursor >= self.providers.len() {
            self.cursor = 0;
        }
        before != self.providers.len()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Next provider in turn; the cursor wraps to the first
    pub fn next(&mut self) -> Option<ActorRef> {
        if self.providers.is_empty() {
            return None;
        }
        let index = self.cursor % self.providers.len();
        self.cursor = (index + 1) % self.providers.len();
        Some(self.providers[index].clone())
    }

    /// Send a pull to the next provider, dropping providers that refuse it
    pub async fn pull(&mut self, ctx: &ActorContext, kind: MessageKind) -> bool {
        while let Some(provider) = self.next() {
            match ctx.tell(&provider, Message::signal(kind)).await {
                Ok(()) => return true,
                Err(e) => {
                    debug!(consumer = %ctx.name(), provider = %provider.name(), error = %e, "Dropping provider");
                    self.remove(&provider);
                }
            }
        }
        false
    }
}
