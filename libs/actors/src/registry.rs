//! Actor Registry
//!
//! Actor identity and name-based discovery. Identifiers come from a
//! monotonic sequence owned by the actor system; the directory maps names to
//! weak references and is used only for lookup, never for lifecycle. An
//! actor releases its name when it terminates.

use crate::actor::{ActorRef, WeakActorRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Unique actor identifier within one actor system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Name given to actors built without one
    pub fn default_name(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Monotonic source of [`ActorId`]s
#[derive(Debug, Default)]
pub struct NameSequence {
    next: AtomicU64,
}

impl NameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> ActorId {
        ActorId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Ids handed out so far
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Resolve an actor by its path
pub trait ActorLookup: Send + Sync {
    fn find(&self, path: &str) -> Option<ActorRef>;
}

/// Entries below this count are never swept
const SWEEP_FLOOR: usize = 64;

#[derive(Debug, Default)]
struct Entries {
    by_name: HashMap<String, WeakActorRef>,
    sweep_at: usize,
}

/// In-memory name → actor directory
#[derive(Debug, Default)]
pub struct ActorDirectory {
    entries: RwLock<Entries>,
}

impl ActorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `actor` under its name, replacing a previous holder
    ///
    /// Entries of dropped actors are swept whenever the directory has
    /// doubled since the last sweep.
    pub fn register(&self, actor: &ActorRef) {
        debug!(actor = %actor.name(), "Registering actor name");
        let mut entries = self.entries.write();
        entries
            .by_name
            .insert(actor.name().to_string(), actor.downgrade());

        if entries.by_name.len() >= entries.sweep_at.max(SWEEP_FLOOR) {
            let before = entries.by_name.len();
            entries.by_name.retain(|_, weak| !weak.is_gone());
            let swept = before - entries.by_name.len();
            if swept > 0 {
                debug!(swept, "Swept names of dropped actors");
            }
            entries.sweep_at = entries.by_name.len() * 2;
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.entries.write().by_name.remove(name).is_some()
    }

    /// Remove `actor`'s entry unless its name now belongs to another actor
    pub fn release(&self, actor: &ActorRef) -> bool {
        let mut entries = self.entries.write();
        let owned = entries
            .by_name
            .get(actor.name())
            .is_some_and(|weak| weak.refers_to(actor));
        if owned {
            entries.by_name.remove(actor.name());
        }
        owned
    }

    /// Drop entries whose actor no longer exists or has terminated
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.by_name.len();
        entries.by_name.retain(|_, weak| {
            weak.upgrade()
                .map(|actor| !actor.state().is_finished())
                .unwrap_or(false)
        });
        before - entries.by_name.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().by_name.is_empty()
    }
}

impl ActorLookup for ActorDirectory {
    fn find(&self, path: &str) -> Option<ActorRef> {
        self.entries
            .read()
            .by_name
            .get(path)
            .and_then(WeakActorRef::upgrade)
    }
}
