//! Actor lifecycle state
//!
//! States only move forward: Created → Limbo → Running → Stopped → Terminated.
//! [`StateCell`] stores the state in one atomic byte and advances it with
//! `fetch_max`, so no interleaving can move an actor backwards.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Actor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ActorState {
    /// Allocated, not yet fully constructed
    Created = 0,
    /// Constructed, dispatch loop not started
    Limbo = 1,
    /// Dispatch loop scheduled on its domain
    Running = 2,
    /// Stop requested, loop draining
    Stopped = 3,
    /// Loop exited and post-stop hook ran
    Terminated = 4,
}

impl ActorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Limbo,
            2 => Self::Running,
            3 => Self::Stopped,
            _ => Self::Terminated,
        }
    }

    /// Whether the actor still accepts messages
    pub fn accepts_messages(self) -> bool {
        self <= Self::Running
    }

    pub fn is_finished(self) -> bool {
        self >= Self::Stopped
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Limbo => "limbo",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Monotonic atomic state holder
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ActorState::Created as u8))
    }

    pub(crate) fn load(&self) -> ActorState {
        ActorState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advance to `to` unless already at or past it; returns the previous state
    pub(crate) fn advance(&self, to: ActorState) -> ActorState {
        ActorState::from_u8(self.0.fetch_max(to as u8, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_state_never_moves_backwards() {
        let cell = StateCell::new();
        assert_eq!(cell.advance(ActorState::Limbo), ActorState::Created);
        assert_eq!(cell.advance(ActorState::Stopped), ActorState::Limbo);
        assert_eq!(cell.advance(ActorState::Running), ActorState::Stopped);
        assert_eq!(cell.load(), ActorState::Stopped);
    }

    #[test]
    fn test_message_acceptance() {
        assert!(ActorState::Limbo.accepts_messages());
        assert!(ActorState::Running.accepts_messages());
        assert!(!ActorState::Stopped.accepts_messages());
        assert!(ActorState::Terminated.is_finished());
    }

    proptest! {
        #[test]
        fn prop_state_is_running_max(steps in prop::collection::vec(0u8..5, 0..20)) {
            let cell = StateCell::new();
            let mut highest = ActorState::Created;
            for step in steps {
                let target = ActorState::from_u8(step);
                let previous = cell.advance(target);
                prop_assert_eq!(previous, highest);
                highest = highest.max(target);
                prop_assert_eq!(cell.load(), highest);
            }
        }
    }
}
