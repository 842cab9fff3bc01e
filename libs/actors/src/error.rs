//! Actor Error Types
//!
//! Errors surfaced by the actor runtime, its routers and the behaviors built
//! on top of it. Handler failures never escape a dispatch loop: they reach the
//! caller only through a rejected Query reply.

use crate::message::MessageKind;
use crate::state::ActorState;
use thiserror::Error;

/// Main actor error type
#[derive(Error, Debug)]
pub enum ActorError {
    /// No handler registered for the message kind
    #[error("Handler not found: actor '{actor}' has no handler for '{kind}'")]
    HandlerNotFound { actor: String, kind: MessageKind },

    /// Operation not permitted in the actor's current state
    #[error("Actor state error: {actor} is {state}: {message}")]
    ActorState {
        actor: String,
        state: ActorState,
        message: String,
    },

    /// Plain message given where a Query is required, or the reverse
    #[error("Wrong message kind: expected {expected} message, got '{kind}'")]
    WrongMessageKind {
        expected: &'static str,
        kind: MessageKind,
    },

    /// Required collaborator missing at construction time
    #[error("Configuration missing: {component} requires '{field}'")]
    ConfigurationMissing {
        component: &'static str,
        field: &'static str,
    },

    /// Handler returned an error or panicked
    #[error("Handler error: {message}")]
    Handler {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Payload is not of the requested type
    #[error("Payload type error: '{kind}' does not carry a {expected}")]
    PayloadType {
        kind: MessageKind,
        expected: &'static str,
    },

    /// Mailbox receiver is gone
    #[error("Mailbox closed: {actor}")]
    MailboxClosed { actor: String },

    /// Mailbox at capacity (non-waiting sends only)
    #[error("Mailbox full: {actor} (capacity {capacity})")]
    MailboxFull { actor: String, capacity: usize },

    /// Reply slot dropped without being settled
    #[error("Reply dropped: no reply will arrive for '{kind}'")]
    ReplyDropped { kind: MessageKind },

    /// Router has no workers to route to
    #[error("No routees: router '{router}' has no workers")]
    NoRoutees { router: String },

    /// Bounded operation exceeded its limit
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Loop domain or bridge failure
    #[error("Domain error: {message}")]
    Domain { message: String },
}

/// Result type alias for actor operations
pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    pub fn handler_not_found(actor: impl Into<String>, kind: MessageKind) -> Self {
        Self::HandlerNotFound {
            actor: actor.into(),
            kind,
        }
    }

    pub fn actor_state(
        actor: impl Into<String>,
        state: ActorState,
        message: impl Into<String>,
    ) -> Self {
        Self::ActorState {
            actor: actor.into(),
            state,
            message: message.into(),
        }
    }

    /// A Query was required
    pub fn expected_query(kind: MessageKind) -> Self {
        Self::WrongMessageKind {
            expected: "Query",
            kind,
        }
    }

    /// A Plain message was required
    pub fn expected_plain(kind: MessageKind) -> Self {
        Self::WrongMessageKind {
            expected: "Plain",
            kind,
        }
    }

    pub fn configuration_missing(component: &'static str, field: &'static str) -> Self {
        Self::ConfigurationMissing { component, field }
    }

    /// Create a handler error
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            source: None,
        }
    }

    /// Create a handler error with source
    pub fn handler_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Handler {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn payload_type<T>(kind: MessageKind) -> Self {
        Self::PayloadType {
            kind,
            expected: std::any::type_name::<T>(),
        }
    }

    pub fn mailbox_closed(actor: impl Into<String>) -> Self {
        Self::MailboxClosed {
            actor: actor.into(),
        }
    }

    pub fn mailbox_full(actor: impl Into<String>, capacity: usize) -> Self {
        Self::MailboxFull {
            actor: actor.into(),
            capacity,
        }
    }

    pub fn reply_dropped(kind: MessageKind) -> Self {
        Self::ReplyDropped { kind }
    }

    pub fn no_routees(router: impl Into<String>) -> Self {
        Self::NoRoutees {
            router: router.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }

    /// Short category name for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::HandlerNotFound { .. } => "handler_not_found",
            Self::ActorState { .. } => "actor_state",
            Self::WrongMessageKind { .. } => "wrong_message_kind",
            Self::ConfigurationMissing { .. } => "configuration_missing",
            Self::Handler { .. } => "handler",
            Self::PayloadType { .. } => "payload_type",
            Self::MailboxClosed { .. } => "mailbox_closed",
            Self::MailboxFull { .. } => "mailbox_full",
            Self::ReplyDropped { .. } => "reply_dropped",
            Self::NoRoutees { .. } => "no_routees",
            Self::Timeout { .. } => "timeout",
            Self::Domain { .. } => "domain",
        }
    }

    /// Whether retrying the same operation later can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MailboxFull { .. } | Self::NoRoutees { .. } | Self::Timeout { .. }
        )
    }
}

impl From<anyhow::Error> for ActorError {
    fn from(error: anyhow::Error) -> Self {
        Self::Handler {
            message: format!("{:#}", error),
            source: Some(error.into()),
        }
    }
}
