//! Actor System
//!
//! Factory and owner of shared runtime resources: the monotonic name
//! sequence, the loop-domain pool, the name directory and system metrics.
//! There is no process-wide state; every actor is created through a system.
//!
//! ## Domain selection
//!
//! Actors run on the domain given to their builder, otherwise on the
//! system's default domain: the runtime the system was created on, or, when
//! created outside any runtime, the first dedicated domain of the pool.

use crate::actor::{Actor, ActorRef, ActorSpec};
use crate::behavior::{Behavior, HandlerEntry, HandlerFuture, HandlerTable};
use crate::context::ActorContext;
use crate::domain::{DomainHandle, DomainPool};
use crate::error::{ActorError, Result};
use crate::message::{Message, MessageKind};
use crate::metrics::{SystemMetrics, SystemStats};
use crate::registry::{ActorDirectory, ActorLookup, NameSequence};
use parking_lot::Mutex;
use pulse_config::{defaults, PulseConfig, RouterSettings, RuntimeSettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Core actor system managing actor creation and loop domains
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

struct SystemInner {
    /// System ID for debugging
    system_id: String,
    names: NameSequence,
    default_domain: DomainHandle,
    domains: Mutex<DomainPool>,
    directory: Arc<ActorDirectory>,
    metrics: Arc<SystemMetrics>,
    runtime: RuntimeSettings,
    router: RouterSettings,
}

impl ActorSystem {
    /// Create a system with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(RuntimeSettings::default(), RouterSettings::default())
    }

    /// Create a system from loaded configuration
    pub fn from_config(config: &PulseConfig) -> Result<Self> {
        Self::with_settings(config.runtime.clone(), config.router.clone())
    }

    pub fn with_settings(runtime: RuntimeSettings, router: RouterSettings) -> Result<Self> {
        let system_id = format!("system-{}", Uuid::new_v4().simple());

        let mut domains = DomainPool::new(
            runtime.domain_thread_prefix.clone(),
            Duration::from_millis(defaults::runtime::DOMAIN_SHUTDOWN_GRACE_MS),
        );
        for _ in 0..runtime.loop_domains {
            domains.create_domain()?;
        }

        let default_domain = match DomainHandle::current() {
            Ok(ambient) => ambient,
            Err(_) => match domains.get(0) {
                Some(first) => first,
                None => domains.create_domain()?,
            },
        };

        info!(
            system_id = %system_id,
            default_domain = %default_domain.label(),
            loop_domains = domains.len(),
            mailbox_capacity = runtime.mailbox_capacity,
            "Creating new actor system"
        );

        Ok(Self {
            inner: Arc::new(SystemInner {
                system_id,
                names: NameSequence::new(),
                default_domain,
                domains: Mutex::new(domains),
                directory: Arc::new(ActorDirectory::new()),
                metrics: Arc::new(SystemMetrics::default()),
                runtime,
                router,
            }),
        })
    }

    pub fn system_id(&self) -> &str {
        &self.inner.system_id
    }

    /// Start building an actor running `behavior`
    pub fn actor_of<B: Behavior>(&self, behavior: B) -> ActorBuilder<'_, B> {
        ActorBuilder {
            system: self,
            behavior,
            name: None,
            domain: None,
            mailbox_capacity: None,
            stop_timeout: None,
            handlers: HandlerTable::new(),
        }
    }

    /// Build and start an actor with default options
    pub fn spawn<B: Behavior>(&self, behavior: B) -> Result<Actor<B>> {
        self.actor_of(behavior).spawn()
    }

    pub fn default_domain(&self) -> &DomainHandle {
        &self.inner.default_domain
    }

    /// Start one more dedicated loop domain
    pub fn create_domain(&self) -> Result<DomainHandle> {
        self.inner.domains.lock().create_domain()
    }

    /// Shut down a dedicated loop domain; actors bound to it stop running
    pub fn remove_domain(&self, label: &str) -> Result<bool> {
        if label == self.inner.default_domain.label() {
            return Err(ActorError::domain(format!(
                "{} is the default domain of {}",
                label, self.inner.system_id
            )));
        }
        self.inner.domains.lock().remove(label)
    }

    pub fn domains(&self) -> Vec<DomainHandle> {
        self.inner.domains.lock().handles()
    }

    /// Find a live actor by name
    pub fn lookup(&self, name: &str) -> Option<ActorRef> {
        self.inner.directory.find(name)
    }

    /// Lookup capability to hand to collaborators
    pub fn lookup_capability(&self) -> Arc<dyn ActorLookup> {
        Arc::clone(&self.inner.directory) as Arc<dyn ActorLookup>
    }

    pub fn metrics(&self) -> Arc<SystemMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn stats(&self) -> SystemStats {
        self.inner.metrics.snapshot()
    }

    pub fn runtime_settings(&self) -> &RuntimeSettings {
        &self.inner.runtime
    }

    pub fn router_settings(&self) -> &RouterSettings {
        &self.inner.router
    }

    /// Shut down every dedicated loop domain
    ///
    /// Actors should be stopped first; loops still parked on a dedicated
    /// domain are dropped with it.
    pub async fn shutdown(&self) -> Result<()> {
        let mut pool = {
            let mut domains = self.inner.domains.lock();
            let replacement = DomainPool::new(
                self.inner.runtime.domain_thread_prefix.clone(),
                Duration::from_millis(defaults::runtime::DOMAIN_SHUTDOWN_GRACE_MS),
            );
            std::mem::replace(&mut *domains, replacement)
        };
        let count = pool.len();
        self.inner.directory.prune();

        tokio::task::spawn_blocking(move || pool.shutdown())
            .await
            .map_err(|e| ActorError::domain(format!("domain shutdown task failed: {}", e)))??;

        info!(
            system_id = %self.inner.system_id,
            domains_shut_down = count,
            "Actor system shut down"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("system_id", &self.inner.system_id)
            .field("default_domain", &self.inner.default_domain.label())
            .field("actors_created", &self.inner.names.issued())
            .finish()
    }
}

/// Options for one actor; obtained from [`ActorSystem::actor_of`]
pub struct ActorBuilder<'s, B: Behavior> {
    system: &'s ActorSystem,
    behavior: B,
    name: Option<String>,
    domain: Option<DomainHandle>,
    mailbox_capacity: Option<usize>,
    stop_timeout: Option<Option<Duration>>,
    handlers: HandlerTable<B>,
}

impl<'s, B: Behavior> ActorBuilder<'s, B> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn domain(mut self, domain: DomainHandle) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    /// Bound on `stop()`; `None` waits indefinitely
    pub fn stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    /// Add an initial handler; overrides the behavior's own for the same kind
    pub fn handler<F>(mut self, kind: MessageKind, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut B, Message, &'a ActorContext) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(HandlerEntry::new(kind, handler));
        self
    }

    /// Create the actor in Limbo
    pub fn build(self) -> Actor<B> {
        let inner = &self.system.inner;
        let id = inner.names.next_id();
        let name = self.name.unwrap_or_else(|| id.default_name());

        let spec = ActorSpec {
            id,
            name,
            domain: self.domain.unwrap_or_else(|| inner.default_domain.clone()),
            mailbox_capacity: self
                .mailbox_capacity
                .unwrap_or(inner.runtime.mailbox_capacity),
            stop_timeout: self
                .stop_timeout
                .unwrap_or_else(|| inner.runtime.stop_timeout()),
            metrics: Arc::clone(&inner.metrics),
            directory: Arc::downgrade(&inner.directory),
        };

        let actor = ActorRef::create(spec, self.behavior, self.handlers);
        inner.directory.register(&actor);
        Actor::new(actor)
    }

    /// Create the actor and start its dispatch loop
    pub fn spawn(self) -> Result<Actor<B>> {
        let actor = self.build();
        actor.start()?;
        debug!(actor = %actor.name(), "Actor spawned");
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{empty, payload};
    use crate::state::ActorState;

    const ECHO: MessageKind = MessageKind::new("test.echo");

    #[tokio::test]
    async fn test_actor_system_creation() {
        let system = ActorSystem::new().unwrap();
        assert!(system.system_id().starts_with("system-"));
        assert_eq!(system.default_domain().label(), crate::domain::AMBIENT_DOMAIN);
        assert!(system.domains().is_empty());
    }

    #[tokio::test]
    async fn test_generated_names_are_monotonic() {
        let system = ActorSystem::new().unwrap();
        let first = system.actor_of(()).build();
        let second = system.actor_of(()).build();
        assert!(second.id() > first.id());
        assert_eq!(first.name(), first.id().to_string());
        assert_eq!(first.state(), ActorState::Limbo);
    }

    #[tokio::test]
    async fn test_builder_options_apply() {
        let system = ActorSystem::new().unwrap();
        let actor = system
            .actor_of(())
            .name("echo")
            .mailbox_capacity(4)
            .handler(ECHO, |_, msg, _| {
                Box::pin(async move { Ok(msg.payload().clone()) })
            })
            .spawn()
            .unwrap();

        assert_eq!(actor.mailbox_capacity(), 4);
        assert_eq!(system.lookup("echo"), Some(actor.actor_ref().clone()));

        let reply: u32 = actor.ask_as(Message::query(ECHO, 9u32)).await.unwrap();
        assert_eq!(reply, 9);
        actor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_on_dedicated_domain() {
        let system = ActorSystem::new().unwrap();
        let domain = system.create_domain().unwrap();
        let actor = system
            .actor_of(())
            .domain(domain.clone())
            .handler(ECHO, |_, _, ctx| {
                let label = ctx.domain().label().to_string();
                Box::pin(async move {
                    let thread = std::thread::current().name().map(str::to_string);
                    Ok(payload((label, thread)))
                })
            })
            .spawn()
            .unwrap();

        let (label, thread): (String, Option<String>) =
            actor.ask_as(Message::query(ECHO, ())).await.unwrap();
        assert_eq!(label, domain.label());
        assert_eq!(thread.as_deref(), Some(domain.label()));

        actor.stop().await.unwrap();
        assert!(system.remove_domain(domain.label()).unwrap());
        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_actors_release_their_names() {
        let system = ActorSystem::new().unwrap();
        for _ in 0..1000 {
            let actor = system.actor_of(()).spawn().unwrap();
            actor.stop().await.unwrap();
        }
        assert!(system.inner.directory.is_empty());

        // Names of dropped actors that never started are swept on register
        for _ in 0..1000 {
            drop(system.actor_of(()).build());
        }
        assert!(system.inner.directory.len() <= 64);
    }

    #[tokio::test]
    async fn test_release_keeps_reused_name() {
        let system = ActorSystem::new().unwrap();
        let first = system.actor_of(()).name("worker").spawn().unwrap();
        let second = system.actor_of(()).name("worker").spawn().unwrap();

        first.stop().await.unwrap();
        assert_eq!(system.lookup("worker"), Some(second.actor_ref().clone()));

        second.stop().await.unwrap();
        assert!(system.lookup("worker").is_none());
        assert!(system.inner.directory.is_empty());
    }

    #[tokio::test]
    async fn test_default_domain_cannot_be_removed() {
        let system = ActorSystem::new().unwrap();
        assert!(system.remove_domain(crate::domain::AMBIENT_DOMAIN).is_err());
    }

    #[test]
    fn test_system_outside_runtime_uses_dedicated_domain() {
        let system = ActorSystem::new().unwrap();
        assert_eq!(system.domains().len(), 1);
        assert_eq!(system.default_domain().label(), "pulse-domain-0");

        let actor = system
            .actor_of(())
            .handler(ECHO, |_, _, _| Box::pin(async { Ok(empty()) }))
            .spawn()
            .unwrap();
        let result = actor
            .domain()
            .submit({
                let actor = actor.actor_ref().clone();
                async move { actor.ask(Message::query(ECHO, ())).await.is_ok() }
            })
            .wait_blocking()
            .unwrap();
        assert!(result);
    }
}
