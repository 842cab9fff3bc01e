//! Loop Domains
//!
//! A loop domain is a single-threaded cooperative scheduler: a tokio
//! current-thread runtime driven by one dedicated OS thread. Every actor is
//! bound to exactly one domain; its dispatch loop and all of its handler
//! invocations run there.
//!
//! ## Crossing domains
//!
//! Actor references and reply slots are built on thread-safe channels, so
//! `tell` and `ask` work from any domain. Work that must *run* on a specific
//! domain goes through [`DomainHandle::submit`], which returns a [`Bridged`]
//! handle awaitable from anywhere. Blocking on a [`Bridged`] handle is refused
//! inside an async runtime, where it would stall a cooperative scheduler.

use crate::error::{ActorError, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Label used for the runtime the system was created on
pub const AMBIENT_DOMAIN: &str = "ambient";

/// Cloneable reference to a loop domain
#[derive(Clone)]
pub struct DomainHandle {
    label: Arc<str>,
    handle: Handle,
}

impl DomainHandle {
    /// The runtime the caller is running on
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| ActorError::domain(format!("no ambient runtime: {}", e)))?;
        Ok(Self::from_handle(AMBIENT_DOMAIN, handle))
    }

    pub fn from_handle(label: impl Into<String>, handle: Handle) -> Self {
        Self {
            label: Arc::from(label.into()),
            handle,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tokio_handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run `future` on this domain, from any thread or domain
    pub fn submit<F>(&self, future: F) -> Bridged<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Bridged {
            domain: Arc::clone(&self.label),
            task: self.handle.spawn(future),
        }
    }
}

impl fmt::Debug for DomainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainHandle")
            .field("label", &self.label)
            .finish()
    }
}

/// Result of work submitted to another domain
#[derive(Debug)]
pub struct Bridged<T> {
    domain: Arc<str>,
    task: JoinHandle<T>,
}

impl<T> Bridged<T> {
    /// Await the result from any domain
    pub async fn wait(self) -> Result<T> {
        let Self { domain, task } = self;
        task.await
            .map_err(|e| ActorError::domain(format!("task on {} failed: {}", domain, e)))
    }

    /// Block the calling thread until the result is ready
    ///
    /// Only valid on threads that are not driving an async runtime.
    pub fn wait_blocking(self) -> Result<T> {
        if Handle::try_current().is_ok() {
            return Err(ActorError::domain(format!(
                "blocking wait on work from {} inside an async runtime",
                self.domain
            )));
        }
        futures::executor::block_on(self.wait())
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// A dedicated thread driving a current-thread runtime
pub struct LoopDomain {
    handle: DomainHandle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl LoopDomain {
    /// Start a new domain on its own thread named `label`
    pub fn spawn(label: impl Into<String>, grace: Duration) -> Result<Self> {
        let label = label.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name(label.clone())
            .build()
            .map_err(|e| ActorError::domain(format!("failed to build runtime {}: {}", label, e)))?;

        let handle = DomainHandle::from_handle(label.clone(), runtime.handle().clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread_label = label.clone();
        let thread = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                runtime.shutdown_timeout(grace);
                debug!(domain = %thread_label, "Loop domain thread exiting");
            })
            .map_err(|e| ActorError::domain(format!("failed to spawn thread {}: {}", label, e)))?;

        info!(domain = %label, "Loop domain started");

        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> DomainHandle {
        self.handle.clone()
    }

    pub fn label(&self) -> &str {
        self.handle.label()
    }

    /// Stop the scheduler and join its thread
    ///
    /// Tasks still pending on the domain are dropped after the grace period.
    pub fn shutdown(mut self) -> Result<()> {
        self.signal();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| {
                ActorError::domain(format!("domain thread {} panicked", self.label()))
            }),
            None => Ok(()),
        }
    }

    fn signal(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for LoopDomain {
    fn drop(&mut self) {
        self.signal();
    }
}

impl fmt::Debug for LoopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopDomain")
            .field("label", &self.label())
            .field("running", &self.shutdown.is_some())
            .finish()
    }
}

/// Owner of the dedicated loop domains of one actor system
#[derive(Debug)]
pub struct DomainPool {
    prefix: String,
    grace: Duration,
    next_id: u64,
    domains: Vec<LoopDomain>,
}

impl DomainPool {
    pub fn new(prefix: impl Into<String>, grace: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            grace,
            next_id: 0,
            domains: Vec::new(),
        }
    }

    /// Start one more domain and return its handle
    pub fn create_domain(&mut self) -> Result<DomainHandle> {
        let label = format!("{}-{}", self.prefix, self.next_id);
        self.next_id += 1;
        let domain = LoopDomain::spawn(label, self.grace)?;
        let handle = domain.handle();
        self.domains.push(domain);
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<DomainHandle> {
        self.domains.get(index).map(LoopDomain::handle)
    }

    pub fn handles(&self) -> Vec<DomainHandle> {
        self.domains.iter().map(LoopDomain::handle).collect()
    }

    /// Shut down and forget the domain labelled `label`
    pub fn remove(&mut self, label: &str) -> Result<bool> {
        match self.domains.iter().position(|d| d.label() == label) {
            Some(index) => {
                self.domains.remove(index).shutdown()?;
                info!(domain = %label, "Loop domain removed");
                Ok(true)
            }
            None => {
                warn!(domain = %label, "Attempted to remove unknown loop domain");
                Ok(false)
            }
        }
    }

    /// Shut down every domain; reports the first failure after trying all
    pub fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;
        for domain in self.domains.drain(..) {
            let label = domain.label().to_string();
            if let Err(e) = domain.shutdown() {
                warn!(domain = %label, error = %e, "Loop domain did not shut down cleanly");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
