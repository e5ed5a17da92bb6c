//! Scoped teardown of test resources.
//!
//! Resources registered during a test are closed exactly once when the scope
//! ends, on both success and failure paths. `close_all` drains explicitly;
//! Drop drains whatever remains, so a panicking test still releases its
//! streams, readers and subscriptions.

use parking_lot::Mutex;
use tracing::warn;

/// A resource that can be released with a synchronous, idempotent signal.
///
/// Async teardown work (engine tasks draining, channels flushing) is
/// triggered by the close signal rather than awaited here, so closing is
/// safe from Drop. Closing twice must be a no-op for every implementor.
pub trait Close: Send {
    fn close(&mut self);
}

impl<F> Close for F
where
    F: FnMut() + Send,
{
    fn close(&mut self) {
        self();
    }
}

/// Registry of resources closed exactly once at scope exit.
#[derive(Default)]
pub struct CloseScope {
    inner: Mutex<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    resources: Vec<Box<dyn Close>>,
    drained: bool,
}

impl CloseScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource for teardown. Resources close in registration
    /// order. Pushing into an already-drained scope closes immediately.
    pub fn push<C: Close + 'static>(&self, resource: C) {
        let mut inner = self.inner.lock();
        if inner.drained {
            warn!("resource registered after scope teardown, closing immediately");
            let mut resource = resource;
            resource.close();
            return;
        }
        inner.resources.push(Box::new(resource));
    }

    /// Number of resources currently registered.
    pub fn len(&self) -> usize {
        self.inner.lock().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every registered resource, in registration order.
    ///
    /// The second and later calls are no-ops: the drain happens exactly once
    /// per scope regardless of how the owning test exits.
    pub fn close_all(&self) {
        let resources = {
            let mut inner = self.inner.lock();
            if inner.drained {
                return;
            }
            inner.drained = true;
            std::mem::take(&mut inner.resources)
        };
        for mut resource in resources {
            resource.close();
        }
    }
}

impl Drop for CloseScope {
    fn drop(&mut self) {
        self.close_all();
    }
}
