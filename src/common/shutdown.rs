//! Cooperative shutdown signal shared between background tasks.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;
use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    terminated: AtomicBool,
    notify: Notify,
}

/// One-shot shutdown flag with async waiters.
///
/// Once [`Shutdown::shutdown`] is called every pending and future
/// [`Shutdown::wait`] resolves immediately.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown, waking every waiter.
    pub fn shutdown(&self) {
        self.inner.terminated.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Resolve once the shutdown has been triggered.
    pub fn wait(&self) -> BoxFuture<'static, ()> {
        let inner = self.inner.clone();
        Box::pin(async move {
            loop {
                // register before checking the flag so a concurrent shutdown is not missed
                let notified = inner.notify.notified();
                if inner.terminated.load(Ordering::SeqCst) {
                    return;
                }
                notified.await;
            }
        })
    }
}
