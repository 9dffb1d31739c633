//! Live configuration store.
//!
//! `ConfigStore<T>` keeps the current value inside a `watch` channel so that
//! synchronous code (event listeners in particular) can read it without
//! awaiting while another task replaces it.

use std::sync::Arc;
use tokio::sync::watch;

/// A shared configuration value that can be replaced while readers hold
/// clones of the store.
pub struct ConfigStore<T> {
    inner: Arc<watch::Sender<T>>,
}

impl<T> ConfigStore<T> {
    /// Create a new `ConfigStore` with the given initial value.
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            inner: Arc::new(tx),
        }
    }

    /// Replace the stored value. Every clone observes it on its next read.
    pub fn update(&self, value: T) {
        self.inner.send_replace(value);
    }

    /// Read the current value.
    ///
    /// The returned guard holds a read lock; do not keep it across an
    /// `.await`.
    pub fn read(&self) -> watch::Ref<'_, T> {
        self.inner.borrow()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
