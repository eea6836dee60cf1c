//! # Set-once, multi-waiter notification.
//!
//! [`Signal`] starts unset and can be set exactly once. Any number of tasks may
//! wait for it, before or after it is set. It backs the "closed" signal of a
//! connection and the "joined" signal of a session.

use std::sync::Arc;

use tokio::sync::watch;

/// One-shot notification shared between clones.
///
/// # Example
/// ```
/// # tokio_test_block(async {
/// use linkvisor::Signal;
///
/// let closed = Signal::new();
/// let waiter = closed.clone();
/// assert!(closed.set());
/// assert!(!closed.set()); // only the first call sets it
/// waiter.wait().await;
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Signal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    /// Creates an unset signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Sets the signal. Returns `true` only for the call that actually set it.
    pub fn set(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// True once the signal has been set.
    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the signal is set (returns immediately if it already is).
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|set| *set).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn set_once() {
        let s = Signal::new();
        assert!(!s.is_set());
        assert!(s.set());
        assert!(!s.set());
        assert!(s.is_set());
    }

    #[tokio::test]
    async fn wakes_every_waiter() {
        let s = Signal::new();
        let a = tokio::spawn({
            let s = s.clone();
            async move { s.wait().await }
        });
        let b = tokio::spawn({
            let s = s.clone();
            async move { s.wait().await }
        });
        tokio::task::yield_now().await;
        s.set();
        tokio::time::timeout(Duration::from_secs(1), async {
            a.await.unwrap();
            b.await.unwrap();
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn late_waiter_returns_immediately() {
        let s = Signal::new();
        s.set();
        tokio::time::timeout(Duration::from_millis(100), s.wait())
            .await
            .unwrap();
    }
}
