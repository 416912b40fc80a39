//! Connectivity monitor.
//!
//! Trusts the platform's online/offline signal; never polls the server.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

type Listener = Box<dyn Fn(bool) + Send + Sync>;

/// Tracks online/offline transitions.
///
/// Cloning yields another handle to the same monitor. Listeners registered
/// with [`on_change`](Self::on_change) and receivers from
/// [`subscribe`](Self::subscribe) observe edges only: setting the same
/// value twice notifies nobody.
///
/// A `watch` receiver only keeps the latest value, so a quick
/// offline/online flip can look like no change at all. Code that must react
/// to every reconnect should use
/// [`subscribe_reconnects`](Self::subscribe_reconnects), which counts
/// offline to online transitions.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<bool>,
    reconnects: watch::Sender<u64>,
    listeners: RwLock<Vec<Listener>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        let (reconnects, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state,
                reconnects,
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Returns the current state.
    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Feeds a platform connectivity signal.
    ///
    /// Returns true if the signal caused a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            tracing::info!(online, "connectivity changed");
            if online {
                self.inner.reconnects.send_modify(|count| *count += 1);
            }
            for listener in self.inner.listeners.read().iter() {
                listener(online);
            }
        }
        changed
    }

    /// Registers a callback fired on every transition with the new state.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push(Box::new(listener));
    }

    /// Returns a receiver that is notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    /// Returns a receiver of the reconnect counter.
    ///
    /// The counter only grows, so a receiver that sees it change knows at
    /// least one reconnect happened since it last looked, however quickly
    /// the state flipped back and forth.
    pub fn subscribe_reconnects(&self) -> watch::Receiver<u64> {
        self.inner.reconnects.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("listeners", &self.inner.listeners.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn reports_initial_state() {
        assert!(ConnectivityMonitor::new(true).is_online());
        assert!(!ConnectivityMonitor::new(false).is_online());
    }

    #[test]
    fn listeners_fire_on_edges_only() {
        let monitor = ConnectivityMonitor::new(false);
        let went_online = Arc::new(AtomicUsize::new(0));
        let went_offline = Arc::new(AtomicUsize::new(0));

        let on = Arc::clone(&went_online);
        let off = Arc::clone(&went_offline);
        monitor.on_change(move |online| {
            if online {
                on.fetch_add(1, Ordering::SeqCst);
            } else {
                off.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));

        assert_eq!(went_online.load(Ordering::SeqCst), 1);
        assert_eq!(went_offline.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_state() {
        let monitor = ConnectivityMonitor::new(true);
        let handle = monitor.clone();
        handle.set_online(false);
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        monitor.set_online(false);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn quick_flip_still_counts_a_reconnect() {
        let monitor = ConnectivityMonitor::new(true);
        let mut state = monitor.subscribe();
        let mut reconnects = monitor.subscribe_reconnects();

        monitor.set_online(false);
        monitor.set_online(true);

        // The state receiver only sees the latest value.
        assert!(*state.borrow_and_update());
        assert!(reconnects.has_changed().unwrap());
        assert_eq!(*reconnects.borrow_and_update(), 1);

        monitor.set_online(true);
        assert!(!reconnects.has_changed().unwrap());
    }
}
