use std::sync::Arc;
use tokio::sync::watch;

/// Observable state container shared between a controller and its views.
///
/// Writers mutate through [`Store::update`]; every accepted change is published to subscribers,
/// which always see the latest snapshot. Clones share the same state.
#[derive(Debug)]
pub struct Store<S> {
    tx: Arc<watch::Sender<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: Clone> Store<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> S {
        self.tx.borrow().clone()
    }

    /// Run `f` against the current state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Apply `modify` atomically. It returns whether it changed anything; subscribers are
    /// notified only when it did. The same flag is returned to the caller, so a
    /// check-then-set gate can be written as one update.
    pub fn update(&self, modify: impl FnOnce(&mut S) -> bool) -> bool {
        self.tx.send_if_modified(modify)
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }
}

impl<S: Clone + Default> Default for Store<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        busy: bool,
        hits: u32,
    }

    #[test]
    fn test_update_reports_whether_state_changed() {
        let store = Store::new(Counter::default());

        let accepted = store.update(|s| {
            if s.busy {
                return false;
            }
            s.busy = true;
            true
        });
        assert!(accepted);

        let accepted = store.update(|s| {
            if s.busy {
                return false;
            }
            s.busy = true;
            true
        });
        assert!(!accepted);
        assert!(store.read(|s| s.busy));
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_snapshot() {
        let store = Store::new(Counter::default());
        let mut rx = store.subscribe();

        store.update(|s| {
            s.hits += 1;
            true
        });
        store.update(|s| {
            s.hits += 1;
            true
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().hits, 2);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_unchanged_update_does_not_notify() {
        let store = Store::new(Counter::default());
        let rx = store.subscribe();

        store.update(|_| false);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_clones_share_state() {
        let store = Store::new(Counter::default());
        let other = store.clone();
        other.update(|s| {
            s.hits = 7;
            true
        });
        assert_eq!(store.snapshot().hits, 7);
    }
}
