use crate::{blackboard::lock, NodeStatus};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

/// A persisted status transition of one node.
#[derive(Debug, Clone)]
pub struct StatusChange<'a> {
    pub stamp: Instant,
    pub uid: u16,
    pub name: &'a str,
    pub path: &'a str,
    pub prev_status: NodeStatus,
    pub status: NodeStatus,
}

pub type StatusChangeCallback = dyn Fn(&StatusChange) + Send + Sync;

/// Keeps a status subscription alive. Dropping it unsubscribes.
#[derive(Clone)]
pub struct StatusChangeSubscriber(Arc<StatusChangeCallback>);

#[derive(Default)]
pub struct StatusChangeSignal {
    subscribers: Mutex<Vec<Weak<StatusChangeCallback>>>,
}

impl StatusChangeSignal {
    pub fn subscribe(
        &self,
        callback: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> StatusChangeSubscriber {
        let callback: Arc<StatusChangeCallback> = Arc::new(callback);
        lock(&self.subscribers).push(Arc::downgrade(&callback));
        StatusChangeSubscriber(callback)
    }

    pub fn notify(&self, change: &StatusChange) {
        // Callbacks run without the lock, so they may subscribe themselves.
        let alive: Vec<_> = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in alive {
            callback(change);
        }
    }

    pub fn has_subscribers(&self) -> bool {
        lock(&self.subscribers)
            .iter()
            .any(|weak| weak.strong_count() > 0)
    }
}

/// Raised by asynchronous work to ask the tree driver for an early tick.
#[derive(Default)]
pub struct WakeUpSignal {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl WakeUpSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emit_signal(&self) {
        *lock(&self.ready) = true;
        self.cond.notify_all();
    }

    /// Blocks until the signal is raised or `timeout` elapses, then clears it.
    /// Returns whether the signal was raised.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let guard = lock(&self.ready);
        let (mut ready, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |ready| !*ready)
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *ready, false)
    }

    /// Clears the signal without waiting.
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *lock(&self.ready), false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_dropped_subscriber_is_not_called() {
        let signal = StatusChangeSignal::default();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let subscriber = signal.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let change = StatusChange {
            stamp: Instant::now(),
            uid: 1,
            name: "node",
            path: "node",
            prev_status: NodeStatus::Idle,
            status: NodeStatus::Running,
        };
        signal.notify(&change);
        drop(subscriber);
        signal.notify(&change);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(!signal.has_subscribers());
    }

    #[test]
    fn test_wake_up() {
        let signal = WakeUpSignal::new();
        assert!(!signal.wait_for(Duration::from_millis(1)));

        let remote = signal.clone();
        let handle = thread::spawn(move || remote.emit_signal());
        assert!(signal.wait_for(Duration::from_secs(5)));
        handle.join().unwrap();
        assert!(!signal.take());
    }
}
