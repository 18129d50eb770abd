//! Publish/subscribe value slot

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: RwLock<T>,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
    // Held across mutate-then-notify so subscribers see writes in order
    write: ReentrantMutex<()>,
}

trait Unsubscribe: Send + Sync {
    fn remove(&self, id: u64);
}

impl<T: Send + Sync> Unsubscribe for Inner<T> {
    fn remove(&self, id: u64) {
        self.subscribers.lock().retain(|(sub_id, _)| *sub_id != id);
    }
}

/// A shared value whose subscribers receive the full value after every write
///
/// Cloning a `Slot` yields another handle to the same value. Callbacks run on
/// the writing thread, in registration order, after the value lock has been
/// released; a callback may read the slot or write to it.
pub struct Slot<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone + Send + Sync + 'static> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("value", &*self.inner.value.read())
            .field("subscribers", &self.inner.subscribers.lock().len())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Slot<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(value),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                write: ReentrantMutex::new(()),
            }),
        }
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        self.update(|current| *current = value);
    }

    /// Mutate the value in place and notify subscribers once with the result
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _write = self.inner.write.lock();

        let (result, snapshot) = {
            let mut value = self.inner.value.write();
            let result = f(&mut value);
            (result, value.clone())
        };

        self.notify(&snapshot);
        result
    }

    /// Register a callback for every subsequent write
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));

        let registry: Weak<dyn Unsubscribe> = Arc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        Subscription {
            id,
            registry: Some(registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn notify(&self, snapshot: &T) {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(snapshot);
        }
    }
}

/// Keeps a slot callback registered; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Option<Weak<dyn Unsubscribe>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|weak| weak.upgrade()) {
            registry.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let slot = Slot::new(1);
        slot.set(5);
        assert_eq!(slot.get(), 5);
        assert_eq!(slot.with(|v| v * 2), 10);
    }

    #[test]
    fn test_subscribers_notified_in_registration_order() {
        let slot = Slot::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = seen.clone();
            slot.subscribe(move |v| seen.lock().push(("first", *v)))
        };
        let second = {
            let seen = seen.clone();
            slot.subscribe(move |v| seen.lock().push(("second", *v)))
        };

        slot.set(7);

        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
        drop((first, second));
    }

    #[test]
    fn test_update_notifies_once_with_full_snapshot() {
        let slot = Slot::new(vec![1, 2]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            slot.subscribe(move |v: &Vec<i32>| seen.lock().push(v.clone()))
        };

        let len = slot.update(|v| {
            v.push(3);
            v.push(4);
            v.len()
        });

        assert_eq!(len, 4);
        assert_eq!(*seen.lock(), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn test_drop_and_unsubscribe_remove_callback() {
        let slot = Slot::new(0);
        let hits = Arc::new(AtomicU64::new(0));

        let dropped = {
            let hits = hits.clone();
            slot.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let explicit = {
            let hits = hits.clone();
            slot.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert_eq!(slot.subscriber_count(), 2);

        drop(dropped);
        explicit.unsubscribe();
        slot.set(1);

        assert_eq!(slot.subscriber_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_outliving_slot() {
        let slot = Slot::new(0);
        let sub = slot.subscribe(|_| {});
        drop(slot);
        drop(sub);
    }

    #[test]
    fn test_callback_may_read_slot() {
        let slot = Slot::new(0);
        let observed = Arc::new(AtomicU64::new(0));
        let _sub = {
            let reader = slot.clone();
            let observed = observed.clone();
            slot.subscribe(move |_| observed.store(reader.get(), Ordering::SeqCst))
        };

        slot.set(9);
        assert_eq!(observed.load(Ordering::SeqCst), 9);
    }
}
