use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use log::debug;
use tokio::sync::mpsc;

pub type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Subscriber<T> {
    id: u64,
    tx: mpsc::Sender<T>,
    filter: Filter<T>,
    dropped: AtomicU64,
}

struct Inner<T> {
    // Replaced as a whole on (un)subscribe, so publishers only clone the Arc.
    subscribers: RwLock<Arc<Vec<Arc<Subscriber<T>>>>>,
    next_id: AtomicU64,
}

impl<T> Inner<T> {
    fn snapshot(&self) -> Arc<Vec<Arc<Subscriber<T>>>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<Arc<Subscriber<T>>>),
    {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Arc<Subscriber<T>>> = subscribers.as_ref().clone();
        f(&mut next);
        *subscribers = Arc::new(next);
    }
}

/// Non-blocking publish/subscribe hub. Every subscriber owns a bounded
/// queue; an item that does not fit is dropped for that subscriber only.
pub struct PubSub<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PubSub<T> {
    fn clone(&self) -> Self {
        PubSub {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for PubSub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PubSub<T> {
    pub fn new() -> PubSub<T> {
        PubSub {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(Arc::new(Vec::new())),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers `tx`. Items rejected by `filter` are never queued. The
    /// registration lives as long as the returned guard.
    pub fn subscribe(&self, tx: mpsc::Sender<T>, filter: Filter<T>) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            tx,
            filter,
            dropped: AtomicU64::new(0),
        });
        self.inner.update(|subs| subs.push(subscriber.clone()));
        Subscription {
            hub: Arc::downgrade(&self.inner),
            subscriber,
        }
    }

    pub fn subscribe_channel(
        &self,
        capacity: usize,
        filter: Filter<T>,
    ) -> (Subscription<T>, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        (self.subscribe(tx, filter), rx)
    }

    pub fn subscribers_num(&self) -> usize {
        self.inner.snapshot().len()
    }
}

impl<T: Clone> PubSub<T> {
    /// Offers `item` to every interested subscriber without waiting.
    /// Returns how many subscribers received it.
    pub fn publish(&self, item: T) -> usize {
        let subscribers = self.inner.snapshot();
        let mut delivered = 0;
        for sub in subscribers.iter() {
            if !(sub.filter)(&item) {
                continue;
            }
            match sub.tx.try_send(item.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                }
                // The session is going away and will unsubscribe.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

/// Subscription guard, unregisters on drop.
pub struct Subscription<T> {
    hub: Weak<Inner<T>>,
    subscriber: Arc<Subscriber<T>>,
}

impl<T> Subscription<T> {
    /// Items discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.subscriber.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let id = self.subscriber.id;
        if let Some(hub) = self.hub.upgrade() {
            hub.update(|subs| subs.retain(|s| s.id != id));
        }
        let dropped = self.dropped();
        if dropped > 0 {
            debug!("Subscriber {} discarded {} items on a full queue", id, dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_publish_respects_filter() {
        let hub: PubSub<u32> = PubSub::new();
        let (_even, mut even_rx) = hub.subscribe_channel(8, Box::new(|v| v % 2 == 0));
        let (_all, mut all_rx) = hub.subscribe_channel(8, Box::new(|_| true));
        assert_eq!(hub.subscribers_num(), 2);

        assert_eq!(hub.publish(1), 1);
        assert_eq!(hub.publish(2), 2);

        assert_eq!(even_rx.recv().await, Some(2));
        assert_eq!(all_rx.recv().await, Some(1));
        assert_eq!(all_rx.recv().await, Some(2));
        assert!(even_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_never_blocks_on_full_queue() {
        let hub: PubSub<u32> = PubSub::new();
        let (slow, mut slow_rx) = hub.subscribe_channel(1, Box::new(|_| true));
        let (_fast, mut fast_rx) = hub.subscribe_channel(16, Box::new(|_| true));

        let published = tokio::time::timeout(Duration::from_secs(1), async {
            for i in 0..10 {
                hub.publish(i);
            }
        })
        .await;
        assert!(published.is_ok());

        assert_eq!(slow.dropped(), 9);
        assert_eq!(slow_rx.recv().await, Some(0));
        for i in 0..10 {
            assert_eq!(fast_rx.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let hub: PubSub<u32> = PubSub::new();
        let (sub, mut rx) = hub.subscribe_channel(4, Box::new(|_| true));
        assert_eq!(hub.subscribers_num(), 1);
        drop(sub);
        assert_eq!(hub.subscribers_num(), 0);
        assert_eq!(hub.publish(7), 0);
        assert_eq!(rx.recv().await, None);
    }
}
