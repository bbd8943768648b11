//! Broadcast fanout of committed changes to live subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::{Change, Envelope};

pub const DEFAULT_BUFFER: usize = 256;

/// Receiving side handed to a subscriber.
pub struct Subscription {
    pub id: Uuid,
    rx: mpsc::Receiver<Arc<Envelope>>,
}

impl Subscription {
    /// `None` once the broadcaster has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<Envelope>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Envelope>> {
        self.rx.try_recv().ok()
    }
}

struct Inner {
    next_seq: u64,
    subscribers: HashMap<Uuid, mpsc::Sender<Arc<Envelope>>>,
}

/// Delivers each published change to every registered subscriber.
///
/// Delivery never waits: a subscriber whose buffer is full or whose receiver
/// is gone is unregistered on the spot, which closes its channel. Sequence
/// numbers are assigned under the same lock as delivery, so every subscriber
/// sees envelopes in publish order.
pub struct Broadcaster {
    buffer: usize,
    inner: Mutex<Inner>,
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            inner: Mutex::new(Inner {
                next_seq: 1,
                subscribers: HashMap::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        let count = {
            let mut inner = self.inner.lock();
            inner.subscribers.insert(id, tx);
            inner.subscribers.len()
        };
        info!(subscriber = %id, subscribers = count, "Subscriber registered");
        Subscription { id, rx }
    }

    /// Returns `false` if the subscriber was not registered.
    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        let removed = self.inner.lock().subscribers.remove(id).is_some();
        if removed {
            info!(subscriber = %id, "Subscriber unregistered");
        }
        removed
    }

    /// Publish a change. Returns the number of subscribers it reached.
    pub fn publish(&self, change: Change) -> usize {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let envelope = Arc::new(Envelope {
            seq,
            published_at: Utc::now(),
            change,
        });

        let mut dropped = Vec::new();
        for (id, tx) in &inner.subscribers {
            match tx.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = %id, seq, "Subscriber buffer full, dropping subscriber");
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %id, seq, "Subscriber gone");
                    dropped.push(*id);
                }
            }
        }
        for id in &dropped {
            inner.subscribers.remove(id);
        }

        let delivered = inner.subscribers.len();
        drop(inner);

        if !dropped.is_empty() {
            info!(dropped = dropped.len(), remaining = delivered, "Pruned subscribers during publish");
        }
        delivered
    }

    /// Remove subscribers whose receivers were dropped. Returns how many.
    pub fn prune_closed(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|_, tx| !tx.is_closed());
        before - inner.subscribers.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_shared::protocol::PresenceUpdate;
    use chatline_shared::UserId;

    fn presence(user: &str) -> Change {
        Change::Presence(PresenceUpdate {
            user: UserId::from(user),
            available: true,
            last_seen: None,
        })
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_publish_order() {
        let fanout = Broadcaster::new(16);
        let mut a = fanout.subscribe();
        let mut b = fanout.subscribe();

        for i in 0..5 {
            assert_eq!(fanout.publish(presence(&format!("u{i}"))), 2);
        }

        for sub in [&mut a, &mut b] {
            let mut seqs = Vec::new();
            for _ in 0..5 {
                seqs.push(sub.recv().await.unwrap().seq);
            }
            assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped_and_closed() {
        let fanout = Broadcaster::new(2);
        let mut slow = fanout.subscribe();
        let mut fast = fanout.subscribe();

        fanout.publish(presence("u1"));
        fast.recv().await.unwrap();
        fanout.publish(presence("u2"));
        fast.recv().await.unwrap();

        // `slow` has a full buffer now.
        assert_eq!(fanout.publish(presence("u3")), 1);
        assert_eq!(fanout.len(), 1);
        assert_eq!(fast.recv().await.unwrap().seq, 3);

        // Buffered envelopes drain, then the channel reports closed.
        assert_eq!(slow.recv().await.unwrap().seq, 1);
        assert_eq!(slow.recv().await.unwrap().seq, 2);
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let fanout = Broadcaster::default();
        let gone = fanout.subscribe();
        let _kept = fanout.subscribe();
        drop(gone);

        assert_eq!(fanout.prune_closed(), 1);
        assert_eq!(fanout.len(), 1);

        let gone = fanout.subscribe();
        drop(gone);
        assert_eq!(fanout.publish(presence("u1")), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_channel() {
        let fanout = Broadcaster::default();
        let mut sub = fanout.subscribe();

        assert!(fanout.unsubscribe(&sub.id));
        assert!(!fanout.unsubscribe(&sub.id));
        assert!(sub.recv().await.is_none());
        assert_eq!(fanout.publish(presence("u1")), 0);
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_and_publish() {
        let fanout = Arc::new(Broadcaster::new(1024));
        let publisher = {
            let fanout = fanout.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    fanout.publish(presence(&format!("u{i}")));
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut subs = Vec::new();
        for _ in 0..10 {
            subs.push(fanout.subscribe());
            tokio::task::yield_now().await;
        }
        publisher.await.unwrap();

        for mut sub in subs {
            let mut last = 0;
            while let Some(env) = sub.try_recv() {
                assert!(env.seq > last);
                last = env.seq;
            }
        }
    }
}
