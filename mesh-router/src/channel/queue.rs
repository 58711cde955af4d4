//! Local per-alias queue: FIFO history plus fan-out to subscribed observers.

use crate::channel::observer::{MessageObserver, ObserverList, Subscription};
use crate::wire_message::MeshMessage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// The local queue behind one input channel alias.
///
/// Appends keep arrival order. Retained history is bounded by `capacity`; the oldest
/// entry is evicted once it is full.
pub struct ChannelQueue {
    alias: String,
    capacity: usize,
    history: Mutex<VecDeque<MeshMessage>>,
    observers: ObserverList<dyn MessageObserver>,
}

impl ChannelQueue {
    pub fn new(alias: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            alias: alias.into(),
            capacity,
            history: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            observers: ObserverList::new(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn subscribe(&self, observer: Arc<dyn MessageObserver>) -> Subscription {
        self.observers.add(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Appends `message` and hands it to every observer registered at this instant.
    pub async fn add(&self, message: MeshMessage) {
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(message.clone());
        }

        for observer in self.observers.snapshot() {
            observer.on_next(&message).await;
        }
    }

    pub fn len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<MeshMessage> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Takes every retained entry, oldest first.
    pub fn drain(&self) -> Vec<MeshMessage> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    /// Signals completion to every observer, e.g. when the queue is being torn down.
    pub async fn complete(&self) {
        for observer in self.observers.snapshot() {
            observer.on_completed().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelQueue;
    use crate::channel::observer::MessageObserver;
    use crate::MeshMessage;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageObserver for RecordingObserver {
        async fn on_next(&self, message: &MeshMessage) {
            self.seen.lock().unwrap().push(message.payload.clone());
        }
    }

    #[tokio::test]
    async fn add_preserves_fifo_order() {
        let queue = ChannelQueue::new("prices", 8);

        queue.add(MeshMessage::new("1")).await;
        queue.add(MeshMessage::new("2")).await;
        queue.add(MeshMessage::new("3")).await;

        let payloads: Vec<_> = queue.snapshot().into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn history_evicts_oldest_when_full() {
        let queue = ChannelQueue::new("prices", 2);

        queue.add(MeshMessage::new("1")).await;
        queue.add(MeshMessage::new("2")).await;
        queue.add(MeshMessage::new("3")).await;

        let payloads: Vec<_> = queue.drain().into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec!["2", "3"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn observers_receive_until_unsubscribed() {
        let queue = ChannelQueue::new("prices", 8);
        let observer = Arc::new(RecordingObserver::default());
        let token = queue.subscribe(observer.clone());

        queue.add(MeshMessage::new("before")).await;
        assert!(token.unsubscribe());
        queue.add(MeshMessage::new("after")).await;

        assert_eq!(*observer.seen.lock().unwrap(), vec!["before".to_string()]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.observer_count(), 0);
    }
}
