// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use parking_lot::Mutex;
use std::sync::Arc;

/// A fan-out event channel.
///
/// Every call to [`subscribe`](EventBus::subscribe) creates a new unbounded
/// channel. [`publish`](EventBus::publish) enqueues a clone of the event into
/// every live subscriber's channel before it returns, so a subscriber observes
/// all events published after it subscribed, in publication order. Events
/// published before a subscription are not replayed.
///
/// The bus is cheap to clone; clones share the same subscriber list.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + 'static> {
    subscribers: Arc<Mutex<Vec<flume::Sender<T>>>>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Registers a new subscriber and returns its receiving end.
    ///
    /// Dropping the receiver unsubscribes; the sender is pruned on the next publish.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Delivers `event` to every live subscriber.
    pub fn publish(&self, event: T) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        log::trace!(
            "EventBus: event delivered to {} subscriber(s).",
            subscribers.len()
        );
    }

    /// Number of live subscribers, as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<T: Clone + Send + 'static> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::TryRecvError;
    use std::{thread, time::Duration};

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Progress(f32),
        Loaded(String),
    }

    #[test]
    fn test_publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Progress(0.5));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_every_subscriber_receives_every_event() {
        let bus = EventBus::<TestEvent>::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(TestEvent::Progress(0.25));
        bus.publish(TestEvent::Loaded("a".to_string()));

        for receiver in [&first, &second] {
            assert_eq!(receiver.try_recv(), Ok(TestEvent::Progress(0.25)));
            assert_eq!(receiver.try_recv(), Ok(TestEvent::Loaded("a".to_string())));
            assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
        }
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Progress(1.0));

        let late = bus.subscribe();
        assert_eq!(late.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::<TestEvent>::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(TestEvent::Progress(0.1));
        assert_eq!(bus.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_publish_from_thread() {
        let bus = EventBus::<TestEvent>::new();
        let receiver = bus.subscribe();
        let publisher = bus.clone();

        let handle = thread::spawn(move || {
            publisher.publish(TestEvent::Loaded("threaded".to_string()));
        });

        let received = receiver
            .recv_timeout(Duration::from_secs(1))
            .expect("event from spawned thread");
        assert_eq!(received, TestEvent::Loaded("threaded".to_string()));
        handle.join().expect("Thread join failed");
    }
}
