//! Bounded single-producer/single-consumer queue between the hook context and
//! the recognizer worker.

use crate::hook::types::KeyEvent;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// Default capacity, enough for key-repeat bursts.
pub const DEFAULT_CAPACITY: usize = 256;

/// Create a channel holding at most `capacity` events.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (sender, receiver) = bounded(capacity);
    (EventSender { sender }, EventReceiver { receiver })
}

/// Producer half, used from the hook context.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<KeyEvent>,
}

impl EventSender {
    /// Enqueue without blocking. Returns `false` if the event was dropped.
    pub fn try_enqueue(&self, event: KeyEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Result of a timed dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued {
    Event(KeyEvent),
    TimedOut,
    Closed,
}

/// Consumer half, owned by the recognizer worker.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    receiver: Receiver<KeyEvent>,
}

impl EventReceiver {
    /// Wait up to `timeout` for the next event.
    pub fn dequeue(&self, timeout: Duration) -> Dequeued {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Dequeued::Event(event),
            Err(RecvTimeoutError::Timeout) => Dequeued::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Dequeued::Closed,
        }
    }

    /// Discard everything currently queued, returning how many events were dropped.
    pub fn drain(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::types::{KeyId, Modifier, Side};

    fn ctrl_down() -> KeyEvent {
        KeyEvent::down(KeyId::Modifier(Modifier::Primary, Side::Left))
    }

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = event_channel(8);
        let first = ctrl_down();
        let second = KeyEvent::up(KeyId::Selector(2));
        assert!(tx.try_enqueue(first));
        assert!(tx.try_enqueue(second));

        assert_eq!(rx.dequeue(Duration::from_millis(10)), Dequeued::Event(first));
        assert_eq!(rx.dequeue(Duration::from_millis(10)), Dequeued::Event(second));
        assert_eq!(rx.dequeue(Duration::from_millis(10)), Dequeued::TimedOut);
    }

    #[test]
    fn test_overflow_drops_newest() {
        let (tx, rx) = event_channel(2);
        let kept = ctrl_down();
        assert!(tx.try_enqueue(kept));
        assert!(tx.try_enqueue(kept));
        assert!(!tx.try_enqueue(KeyEvent::down(KeyId::Selector(3))));

        assert_eq!(rx.len(), 2);
        assert_eq!(rx.dequeue(Duration::from_millis(10)), Dequeued::Event(kept));
    }

    #[test]
    fn test_drain() {
        let (tx, rx) = event_channel(4);
        for _ in 0..3 {
            tx.try_enqueue(ctrl_down());
        }
        assert_eq!(rx.drain(), 3);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_closed_when_senders_dropped() {
        let (tx, rx) = event_channel(1);
        drop(tx);
        assert_eq!(rx.dequeue(Duration::from_millis(10)), Dequeued::Closed);
    }
}
