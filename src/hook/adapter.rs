//! The code that runs inside the OS hook callback.
//!
//! [`HookAdapter::handle`] is called synchronously for every key transition on
//! a thread the engine does not own. It never blocks, never logs and takes no
//! locks: it filters, attempts a non-blocking enqueue, and answers from the
//! atomic armed flag.

use super::types::{KeyEvent, KeyId, Transition};
use crate::core::channel::EventSender;
use crate::core::profile::ProfileRegistry;
use crate::core::recognizer::EngineSignals;
use crate::stats::SharedEngineStats;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What the OS should do with the current key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    /// Deliver the key to the foreground application.
    Pass,
    /// Swallow the key.
    Suppress,
}

impl HookDecision {
    pub fn is_suppress(self) -> bool {
        self == HookDecision::Suppress
    }
}

/// Hook-side entry point of the engine. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HookAdapter {
    sender: EventSender,
    signals: Arc<EngineSignals>,
    stats: SharedEngineStats,
    /// Bit `d` set when selector digit `d` maps to a supported profile.
    selectors: u16,
}

impl HookAdapter {
    pub(crate) fn new(
        sender: EventSender,
        signals: Arc<EngineSignals>,
        stats: SharedEngineStats,
        registry: &ProfileRegistry,
    ) -> Self {
        let selectors = registry
            .iter()
            .filter_map(KeyId::selector_for)
            .fold(0u16, |mask, key| match key {
                KeyId::Selector(digit) => mask | (1 << digit),
                KeyId::Modifier(..) => mask,
            });
        Self {
            sender,
            signals,
            stats,
            selectors,
        }
    }

    /// Handle a raw key transition reported by the OS, stamped now.
    pub fn handle(&self, name: &str, transition: Transition) -> HookDecision {
        self.handle_at(name, transition, Utc::now())
    }

    /// Handle a raw key transition with the OS-provided timestamp.
    pub fn handle_at(
        &self,
        name: &str,
        transition: Transition,
        observed_at: DateTime<Utc>,
    ) -> HookDecision {
        match KeyId::from_name(name) {
            Some(key) => self.handle_key(KeyEvent::at(key, transition, observed_at)),
            None => HookDecision::Pass,
        }
    }

    /// Handle an already-classified key event.
    pub fn handle_key(&self, event: KeyEvent) -> HookDecision {
        if !self.is_of_interest(event.key) {
            return HookDecision::Pass;
        }

        if self.sender.try_enqueue(event) {
            self.stats.record_enqueued();
        } else {
            self.stats.record_dropped();
        }

        match (event.key, event.transition) {
            (KeyId::Selector(_), Transition::Down) if self.signals.is_armed() => {
                HookDecision::Suppress
            }
            _ => HookDecision::Pass,
        }
    }

    /// Whether `key` is one the engine listens to.
    pub fn is_of_interest(&self, key: KeyId) -> bool {
        match key {
            KeyId::Modifier(..) => true,
            KeyId::Selector(digit) => digit < 10 && self.selectors & (1 << digit) != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::{event_channel, Dequeued, EventReceiver};
    use crate::core::profile::ProfileId;
    use crate::hook::types::{Modifier, Side};
    use crate::stats::EngineStats;
    use std::time::Duration;

    fn adapter(capacity: usize) -> (HookAdapter, EventReceiver, Arc<EngineSignals>) {
        let (tx, rx) = event_channel(capacity);
        let signals = Arc::new(EngineSignals::new(ProfileId::new(1)));
        let registry = ProfileRegistry::new([1u32, 2, 3]).unwrap();
        let adapter = HookAdapter::new(
            tx,
            signals.clone(),
            Arc::new(EngineStats::new()),
            &registry,
        );
        (adapter, rx, signals)
    }

    #[test]
    fn test_unrelated_keys_pass_untouched() {
        let (adapter, rx, _) = adapter(4);
        assert_eq!(adapter.handle("a", Transition::Down), HookDecision::Pass);
        assert_eq!(adapter.handle("space", Transition::Up), HookDecision::Pass);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_unsupported_selector_not_enqueued() {
        let (adapter, rx, signals) = adapter(4);
        signals.set_armed(true);
        assert_eq!(adapter.handle("7", Transition::Down), HookDecision::Pass);
        assert_eq!(adapter.handle("&", Transition::Down), HookDecision::Pass);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_modifiers_enqueued_never_suppressed() {
        let (adapter, rx, signals) = adapter(4);
        signals.set_armed(true);
        assert_eq!(adapter.handle("ctrl", Transition::Down), HookDecision::Pass);
        assert_eq!(adapter.handle("shift", Transition::Up), HookDecision::Pass);

        match rx.dequeue(Duration::from_millis(10)) {
            Dequeued::Event(e) => {
                assert_eq!(e.key, KeyId::Modifier(Modifier::Primary, Side::Left));
                assert_eq!(e.transition, Transition::Down);
            }
            other => panic!("expected event, got {other:?}"),
        }
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_selector_suppressed_only_when_armed_and_down() {
        let (adapter, rx, signals) = adapter(8);
        assert_eq!(adapter.handle("@", Transition::Down), HookDecision::Pass);

        signals.set_armed(true);
        assert_eq!(adapter.handle("@", Transition::Down), HookDecision::Suppress);
        assert_eq!(adapter.handle("@", Transition::Up), HookDecision::Pass);
        assert_eq!(rx.len(), 3);
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (adapter, rx, signals) = adapter(1);
        signals.set_armed(true);
        assert_eq!(adapter.handle("ctrl", Transition::Down), HookDecision::Pass);
        // Dropped, but the decision is still made.
        assert_eq!(adapter.handle("2", Transition::Down), HookDecision::Suppress);
        assert_eq!(rx.len(), 1);
        assert_eq!(adapter.stats.dropped(), 1);
    }
}
