//! The chord state machine.
//!
//! A [`ChordRecognizer`] consumes [`KeyEvent`]s strictly in order on a single
//! thread and turns them into [`Command`]s. It owns the pressed-key set; the
//! only state visible to other threads goes through [`EngineSignals`].

use super::profile::{ProfileId, ProfileRegistry, ProfileStore};
use crate::hook::types::{KeyEvent, KeyId, Modifier, Transition};
use crate::stats::SharedEngineStats;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Whether the recording chord is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The chord is not complete.
    Idle,
    /// Both modifiers are held.
    Armed {
        /// Profile recording runs with
        active: ProfileId,
        /// When the completing modifier went down
        since: DateTime<Utc>,
    },
}

impl SessionState {
    pub fn is_armed(&self) -> bool {
        matches!(self, SessionState::Armed { .. })
    }
}

/// Application-level command emitted by the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Arm(ProfileId),
    Disarm(ProfileId),
    SwitchProfile(ProfileId),
}

impl Command {
    pub fn profile(&self) -> ProfileId {
        match *self {
            Command::Arm(p) | Command::Disarm(p) | Command::SwitchProfile(p) => p,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Arm(_) => "arm",
            Command::Disarm(_) => "disarm",
            Command::SwitchProfile(_) => "switch_profile",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.profile())
    }
}

/// State the recognizer publishes for other threads.
///
/// Written only by the recognizer worker. The hook context reads `armed` to
/// make its suppression decision; the application reads the current profile.
#[derive(Debug)]
pub struct EngineSignals {
    armed: AtomicBool,
    profile: AtomicU32,
}

impl EngineSignals {
    pub fn new(profile: ProfileId) -> Self {
        Self {
            armed: AtomicBool::new(false),
            profile: AtomicU32::new(profile.get()),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn current_profile(&self) -> ProfileId {
        ProfileId::new(self.profile.load(Ordering::Acquire))
    }

    pub(crate) fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
    }

    pub(crate) fn set_profile(&self, profile: ProfileId) {
        self.profile.store(profile.get(), Ordering::Release);
    }
}

/// Sequential chord state machine.
pub struct ChordRecognizer {
    registry: ProfileRegistry,
    store: ProfileStore,
    signals: Arc<EngineSignals>,
    stats: SharedEngineStats,
    pressed: HashSet<KeyId>,
    state: SessionState,
    current: ProfileId,
}

impl ChordRecognizer {
    /// Create an idle recognizer starting from the profile in `signals`.
    pub fn new(
        registry: ProfileRegistry,
        store: ProfileStore,
        signals: Arc<EngineSignals>,
        stats: SharedEngineStats,
    ) -> Self {
        let current = signals.current_profile();
        Self {
            registry,
            store,
            signals,
            stats,
            pressed: HashSet::new(),
            state: SessionState::Idle,
            current,
        }
    }

    /// Apply one event, returning the command it produces, if any.
    pub fn process(&mut self, event: &KeyEvent) -> Option<Command> {
        match (event.key, event.transition) {
            (KeyId::Modifier(..), Transition::Down) => self.modifier_down(event),
            (KeyId::Modifier(..), Transition::Up) => self.modifier_up(event),
            (KeyId::Selector(_), Transition::Down) => self.selector_down(event.key),
            (KeyId::Selector(_), Transition::Up) => None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state.is_armed()
    }

    /// Last known profile; the one the next arm will use.
    pub fn current_profile(&self) -> ProfileId {
        self.current
    }

    pub fn is_pressed(&self, key: KeyId) -> bool {
        self.pressed.contains(&key)
    }

    /// Whether `modifier` is held on either side.
    pub fn modifier_held(&self, modifier: Modifier) -> bool {
        self.pressed.iter().any(|k| k.modifier() == Some(modifier))
    }

    /// Whether every chord modifier is currently held.
    pub fn chord_held(&self) -> bool {
        Modifier::ALL.iter().all(|m| self.modifier_held(*m))
    }

    fn modifier_down(&mut self, event: &KeyEvent) -> Option<Command> {
        if !self.pressed.insert(event.key) {
            // OS key repeat
            return None;
        }
        tracing::trace!(key = %event.key, "modifier down");

        if !self.chord_held() || self.state.is_armed() {
            return None;
        }

        self.state = SessionState::Armed {
            active: self.current,
            since: event.observed_at,
        };
        self.signals.set_armed(true);
        tracing::debug!(profile = %self.current, "chord armed");
        Some(Command::Arm(self.current))
    }

    fn modifier_up(&mut self, event: &KeyEvent) -> Option<Command> {
        if !self.pressed.remove(&event.key) {
            return None;
        }
        tracing::trace!(key = %event.key, "modifier up");

        let SessionState::Armed { active, since } = self.state else {
            return None;
        };
        if self.chord_held() {
            return None;
        }

        self.state = SessionState::Idle;
        self.signals.set_armed(false);
        let held = event.observed_at - since;
        tracing::debug!(
            profile = %active,
            held_ms = held.num_milliseconds(),
            "chord released"
        );
        Some(Command::Disarm(active))
    }

    fn selector_down(&mut self, key: KeyId) -> Option<Command> {
        let SessionState::Armed { active, since } = self.state else {
            return None;
        };
        let profile = key.profile()?;
        if profile == active || !self.registry.is_supported(profile) {
            return None;
        }

        self.state = SessionState::Armed {
            active: profile,
            since,
        };
        self.current = profile;
        self.signals.set_profile(profile);
        if !self.store.save(profile) {
            self.stats.record_persist_failure();
        }
        tracing::debug!(from = %active, to = %profile, "profile switched");
        Some(Command::SwitchProfile(profile))
    }
}

impl fmt::Debug for ChordRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChordRecognizer")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("pressed", &self.pressed)
            .finish_non_exhaustive()
    }
}
