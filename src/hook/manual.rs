//! A hook driven from code rather than the OS.
//!
//! [`ManualHook`] is installed like any other backend; its paired
//! [`ManualKeyboard`] feeds key names into whatever adapter is currently
//! installed. Used for replaying scripted input and in tests.

use super::adapter::{HookAdapter, HookDecision};
use super::types::Transition;
use super::{HookError, KeyHook};
use parking_lot::Mutex;
use std::sync::Arc;

type Slot = Arc<Mutex<Option<HookAdapter>>>;

/// Hook backend whose key stream comes from a [`ManualKeyboard`].
#[derive(Debug)]
pub struct ManualHook {
    slot: Slot,
}

/// Handle used to type into a [`ManualHook`].
#[derive(Debug, Clone)]
pub struct ManualKeyboard {
    slot: Slot,
}

impl ManualHook {
    pub fn new() -> (Self, ManualKeyboard) {
        let slot: Slot = Arc::new(Mutex::new(None));
        (Self { slot: slot.clone() }, ManualKeyboard { slot })
    }
}

impl KeyHook for ManualHook {
    fn install(&mut self, adapter: HookAdapter) -> Result<(), HookError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(HookError::AlreadyInstalled);
        }
        *slot = Some(adapter);
        Ok(())
    }

    fn uninstall(&mut self) {
        self.slot.lock().take();
    }
}

impl ManualKeyboard {
    /// Deliver one transition. Returns `None` when no hook is installed.
    pub fn send(&self, name: &str, transition: Transition) -> Option<HookDecision> {
        let adapter = self.slot.lock().clone()?;
        Some(adapter.handle(name, transition))
    }

    pub fn press(&self, name: &str) -> Option<HookDecision> {
        self.send(name, Transition::Down)
    }

    pub fn release(&self, name: &str) -> Option<HookDecision> {
        self.send(name, Transition::Up)
    }

    /// Press then release.
    pub fn tap(&self, name: &str) -> Option<HookDecision> {
        let decision = self.press(name);
        self.release(name);
        decision
    }

    pub fn is_installed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Parse a key script such as `"ctrl+ shift+ 2+ 2- shift- ctrl-"`.
///
/// Each whitespace-separated step is a key name followed by `+` (down) or
/// `-` (up). Multi-word key names use `_` in place of the space
/// (`left_ctrl+`).
pub fn parse_script(script: &str) -> Result<Vec<(String, Transition)>, String> {
    script
        .split_whitespace()
        .map(|step| {
            let (name, transition) = if let Some(name) = step.strip_suffix('+') {
                (name, Transition::Down)
            } else if let Some(name) = step.strip_suffix('-') {
                (name, Transition::Up)
            } else {
                return Err(format!("step {step:?} must end with '+' or '-'"));
            };
            if name.is_empty() {
                return Err(format!("step {step:?} has no key name"));
            }
            Ok((name.replace('_', " "), transition))
        })
        .collect()
}
