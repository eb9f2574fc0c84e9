//! macOS keyboard hook using a CGEvent tap.
//!
//! The tap is an active filter so selector keys can be dropped while the
//! chord is armed. It requires Input Monitoring (and Accessibility, for an
//! active tap) permission.

use super::adapter::HookAdapter;
use super::types::Transition;
use super::{HookError, KeyHook};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// Virtual key codes (kVK_*) from HIToolbox/Events.h
const KC_SHIFT: i64 = 56;
const KC_CONTROL: i64 = 59;
const KC_RIGHT_SHIFT: i64 = 60;
const KC_RIGHT_CONTROL: i64 = 62;

// Device-dependent modifier bits (NX_DEVICE*KEYMASK); the generic flags
// stay set while the other side is still held.
const DEVICE_LEFT_CONTROL: u64 = 0x0000_0001;
const DEVICE_LEFT_SHIFT: u64 = 0x0000_0002;
const DEVICE_RIGHT_SHIFT: u64 = 0x0000_0004;
const DEVICE_RIGHT_CONTROL: u64 = 0x0000_2000;

/// Digit-row key codes, indexed by digit.
const DIGIT_KEYCODES: [i64; 10] = [29, 18, 19, 20, 21, 23, 22, 26, 28, 25];
const DIGIT_NAMES: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

/// The macOS keyboard hook.
#[derive(Debug, Default)]
pub struct MacOSHook {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the tap thread is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl KeyHook for MacOSHook {
    fn install(&mut self, adapter: HookAdapter) -> Result<(), HookError> {
        if self.thread_handle.is_some() {
            return Err(HookError::AlreadyInstalled);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name("chordkey-event-tap".into())
            .spawn(move || {
                if let Err(e) = run_event_loop(adapter, running.clone(), &ready_tx) {
                    let _ = ready_tx.send(Err(e));
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HookError::Spawn(e)
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(HookError::ThreadExited)
            }
        }
    }

    fn uninstall(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The run loop wakes at least every 100ms to check `running`.
            let _ = handle.join();
        }
    }
}

impl Drop for MacOSHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Create the tap on this thread and run its loop until `running` clears.
fn run_event_loop(
    adapter: HookAdapter,
    running: Arc<AtomicBool>,
    ready: &Sender<Result<(), HookError>>,
) -> Result<(), HookError> {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        move |_proxy, event_type, event| match classify(event_type, event) {
            Some((name, transition)) if adapter.handle(name, transition).is_suppress() => {
                CallbackResult::Drop
            }
            _ => CallbackResult::Keep,
        },
    )
    .map_err(|_| HookError::TapCreationFailed)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| HookError::RunLoopSourceFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();
    let _ = ready.send(Ok(()));
    tracing::debug!("event tap installed");

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            Duration::from_millis(100),
            false,
        );
    }

    // The tap is disabled when dropped
    tracing::debug!("event tap removed");
    Ok(())
}

/// Map a CGEvent to a key name the adapter understands.
fn classify(event_type: CGEventType, event: &CGEvent) -> Option<(&'static str, Transition)> {
    let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);

    match event_type {
        CGEventType::KeyDown => digit_name(keycode).map(|n| (n, Transition::Down)),
        CGEventType::KeyUp => digit_name(keycode).map(|n| (n, Transition::Up)),
        CGEventType::FlagsChanged => {
            // Modifiers only report a flags change; the flag tells down from up.
            let flags = event.get_flags().bits();
            let (name, mask) = modifier_key(keycode)?;
            let transition = if flags & mask != 0 {
                Transition::Down
            } else {
                Transition::Up
            };
            Some((name, transition))
        }
        _ => None,
    }
}

/// Key name and device flag bit for a physical modifier key.
fn modifier_key(keycode: i64) -> Option<(&'static str, u64)> {
    match keycode {
        KC_CONTROL => Some(("left ctrl", DEVICE_LEFT_CONTROL)),
        KC_RIGHT_CONTROL => Some(("right ctrl", DEVICE_RIGHT_CONTROL)),
        KC_SHIFT => Some(("left shift", DEVICE_LEFT_SHIFT)),
        KC_RIGHT_SHIFT => Some(("right shift", DEVICE_RIGHT_SHIFT)),
        _ => None,
    }
}

fn digit_name(keycode: i64) -> Option<&'static str> {
    DIGIT_KEYCODES
        .iter()
        .position(|&k| k == keycode)
        .map(|digit| DIGIT_NAMES[digit])
}

/// Check if the application may create a keyboard event tap.
///
/// macOS has no direct query for Input Monitoring; creating a passive tap
/// fails when permission is missing.
pub fn check_permission() -> bool {
    CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_keycodes() {
        assert_eq!(digit_name(18), Some("1"));
        assert_eq!(digit_name(29), Some("0"));
        assert_eq!(digit_name(0), None);
    }

    #[test]
    fn test_modifier_sides() {
        assert_eq!(modifier_key(KC_CONTROL), Some(("left ctrl", DEVICE_LEFT_CONTROL)));
        assert_eq!(
            modifier_key(KC_RIGHT_SHIFT),
            Some(("right shift", DEVICE_RIGHT_SHIFT))
        );
        assert_eq!(modifier_key(18), None);
    }

    #[test]
    fn test_hook_creation() {
        let hook = MacOSHook::new();
        assert!(!hook.is_running());
    }
}
