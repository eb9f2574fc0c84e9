//! Keyboard hook layer.
//!
//! A [`KeyHook`] subscribes to the OS keyboard stream and forwards every
//! transition to a [`HookAdapter`], applying the adapter's suppression
//! decision. Platform backends live in submodules; [`PlatformHook`] names the
//! one for the current target.

pub mod adapter;
pub mod manual;
pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

use thiserror::Error;

pub use adapter::{HookAdapter, HookDecision};
pub use manual::{ManualHook, ManualKeyboard};
pub use types::{KeyEvent, KeyId, Modifier, Side, Transition};

#[cfg(target_os = "macos")]
pub use macos::{check_permission, MacOSHook};

/// Platform-agnostic hook type alias
#[cfg(target_os = "macos")]
pub type PlatformHook = MacOSHook;

#[cfg(target_os = "windows")]
pub use windows::{check_permission, WindowsHook};

/// Platform-agnostic hook type alias
#[cfg(target_os = "windows")]
pub type PlatformHook = WindowsHook;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{check_permission, NoopHook};

/// Platform-agnostic hook type alias
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type PlatformHook = NoopHook;

/// Fail with [`HookError::PermissionDenied`] unless the OS lets this process
/// observe the keyboard.
pub fn ensure_permission() -> Result<(), HookError> {
    if check_permission() {
        Ok(())
    } else {
        Err(HookError::PermissionDenied)
    }
}

/// Install/uninstall seam over an OS keyboard hook.
pub trait KeyHook: Send {
    /// Start delivering key transitions to `adapter`.
    fn install(&mut self, adapter: HookAdapter) -> Result<(), HookError>;

    /// Stop delivering key transitions. Must be safe to call when not installed.
    fn uninstall(&mut self);
}

/// Errors that can occur while installing a hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook is already installed")]
    AlreadyInstalled,

    #[error("input monitoring permission not granted")]
    PermissionDenied,

    #[error("failed to create event tap")]
    TapCreationFailed,

    #[error("failed to create run loop source")]
    RunLoopSourceFailed,

    #[error("failed to install keyboard hook")]
    InstallFailed,

    #[error("hook thread exited before reporting readiness")]
    ThreadExited,

    #[error("failed to spawn hook thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[cfg(all(test, not(any(target_os = "macos", target_os = "windows"))))]
mod tests {
    use super::*;

    #[test]
    fn test_permission_always_granted_without_os_hook() {
        assert!(ensure_permission().is_ok());
    }
}
