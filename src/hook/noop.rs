//! Fallback hook for targets without a native backend.
//!
//! This exists so the crate (and binary) can compile on targets other than
//! macOS and Windows. Installing it succeeds but no keys are ever delivered;
//! use [`ManualHook`](super::ManualHook) to drive the engine there.

use super::adapter::HookAdapter;
use super::{HookError, KeyHook};

/// A hook that never delivers events.
#[derive(Debug, Default)]
pub struct NoopHook {
    installed: bool,
}

impl NoopHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

impl KeyHook for NoopHook {
    fn install(&mut self, _adapter: HookAdapter) -> Result<(), HookError> {
        if self.installed {
            return Err(HookError::AlreadyInstalled);
        }
        tracing::warn!("no native keyboard hook on this platform, chords will not be observed");
        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.installed = false;
    }
}

/// There is no permission gate on these targets.
pub fn check_permission() -> bool {
    true
}
