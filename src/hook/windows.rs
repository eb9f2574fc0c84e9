//! Windows keyboard hook using `WH_KEYBOARD_LL`.
//!
//! The hook is installed on a dedicated thread that pumps messages; Windows
//! calls the hook procedure on that thread. Returning a non-zero value from
//! the procedure swallows the key.

use super::adapter::HookAdapter;
use super::types::Transition;
use super::{HookError, KeyHook};
use crossbeam_channel::bounded;
use std::cell::RefCell;
use std::thread::{self, JoinHandle};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN,
    WM_SYSKEYUP,
};

// Virtual-key codes
const VK_SHIFT: u32 = 0x10;
const VK_CONTROL: u32 = 0x11;
const VK_LSHIFT: u32 = 0xA0;
const VK_RSHIFT: u32 = 0xA1;
const VK_LCONTROL: u32 = 0xA2;
const VK_RCONTROL: u32 = 0xA3;
const VK_0: u32 = 0x30;
const VK_9: u32 = 0x39;

const DIGIT_NAMES: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

thread_local! {
    /// Adapter for the hook procedure running on this thread.
    static ADAPTER: RefCell<Option<HookAdapter>> = const { RefCell::new(None) };
}

/// The Windows keyboard hook.
#[derive(Debug, Default)]
pub struct WindowsHook {
    thread_id: Option<u32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl KeyHook for WindowsHook {
    fn install(&mut self, adapter: HookAdapter) -> Result<(), HookError> {
        if self.thread_handle.is_some() {
            return Err(HookError::AlreadyInstalled);
        }

        let (ready_tx, ready_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("chordkey-keyboard-hook".into())
            .spawn(move || {
                ADAPTER.with(|slot| *slot.borrow_mut() = Some(adapter));
                let result = run_hook_loop(|thread_id| {
                    let _ = ready_tx.send(Ok(thread_id));
                });
                if let Err(e) = result {
                    let _ = ready_tx.send(Err(e));
                }
                ADAPTER.with(|slot| slot.borrow_mut().take());
            })
            .map_err(HookError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.thread_id = Some(thread_id);
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
        if let Some(thread_id) = self.thread_id.take() {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WindowsHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Map a virtual-key code to a key name the adapter understands.
fn key_name(vk: u32) -> Option<&'static str> {
    match vk {
        VK_CONTROL | VK_LCONTROL => Some("left ctrl"),
        VK_RCONTROL => Some("right ctrl"),
        VK_SHIFT | VK_LSHIFT => Some("left shift"),
        VK_RSHIFT => Some("right shift"),
        VK_0..=VK_9 => Some(DIGIT_NAMES[(vk - VK_0) as usize]),
        _ => None,
    }
}

/// Low-level keyboard hook callback.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let kb_struct = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let transition = match w_param.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(Transition::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(Transition::Up),
            _ => None,
        };

        if let (Some(transition), Some(name)) = (transition, key_name(kb_struct.vkCode)) {
            let suppress = ADAPTER.with(|slot| {
                slot.borrow()
                    .as_ref()
                    .map(|adapter| adapter.handle(name, transition).is_suppress())
                    .unwrap_or(false)
            });
            if suppress {
                return LRESULT(1);
            }
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Install the hook on this thread and pump messages until `WM_QUIT`.
fn run_hook_loop(ready: impl FnOnce(u32)) -> Result<(), HookError> {
    unsafe {
        let hook = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
            .map_err(|_| HookError::InstallFailed)?;
        ready(GetCurrentThreadId());
        tracing::debug!("keyboard hook installed");

        let mut msg = MSG::default();
        // 0 means WM_QUIT, -1 an error
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {}

        let _ = UnhookWindowsHookEx(hook);
        tracing::debug!("keyboard hook removed");
    }
    Ok(())
}

/// Check if a low-level keyboard hook can be installed.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(VK_LCONTROL), Some("left ctrl"));
        assert_eq!(key_name(VK_RCONTROL), Some("right ctrl"));
        assert_eq!(key_name(VK_RSHIFT), Some("right shift"));
        assert_eq!(key_name(0x32), Some("2"));
        assert_eq!(key_name(0x41), None);
    }

    #[test]
    fn test_hook_creation() {
        let hook = WindowsHook::new();
        assert!(!hook.is_running());
    }
}
