//! The application-facing side of the engine.
//!
//! Callbacks run on the recognizer worker thread. A sink that needs a
//! different thread (UI, audio) is responsible for marshaling there itself and
//! should return quickly.

use super::profile::ProfileId;

/// Error a sink callback may return. Logged by the engine, never propagated.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a sink callback.
pub type CallbackResult = Result<(), CallbackError>;

/// Receiver of the commands produced by the chord recognizer.
pub trait CommandSink: Send + Sync + 'static {
    /// Both modifiers are down: start recording with `profile`.
    fn on_arm(&self, profile: ProfileId) -> CallbackResult;

    /// A modifier was released: stop recording. `profile` is the profile active at release.
    fn on_disarm(&self, profile: ProfileId) -> CallbackResult;

    /// A selector key changed the active profile while armed.
    fn on_profile_switch(&self, profile: ProfileId) -> CallbackResult;
}

type Callback = Box<dyn Fn(ProfileId) -> CallbackResult + Send + Sync>;

/// A [`CommandSink`] assembled from three closures.
///
/// ```
/// use chordkey::CallbackSink;
///
/// let sink = CallbackSink::new(
///     |profile| { println!("arm {profile}"); Ok(()) },
///     |profile| { println!("disarm {profile}"); Ok(()) },
///     |profile| { println!("switch {profile}"); Ok(()) },
/// );
/// # let _ = sink;
/// ```
pub struct CallbackSink {
    on_arm: Callback,
    on_disarm: Callback,
    on_profile_switch: Callback,
}

impl CallbackSink {
    pub fn new<A, D, S>(on_arm: A, on_disarm: D, on_profile_switch: S) -> Self
    where
        A: Fn(ProfileId) -> CallbackResult + Send + Sync + 'static,
        D: Fn(ProfileId) -> CallbackResult + Send + Sync + 'static,
        S: Fn(ProfileId) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            on_arm: Box::new(on_arm),
            on_disarm: Box::new(on_disarm),
            on_profile_switch: Box::new(on_profile_switch),
        }
    }
}

impl CommandSink for CallbackSink {
    fn on_arm(&self, profile: ProfileId) -> CallbackResult {
        (self.on_arm)(profile)
    }

    fn on_disarm(&self, profile: ProfileId) -> CallbackResult {
        (self.on_disarm)(profile)
    }

    fn on_profile_switch(&self, profile: ProfileId) -> CallbackResult {
        (self.on_profile_switch)(profile)
    }
}

impl std::fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}
