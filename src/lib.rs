//! chordkey - global chord recognition for hold-to-record dictation.
//!
//! Turns the raw keyboard stream into three application commands: arm
//! recording when Ctrl+Shift is held, disarm when either is released, and
//! switch profile when a digit-row key is pressed while the chord is held.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Chord Engine                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  OS hook thread            │  recognizer worker                  │
//! │  ┌─────────────┐  bounded  │  ┌─────────────┐   ┌─────────────┐  │
//! │  │ HookAdapter │──channel──┼─▶│ Recognizer  │──▶│ CommandSink │  │
//! │  └─────────────┘           │  └─────────────┘   └─────────────┘  │
//! │         ▲                  │         │                           │
//! │         └──── armed flag ──┼─────────┤                           │
//! │                            │         ▼                           │
//! │                            │  ┌─────────────┐                    │
//! │                            │  │ProfileStore │                    │
//! │                            │  └─────────────┘                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The hook side never blocks: it enqueues with `try_send` and answers the
//! suppression question from an atomic flag. All state lives on the worker.
//!
//! # Example
//!
//! ```no_run
//! use chordkey::{CallbackSink, ChordEngine, Config, PlatformHook};
//!
//! let sink = CallbackSink::new(
//!     |profile| { println!("recording with profile {profile}"); Ok(()) },
//!     |profile| { println!("stopped ({profile})"); Ok(()) },
//!     |profile| { println!("now using profile {profile}"); Ok(()) },
//! );
//! let engine = ChordEngine::from_config(&Config::default(), sink, PlatformHook::new())
//!     .expect("invalid configuration");
//! engine.start().expect("failed to start");
//! ```

pub mod config;
pub mod core;
pub mod hook;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use crate::core::{
    CallbackError, CallbackResult, CallbackSink, ChordEngine, ChordRecognizer, Command,
    CommandSink, ConfigurationError, EngineError, EngineOptions, Persisted, ProfileId,
    ProfileRegistry, ProfileStore, SessionState,
};
pub use hook::{
    HookAdapter, HookDecision, HookError, KeyEvent, KeyHook, KeyId, ManualHook, ManualKeyboard,
    Modifier, PlatformHook, Side, Transition,
};
pub use stats::{EngineStats, SharedEngineStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
