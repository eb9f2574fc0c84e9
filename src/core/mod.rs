//! Core of the chord engine.
//!
//! This module contains:
//! - The bounded event channel between the hook and the worker
//! - The profile registry and persisted profile store
//! - The chord recognizer state machine
//! - The engine that ties them together with a start/stop lifecycle

pub mod channel;
pub mod engine;
pub mod error;
pub mod profile;
pub mod recognizer;
pub mod sink;

// Re-export commonly used types
pub use channel::{event_channel, Dequeued, EventReceiver, EventSender};
pub use engine::{ChordEngine, EngineOptions};
pub use error::{ConfigurationError, EngineError};
pub use profile::{Persisted, ProfileId, ProfileRegistry, ProfileStore};
pub use recognizer::{ChordRecognizer, Command, EngineSignals, SessionState};
pub use sink::{CallbackError, CallbackResult, CallbackSink, CommandSink};
