use crate::hook::HookError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems detected while constructing the engine.
///
/// Raised before any hook is installed.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The supported profile set is empty.
    #[error("supported profile set is empty")]
    NoProfiles,

    /// The event channel was configured without room for a single event.
    #[error("event channel capacity must be at least 1")]
    ZeroCapacity,

    /// The persisted profile file exists but does not hold an integer.
    #[error("persisted profile file {} is corrupted: {content:?}", path.display())]
    CorruptProfileFile { path: PathBuf, content: String },

    /// The persisted profile file exists but could not be read.
    #[error("cannot read persisted profile file {}: {source}", path.display())]
    UnreadableProfileFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors from the engine's control surface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("chord engine is already running")]
    AlreadyRunning,

    #[error("failed to spawn recognizer worker: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Hook(#[from] HookError),
}
