//! Profile identifiers, the supported-profile registry and the persisted
//! last-active profile.

use super::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Identifier of a configuration profile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProfileId(u32);

impl ProfileId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ProfileId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed set of profiles the engine is allowed to select.
///
/// Never empty: [`ProfileRegistry::new`] rejects an empty set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRegistry {
    supported: BTreeSet<ProfileId>,
}

impl ProfileRegistry {
    /// Build a registry from the supported profile ids.
    pub fn new<I>(profiles: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator,
        I::Item: Into<ProfileId>,
    {
        let supported: BTreeSet<ProfileId> = profiles.into_iter().map(Into::into).collect();
        if supported.is_empty() {
            return Err(ConfigurationError::NoProfiles);
        }
        Ok(Self { supported })
    }

    pub fn is_supported(&self, id: ProfileId) -> bool {
        self.supported.contains(&id)
    }

    /// The smallest supported profile, used as the default.
    pub fn min(&self) -> ProfileId {
        // Non-empty by construction.
        self.supported
            .first()
            .copied()
            .unwrap_or(ProfileId::new(0))
    }

    pub fn iter(&self) -> impl Iterator<Item = ProfileId> + '_ {
        self.supported.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.supported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supported.is_empty()
    }
}

/// What the persisted file holds, judged against a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// No file yet.
    Absent,
    /// A supported profile.
    Supported(ProfileId),
    /// An integer that is not a supported profile, as written in the file.
    Unsupported(String),
}

/// Parse an integer the way it is written by hand: optional sign, then
/// ASCII digits. `Ok(None)` is an integer outside the `u32` range.
fn parse_integer(text: &str) -> Result<Option<u32>, ()> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(());
    }
    let magnitude = digits.parse::<u32>().ok();
    Ok(match (negative, magnitude) {
        (true, Some(0)) => Some(0),
        (true, _) => None,
        (false, m) => m,
    })
}

/// The last active profile, kept as a decimal string in a small text file.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted profile and reconcile it with `registry`.
    ///
    /// - absent file: `registry.min()`, nothing written
    /// - unreadable or non-numeric content: [`ConfigurationError`]
    /// - numeric but unsupported: `registry.min()`, written back
    pub fn load(&self, registry: &ProfileRegistry) -> Result<ProfileId, ConfigurationError> {
        match self.peek(registry)? {
            Persisted::Absent => {
                tracing::debug!(path = %self.path.display(), "no persisted profile, using default");
                Ok(registry.min())
            }
            Persisted::Supported(id) => {
                tracing::debug!(profile = %id, "loaded persisted profile");
                Ok(id)
            }
            Persisted::Unsupported(stored) => {
                let fallback = registry.min();
                tracing::info!(
                    stored = %stored,
                    profile = %fallback,
                    "persisted profile not supported, resetting"
                );
                self.save(fallback);
                Ok(fallback)
            }
        }
    }

    /// Classify the persisted content without correcting or writing anything.
    pub fn peek(&self, registry: &ProfileRegistry) -> Result<Persisted, ConfigurationError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Persisted::Absent),
            Err(e) => {
                return Err(ConfigurationError::UnreadableProfileFile {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let text = content.trim();
        let value = parse_integer(text).map_err(|()| ConfigurationError::CorruptProfileFile {
            path: self.path.clone(),
            content: text.to_string(),
        })?;

        Ok(match value.map(ProfileId::new) {
            Some(id) if registry.is_supported(id) => Persisted::Supported(id),
            _ => Persisted::Unsupported(text.to_string()),
        })
    }

    /// Persist `profile`. Failures are logged and otherwise ignored.
    pub fn save(&self, profile: ProfileId) -> bool {
        match self.write(profile) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    profile = %profile,
                    error = %e,
                    "failed to persist profile"
                );
                false
            }
        }
    }

    fn write(&self, profile: ProfileId) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, profile.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> ProfileRegistry {
        ProfileRegistry::new([1u32, 2, 3]).unwrap()
    }

    fn store_in(dir: &TempDir) -> ProfileStore {
        ProfileStore::new(dir.path().join("profile.txt"))
    }

    #[test]
    fn test_empty_registry_rejected() {
        let err = ProfileRegistry::new(Vec::<u32>::new()).unwrap_err();
        assert!(matches!(err, ConfigurationError::NoProfiles));
    }

    #[test]
    fn test_registry_min_and_membership() {
        let registry = ProfileRegistry::new([3u32, 1, 2]).unwrap();
        assert_eq!(registry.min(), ProfileId::new(1));
        assert!(registry.is_supported(ProfileId::new(2)));
        assert!(!registry.is_supported(ProfileId::new(4)));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_absent_file_defaults_without_writing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.load(&registry()).unwrap(), ProfileId::new(1));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_supported_value_is_loaded() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "3\n").unwrap();

        assert_eq!(store.load(&registry()).unwrap(), ProfileId::new(3));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "3\n");
    }

    #[test]
    fn test_unsupported_value_is_corrected_and_rewritten() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "9").unwrap();

        assert_eq!(store.load(&registry()).unwrap(), ProfileId::new(1));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "1");
    }

    #[test]
    fn test_negative_value_is_corrected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "-4").unwrap();

        assert_eq!(store.load(&registry()).unwrap(), ProfileId::new(1));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "1");
    }

    #[test]
    fn test_huge_value_is_corrected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "99999999999999999999\n").unwrap();

        assert_eq!(store.load(&registry()).unwrap(), ProfileId::new(1));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "1");
    }

    #[test]
    fn test_integer_shapes() {
        assert_eq!(parse_integer("2"), Ok(Some(2)));
        assert_eq!(parse_integer("+3"), Ok(Some(3)));
        assert_eq!(parse_integer("-0"), Ok(Some(0)));
        assert_eq!(parse_integer("-4"), Ok(None));
        assert_eq!(parse_integer("4294967296"), Ok(None));
        for text in ["", "-", "+", "1.5", "0x2", "two", "1 2"] {
            assert_eq!(parse_integer(text), Err(()), "{text:?}");
        }
    }

    #[test]
    fn test_peek_does_not_correct() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.peek(&registry()).unwrap(), Persisted::Absent);

        std::fs::write(store.path(), "9").unwrap();
        assert_eq!(
            store.peek(&registry()).unwrap(),
            Persisted::Unsupported("9".to_string())
        );
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "9");

        std::fs::write(store.path(), " 2 ").unwrap();
        assert_eq!(
            store.peek(&registry()).unwrap(),
            Persisted::Supported(ProfileId::new(2))
        );
    }

    #[test]
    fn test_corrupt_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "two").unwrap();

        let err = store.load(&registry()).unwrap_err();
        assert!(matches!(err, ConfigurationError::CorruptProfileFile { .. }));
        // Left untouched for the user to inspect.
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "two");
    }

    #[test]
    fn test_empty_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "").unwrap();

        assert!(store.load(&registry()).is_err());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path().join("nested").join("profile.txt"));

        assert!(store.save(ProfileId::new(2)));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "2");
    }

    #[test]
    fn test_save_failure_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = ProfileStore::new(blocker.join("profile.txt"));

        assert!(!store.save(ProfileId::new(2)));
    }
}
