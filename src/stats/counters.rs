//! Lock-free engine counters.
//!
//! Every counter is a relaxed atomic so the hook context can record drops
//! without waiting on anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one engine session.
#[derive(Debug)]
pub struct EngineStats {
    /// Events accepted by the channel
    events_enqueued: AtomicU64,
    /// Events dropped because the channel was full
    events_dropped: AtomicU64,
    /// Arm commands delivered
    arms: AtomicU64,
    /// Disarm commands delivered
    disarms: AtomicU64,
    /// Profile switches delivered
    switches: AtomicU64,
    /// Sink callbacks that failed or panicked
    callback_failures: AtomicU64,
    /// Failed profile writes
    persist_failures: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting cumulative stats
    persist_path: Option<PathBuf>,
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            events_enqueued: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            arms: AtomicU64::new(0),
            disarms: AtomicU64::new(0),
            switches: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create counters that continue from, and save back to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!(error = %e, "could not load previous engine stats");
        }

        stats
    }

    pub fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_arm(&self) {
        self.arms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disarm(&self) {
        self.disarms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_switch(&self) {
        self.switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_failure(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of dropped events so far.
    pub fn dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            arms: self.arms.load(Ordering::Relaxed),
            disarms: self.disarms.load(Ordering::Relaxed),
            switches: self.switches.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Engine Statistics:\n\
             - Key events delivered: {}\n\
             - Key events dropped (queue full): {}\n\
             - Recordings armed: {}\n\
             - Recordings disarmed: {}\n\
             - Profile switches: {}\n\
             - Callback failures: {}\n\
             - Profile write failures: {}\n\
             - Session duration: {} seconds",
            stats.events_enqueued,
            stats.events_dropped,
            stats.arms,
            stats.disarms,
            stats.switches,
            stats.callback_failures,
            stats.persist_failures,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                events_enqueued: stats.events_enqueued,
                events_dropped: stats.events_dropped,
                arms: stats.arms,
                disarms: stats.disarms,
                switches: stats.switches,
                callback_failures: stats.callback_failures,
                persist_failures: stats.persist_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.events_enqueued
                    .store(persisted.events_enqueued, Ordering::Relaxed);
                self.events_dropped
                    .store(persisted.events_dropped, Ordering::Relaxed);
                self.arms.store(persisted.arms, Ordering::Relaxed);
                self.disarms.store(persisted.disarms, Ordering::Relaxed);
                self.switches.store(persisted.switches, Ordering::Relaxed);
                self.callback_failures
                    .store(persisted.callback_failures, Ordering::Relaxed);
                self.persist_failures
                    .store(persisted.persist_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub events_enqueued: u64,
    pub events_dropped: u64,
    pub arms: u64,
    pub disarms: u64,
    pub switches: u64,
    pub callback_failures: u64,
    pub persist_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub events_enqueued: u64,
    pub events_dropped: u64,
    pub arms: u64,
    pub disarms: u64,
    pub switches: u64,
    pub callback_failures: u64,
    pub persist_failures: u64,
    pub last_updated: DateTime<Utc>,
}

/// Stats shared between the hook, the worker and the application.
pub type SharedEngineStats = Arc<EngineStats>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counting() {
        let stats = EngineStats::new();

        stats.record_enqueued();
        stats.record_enqueued();
        stats.record_dropped();
        stats.record_arm();

        let snapshot = stats.stats();
        assert_eq!(snapshot.events_enqueued, 2);
        assert_eq!(snapshot.events_dropped, 1);
        assert_eq!(snapshot.arms, 1);
        assert_eq!(snapshot.disarms, 0);
        assert_eq!(stats.dropped(), 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = EngineStats::new().summary();

        assert!(summary.contains("Key events delivered"));
        assert!(summary.contains("dropped"));
        assert!(summary.contains("Profile switches"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats").join("engine.json");

        let stats = EngineStats::with_persistence(path.clone());
        stats.record_arm();
        stats.record_switch();
        stats.record_switch();
        stats.save().unwrap();

        let reloaded = EngineStats::with_persistence(path);
        let snapshot = reloaded.stats();
        assert_eq!(snapshot.arms, 1);
        assert_eq!(snapshot.switches, 2);
    }

    #[test]
    fn test_unreadable_stats_start_from_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "{ not json").unwrap();

        let stats = EngineStats::with_persistence(path);
        assert_eq!(stats.stats().arms, 0);
    }
}
