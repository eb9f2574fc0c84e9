//! The chord engine: owns the hook, the channel and the recognizer worker.

use super::channel::{event_channel, Dequeued, EventReceiver};
use super::error::{ConfigurationError, EngineError};
use super::profile::{ProfileId, ProfileRegistry, ProfileStore};
use super::recognizer::{ChordRecognizer, Command, EngineSignals};
use super::sink::CommandSink;
use crate::config::Config;
use crate::hook::{HookAdapter, KeyHook};
use crate::stats::{EngineStats, SharedEngineStats};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Timing and sizing knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum number of queued key events
    pub channel_capacity: usize,
    /// How long the worker waits for an event before checking for shutdown
    pub dequeue_timeout: Duration,
    /// How long `stop` waits for the worker to exit
    pub stop_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            channel_capacity: super::channel::DEFAULT_CAPACITY,
            dequeue_timeout: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            channel_capacity: config.channel_capacity,
            dequeue_timeout: Duration::from_millis(config.dequeue_timeout_ms),
            stop_timeout: Duration::from_millis(config.stop_timeout_ms),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    thread_id: ThreadId,
    /// Cancellation for this worker only; a detached worker never sees a reset.
    shutdown: Arc<AtomicBool>,
    /// Consumer end of this session's channel.
    receiver: EventReceiver,
    /// Disconnects when the worker thread exits.
    exited: Receiver<()>,
}

/// Global chord recognition engine.
///
/// Construct with [`ChordEngine::new`], then [`start`](Self::start) to install
/// the hook and spawn the recognizer worker. [`stop`](Self::stop) may be called
/// from any thread, any number of times; dropping the engine stops it.
pub struct ChordEngine<H: KeyHook> {
    registry: ProfileRegistry,
    store: ProfileStore,
    options: EngineOptions,
    sink: Arc<dyn CommandSink>,
    signals: Arc<EngineSignals>,
    stats: SharedEngineStats,
    running: AtomicBool,
    hook: Mutex<H>,
    worker: Mutex<Option<Worker>>,
}

impl<H: KeyHook> ChordEngine<H> {
    /// Build an engine from application configuration.
    pub fn from_config<S: CommandSink>(
        config: &Config,
        sink: S,
        hook: H,
    ) -> Result<Self, ConfigurationError> {
        let registry = ProfileRegistry::new(config.supported_profiles.iter().copied())?;
        let store = ProfileStore::new(config.profile_file.clone());
        Self::new(registry, store, EngineOptions::from(config), sink, hook)
    }

    /// Validate the configuration and load the persisted profile.
    ///
    /// Fails without touching `hook` if the capacity is zero or the persisted
    /// profile file is corrupted.
    pub fn new<S: CommandSink>(
        registry: ProfileRegistry,
        store: ProfileStore,
        options: EngineOptions,
        sink: S,
        hook: H,
    ) -> Result<Self, ConfigurationError> {
        if options.channel_capacity == 0 {
            return Err(ConfigurationError::ZeroCapacity);
        }
        let profile = store.load(&registry)?;

        tracing::info!(
            profile = %profile,
            supported = registry.len(),
            capacity = options.channel_capacity,
            "chord engine configured"
        );

        Ok(Self {
            registry,
            store,
            options,
            sink: Arc::new(sink),
            signals: Arc::new(EngineSignals::new(profile)),
            stats: Arc::new(EngineStats::new()),
            running: AtomicBool::new(false),
            hook: Mutex::new(hook),
            worker: Mutex::new(None),
        })
    }

    /// Use `stats` for counters instead of the engine's private set.
    pub fn with_stats(mut self, stats: SharedEngineStats) -> Self {
        self.stats = stats;
        self
    }

    /// Spawn the recognizer worker, then install the hook.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut worker = self.worker.lock();
        if self.running.load(Ordering::SeqCst) || worker.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        // Each session gets its own channel, so a worker detached by an
        // earlier stop can never consume events meant for this one.
        let (sender, receiver) = event_channel(self.options.channel_capacity);
        let spawned = self.spawn_worker(receiver).map_err(EngineError::Spawn)?;
        let thread_id = spawned.thread_id;
        *worker = Some(spawned);

        let adapter = HookAdapter::new(
            sender,
            self.signals.clone(),
            self.stats.clone(),
            &self.registry,
        );
        if let Err(e) = self.hook.lock().install(adapter) {
            tracing::error!(error = %e, "failed to install keyboard hook");
            if let Some(w) = worker.take() {
                w.shutdown.store(true, Ordering::SeqCst);
                self.join_worker(w, thread_id);
            }
            return Err(e.into());
        }

        self.running.store(true, Ordering::SeqCst);
        tracing::info!(profile = %self.current_profile(), "chord engine started");
        Ok(())
    }

    /// Stop the engine: signal the worker, uninstall the hook, wait for the
    /// worker (bounded by the stop timeout) and discard queued events.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if !self.running.swap(false, Ordering::SeqCst) && worker.is_none() {
            return;
        }

        if let Some(w) = worker.as_ref() {
            w.shutdown.store(true, Ordering::SeqCst);
        }
        self.hook.lock().uninstall();

        if let Some(w) = worker.take() {
            let receiver = w.receiver.clone();
            let thread_id = w.thread_id;
            self.join_worker(w, thread_id);

            let discarded = receiver.drain();
            if discarded > 0 {
                tracing::debug!(discarded, "discarded queued key events");
            }
        }
        if self.signals.is_armed() {
            tracing::info!(profile = %self.current_profile(), "stopped while chord was held");
        }
        self.signals.set_armed(false);
        tracing::info!("chord engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the active profile.
    pub fn current_profile(&self) -> ProfileId {
        self.signals.current_profile()
    }

    /// Whether the recording chord is currently held.
    pub fn is_armed(&self) -> bool {
        self.signals.is_armed()
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &SharedEngineStats {
        &self.stats
    }

    fn spawn_worker(&self, receiver: EventReceiver) -> std::io::Result<Worker> {
        let recognizer = ChordRecognizer::new(
            self.registry.clone(),
            self.store.clone(),
            self.signals.clone(),
            self.stats.clone(),
        );
        let worker_receiver = receiver.clone();
        let sink = self.sink.clone();
        let stats = self.stats.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = shutdown.clone();
        let timeout = self.options.dequeue_timeout;
        let (exit_tx, exit_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("chordkey-recognizer".into())
            .spawn(move || {
                // Dropped on exit, which wakes `stop`.
                let _exit = exit_tx;
                run_recognizer(
                    recognizer,
                    &worker_receiver,
                    sink.as_ref(),
                    &stats,
                    &worker_shutdown,
                    timeout,
                );
            })?;

        Ok(Worker {
            thread_id: handle.thread().id(),
            handle,
            shutdown,
            receiver,
            exited: exit_rx,
        })
    }

    fn join_worker(&self, worker: Worker, thread_id: ThreadId) {
        if thread::current().id() == thread_id {
            // Called from a sink callback; the loop exits once the callback returns.
            tracing::debug!("stop requested from the recognizer thread");
            return;
        }

        match worker.exited.recv_timeout(self.options.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    tracing::error!("recognizer worker panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = self.options.stop_timeout.as_millis() as u64,
                    "recognizer worker did not exit in time, detaching"
                );
            }
        }
    }
}

impl<H: KeyHook> Drop for ChordEngine<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<H: KeyHook> std::fmt::Debug for ChordEngine<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChordEngine")
            .field("running", &self.is_running())
            .field("armed", &self.is_armed())
            .field("profile", &self.current_profile())
            .finish_non_exhaustive()
    }
}

/// Worker loop: process events in order until shutdown.
fn run_recognizer(
    mut recognizer: ChordRecognizer,
    receiver: &EventReceiver,
    sink: &dyn CommandSink,
    stats: &EngineStats,
    shutdown: &AtomicBool,
    timeout: Duration,
) {
    tracing::debug!(profile = %recognizer.current_profile(), "recognizer worker started");
    let mut seen_drops = stats.dropped();

    while !shutdown.load(Ordering::SeqCst) {
        match receiver.dequeue(timeout) {
            Dequeued::Event(event) => {
                if let Some(command) = recognizer.process(&event) {
                    dispatch(sink, command, stats);
                }
            }
            Dequeued::TimedOut => {}
            Dequeued::Closed => break,
        }

        let dropped = stats.dropped();
        if dropped != seen_drops {
            tracing::debug!(
                dropped = dropped - seen_drops,
                total = dropped,
                "key events dropped, queue full"
            );
            seen_drops = dropped;
        }
    }

    tracing::debug!("recognizer worker exiting");
}

/// Deliver `command` to the sink, isolating failures and panics.
fn dispatch(sink: &dyn CommandSink, command: Command, stats: &EngineStats) {
    match command {
        Command::Arm(_) => stats.record_arm(),
        Command::Disarm(_) => stats.record_disarm(),
        Command::SwitchProfile(_) => stats.record_switch(),
    }
    tracing::info!(command = command.name(), profile = %command.profile(), "dispatching");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match command {
        Command::Arm(p) => sink.on_arm(p),
        Command::Disarm(p) => sink.on_disarm(p),
        Command::SwitchProfile(p) => sink.on_profile_switch(p),
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            stats.record_callback_failure();
            tracing::error!(
                command = command.name(),
                profile = %command.profile(),
                error = %e,
                "command sink callback failed"
            );
        }
        Err(payload) => {
            stats.record_callback_failure();
            tracing::error!(
                command = command.name(),
                profile = %command.profile(),
                panic = panic_message(payload.as_ref()),
                "command sink callback panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::CallbackSink;
    use crate::hook::{HookError, ManualHook};
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn quiet_sink() -> CallbackSink {
        CallbackSink::new(|_| Ok(()), |_| Ok(()), |_| Ok(()))
    }

    /// Hook that records install attempts and can be told to fail.
    struct CountingHook {
        installs: Arc<AtomicUsize>,
        fail: bool,
    }

    impl KeyHook for CountingHook {
        fn install(&mut self, _adapter: HookAdapter) -> Result<(), HookError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(HookError::InstallFailed)
            } else {
                Ok(())
            }
        }

        fn uninstall(&mut self) {}
    }

    fn registry() -> ProfileRegistry {
        ProfileRegistry::new([1u32, 2, 3]).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = TempDir::new().unwrap();
        let options = EngineOptions {
            channel_capacity: 0,
            ..EngineOptions::default()
        };
        let (hook, _keyboard) = ManualHook::new();
        let err = ChordEngine::new(
            registry(),
            ProfileStore::new(dir.path().join("profile.txt")),
            options,
            quiet_sink(),
            hook,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::ZeroCapacity));
    }

    #[test]
    fn test_failed_install_stops_worker() {
        let dir = TempDir::new().unwrap();
        let installs = Arc::new(AtomicUsize::new(0));
        let engine = ChordEngine::new(
            registry(),
            ProfileStore::new(dir.path().join("profile.txt")),
            EngineOptions::default(),
            quiet_sink(),
            CountingHook {
                installs: installs.clone(),
                fail: true,
            },
        )
        .unwrap();

        let err = engine.start().unwrap_err();
        assert!(matches!(err, EngineError::Hook(HookError::InstallFailed)));
        assert!(!engine.is_running());
        assert_eq!(installs.load(Ordering::SeqCst), 1);
        // Nothing left to stop.
        engine.stop();
    }

    #[test]
    fn test_double_start_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = ChordEngine::new(
            registry(),
            ProfileStore::new(dir.path().join("profile.txt")),
            EngineOptions::default(),
            quiet_sink(),
            CountingHook {
                installs: Arc::new(AtomicUsize::new(0)),
                fail: false,
            },
        )
        .unwrap();

        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(EngineError::AlreadyRunning)));
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
