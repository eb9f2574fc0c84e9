//! chordkey CLI
//!
//! Hold Ctrl+Shift to record; press a digit while holding to switch profile.

use anyhow::{bail, Context};
use chrono::Local;
use chordkey::{
    hook::{check_permission, ensure_permission, manual::parse_script},
    CallbackResult, ChordEngine, CommandSink, Config, EngineStats, ManualHook, Persisted,
    PlatformHook, ProfileId, ProfileRegistry, ProfileStore, VERSION,
};
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chordkey")]
#[command(version = VERSION)]
#[command(about = "Global Ctrl+Shift chord engine for hold-to-record dictation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for the chord until Ctrl+C
    Run {
        /// Supported profiles, comma separated (overrides the config file)
        #[arg(long)]
        profiles: Option<String>,
    },

    /// Replay a key script through the engine, e.g. "ctrl+ shift+ 2+ shift-"
    Simulate {
        /// Whitespace-separated steps: key name followed by '+' (down) or '-' (up)
        script: String,

        /// Supported profiles, comma separated (overrides the config file)
        #[arg(long)]
        profiles: Option<String>,
    },

    /// Show or set the persisted profile
    Profile {
        /// New profile to persist
        id: Option<u32>,
    },

    /// Show current status
    Status,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chordkey=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { profiles } => cmd_run(profiles.as_deref()),
        Commands::Simulate { script, profiles } => cmd_simulate(&script, profiles.as_deref()),
        Commands::Profile { id } => cmd_profile(id),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
    }
}

/// Prints commands as they arrive. Stands in for the recording layer.
struct ConsoleSink;

impl CommandSink for ConsoleSink {
    fn on_arm(&self, profile: ProfileId) -> CallbackResult {
        println!("[{}] ● recording (profile {profile})", Local::now().format("%H:%M:%S"));
        Ok(())
    }

    fn on_disarm(&self, profile: ProfileId) -> CallbackResult {
        println!("[{}] ■ stopped (profile {profile})", Local::now().format("%H:%M:%S"));
        Ok(())
    }

    fn on_profile_switch(&self, profile: ProfileId) -> CallbackResult {
        println!("[{}] ⇄ profile {profile}", Local::now().format("%H:%M:%S"));
        Ok(())
    }
}

fn load_config(profiles: Option<&str>) -> anyhow::Result<Config> {
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(profiles) = profiles {
        config.supported_profiles = Config::parse_profiles(profiles)?;
    }
    Ok(config)
}

fn cmd_run(profiles: Option<&str>) -> anyhow::Result<()> {
    println!("chordkey v{VERSION}");
    println!();

    if let Err(e) = ensure_permission() {
        eprintln!("On macOS, add this application under System Settings >");
        eprintln!("Privacy & Security > Input Monitoring and Accessibility,");
        eprintln!("then restart it.");
        eprintln!();
        return Err(e.into());
    }

    let config = load_config(profiles)?;
    let stats = Arc::new(EngineStats::with_persistence(config.stats_path()));
    let engine = ChordEngine::from_config(&config, ConsoleSink, PlatformHook::new())
        .context("chord engine configuration is invalid")?
        .with_stats(stats.clone());

    println!("  Profiles: {:?}", config.supported_profiles);
    println!("  Active profile: {}", engine.current_profile());
    println!();
    println!("Hold Ctrl+Shift to record, press a digit while holding to switch profile.");
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    engine.start().context("failed to start chord engine")?;
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping...");
    engine.stop();

    if let Err(e) = stats.save() {
        tracing::warn!(error = %e, "could not save engine stats");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_simulate(script: &str, profiles: Option<&str>) -> anyhow::Result<()> {
    let steps = parse_script(script).map_err(anyhow::Error::msg)?;
    let config = load_config(profiles)?;
    let (hook, keyboard) = ManualHook::new();
    let engine = ChordEngine::from_config(&config, ConsoleSink, hook)
        .context("chord engine configuration is invalid")?;

    println!("Active profile: {}", engine.current_profile());
    engine.start()?;
    for (name, transition) in steps {
        let decision = keyboard.send(&name, transition);
        println!("  {name} {transition:?} -> {decision:?}");
        // Let the worker catch up so output stays in order.
        thread::sleep(Duration::from_millis(20));
    }
    engine.stop();
    println!("Active profile: {}", engine.current_profile());
    Ok(())
}

fn cmd_profile(id: Option<u32>) -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let registry = ProfileRegistry::new(config.supported_profiles.iter().copied())?;
    let store = ProfileStore::new(config.profile_file.clone());

    match id {
        None => match store.peek(&registry)? {
            Persisted::Absent => println!("{} (default)", registry.min()),
            Persisted::Supported(profile) => println!("{profile}"),
            Persisted::Unsupported(stored) => println!(
                "{} (stored value {stored:?} is not supported; reset on next run)",
                registry.min()
            ),
        },
        Some(id) => {
            let profile = ProfileId::new(id);
            if !registry.is_supported(profile) {
                bail!(
                    "profile {profile} is not supported (configured: {:?})",
                    config.supported_profiles
                );
            }
            if !store.save(profile) {
                bail!("could not write {}", store.path().display());
            }
            println!("Active profile set to {profile}");
        }
    }
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("chordkey Status");
    println!("===============");
    println!();

    let has_permission = check_permission();
    println!(
        "Keyboard Monitoring Permission: {}",
        if has_permission {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Profiles: {:?}", config.supported_profiles);
    println!("  Profile file: {:?}", config.profile_file);
    match ProfileRegistry::new(config.supported_profiles.iter().copied()) {
        Ok(registry) => match ProfileStore::new(config.profile_file.clone()).peek(&registry) {
            Ok(Persisted::Absent) => println!("  Active profile: {} (default)", registry.min()),
            Ok(Persisted::Supported(profile)) => println!("  Active profile: {profile}"),
            Ok(Persisted::Unsupported(stored)) => println!(
                "  Active profile: {} (stored value {stored:?} will be corrected)",
                registry.min()
            ),
            Err(e) => println!("  Active profile: error ({e})"),
        },
        Err(e) => println!("  Active profile: error ({e})"),
    }
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let stats = EngineStats::with_persistence(stats_path);
        let snapshot = stats.stats();
        println!("Cumulative Statistics:");
        println!("  Key events delivered: {}", snapshot.events_enqueued);
        println!("  Key events dropped: {}", snapshot.events_dropped);
        println!("  Recordings armed: {}", snapshot.arms);
        println!("  Profile switches: {}", snapshot.switches);
        println!("  Callback failures: {}", snapshot.callback_failures);
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
