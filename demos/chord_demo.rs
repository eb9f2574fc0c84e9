//! Walkthrough of the chord engine driven by a scripted keyboard.
//!
//! This example shows how to:
//! 1. Build an engine with a closure-based command sink
//! 2. Drive it from code through a manual hook
//! 3. Switch profiles while the chord is held
//! 4. Read the engine statistics
//!
//! Run with: cargo run --example chord_demo

use std::thread;
use std::time::Duration;

use chordkey::{
    CallbackSink, ChordEngine, EngineOptions, ManualHook, ProfileRegistry, ProfileStore,
};

fn pause() {
    thread::sleep(Duration::from_millis(50));
}

fn main() {
    println!("chordkey - Chord Demo");
    println!("=====================");
    println!();

    let state_dir = std::env::temp_dir().join("chordkey-demo");
    let store = ProfileStore::new(state_dir.join("profile.txt"));
    let registry = ProfileRegistry::new([1u32, 2, 3]).expect("profiles");

    let sink = CallbackSink::new(
        |profile| {
            println!("  -> start recording with profile {profile}");
            Ok(())
        },
        |profile| {
            println!("  -> stop recording (profile {profile})");
            Ok(())
        },
        |profile| {
            println!("  -> switched to profile {profile}");
            Ok(())
        },
    );

    let (hook, keyboard) = ManualHook::new();
    let engine = match ChordEngine::new(registry, store, EngineOptions::default(), sink, hook) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };

    println!("Starting profile: {}", engine.current_profile());
    if let Err(e) = engine.start() {
        eprintln!("Failed to start: {e}");
        return;
    }

    println!();
    println!("Holding Ctrl+Shift...");
    keyboard.press("ctrl");
    keyboard.press("shift");
    pause();

    println!("Pressing '@' (Shift+2) while held...");
    let decision = keyboard.tap("@");
    pause();
    println!("  key was {decision:?}");

    println!("Releasing Shift...");
    keyboard.release("shift");
    keyboard.release("ctrl");
    pause();

    println!();
    println!("Pressing '3' without the chord...");
    let decision = keyboard.tap("3");
    pause();
    println!("  key was {decision:?}");

    engine.stop();

    println!();
    println!("Final profile: {}", engine.current_profile());
    println!();
    println!("{}", engine.stats().summary());
}
