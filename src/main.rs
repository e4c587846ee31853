// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use keyloop::bus::Topic;
use keyloop::config::AppConfig;
use keyloop::keys::{LoggedTone, NoteHandle};
use keyloop::timing::{TokioClock, TokioTimer};
use keyloop::Instrument;
use tokio::task::LocalSet;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Scripted phrase for the demo: (hint key, press at ms, release at ms)
const DEMO_PHRASE: &[(char, u64, u64)] = &[
    ('a', 0, 200),
    ('d', 250, 450),
    ('g', 500, 700),
    ('k', 750, 1100),
];

fn print_usage() {
    println!("KEYLOOP - Keyboard with loop recorder");
    println!();
    println!("Usage: keyloop [--config <FILE>] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  --list-keys             List the keyboard layout");
    println!("  --print-config          Print the effective configuration as YAML");
    println!("  --demo [SECONDS]        Record a short phrase, then loop it (default 3)");
    println!("  --help                  Show this help message");
    println!();
    println!("Set RUST_LOG to control log output (default: keyloop=info)");
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keyloop=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn list_keys(config: &AppConfig) {
    println!("{:<6} {:>10}  {}", "Note", "Hz", "Key");
    for key in &config.keys {
        let marker = if key.is_sharp() { " (sharp)" } else { "" };
        println!("{:<6} {:>10.2}  {}{}", key.name, key.frequency, key.hint, marker);
    }
}

fn run_demo(config: &AppConfig, seconds: u64) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start runtime")?;
    let local = LocalSet::new();

    local.block_on(&runtime, async {
        let clock = Rc::new(TokioClock::new());
        let timer = Rc::new(TokioTimer::new());
        let instrument = Instrument::new(config, clock, timer.clone(), |key| {
            let tone: Rc<dyn NoteHandle> = Rc::new(LoggedTone::new(key));
            tone
        })
        .context("Invalid configuration")?;

        instrument.bus.subscribe(Topic::StateChanged, |message| {
            if let Some(state) = message.state() {
                info!(
                    recording = state.is_recording,
                    playing = state.is_playing,
                    has_loop = state.has_loop,
                    "state changed"
                );
            }
        });

        info!(button = instrument.transport.label(), "pressing transport");
        instrument.transport.press();

        let mut script: Vec<(u64, char, bool)> = DEMO_PHRASE
            .iter()
            .flat_map(|&(hint, on, off)| [(on, hint, true), (off, hint, false)])
            .collect();
        script.sort_by_key(|&(at, _, _)| at);

        let mut elapsed = 0;
        for (at, hint, down) in script {
            sleep(Duration::from_millis(at - elapsed)).await;
            elapsed = at;
            if down {
                instrument.keyboard.press_hint(hint);
            } else {
                instrument.keyboard.release_hint(hint);
            }
        }
        sleep(Duration::from_millis(150)).await;

        info!(button = instrument.transport.label(), "pressing transport");
        instrument.transport.press();
        info!(
            events = instrument.engine.recorded_events().len(),
            cycle_ms = instrument.engine.cycle_duration().as_millis() as u64,
            "looping for {} seconds",
            seconds
        );

        sleep(Duration::from_secs(seconds)).await;

        info!(button = instrument.transport.label(), "pressing transport");
        instrument.transport.press();
        info!(pending = timer.pending(), "demo finished");
        Ok::<_, anyhow::Error>(())
    })
}

fn main() -> Result<()> {
    init_logging();

    let mut args: Vec<String> = env::args().skip(1).collect();

    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow!("--config requires a file path"))?;
            args.remove(i + 1);
            args.remove(i);
            AppConfig::load(&path)?
        }
        None => AppConfig::default(),
    };

    let Some(command) = args.first() else {
        println!("KEYLOOP - Keyboard with loop recorder");
        println!("Run with --help for usage information");
        return Ok(());
    };

    match command.as_str() {
        "--list-keys" => {
            list_keys(&config);
        }
        "--print-config" => {
            print!("{}", config.to_yaml()?);
        }
        "--demo" => {
            let seconds: u64 = match args.get(1) {
                Some(s) => s
                    .parse()
                    .map_err(|_| anyhow!("Invalid number of seconds: {}", s))?,
                None => 3,
            };
            run_demo(&config, seconds)?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        other => {
            eprintln!("Unknown option: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
