//! Chime - Procedural UI sound effects synthesized on the fly

use anyhow::{bail, Context, Result};
use clap::Parser;
use chime::config::{self, ChimeConfig};
use chime::engine::{
    default_device_name, list_output_devices, CpalHost, Engine, InitStatus, OfflineHost, OutputDevice, PlayOptions,
    Recorder,
};
use chime::registry::{builtin_sounds, Category, SoundRegistry};
use chime::settings::{JsonFileStore, MemoryStore, SettingsStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod cli;

use cli::{Cli, Commands};

const DEFAULT_CONFIG: &str = "chime.yaml";

/// Longest sound `play` waits for before giving up
const PLAY_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { category, config: config_path } => {
            let cfg = load_or_default(config_path.as_deref())?;
            let registry = load_registry(&cfg)?;

            let sounds = match category {
                Some(name) => {
                    let category = Category::from_name(&name)
                        .with_context(|| format!("unknown category '{}'", name))?;
                    registry.list_by_category(category)
                }
                None => registry.list_all(),
            };

            for def in sounds {
                println!(
                    "{:<20} {:<13} {:>5} ms  {}{}",
                    def.id,
                    def.category.as_str(),
                    def.nominal_duration_ms,
                    def.description,
                    if def.enabled { "" } else { " [disabled]" }
                );
            }
        }

        Commands::Play { id, volume, config: config_path } => {
            let cfg = load_or_default(config_path.as_deref())?;
            let engine = live_engine(&cfg)?;

            let voices = engine.try_play(&id, PlayOptions::volume(volume))?;
            if voices == 0 {
                println!("'{}' is disabled by the current settings", id);
                return Ok(());
            }

            let started = Instant::now();
            while engine.device().active_voices() > 0 && started.elapsed() < PLAY_TIMEOUT {
                std::thread::sleep(Duration::from_millis(20));
            }
            engine.destroy();
        }

        Commands::Demo { interval, config: config_path } => {
            let cfg = load_or_default(config_path.as_deref())?;
            let engine = live_engine(&cfg)?;

            let running = Arc::new(AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                r.store(false, Ordering::SeqCst);
            })?;

            println!("Playing every enabled sound. Press Ctrl-C to stop.\n");

            'demo: while running.load(Ordering::SeqCst) {
                for def in engine.registry().list_enabled() {
                    if !running.load(Ordering::SeqCst) {
                        break 'demo;
                    }
                    println!("  {} ({})", def.id, def.name);
                    engine.play(&def.id, PlayOptions::default());
                    sleep_while(&running, Duration::from_millis(interval));
                }
            }

            engine.stop_all();
            engine.destroy();
            println!("\nStopped.");
        }

        Commands::Record { id, output, volume, config: config_path } => {
            let cfg = load_or_default(config_path.as_deref())?;
            let registry = load_registry(&cfg)?;
            let def = registry.get(&id)?;

            let sample_rate = cfg.audio.sample_rate;
            let device = OutputDevice::new(Arc::new(OfflineHost::new(sample_rate)), cfg.audio.max_voices);
            device.play(&def, volume)?;

            let mixer = device.mixer();
            let mut mixer = mixer.lock().map_err(|_| anyhow::anyhow!("mixer lock poisoned"))?;
            let mut recorder = Recorder::new(&output, sample_rate)?;
            let rate = sample_rate as u64;
            recorder.record_until_idle(&mut mixer, rate / 10, rate * 30)?;

            println!("Recorded {} ({:.2}s) to {:?}", id, recorder.duration_secs(), output);
            recorder.finalize()?;
        }

        Commands::Devices => {
            println!("Available audio devices:\n");

            if let Some(name) = default_device_name() {
                println!("Default output: {}\n", name);
            }

            println!("Output devices:");
            let devices = list_output_devices();
            if devices.is_empty() {
                println!("  (none)");
            }
            for (name, config) in devices {
                println!("  - {} ({} Hz, {} ch)", name, config.sample_rate.0, config.channels);
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path).and_then(|cfg| Ok((load_registry(&cfg)?, cfg))) {
                Ok((registry, cfg)) => {
                    println!("Configuration is valid!");
                    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
                    println!("  Buffer size: {}", cfg.audio.buffer_size);
                    println!("  Max voices: {}", cfg.audio.max_voices);
                    match &cfg.settings_path {
                        Some(path) => println!("  Settings: {:?}", path),
                        None => println!("  Settings: in memory"),
                    }
                    match &cfg.catalog {
                        Some(path) => println!("  Catalog: {:?}", path),
                        None => println!("  Catalog: built-in"),
                    }
                    for category in Category::ALL {
                        println!("    - {}: {} sounds", category, registry.list_by_category(category).len());
                    }
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Export => {
            print!("{}", serde_yaml::to_string(&builtin_sounds())?);
        }

        Commands::Init => {
            let path = DEFAULT_CONFIG;
            if Path::new(path).exists() {
                println!("{} already exists. Not overwriting.", path);
            } else {
                std::fs::write(path, config::EXAMPLE_CONFIG)?;
                println!("Created {} with example configuration.", path);
            }
        }
    }

    Ok(())
}

/// Load the given config, or `chime.yaml` when present, or defaults
fn load_or_default(path: Option<&Path>) -> Result<ChimeConfig> {
    match path {
        Some(path) => config::load_config(path),
        None if Path::new(DEFAULT_CONFIG).exists() => config::load_config(Path::new(DEFAULT_CONFIG)),
        None => Ok(ChimeConfig::default()),
    }
}

fn load_registry(cfg: &ChimeConfig) -> Result<SoundRegistry> {
    match &cfg.catalog {
        Some(path) => SoundRegistry::load(path).with_context(|| format!("failed to load catalog {:?}", path)),
        None => Ok(SoundRegistry::builtin()),
    }
}

fn settings_store(path: Option<&PathBuf>) -> Box<dyn SettingsStore> {
    match path {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::default()),
    }
}

/// Engine on the default cpal output, already initialized
fn live_engine(cfg: &ChimeConfig) -> Result<Engine> {
    let host = CpalHost::new()
        .with_device(cfg.audio.device.clone())
        .with_buffer_size(Some(cfg.audio.buffer_size));
    let engine = Engine::new(cfg, Arc::new(host), settings_store(cfg.settings_path.as_ref()))?;

    match engine.initialize()? {
        InitStatus::Ready => Ok(engine),
        InitStatus::Pending => bail!("audio output is waiting for user interaction"),
    }
}

fn sleep_while(running: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
}
