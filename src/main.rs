use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use sysinfo::System;

use battle_audio::audio_system::manifest::write_manifest;
use battle_audio::audio_system::{Category, RecordingBackend, RodioBackend};
use battle_audio::config::AudioConfig;
use battle_audio::console::{self, ConsoleCommand};
use battle_audio::error::AppResult;
use battle_audio::messaging::AudioService;

const LOG_TARGET_STARTUP: &str = "battle_audio::startup";

/// Initialize tracing with file rotation
///
/// Logs are written to `<config dir>/BattleAudio/logs/`, one file per day
/// (`battle-audio.YYYY-MM-DD.log`). Debug builds also log to the console.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("BattleAudio").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "battle-audio.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting battle-audio v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
}

struct Args {
    config: Option<PathBuf>,
    headless: bool,
    generate_manifest: Option<PathBuf>,
}

fn parse_args() -> AppResult<Args> {
    let mut args = Args {
        config: None,
        headless: false,
        generate_manifest: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--headless" => args.headless = true,
            "--config" => {
                args.config = Some(iter.next().context("--config needs a path")?.into());
            }
            "--generate-manifest" => {
                args.generate_manifest = Some(iter.next().context("--generate-manifest needs a directory")?.into());
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn main() -> AppResult<()> {
    initialize_tracing();
    log_runtime_environment();

    let args = parse_args()?;

    if let Some(dir) = args.generate_manifest {
        let manifest = write_manifest(&dir)
            .with_context(|| format!("Failed to generate manifest in {}", dir.display()))?;
        println!("Wrote {} track(s) to {}", manifest.tracks.len(), dir.join("manifest.json").display());
        return Ok(());
    }

    let config_path = match args.config {
        Some(path) => path,
        None => AudioConfig::default_path()?,
    };
    let config = AudioConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let service = if args.headless {
        tracing::info!("Headless mode, no audio output");
        AudioService::spawn(&config, |_events| Ok(RecordingBackend::new()))?
    } else {
        let assets_dir = config.assets_dir.clone();
        let bgm_dir = config.bgm_dir();
        AudioService::spawn(&config, move |events| RodioBackend::new(assets_dir, bgm_dir, events))?
    };

    // Runs in the background; menu music starts right away
    let manifest_load = config.manifest_source().map(|source| service.load_manifest(source));
    service.play(Category::Menu);

    println!("battle-audio ready. Type 'help' for commands.");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        match console::parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Some(output) = console::execute(&service, &command) {
                    println!("{}", output);
                }
            }
            Err(e) => println!("{} (try 'help')", e),
        }
        io::stdout().flush().ok();
    }

    service.shutdown();
    if let Some(handle) = manifest_load {
        if handle.join().is_err() {
            tracing::warn!("Manifest loader panicked");
        }
    }
    Ok(())
}
