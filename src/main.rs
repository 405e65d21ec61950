#![forbid(unsafe_code)]

mod color;
mod config;
mod constants;
mod overlay;
mod pipeline;
mod provider;
mod screenshot;
mod watcher;
mod x11_utils;

use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use tracing::{Level as TraceLevel, error, info};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use overlay::Overlay;
use pipeline::Pipeline;
use provider::{Provider, create_backend};
use watcher::ScreenshotWatcher;

/// Watch the screenshot folder and show the AI's answer in an overlay
#[derive(Parser, Debug)]
#[command(
    name = "shot-answer",
    version,
    about,
    after_help = "Examples:\n  shot-answer\n  shot-answer --provider gemini\n  shot-answer -p anthropic -m claude-3-5-sonnet-20241022\n\nSettings are read from the config file and the OPENAI_API_KEY, GEMINI_API_KEY,\nANTHROPIC_API_KEY, DEFAULT_PROVIDER, <VENDOR>_MODEL, HOTKEY and SCREENSHOT_DIR\nenvironment variables."
)]
struct Cli {
    /// Vision backend to use instead of the configured default
    #[arg(short, long, value_enum)]
    provider: Option<Provider>,

    /// Model for the selected backend
    #[arg(short, long)]
    model: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match Settings::load().and_then(|settings| settings.resolve(cli.provider, cli.model.as_deref())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let backend = match create_backend(&config.backend) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    info!(
        provider = %config.backend.provider.display_name(),
        model = %config.backend.model,
        "Using vision backend"
    );
    info!(dir = %config.screenshot_dir.display(), "Watching for new screenshots");
    info!(hotkey = %config.hotkey, "Hotkey (display only)");

    let stop = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop))?;
    }

    let watcher = match ScreenshotWatcher::new(&config.screenshot_dir, config.settle_delay) {
        Ok(watcher) => watcher,
        Err(e) => {
            eprintln!("Error: failed to watch {}: {e}", config.screenshot_dir.display());
            std::process::exit(1);
        }
    };

    let overlay = Overlay::spawn(config.overlay.clone());
    let sink = overlay.handle();

    thread::scope(|scope| -> std::io::Result<()> {
        let config = &config;
        let stop = &stop;
        let watch = thread::Builder::new()
            .name("watcher".to_string())
            .spawn_scoped(scope, move || {
                let mut pipeline = Pipeline::new(config, backend, sink);
                if config.process_latest_on_start {
                    pipeline.process(None);
                }
                watcher.run(stop, |path| pipeline.process(Some(path)));
            })?;

        if watch.join().is_err() {
            error!("Watch thread panicked");
        }
        Ok(())
    })?;

    info!("Shutting down");
    overlay.destroy();
    Ok(())
}
