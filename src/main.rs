//! MidiDaemon - trigger system actions from a MIDI controller

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_daemon::config::AppConfig;
use midi_daemon::dispatch::{self, DispatchError, Dispatcher, MappingFailure};
use midi_daemon::midi::{EventSource, MidirSource};
use midi_daemon::platform::Platform;
use midi_daemon::ActionRegistry;

/// MidiDaemon - trigger volume, app, keyboard and audio actions from MIDI controls
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML, or JSON with a .json extension)
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace); overrides the config file
    #[arg(short, long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// List available MIDI input ports
    #[arg(long)]
    list_ports: bool,

    /// Write an example configuration to the config path and exit
    #[arg(long)]
    generate_config: bool,

    /// Validate every mapping's action and exit
    #[arg(long)]
    check: bool,

    /// Log actions instead of performing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if args.generate_config || args.list_ports {
        let _guard = init_logging(args.log_level.as_deref().unwrap_or("info"), args.log_file.as_deref())?;
        if args.generate_config {
            return generate_config(&args.config).await;
        }
        return list_ports();
    }

    let config = AppConfig::load(&args.config).await?;
    let level = args.log_level.clone().unwrap_or_else(|| config.general.log_level.clone());
    let _guard = init_logging(&level, args.log_file.as_deref())?;

    info!("Starting MidiDaemon v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let platform = Platform::detect(args.dry_run);
    let registry = Arc::new(ActionRegistry::with_builtins(&platform));

    let failures = dispatch::check_mappings(&config, &registry).await;
    if args.check {
        return report_check(&config, &failures);
    }
    for failure in &failures {
        warn!(mapping = %failure.name, error = %failure.error, "⚠️  Mapping will fail when triggered");
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    run(Arc::new(config), registry, shutdown).await?;

    info!("MidiDaemon shutdown complete");
    Ok(())
}

/// Run dispatch loops until shutdown, restarting failed ones when configured
async fn run(config: Arc<AppConfig>, registry: Arc<ActionRegistry>, shutdown: CancellationToken) -> Result<()> {
    let source: Arc<dyn EventSource> = Arc::new(MidirSource::new());
    let mut attempt: u32 = 0;

    loop {
        let dispatcher = Dispatcher::new(config.clone(), registry.clone(), source.clone());
        let result = dispatcher.start(shutdown.clone()).await;
        dispatcher.close().await;

        let e = match result {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        let retryable = !matches!(e, DispatchError::AlreadyRunning | DispatchError::Closed);
        if !config.general.auto_restart || !retryable || shutdown.is_cancelled() {
            return Err(e.into());
        }

        // A loop that got as far as running starts its back-off over
        if matches!(e, DispatchError::StreamEnded) {
            attempt = 0;
        }
        attempt = attempt.saturating_add(1);
        let delay = dispatch::restart_delay(attempt);
        error!("Dispatch loop failed: {}", e);
        info!("🔁 Restart #{} in {}ms", attempt, delay.as_millis());

        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}

fn list_ports() -> Result<()> {
    use colored::*;

    println!("\n{}", "=== Available MIDI Input Ports ===".bold().cyan());

    let names = MidirSource::new().port_names()?;
    if names.is_empty() {
        println!("  {}", "No input ports found".dimmed());
    } else {
        for (idx, name) in names.iter().enumerate() {
            let marker = if idx == 0 { "[DEFAULT]".green() } else { "[INPUT]".yellow() };
            println!("  {} {}", marker, name);
        }
        println!(
            "\n  {}",
            "Set midi.input_port to any part of a name; the first port is used when unset.".dimmed()
        );
    }

    println!();
    Ok(())
}

async fn generate_config(path: &str) -> Result<()> {
    use colored::*;

    if Path::new(path).exists() {
        bail!("Refusing to overwrite existing config file: {}", path);
    }

    AppConfig::example().save(path).await?;
    println!("{} {}", "✅ Example configuration written to".green().bold(), path.bright_white());
    Ok(())
}

fn report_check(config: &AppConfig, failures: &[MappingFailure]) -> Result<()> {
    use colored::*;

    println!("\n{}", "=== Mapping Check ===".bold().cyan());
    for (idx, mapping) in config.mappings.iter().enumerate() {
        let failure = failures.iter().find(|f| f.index == idx);
        let status = match (failure, mapping.enabled) {
            (Some(_), _) => "[FAIL]".red(),
            (None, true) => "[ OK ]".green(),
            (None, false) => "[ OFF]".dimmed(),
        };
        println!(
            "  {} {} ({} → {})",
            status,
            mapping.name.bright_white(),
            mapping.event.kind,
            mapping.action.action_type
        );
        if let Some(failure) = failure {
            println!("         {}", failure.error.to_string().red());
        }
    }
    println!();

    if !failures.is_empty() {
        bail!("{} of {} mappings failed validation", failures.len(), config.mappings.len());
    }
    println!("{}", "✅ All mappings are valid".green().bold());
    Ok(())
}
