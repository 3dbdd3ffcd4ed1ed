//! Airbox - PM2.5 monitor on a serial port.
//!
//! Run with: `cargo run -p airbox-service -- run --port /dev/ttyUSB0`

use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use airbox_core::{Monitor, SerialBackend, forward_events};
use airbox_service::console::{self, Command, JsonLinesNotifier, Reply};
use airbox_service::Config;

/// Airbox - PM2.5 monitor on a serial port.
#[derive(Parser, Debug)]
#[command(name = "airbox")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// List available serial ports and exit.
    Ports,

    /// Run the monitor in the foreground (default behavior).
    Run {
        /// Port to connect to at startup (overrides config).
        #[arg(short, long)]
        port: Option<String>,

        /// Start with sound cues disabled.
        #[arg(long)]
        no_sound: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airbox_core=info".parse()?)
                .add_directive("airbox_service=info".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_validated(path)?,
        None => Config::load_default().unwrap_or_else(|e| {
            warn!("Ignoring default config: {}", e);
            Config::default()
        }),
    };

    match args.command {
        Some(CliCommand::Ports) => list_ports(&config).await,
        Some(CliCommand::Run { port, no_sound }) => {
            if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
                config.serial.port = Some(port);
            }
            if no_sound {
                config.notifications.sound_enabled = false;
            }
            run_monitor(config).await
        }
        None => run_monitor(config).await,
    }
}

async fn list_ports(config: &Config) -> anyhow::Result<()> {
    let monitor = Monitor::new(SerialBackend::new(), config.to_monitor_config())?;
    for port in monitor.list_ports().await? {
        println!("{}", port);
    }
    Ok(())
}

async fn run_monitor(config: Config) -> anyhow::Result<()> {
    let monitor = Monitor::new(SerialBackend::new(), config.to_monitor_config())?;

    let forwarder = forward_events(monitor.subscribe(), JsonLinesNotifier::stdout());
    monitor.startup().await;
    let refresher = monitor.start_port_refresh();

    if let Some(port) = &config.serial.port {
        match monitor.connect(port).await {
            Ok(info) => info!("{}", info),
            Err(e) => warn!("Auto-connect to {} failed: {}", port, e),
        }
    }

    let mut lines = spawn_stdin_reader()?;
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.recv() => line,
        };

        let line = match line {
            Some(Ok(line)) => line,
            None => {
                info!("Input closed");
                break;
            }
            Some(Err(e)) => {
                warn!("Failed to read input: {}", e);
                break;
            }
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                console::print_json_line(&Reply::invalid(&e))?;
                continue;
            }
        };

        let reply = console::execute(&monitor, &command).await;
        console::print_json_line(&reply)?;
        if command == Command::Quit {
            break;
        }
    }

    monitor.shutdown().await;
    let _ = refresher.await;
    drop(monitor);
    let _ = forwarder.await;
    Ok(())
}

/// Read stdin on a dedicated thread so a pending read never holds up shutdown.
fn spawn_stdin_reader() -> io::Result<mpsc::Receiver<io::Result<String>>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("airbox-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.blocking_send(line).is_err() {
                    return;
                }
            }
        })?;
    Ok(rx)
}
