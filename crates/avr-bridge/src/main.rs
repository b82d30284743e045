//! `avr-bridge` command line.

use avr_bridge::{
    Bridge, BridgeConfig, BridgeError, FanSink, JsonLinesSink, LogSink, Result, ScratchScope,
    SerialDevice, SerialPortDevice, TcpClientListener,
};
use avr_metrics::MetricLabels;
use avr_protocol::CommandFrame;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "avr-bridge")]
#[command(version, about = "Bridge an AV receiver front panel between serial and TCP")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serial device path (overrides the configuration file)
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Serial baud rate (overrides the configuration file)
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default)
    Run(RunArgs),

    /// Send one four-byte command to the device and exit
    Send {
        /// Command payload as 8 hex digits, e.g. 0102A0FF
        payload: String,
    },
}

#[derive(clap::Args, Default)]
struct RunArgs {
    /// TCP port for mirror clients
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind the TCP listener to
    #[arg(long)]
    bind: Option<String>,

    /// Ring buffer size in bytes (power of two)
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Milliseconds between ticks
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Do not publish the parsed volume
    #[arg(long)]
    no_volume: bool,

    /// How client command bytes are grouped
    #[arg(long, value_enum)]
    command_scope: Option<ScratchScope>,

    /// Also write publications to stdout as JSON lines
    #[arg(long)]
    json: bool,

    /// Serve Prometheus metrics on this address
    #[cfg(feature = "prometheus")]
    #[arg(long)]
    metrics_listen: Option<std::net::SocketAddr>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(device) = cli.device {
        config.serial.path = device;
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }

    match cli.command {
        Some(Commands::Send { payload }) => send(&config, &payload),
        Some(Commands::Run(args)) => serve(config, args),
        None => serve(config, RunArgs::default()),
    }
}

fn send(config: &BridgeConfig, payload: &str) -> Result<()> {
    let bytes = hex::decode(payload.trim())
        .map_err(|e| BridgeError::Config(format!("invalid hex payload {:?}: {}", payload, e)))?;
    let command = CommandFrame::from_slice(&bytes)?;

    let mut device = SerialPortDevice::open(&config.serial.path, config.serial.baud_rate)?;
    device.write_bytes(&command.encode())?;
    info!(payload = %hex::encode_upper(command.payload()), "sent command");
    Ok(())
}

fn serve(mut config: BridgeConfig, mut args: RunArgs) -> Result<()> {
    apply_overrides(&mut config, &mut args);
    config.validate()?;

    install_metrics(&args)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let device = SerialPortDevice::open(&config.serial.path, config.serial.baud_rate)?;
    let listener = TcpClientListener::bind(config.listen_addr())?;
    info!(addr = %listener.local_addr()?, "listening for clients");

    let mut sink = FanSink::new().with(LogSink);
    if args.json {
        sink = sink.with(JsonLinesSink::new(std::io::stdout()));
    }

    let labels = MetricLabels::new(config.name.clone(), config.serial.path.clone());
    let mut bridge = Bridge::new(device, listener, sink, config.options())?.with_metric_labels(labels);

    let interval = config.tick_interval();
    let result = loop {
        if !running.load(Ordering::SeqCst) {
            info!("received shutdown signal");
            break Ok(());
        }
        if let Err(e) = bridge.tick() {
            break Err(e);
        }
        std::thread::sleep(interval);
    };

    bridge.shutdown();
    result
}

/// Fold `run` flags into the configuration. Flags that are kept for later
/// (`--json`, `--metrics-listen`) stay in `args`.
fn apply_overrides(config: &mut BridgeConfig, args: &mut RunArgs) {
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if let Some(bind) = args.bind.take() {
        config.listen.bind = bind;
    }
    if let Some(size) = args.buffer_size {
        config.buffer_size = size;
    }
    if let Some(ms) = args.tick_ms {
        config.tick_interval_ms = ms;
    }
    if args.no_volume {
        config.publish_volume = false;
    }
    if let Some(scope) = args.command_scope {
        config.command_scope = scope;
    }
}

#[cfg(feature = "prometheus")]
fn install_metrics(args: &RunArgs) -> Result<()> {
    if let Some(addr) = args.metrics_listen {
        avr_metrics::install_prometheus(addr)
            .map_err(|e| BridgeError::Config(format!("metrics exporter: {}", e)))?;
        info!(%addr, "serving Prometheus metrics");
    }
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(_args: &RunArgs) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Run(args)) => args,
            _ => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn test_run_flags_override_config() {
        let mut args = run_args(&[
            "avr-bridge",
            "run",
            "--bind",
            "127.0.0.1",
            "--port",
            "5000",
            "--no-volume",
            "--command-scope",
            "shared",
            "--json",
        ]);
        let mut config = BridgeConfig::default();
        apply_overrides(&mut config, &mut args);

        assert_eq!(config.listen_addr(), "127.0.0.1:5000");
        assert!(!config.publish_volume);
        assert_eq!(config.command_scope, ScratchScope::Shared);
        assert!(config.validate().is_ok());
        // Flags used after the overrides are still readable.
        assert!(args.json);
        assert!(install_metrics(&args).is_ok());
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut args = run_args(&["avr-bridge", "run"]);
        let mut config = BridgeConfig::default();
        apply_overrides(&mut config, &mut args);
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_global_device_flag() {
        let cli = Cli::try_parse_from(["avr-bridge", "send", "01020304", "--device", "/dev/ttyS3"]).unwrap();
        assert_eq!(cli.device.as_deref(), Some("/dev/ttyS3"));
        assert!(matches!(cli.command, Some(Commands::Send { ref payload }) if payload == "01020304"));
    }
}
