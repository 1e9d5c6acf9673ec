use clap::Parser;
use env_logger::Env;
use config::ConfigError;
use log::{error, info, warn, LevelFilter};
use rusty_scope::config::{load_config, AppConfig};
use rusty_scope::{plot_waveform, Channel, ScopeSession, TcpTransport, WaveformSamples};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Rusty Scope acquisition tool
#[derive(Parser, Debug)]
#[command(name = "scope-cli")]
#[command(about = "Configure a bench oscilloscope and acquire one waveform", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Instrument resource, e.g. TCPIP0::192.168.1.100::5555::SOCKET
    #[arg(short, long, value_name = "RESOURCE")]
    resource: Option<String>,

    /// Channel to configure and acquire (1-4)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    channel: Option<u8>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Acquire with the instrument's current settings
    #[arg(long)]
    skip_settings: bool,

    /// Print the samples as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Do not draw the terminal preview
    #[arg(long)]
    no_plot: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (mut config, fallback_reason) = match startup_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = apply_overrides(&mut config, &args) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.console.verbosity.clone());
    initialize_logging(&log_level);
    match fallback_reason {
        Some(e) => warn!("Failed to load config ({e}), using defaults"),
        None => info!("Configuration loaded successfully"),
    }

    match run(&config, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Load the configuration before logging exists. An explicit file must load;
/// otherwise defaults are used and the reason is returned for logging later.
fn startup_config(path: Option<&Path>) -> Result<(AppConfig, Option<ConfigError>), ConfigError> {
    match path {
        Some(path) => load_config(Some(path)).map(|config| (config, None)),
        None => Ok(match load_config(None) {
            Ok(config) => (config, None),
            Err(e) => (AppConfig::default(), Some(e)),
        }),
    }
}

fn apply_overrides(config: &mut AppConfig, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(resource) = &args.resource {
        config.instrument.resource = resource.clone();
    }
    if let Some(channel) = args.channel {
        config.acquisition.channel = Channel::try_from(channel)?;
    }
    Ok(())
}

fn run(config: &AppConfig, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let channel = config.acquisition.channel;
    let transport = TcpTransport::new(config.instrument.connection_config());
    let mut scope = ScopeSession::new(transport)
        .with_strict_point_count(config.acquisition.strict_point_count);

    info!("=== Rusty Scope ===");
    let identity = scope.connect(&config.instrument.resource)?;
    info!("Status: Connected to {} ({identity})", config.instrument.resource);

    if args.skip_settings {
        info!("Skipping settings, acquiring with current instrument state");
    } else {
        let settings = config.scope_settings();
        info!(
            "Applying settings: {channel}, {} s/div, {} V/div, {:?} trigger on {} at {} V",
            settings.timebase,
            settings.volts_per_div,
            settings.trigger.mode,
            settings.trigger.source,
            settings.trigger.level
        );
        scope.apply_settings(&settings)?;
    }

    let samples = scope.query_waveform(channel)?;
    scope.disconnect();

    report(&samples);

    if !args.no_plot {
        plot_waveform(&samples, Some(&format!("Oscilloscope Waveform ({channel})")), None, None)?;
    }

    if args.json {
        println!("{}", serde_json::to_string(&samples)?);
    }

    Ok(())
}

fn report(samples: &WaveformSamples) {
    info!("Points: {}", samples.len());
    if let [t0, t1, ..] = samples.time() {
        info!("Sample interval: {:e} s", t1 - t0);
    }
    info!("Span: {:e} s", samples.duration());
    if let Some((min, max)) = samples.voltage_range() {
        info!("Voltage: {min:.4} V to {max:.4} V");
    }
}

fn initialize_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{}', using 'info'", log_level);
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}
