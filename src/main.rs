/*!
 * Frond CLI - drive a plant-sensor device from the terminal
 */

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use frond::{
    config::Config,
    core::{retry, Poller, ToggleCache, UpdatePhase, Updater},
    device::{DeviceApi, HttpDevice},
    logging,
    view::{LogSink, ViewSink},
    Source,
};

#[derive(Parser)]
#[command(name = "frond")]
#[command(version, about = "Dashboard core for embedded plant-sensor devices", long_about = None)]
struct Cli {
    /// Device base URL (overrides the config file)
    #[arg(short = 'd', long = "device", value_name = "URL", global = true)]
    device: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll every telemetry source and render updates until interrupted
    Watch,
    /// Show device metadata and firmware versions
    Status,
    /// Read or write the device output toggle
    Led {
        /// Omit to read the current value
        #[arg(value_enum)]
        state: Option<LedArg>,
    },
    /// Rename a device-held sensor label
    Rename {
        /// Sensor index
        index: u32,
        /// New label
        name: String,
    },
    /// Check whether a firmware update is available
    Check,
    /// Drive the full firmware update sequence
    Update,
}

#[derive(ValueEnum, Clone, Copy)]
enum LedArg {
    On,
    Off,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = &cli.device {
        config.device_url = url.clone();
    }
    config.validate()?;

    logging::init(cli.verbose)?;

    let device: Arc<dyn DeviceApi> =
        Arc::new(HttpDevice::new(&config.device_url, config.http.timeout())?);
    let sink: Arc<dyn ViewSink> = Arc::new(LogSink);

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(device, sink, &config).await,
        Command::Status => status(device, &config).await,
        Command::Led { state } => led(device, sink, state).await,
        Command::Rename { index, name } => rename(device, index, &name).await,
        Command::Check => check(device, sink, &config).await,
        Command::Update => update(device, sink, &config).await,
    }
}

/// Discover the device's sources, grounded in one retried metadata read
async fn discover(
    device: &Arc<dyn DeviceApi>,
    config: &Config,
) -> anyhow::Result<Vec<Source>> {
    let policy = config.retry.policy();
    let meta = retry::run(&policy, || device.device_meta())
        .await
        .context("failed to read device metadata")?;
    info!(name = %meta.name, uuid = %meta.uuid, "connected");

    let sensors = retry::run(&policy, || device.sensor_meta())
        .await
        .context("failed to read sensor metadata")?;
    Ok(sensors.iter().map(Source::from_meta).collect())
}

async fn watch(
    device: Arc<dyn DeviceApi>,
    sink: Arc<dyn ViewSink>,
    config: &Config,
) -> anyhow::Result<()> {
    let sources = discover(&device, config).await?;
    if sources.is_empty() {
        anyhow::bail!("device reports no telemetry sources");
    }
    info!(sources = sources.len(), "watching");

    let handle = Poller::start(
        device,
        sink,
        sources,
        config.poll.clone(),
        config.retry.policy(),
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("stopping");

    for (index, state) in handle.stop().await {
        info!(
            source = index,
            samples = state.series.len(),
            consecutive_failures = state.consecutive_failures,
            "final state"
        );
    }
    Ok(())
}

async fn status(device: Arc<dyn DeviceApi>, config: &Config) -> anyhow::Result<()> {
    let policy = config.retry.policy();
    let meta = retry::run(&policy, || device.device_meta())
        .await
        .context("failed to read device metadata")?;
    let report = device
        .version_report()
        .await
        .context("failed to read the version report")?;

    println!("device:    {}", meta.name);
    println!("uuid:      {}", meta.uuid);
    println!("firmware:  {}", report.current_version);
    println!("remote:    {}", report.remote_version);
    println!(
        "updates:   {}",
        if report.updates_available {
            "available"
        } else {
            "none"
        }
    );
    Ok(())
}

async fn led(
    device: Arc<dyn DeviceApi>,
    sink: Arc<dyn ViewSink>,
    state: Option<LedArg>,
) -> anyhow::Result<()> {
    let cache = ToggleCache::new(device, sink);
    match state {
        None => {
            let value = cache.refresh().await.context("failed to read the toggle")?;
            println!("led: {}", if value { "on" } else { "off" });
        }
        Some(arg) => {
            let desired = matches!(arg, LedArg::On);
            cache
                .set(desired)
                .await
                .context("failed to write the toggle")?;
            println!("led: {}", if desired { "on" } else { "off" });
        }
    }
    Ok(())
}

async fn rename(device: Arc<dyn DeviceApi>, index: u32, name: &str) -> anyhow::Result<()> {
    device
        .rename_sensor(index, name)
        .await
        .with_context(|| format!("failed to rename sensor {}", index))?;
    println!("sensor {} renamed to {:?}", index, name);
    Ok(())
}

async fn check(
    device: Arc<dyn DeviceApi>,
    sink: Arc<dyn ViewSink>,
    config: &Config,
) -> anyhow::Result<()> {
    let updater = Updater::new(device, sink, config.update.clone());
    let phase = updater.check().await.context("update check failed")?;
    let view = updater.view().await;
    match phase {
        UpdatePhase::UpdateAvailable => println!(
            "update available: {} -> {}",
            view.local_version.as_deref().unwrap_or("?"),
            view.remote_version.as_deref().unwrap_or("?"),
        ),
        _ => println!(
            "up to date ({})",
            view.local_version.as_deref().unwrap_or("?"),
        ),
    }
    Ok(())
}

async fn update(
    device: Arc<dyn DeviceApi>,
    sink: Arc<dyn ViewSink>,
    config: &Config,
) -> anyhow::Result<()> {
    let updater = Updater::new(device.clone(), sink, config.update.clone());

    let phase = updater.check().await.context("update check failed")?;
    if phase != UpdatePhase::UpdateAvailable {
        println!("nothing to do: firmware is up to date");
        return Ok(());
    }

    let phase = updater.download().await.context("download failed")?;
    if phase != UpdatePhase::Downloaded {
        anyhow::bail!("device did not stage the firmware; try again");
    }

    match updater.install().await.context("install failed")? {
        UpdatePhase::Healthy => {
            // The reload: discard everything cached and re-read the device
            let meta = device
                .device_meta()
                .await
                .context("device healthy but metadata re-read failed")?;
            let report = device
                .version_report()
                .await
                .context("device healthy but version re-read failed")?;
            println!(
                "update complete: {} now runs firmware {}",
                meta.name, report.current_version
            );
        }
        UpdatePhase::InstallTimedOut => {
            anyhow::bail!("device did not come back after the install; check it manually");
        }
        other => anyhow::bail!("unexpected final phase: {}", other),
    }
    Ok(())
}
