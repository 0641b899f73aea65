#![deny(unused_must_use)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use args::{SubCommands, TopLevelCmd};
use errors::AppError;
use logging::{result_sink_thread, CsvResultSink, TracingSink};
use monitor::actor::spawn_session;
use monitor::directory::WaveformLibrary;
use monitor::dummy::DummyTransport;
use monitor::session::{MeasurementOutcome, Phase, SessionSnapshot};
use monitor::transport::MonitorTransport;
use monitor::DeviceDescriptor;
use scan::{scan_for_monitors, ScanUpdate};
use settings::Settings;
use tokio::fs::create_dir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing::{error, info, warn};
use tracing_subscriber::{filter, prelude::*};
use tracing_subscriber::{fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(any(debug_assertions, feature = "portable")))]
use directories::BaseDirs;

pub mod args;
pub mod errors;
pub mod logging;
pub mod monitor;
pub mod scan;
pub mod settings;

const DUMMY_DEVICE_ID: &str = "dummy-monitor";
const DUMMY_DEVICE_NAME: &str = "BP2 Simulated";
/// How long Ctrl-C waits for a stopped measurement to report back
const STOP_GRACE: Duration = Duration::from_secs(2);

pub async fn run(mut arg_config: TopLevelCmd) -> Result<(), AppError> {
    // Relative overrides are relative to where we were launched from
    let launch_dir = std::env::current_dir()?;
    arg_config.config_override = arg_config.config_override.map(|p| launch_dir.join(p));

    let working_directory = determine_working_directory().ok_or(AppError::WorkDir)?;
    if !working_directory.exists() {
        create_dir(&working_directory)
            .await
            .map_err(|e| AppError::CreateDir {
                path: working_directory.clone(),
                source: e,
            })?;
    }
    std::env::set_current_dir(&working_directory)?;
    let log_name = std::env::current_exe()?
        .with_extension("log")
        .file_name()
        .map(PathBuf::from)
        .ok_or(AppError::WorkDir)?;
    let file_appender = BasicRollingFileAppender::new(
        log_name,
        RollingConditionBasic::new().max_size(1024 * 1024 * 5),
        2,
    )?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let time_fmt = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.6f".to_owned());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_file(false)
        .with_ansi(false)
        .with_target(true)
        .with_timer(time_fmt)
        .with_line_number(true)
        .with_filter(filter::LevelFilter::DEBUG);
    let (fmt_layer, reload_handle) = tracing_subscriber::reload::Layer::new(fmt_layer);
    let env_filter = tracing_subscriber::EnvFilter::new("trace,btleplug=info");
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    info!("Starting app... v{}", env!("CARGO_PKG_VERSION"));

    let (config_path, settings) = load_settings(&arg_config)?;
    info!("Loaded config from: {}", config_path.display());

    // Starting off at DEBUG, and setting to whatever user has defined
    reload_handle.modify(|layer| *layer.filter_mut() = settings.get_log_level())?;

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            ctrl_c_token.cancel();
        }
    });

    let result = run_with_settings(&arg_config, &settings, cancel_token).await;
    if let Err(e) = &result {
        error!("Exiting with error: {e}");
    }
    info!("Shutting down gracefully...");
    result
}

/// Same as [`run`] minus the working directory and tracing setup.
pub async fn run_headless(
    arg_config: TopLevelCmd,
    parent_token: CancellationToken,
) -> Result<(), AppError> {
    let (config_path, settings) = load_settings(&arg_config)?;
    info!("Loaded config from: {}", config_path.display());
    run_with_settings(&arg_config, &settings, parent_token).await
}

fn load_settings(arg_config: &TopLevelCmd) -> Result<(PathBuf, Settings), AppError> {
    let config_path = match &arg_config.config_override {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };
    let settings = Settings::load(&config_path, arg_config.config_required)?;
    if !arg_config.no_save {
        settings.save(&config_path)?;
    }
    Ok((config_path, settings))
}

pub async fn run_with_settings(
    arg_config: &TopLevelCmd,
    settings: &Settings,
    cancel_token: CancellationToken,
) -> Result<(), AppError> {
    match &arg_config.subcommands {
        Some(SubCommands::Dummy(cmd)) => {
            run_dummy(settings, cmd.records_only, cancel_token).await?;
        }
        Some(SubCommands::Scan(cmd)) => {
            let seconds = cmd.seconds.unwrap_or(settings.ble.scan_seconds);
            run_scan(settings, Duration::from_secs(seconds), cancel_token).await?;
        }
        None => {
            run_scan(
                settings,
                Duration::from_secs(settings.ble.scan_seconds),
                cancel_token,
            )
            .await?;
        }
    }
    Ok(())
}

pub async fn run_scan(
    settings: &Settings,
    duration: Duration,
    cancel_token: CancellationToken,
) -> Result<(), AppError> {
    let resolver = settings.resolver();
    let (tx, mut rx) = mpsc::channel(32);
    let print_updates = async move {
        let mut seen = HashSet::new();
        while let Some(update) = rx.recv().await {
            match update {
                ScanUpdate::Discovered {
                    descriptor,
                    variant,
                } => {
                    if seen.insert(descriptor.id.clone()) {
                        println!(
                            "{:<40} {:<24} {:?} (rssi {})",
                            descriptor.id,
                            descriptor.name.unwrap_or_default(),
                            variant,
                            descriptor
                                .rssi
                                .map_or_else(|| "?".to_string(), |r| r.to_string())
                        );
                    }
                }
                ScanUpdate::Disconnected(id) => {
                    seen.remove(&id);
                }
            }
        }
    };
    let (result, ()) = tokio::join!(
        scan_for_monitors(&resolver, duration, tx, cancel_token),
        print_updates
    );
    result
}

/// Runs the simulated monitor through record browsing and, unless
/// `records_only`, one live measurement. Returns that measurement's outcome.
pub async fn run_dummy(
    settings: &Settings,
    records_only: bool,
    cancel_token: CancellationToken,
) -> Result<Option<MeasurementOutcome>, AppError> {
    let transport = Arc::new(DummyTransport::new(&settings.dummy));
    let device = DeviceDescriptor::named(DUMMY_DEVICE_ID, DUMMY_DEVICE_NAME);
    let variant = settings.resolver().resolve(&device);
    transport.connect(&device.id).await?;
    info!("Using simulated monitor as {variant:?}");

    browse_records(transport.clone(), &device, variant).await?;
    if records_only {
        transport.disconnect(&device.id).await?;
        return Ok(None);
    }

    let sink_token = CancellationToken::new();
    let (result_tx, result_rx) = mpsc::unbounded_channel();
    let sink_task = if settings.misc.log_results_to_csv {
        let sink = CsvResultSink::create(Path::new(&settings.misc.results_csv_path)).await?;
        tokio::spawn(result_sink_thread(result_rx, sink, sink_token.clone()))
    } else {
        tokio::spawn(result_sink_thread(result_rx, TracingSink, sink_token.clone()))
    };

    let actor_token = CancellationToken::new();
    let (handle, actor_task) = spawn_session(
        transport.clone(),
        device.id.clone(),
        settings.session_config(),
        settings.tick_interval(),
        Some(result_tx),
        actor_token.clone(),
    );

    let mut snapshots = handle.subscribe();
    let mut last_phase = Phase::Idle;
    handle.start();
    let outcome = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break None;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                report_progress(&snapshot, &mut last_phase);
                if snapshot.outcome.is_some() {
                    break snapshot.outcome;
                }
            }
            _ = cancel_token.cancelled() => {
                break handle.stop_and_wait(STOP_GRACE).await;
            }
        }
    };
    match &outcome {
        Some(MeasurementOutcome::Success(result)) => println!(
            "Result: {}/{} mmHg, pulse {} bpm, MAP {}",
            result.systolic, result.diastolic, result.pulse_rate, result.mean_arterial_pressure
        ),
        Some(other) => println!("Measurement ended: {other:?}"),
        None => warn!("Session ended without an outcome"),
    }

    transport.disconnect(&device.id).await?;
    actor_token.cancel();
    if let Err(e) = actor_task.await {
        error!("Session actor panicked: {e}");
    }
    // Actor held the only result sender, so the sink drains and exits on its own
    if let Err(e) = sink_task.await {
        error!("Result sink panicked: {e}");
    }
    sink_token.cancel();
    Ok(outcome)
}

async fn browse_records(
    transport: Arc<DummyTransport>,
    device: &DeviceDescriptor,
    variant: monitor::DeviceVariant,
) -> Result<(), AppError> {
    let library = WaveformLibrary::new(transport, variant);
    let records = library.list_waveform_records(&device.id).await?;
    println!("{} stored record(s)", records.len());
    for record in &records {
        match library.decode_waveform(&device.id, &record.id).await {
            Ok(waveform) => {
                let millivolts = waveform.millivolts();
                let peak = millivolts.iter().fold(0.0f32, |acc, mv| acc.max(mv.abs()));
                println!(
                    "  {}: {} samples @ {} Hz, {:.1}s, peak {:.2} mV",
                    record.id,
                    waveform.sample_count(),
                    waveform.sample_rate,
                    waveform.duration().as_secs_f32(),
                    peak
                );
            }
            Err(e) => println!("  {}: {e}", record.id),
        }
    }
    let visible = library.list_waveform_records(&device.id).await?;
    println!("{} ECG record(s) after filtering", visible.len());
    Ok(())
}

fn report_progress(snapshot: &SessionSnapshot, last_phase: &mut Phase) {
    if snapshot.phase != *last_phase {
        println!("{:?}", snapshot.phase);
        *last_phase = snapshot.phase;
    }
    if let Some(pressure) = snapshot.current_pressure {
        info!(
            "{:?}: {:.0} mmHg (peak {:.0})",
            snapshot.phase, pressure, snapshot.peak_pressure
        );
    }
}

/// Returns the directory that logs, config, and other files should be placed in by default.
// If the app is built with the portable feature, or a config file sits next to
// the executable, the executable's directory is used. Otherwise the user's
// config dir from `directories`.
//
// Debug builds are always portable.
fn determine_working_directory() -> Option<PathBuf> {
    let portable = is_portable();
    let exe_path = std::env::current_exe().ok()?;
    let exe_parent = exe_path.parent()?.to_path_buf();
    let config_path = exe_path.with_extension("toml");

    if portable || config_path.exists() {
        Some(exe_parent)
    } else {
        get_user_dir()
    }
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn is_portable() -> bool {
    true
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn is_portable() -> bool {
    false
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn get_user_dir() -> Option<PathBuf> {
    None
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn get_user_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base_dirs| {
        let mut config_dir = base_dirs.config_dir().to_owned();
        config_dir.push(env!("CARGO_PKG_NAME"));
        config_dir
    })
}
