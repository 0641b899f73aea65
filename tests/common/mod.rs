use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use iron_cuff::monitor::actor::{spawn_session, SessionHandle};
use iron_cuff::monitor::dummy::DummyTransport;
use iron_cuff::monitor::session::{Phase, SessionConfig, SessionSnapshot};
use iron_cuff::settings::Settings;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[allow(dead_code)]
pub const DEVICE: &str = "cuff-01";

/// Defaults, with results going to `results_dir` and a quick simulated cuff.
#[allow(dead_code)]
pub fn fast_settings(results_dir: &Path) -> Settings {
    let mut settings = Settings::load(&results_dir.join("absent.toml"), false).unwrap();
    settings.misc.log_results_to_csv = true;
    settings.misc.results_csv_path = results_dir.to_string_lossy().into_owned();
    settings.dummy.record_count = 5;
    settings.dummy.event_interval_ms = 2;
    settings
}

/// Session on a transport that only sends what the test emits.
#[allow(dead_code)]
pub fn manual_session(
    config: SessionConfig,
) -> (Arc<DummyTransport>, SessionHandle, JoinHandle<()>) {
    let transport = Arc::new(DummyTransport::empty());
    let (handle, task) = spawn_session(
        transport.clone(),
        DEVICE,
        config,
        Duration::from_millis(50),
        None,
        CancellationToken::new(),
    );
    (transport, handle, task)
}

#[allow(dead_code)]
pub async fn wait_for_phase(
    snapshots: &mut watch::Receiver<SessionSnapshot>,
    phase: Phase,
) -> SessionSnapshot {
    snapshots
        .wait_for(|s| s.phase == phase)
        .await
        .expect("session actor stopped")
        .clone()
}
