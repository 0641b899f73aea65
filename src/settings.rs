use config::{Config, ConfigError, File as ConfigFile};
use serde_derive::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

use crate::errors::AppError;
use crate::monitor::session::SessionConfig;
use crate::monitor::variant::{CapabilityResolver, DEFAULT_ALTERNATE_MARKERS};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MiscSettings {
    log_level: String,
    pub log_results_to_csv: bool,
    pub results_csv_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BLESettings {
    pub scan_seconds: u64,
    /// Name/model fragments that mark the alternate protocol family
    pub alternate_markers: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionSettings {
    pub min_display_delay_ms: u64,
    pub max_step_per_tick: f32,
    pub tick_interval_ms: u64,
    pub completion_timeout_ms: u64,
    pub restart_guard_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            min_display_delay_ms: 200,
            max_step_per_tick: 6.0,
            tick_interval_ms: 50,
            completion_timeout_ms: 10_000,
            restart_guard_ms: 1500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DummySettings {
    /// Stored records served by the simulated monitor
    pub record_count: u16,
    pub peak_pressure: f32,
    pub inflate_step: f32,
    pub deflate_step: f32,
    pub event_interval_ms: u64,
    /// Refuse to begin measurements
    pub fail_start: bool,
}

impl Default for DummySettings {
    fn default() -> Self {
        Self {
            record_count: 6,
            peak_pressure: 170.0,
            inflate_step: 12.0,
            deflate_step: 5.0,
            event_interval_ms: 100,
            fail_start: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    pub ble: BLESettings,
    pub session: SessionSettings,
    pub misc: MiscSettings,
    pub dummy: DummySettings,
}

impl Settings {
    /// Layers `config_path` (if present, or always when `required`) over the defaults.
    pub fn load(config_path: &Path, required: bool) -> Result<Self, ConfigError> {
        let default_log_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        let s = Config::builder()
            .add_source(ConfigFile::from(config_path).required(required))
            .set_default("ble.scan_seconds", 15)?
            .set_default("ble.alternate_markers", DEFAULT_ALTERNATE_MARKERS.to_vec())?
            .set_default("session.min_display_delay_ms", 200)?
            .set_default("session.max_step_per_tick", 6.0)?
            .set_default("session.tick_interval_ms", 50)?
            .set_default("session.completion_timeout_ms", 10_000)?
            .set_default("session.restart_guard_ms", 1500)?
            .set_default("misc.log_level", default_log_level)?
            .set_default("misc.log_results_to_csv", true)?
            .set_default("misc.results_csv_path", "results")?
            .set_default("dummy.record_count", 6)?
            .set_default("dummy.peak_pressure", 170.0)?
            .set_default("dummy.inflate_step", 12.0)?
            .set_default("dummy.deflate_step", 5.0)?
            .set_default("dummy.event_interval_ms", 100)?
            .set_default("dummy.fail_start", false)?
            .build()?;

        s.try_deserialize()
    }

    pub fn save(&self, config_path: &Path) -> Result<(), AppError> {
        let toml_string = toml::to_string(self)?;
        let mut file = File::create(config_path).map_err(|e| AppError::CreateFile {
            path: config_path.to_owned(),
            source: e,
        })?;
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// `<executable name>.toml` in the working directory.
    pub fn default_path() -> Result<PathBuf, AppError> {
        let exe_path = std::env::current_exe()?;
        let file_name = exe_path
            .with_extension("toml")
            .file_name()
            .map(PathBuf::from)
            .ok_or(AppError::WorkDir)?;
        Ok(file_name)
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.misc.log_level.to_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            min_display_delay: Duration::from_millis(self.session.min_display_delay_ms),
            max_step_per_tick: self.session.max_step_per_tick,
            completion_timeout: Duration::from_millis(self.session.completion_timeout_ms),
            restart_guard: Duration::from_millis(self.session.restart_guard_ms),
            ..Default::default()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.session.tick_interval_ms.max(1))
    }

    pub fn resolver(&self) -> CapabilityResolver {
        CapabilityResolver::with_alternate_markers(&self.ble.alternate_markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{DeviceDescriptor, DeviceVariant};

    #[test]
    fn defaults_fill_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml"), false).unwrap();
        assert_eq!(settings.session_config(), SessionConfig::default());
        assert_eq!(settings.tick_interval(), Duration::from_millis(50));
        assert_eq!(settings.ble.alternate_markers, DEFAULT_ALTERNATE_MARKERS);
        assert_eq!(
            settings
                .resolver()
                .resolve(&DeviceDescriptor::named("x", "BP2W 0123")),
            DeviceVariant::Alternate
        );
    }

    #[test]
    fn required_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(&dir.path().join("absent.toml"), true).is_err());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cuff.toml");
        let mut settings = Settings::load(&path, false).unwrap();
        settings.session.restart_guard_ms = 900;
        settings.ble.alternate_markers = vec!["kiosk".into()];
        settings.misc.log_level = "trace".into();
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path, true).unwrap();
        assert_eq!(
            loaded.session_config().restart_guard,
            Duration::from_millis(900)
        );
        assert_eq!(loaded.ble.alternate_markers, vec!["kiosk".to_string()]);
        assert_eq!(loaded.get_log_level(), LevelFilter::TRACE);
    }
}
