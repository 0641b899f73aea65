use std::path::PathBuf;

use thiserror::Error;

/// Represents all possible errors that can occur during the app's lifecycle
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create directory \"{path}\": {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to create file \"{path}\": {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error parsing config: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Bluetooth Error: {0}")]
    Bt(#[from] btleplug::Error),
    #[error("TOML Serialization Error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv_async::Error),
    #[error("Transport Error: {0}")]
    Transport(#[from] TransportError),
    #[error("Decode Error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Failed to set log level: {0}")]
    LogReload(#[from] tracing_subscriber::reload::Error),
    // My errors
    #[error("Failed to get working directory")]
    WorkDir,
    #[error("No Bluetooth adapters found")]
    NoAdapter,
}

/// Failures reported by the monitor transport. Carried verbatim to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Device \"{0}\" is not connected")]
    Disconnected(String),
    #[error("Transport call timed out")]
    Timeout,
    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Per-record waveform decoding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The record exists but is not an ECG recording (usually a blood-pressure reading).
    #[error("Record \"{0}\" is not a waveform file")]
    NotAWaveformFile(String),
    /// Every extraction strategy failed for the record.
    #[error("No decoding strategy could read record \"{0}\"")]
    DecodeExhausted(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
