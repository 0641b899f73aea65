use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use csv_async::AsyncSerializer;
use serde_derive::Serialize;
use tokio::fs::{create_dir_all, File};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::AppError;
use crate::monitor::BpResult;

const CSV_FILE_PREFIX: &str = "cuff-";

/// Where finished measurements end up. Called once per completed session
/// that produced a usable result.
#[async_trait]
pub trait ResultSink: Send {
    async fn on_result(&mut self, result: &BpResult) -> Result<(), AppError>;
}

#[allow(non_snake_case)]
#[derive(Debug, Serialize)]
struct CsvData {
    Timestamp: String,
    Systolic: u16,
    Diastolic: u16,
    PulseRate: u16,
    MAP: u16,
}

impl From<&BpResult> for CsvData {
    fn from(result: &BpResult) -> Self {
        Self {
            Timestamp: result.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            Systolic: result.systolic,
            Diastolic: result.diastolic,
            PulseRate: result.pulse_rate,
            MAP: result.mean_arterial_pressure,
        }
    }
}

/// Appends each result as a row in a per-run CSV file.
pub struct CsvResultSink {
    path: PathBuf,
    writer: AsyncSerializer<File>,
}

impl CsvResultSink {
    pub async fn create(folder: &Path) -> Result<Self, AppError> {
        if !folder.exists() {
            create_dir_all(folder)
                .await
                .map_err(|e| AppError::CreateDir {
                    path: folder.to_owned(),
                    source: e,
                })?;
        }
        let file_name = format!(
            "{}{}.csv",
            CSV_FILE_PREFIX,
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
        );
        let path = folder.join(file_name);
        let file = File::create(&path)
            .await
            .map_err(|e| AppError::CreateFile {
                path: path.clone(),
                source: e,
            })?;
        info!("Logging results to {}", path.display());
        Ok(Self {
            path,
            writer: AsyncSerializer::from_writer(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for CsvResultSink {
    async fn on_result(&mut self, result: &BpResult) -> Result<(), AppError> {
        self.writer.serialize(CsvData::from(result)).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Only reports results in the log.
pub struct TracingSink;

#[async_trait]
impl ResultSink for TracingSink {
    async fn on_result(&mut self, result: &BpResult) -> Result<(), AppError> {
        info!(
            "Result: {}/{} mmHg, pulse {} bpm, MAP {}",
            result.systolic, result.diastolic, result.pulse_rate, result.mean_arterial_pressure
        );
        Ok(())
    }
}

/// Keeps results in memory, mostly for tests and embedding.
#[derive(Clone, Default)]
pub struct MemorySink {
    results: Arc<Mutex<Vec<BpResult>>>,
}

impl MemorySink {
    pub fn results(&self) -> Vec<BpResult> {
        self.results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn on_result(&mut self, result: &BpResult) -> Result<(), AppError> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result.clone());
        Ok(())
    }
}

/// Drains finished results into `sink` until the channel closes or we're cancelled.
pub async fn result_sink_thread<S: ResultSink>(
    mut result_rx: UnboundedReceiver<BpResult>,
    mut sink: S,
    cancel_token: CancellationToken,
) {
    info!("Result sink thread started!");
    loop {
        tokio::select! {
            received = result_rx.recv() => {
                let Some(result) = received else {
                    debug!("Result channel closed");
                    break;
                };
                if let Err(e) = sink.on_result(&result).await {
                    error!("Failed to store result: {e}");
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Result sink thread shutting down");
                break;
            }
        }
    }
}
