use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::Value;
use tokio::sync::broadcast::Receiver as BReceiver;

use super::RawMeasurement;
use crate::errors::TransportError;

/// Whatever the vendor SDK hands back when a record is read.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    /// A parsed, loosely-typed object tree
    Object(Value),
    /// The unparsed file contents
    Bytes(Vec<u8>),
}

/// Physical phase reported in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CuffPhase {
    Inflating,
    Deflating,
    Analyzing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementStatus {
    Complete,
    /// Measurement stopped on the device itself (button press, cuff fault)
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEventKind {
    Progress {
        phase: CuffPhase,
        pressure: Option<f32>,
        /// Live pulse waveform samples carried by deflation packets
        wave: Vec<i16>,
    },
    /// Real-time cuff pressure outside any explicit progress packet
    Telemetry { pressure: f32 },
    /// Final measurement packet
    Final(RawMeasurement),
    Status {
        status: MeasurementStatus,
        result: Option<RawMeasurement>,
    },
    Error(TransportError),
    Disconnected,
}

/// One entry of the transport's event feed. Progress, terminal and error
/// notifications share a single ordered feed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    pub device_id: String,
    pub timestamp: DateTime<Local>,
    pub kind: DeviceEventKind,
}

impl DeviceEvent {
    pub fn new(device_id: impl Into<String>, kind: DeviceEventKind) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp: Local::now(),
            kind,
        }
    }
    pub fn progress(device_id: impl Into<String>, phase: CuffPhase, pressure: f32) -> Self {
        Self::new(
            device_id,
            DeviceEventKind::Progress {
                phase,
                pressure: Some(pressure),
                wave: Vec::new(),
            },
        )
    }
}

/// The vendor transport as seen by the core. Passed explicitly to every component
/// that needs it so tests can swap in a double.
#[async_trait]
pub trait MonitorTransport: Send + Sync {
    async fn connect(&self, device_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self, device_id: &str) -> Result<(), TransportError>;
    /// Record identifiers stored on the device, in no particular order.
    async fn list_records(
        &self,
        device_id: &str,
        variant_code: u8,
    ) -> Result<Vec<String>, TransportError>;
    async fn read_record(
        &self,
        device_id: &str,
        record_id: &str,
    ) -> Result<RecordPayload, TransportError>;
    async fn begin_measurement(&self, device_id: &str) -> Result<(), TransportError>;
    async fn abort_measurement(&self, device_id: &str) -> Result<(), TransportError>;
    fn subscribe(&self) -> BReceiver<DeviceEvent>;
}
