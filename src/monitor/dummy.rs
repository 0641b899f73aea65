use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use rand::Rng;
use serde_json::json;
use tokio::sync::broadcast::{self, Receiver as BReceiver, Sender as BSender};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::transport::{CuffPhase, DeviceEvent, DeviceEventKind, MonitorTransport, RecordPayload};
use super::waveform::{encode_ecg_file, encode_er2_ecg_file, ECG_SCALE_UV};
use super::RawMeasurement;
use crate::errors::TransportError;
use crate::settings::DummySettings;

const EVENT_CAPACITY: usize = 256;
const ECG_RATE: u16 = 125;
const ER2_RATE: u16 = 250;
const RECORD_SECONDS: u16 = 4;
/// Cuff pressure at which the simulated device stops deflating and analyzes
const RELEASE_PRESSURE: f32 = 40.0;

/// Stands in for a real monitor: serves stored records in the shapes the SDK
/// has been seen to return, and plays back a scripted measurement.
pub struct DummyTransport {
    settings: DummySettings,
    records: Mutex<Vec<(String, RecordPayload)>>,
    list_failure: Mutex<Option<String>>,
    last_variant_code: Mutex<Option<u8>>,
    fail_start: AtomicBool,
    /// Play back a measurement on begin; otherwise events only come from `emit`
    scripted: bool,
    begin_calls: AtomicUsize,
    abort_calls: AtomicUsize,
    /// Simulated radio latency before a begin command reaches the cuff
    begin_delay: Mutex<Duration>,
    /// Commands in the order the cuff received them
    command_log: Mutex<Vec<&'static str>>,
    event_tx: BSender<DeviceEvent>,
    script_token: Mutex<Option<CancellationToken>>,
}

impl DummyTransport {
    pub fn new(settings: &DummySettings) -> Self {
        let transport = Self::with_settings(settings.clone(), true);
        let now = Local::now();
        for i in 0..settings.record_count {
            let id = (now - chrono::Duration::hours(i64::from(i) * 7))
                .format("%Y%m%d%H%M%S")
                .to_string();
            transport.add_record(id, stored_record(i));
        }
        transport
    }

    /// No stored records and no scripted measurement.
    pub fn empty() -> Self {
        Self::with_settings(
            DummySettings {
                record_count: 0,
                ..Default::default()
            },
            false,
        )
    }

    fn with_settings(settings: DummySettings, scripted: bool) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            fail_start: AtomicBool::new(settings.fail_start),
            scripted,
            begin_calls: AtomicUsize::new(0),
            abort_calls: AtomicUsize::new(0),
            begin_delay: Mutex::new(Duration::ZERO),
            command_log: Mutex::new(Vec::new()),
            settings,
            records: Mutex::new(Vec::new()),
            list_failure: Mutex::new(None),
            last_variant_code: Mutex::new(None),
            event_tx,
            script_token: Mutex::new(None),
        }
    }

    pub fn add_record(&self, id: impl Into<String>, payload: RecordPayload) {
        lock(&self.records).push((id.into(), payload));
    }

    pub fn record_ids(&self) -> Vec<String> {
        lock(&self.records).iter().map(|(id, _)| id.clone()).collect()
    }

    /// Makes listing fail with `message` until called again with None.
    pub fn fail_listing(&self, message: Option<&str>) {
        *lock(&self.list_failure) = message.map(str::to_owned);
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn last_variant_code(&self) -> Option<u8> {
        *lock(&self.last_variant_code)
    }

    pub fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn abort_calls(&self) -> usize {
        self.abort_calls.load(Ordering::SeqCst)
    }

    pub fn set_begin_delay(&self, delay: Duration) {
        *lock(&self.begin_delay) = delay;
    }

    pub fn command_log(&self) -> Vec<&'static str> {
        lock(&self.command_log).clone()
    }

    /// Pushes an arbitrary event onto the feed.
    pub fn emit(&self, event: DeviceEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No one is listening to dummy events");
        }
    }

    fn cancel_script(&self) {
        if let Some(token) = lock(&self.script_token).take() {
            token.cancel();
        }
    }
}

#[async_trait]
impl MonitorTransport for DummyTransport {
    async fn connect(&self, device_id: &str) -> Result<(), TransportError> {
        info!("Dummy monitor {device_id} connected");
        Ok(())
    }

    async fn disconnect(&self, device_id: &str) -> Result<(), TransportError> {
        self.cancel_script();
        self.emit(DeviceEvent::new(device_id, DeviceEventKind::Disconnected));
        info!("Dummy monitor {device_id} disconnected");
        Ok(())
    }

    async fn list_records(
        &self,
        _device_id: &str,
        variant_code: u8,
    ) -> Result<Vec<String>, TransportError> {
        *lock(&self.last_variant_code) = Some(variant_code);
        if let Some(message) = lock(&self.list_failure).clone() {
            return Err(TransportError::Failed(message));
        }
        Ok(self.record_ids())
    }

    async fn read_record(
        &self,
        _device_id: &str,
        record_id: &str,
    ) -> Result<RecordPayload, TransportError> {
        lock(&self.records)
            .iter()
            .find(|(id, _)| id == record_id)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| TransportError::Failed(format!("No record {record_id} on device")))
    }

    async fn begin_measurement(&self, device_id: &str) -> Result<(), TransportError> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.begin_delay);
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        lock(&self.command_log).push("begin");
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(TransportError::Failed("Cuff not ready".into()));
        }
        self.cancel_script();
        if !self.scripted {
            return Ok(());
        }
        let token = CancellationToken::new();
        *lock(&self.script_token) = Some(token.clone());
        tokio::spawn(measurement_script(
            self.event_tx.clone(),
            device_id.to_owned(),
            self.settings.clone(),
            token,
        ));
        Ok(())
    }

    async fn abort_measurement(&self, device_id: &str) -> Result<(), TransportError> {
        debug!("Aborting dummy measurement on {device_id}");
        self.abort_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.command_log).push("abort");
        self.cancel_script();
        Ok(())
    }

    fn subscribe(&self) -> BReceiver<DeviceEvent> {
        self.event_tx.subscribe()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cycles through every payload shape we know of, including blood-pressure
/// files that only look like ECG files until decoded.
fn stored_record(index: u16) -> RecordPayload {
    let samples = synthetic_ecg(ECG_RATE, RECORD_SECONDS);
    match index % 5 {
        0 => RecordPayload::Object(json!({
            "ecgFile": {
                "$type": "EcgFile",
                "shorts": samples,
                "duration": RECORD_SECONDS,
                "sampleRate": ECG_RATE,
            }
        })),
        1 => RecordPayload::Bytes(encode_ecg_file(&samples, RECORD_SECONDS)),
        2 => RecordPayload::Bytes(encode_ecg_file(&[], 0)),
        3 => RecordPayload::Object(json!({
            "status": "ok",
            "data": {
                "className": "com.monitor.sdk.file.EcgFile",
                "waveShorts": samples,
                "recordingTime": RECORD_SECONDS,
            }
        })),
        _ => {
            let millivolts: Vec<f32> = synthetic_ecg(ER2_RATE, RECORD_SECONDS)
                .iter()
                .map(|s| f32::from(*s) * ECG_SCALE_UV / 1000.0)
                .collect();
            RecordPayload::Bytes(encode_er2_ecg_file(&millivolts, ER2_RATE))
        }
    }
}

/// Flat baseline with a sharp spike once per beat at 75 bpm.
fn synthetic_ecg(sample_rate: u16, seconds: u16) -> Vec<i16> {
    let rate = f32::from(sample_rate);
    (0..u32::from(sample_rate) * u32::from(seconds))
        .map(|n| {
            let t = n as f32 / rate;
            let beat = t % 0.8;
            let value = if beat < 0.04 {
                (beat / 0.04 * std::f32::consts::PI).sin() * 350.0
            } else {
                (t * 2.0 * std::f32::consts::PI).sin() * 20.0
            };
            value as i16
        })
        .collect()
}

fn jitter(step: f32) -> f32 {
    step * (0.8 + 0.4 * rand::random::<f32>())
}

fn final_reading() -> RawMeasurement {
    let mut rng = rand::thread_rng();
    let diastolic = rng.gen_range(65..90);
    RawMeasurement {
        systolic: diastolic + rng.gen_range(30..55),
        diastolic,
        pulse_rate: rng.gen_range(55..95),
        mean_arterial_pressure: None,
    }
}

async fn measurement_script(
    tx: BSender<DeviceEvent>,
    device_id: String,
    settings: DummySettings,
    cancel_token: CancellationToken,
) {
    let mut interval = time::interval(Duration::from_millis(settings.event_interval_ms.max(1)));
    let peak = settings.peak_pressure.max(RELEASE_PRESSURE + 1.0);
    let send = |kind: DeviceEventKind| {
        let _ = tx.send(DeviceEvent::new(device_id.as_str(), kind));
    };
    let mut pressure = 0.0f32;
    let mut sample_index = 0u32;

    while pressure < peak {
        if !next_step(&mut interval, &cancel_token).await {
            return;
        }
        pressure = (pressure + jitter(settings.inflate_step.max(1.0))).min(peak);
        send(DeviceEventKind::Progress {
            phase: CuffPhase::Inflating,
            pressure: Some(pressure),
            wave: Vec::new(),
        });
    }
    while pressure > RELEASE_PRESSURE {
        if !next_step(&mut interval, &cancel_token).await {
            return;
        }
        pressure = (pressure - jitter(settings.deflate_step.max(1.0))).max(RELEASE_PRESSURE);
        let wave = (0..8)
            .map(|_| {
                sample_index += 1;
                ((sample_index as f32 * 0.4).sin() * pressure) as i16
            })
            .collect();
        send(DeviceEventKind::Progress {
            phase: CuffPhase::Deflating,
            pressure: Some(pressure),
            wave,
        });
    }
    if !next_step(&mut interval, &cancel_token).await {
        return;
    }
    send(DeviceEventKind::Progress {
        phase: CuffPhase::Analyzing,
        pressure: Some(0.0),
        wave: Vec::new(),
    });
    if !next_step(&mut interval, &cancel_token).await {
        return;
    }
    send(DeviceEventKind::Final(final_reading()));
    debug!("Dummy measurement on {device_id} finished");
}

/// False once the script has been cancelled.
async fn next_step(interval: &mut time::Interval, cancel_token: &CancellationToken) -> bool {
    tokio::select! {
        _ = interval.tick() => true,
        _ = cancel_token.cancelled() => false,
    }
}
