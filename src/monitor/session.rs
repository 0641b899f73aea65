//! Live blood-pressure measurement state machine.
//!
//! [`MeasurementSession::apply`] is the whole reducer: every command, device
//! event and timer tick goes through it, synchronously, and comes back out as
//! a list of [`Effect`]s for the driver to carry out. Nothing in here awaits.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::smoothing::{PressureSample, PressureSmoother, Trend};
use super::transport::{CuffPhase, DeviceEvent, DeviceEventKind, MeasurementStatus};
use super::{BpResult, RawMeasurement};
use crate::errors::TransportError;

/// Ordered by progress; the three terminal phases share the last rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Waiting,
    Inflating,
    Deflating,
    Analyzing,
    Completed,
    Canceled,
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Canceled | Phase::Error)
    }
    pub fn is_active(self) -> bool {
        !self.is_terminal() && self != Phase::Idle
    }
    pub fn rank(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Waiting => 1,
            Phase::Inflating => 2,
            Phase::Deflating => 3,
            Phase::Analyzing => 4,
            Phase::Completed | Phase::Canceled | Phase::Error => 5,
        }
    }
}

/// The one user-facing outcome of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementOutcome {
    Success(BpResult),
    /// Completed, but without a usable result
    Inconclusive,
    Failed(String),
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub min_display_delay: Duration,
    pub max_step_per_tick: f32,
    pub completion_timeout: Duration,
    pub restart_guard: Duration,
    pub live_wave_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_display_delay: Duration::from_millis(200),
            max_step_per_tick: 6.0,
            completion_timeout: Duration::from_secs(10),
            restart_guard: Duration::from_millis(1500),
            live_wave_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Start,
    Stop,
    /// Dismiss a finished session
    Reset,
    /// The begin command couldn't be issued
    StartFailed(TransportError),
    Device(DeviceEvent),
    Tick,
}

/// Work for the driver, produced by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    BeginMeasurement,
    AbortMeasurement,
    /// Hand to the result sink
    PublishResult(BpResult),
    Outcome(MeasurementOutcome),
}

/// UI-facing copy of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub device_id: String,
    pub phase: Phase,
    pub current_pressure: Option<f32>,
    pub peak_pressure: f32,
    pub result: Option<BpResult>,
    pub error: Option<String>,
    pub outcome: Option<MeasurementOutcome>,
    pub live_wave: Vec<i16>,
}

#[derive(Debug, Clone)]
pub struct MeasurementSession {
    id: Uuid,
    device_id: String,
    phase: Phase,
    config: SessionConfig,
    smoother: PressureSmoother,
    peak_pressure: f32,
    live_wave: Vec<i16>,
    result: Option<BpResult>,
    error: Option<String>,
    outcome: Option<MeasurementOutcome>,
    completion_deadline: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl MeasurementSession {
    pub fn new(device_id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            phase: Phase::Idle,
            smoother: PressureSmoother::new(config.min_display_delay, config.max_step_per_tick),
            config,
            peak_pressure: 0.0,
            live_wave: Vec::new(),
            result: None,
            error: None,
            outcome: None,
            completion_deadline: None,
            stopped_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn current_pressure(&self) -> Option<f32> {
        self.smoother.current()
    }
    pub fn peak_pressure(&self) -> f32 {
        self.peak_pressure
    }
    pub fn raw_pressure_samples(&self) -> &[PressureSample] {
        self.smoother.samples()
    }
    pub fn result(&self) -> Option<&BpResult> {
        self.result.as_ref()
    }
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
    pub fn outcome(&self) -> Option<&MeasurementOutcome> {
        self.outcome.as_ref()
    }
    /// Whether the smoothing/completion timer should be running
    pub fn needs_tick(&self) -> bool {
        self.phase.is_active()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            device_id: self.device_id.clone(),
            phase: self.phase,
            current_pressure: self.current_pressure(),
            peak_pressure: self.peak_pressure,
            result: self.result.clone(),
            error: self.error.clone(),
            outcome: self.outcome.clone(),
            live_wave: self.live_wave.clone(),
        }
    }

    /// Maps (state, input) to the next state plus the effects to run.
    pub fn apply(&mut self, input: SessionInput, now: Instant) -> Vec<Effect> {
        match input {
            SessionInput::Start => self.start(now),
            SessionInput::Stop => self.stop(now),
            SessionInput::Reset => {
                if self.phase.is_terminal() {
                    self.reset(Phase::Idle);
                }
                Vec::new()
            }
            SessionInput::StartFailed(e) => {
                if self.phase.is_active() {
                    self.fail(e.message())
                } else {
                    Vec::new()
                }
            }
            SessionInput::Device(event) => self.on_device_event(event, now),
            SessionInput::Tick => self.tick(now),
        }
    }

    fn in_restart_guard(&self, now: Instant) -> bool {
        self.stopped_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.restart_guard)
    }

    fn start(&mut self, now: Instant) -> Vec<Effect> {
        if self.in_restart_guard(now) {
            warn!("Start rejected, session was stopped moments ago");
            return Vec::new();
        }
        if self.phase.is_active() {
            debug!("Start ignored, already measuring ({:?})", self.phase);
            return Vec::new();
        }
        self.reset(Phase::Waiting);
        info!("Measurement {} started on {}", self.id, self.device_id);
        vec![Effect::BeginMeasurement]
    }

    fn stop(&mut self, now: Instant) -> Vec<Effect> {
        if !self.phase.is_active() {
            return Vec::new();
        }
        self.stopped_at = Some(now);
        let mut effects = vec![Effect::AbortMeasurement];
        effects.extend(self.finish(Phase::Canceled, MeasurementOutcome::Canceled));
        effects
    }

    /// Starts a fresh session in `phase`. Keeps the restart guard.
    fn reset(&mut self, phase: Phase) {
        if self.phase != Phase::Idle {
            self.id = Uuid::new_v4();
        }
        self.phase = phase;
        self.smoother.clear();
        self.peak_pressure = 0.0;
        self.live_wave.clear();
        self.result = None;
        self.error = None;
        self.outcome = None;
        self.completion_deadline = None;
    }

    fn transition(&mut self, phase: Phase) {
        if self.phase != phase {
            info!("Measurement {}: {:?} -> {:?}", self.id, self.phase, phase);
            self.phase = phase;
        }
    }

    fn finish(&mut self, phase: Phase, outcome: MeasurementOutcome) -> Vec<Effect> {
        self.transition(phase);
        self.completion_deadline = None;
        self.outcome = Some(outcome.clone());
        vec![Effect::Outcome(outcome)]
    }

    fn fail(&mut self, message: String) -> Vec<Effect> {
        warn!("Measurement {} failed: {message}", self.id);
        self.error = Some(message.clone());
        self.finish(Phase::Error, MeasurementOutcome::Failed(message))
    }

    fn complete(&mut self, raw: Option<RawMeasurement>, event: &DeviceEvent) -> Vec<Effect> {
        let result = raw.and_then(|raw| {
            let result = BpResult::from_raw(&raw, event.timestamp);
            if result.is_none() {
                warn!("Discarding implausible result {raw:?}");
            }
            result
        });
        self.result = result.clone();
        match result {
            Some(result) => {
                let mut effects = vec![Effect::PublishResult(result.clone())];
                effects.extend(self.finish(Phase::Completed, MeasurementOutcome::Success(result)));
                effects
            }
            None => self.finish(Phase::Completed, MeasurementOutcome::Inconclusive),
        }
    }

    fn record_pressure(&mut self, pressure: f32, now: Instant) {
        self.smoother.push(pressure, now);
        if self.phase == Phase::Inflating {
            self.peak_pressure = self.peak_pressure.max(pressure);
        }
    }

    /// Device-initiated measurement: the cuff is already pumping.
    fn implicit_start(&mut self, pressure: f32, now: Instant) -> Vec<Effect> {
        if self.in_restart_guard(now) {
            debug!("Ignoring trailing pressure {pressure} after stop");
            return Vec::new();
        }
        self.reset(Phase::Inflating);
        info!("Measurement {} started by device {}", self.id, self.device_id);
        self.record_pressure(pressure, now);
        Vec::new()
    }

    fn on_device_event(&mut self, event: DeviceEvent, now: Instant) -> Vec<Effect> {
        if event.device_id != self.device_id {
            return Vec::new();
        }
        if self.phase.is_terminal() {
            debug!("Session finished, ignoring {:?}", event.kind);
            return Vec::new();
        }
        match &event.kind {
            DeviceEventKind::Disconnected => {
                if self.phase != Phase::Idle {
                    warn!("{} disconnected mid measurement", self.device_id);
                    self.reset(Phase::Idle);
                }
                Vec::new()
            }
            DeviceEventKind::Error(e) => {
                if self.phase.is_active() {
                    self.fail(e.message())
                } else {
                    debug!("Transport error while idle: {e}");
                    Vec::new()
                }
            }
            DeviceEventKind::Final(raw) => self.complete(Some(*raw), &event),
            DeviceEventKind::Status {
                status: MeasurementStatus::Complete,
                result: Some(raw),
            } => self.complete(Some(*raw), &event),
            DeviceEventKind::Status {
                status: MeasurementStatus::Complete,
                result: None,
            } => {
                if self.phase.rank() < Phase::Analyzing.rank() {
                    self.transition(Phase::Analyzing);
                }
                if self.completion_deadline.is_none() {
                    debug!("Complete without a result, waiting for one");
                    self.completion_deadline = Some(now + self.config.completion_timeout);
                }
                Vec::new()
            }
            DeviceEventKind::Status {
                status: MeasurementStatus::Interrupted,
                ..
            } => {
                if self.phase.is_active() {
                    info!("Measurement interrupted on the device");
                    self.finish(Phase::Canceled, MeasurementOutcome::Canceled)
                } else {
                    Vec::new()
                }
            }
            DeviceEventKind::Telemetry { pressure } => {
                let pressure = *pressure;
                match self.phase {
                    Phase::Idle if pressure > 0.0 => self.implicit_start(pressure, now),
                    Phase::Waiting if pressure > 0.0 => {
                        self.transition(Phase::Inflating);
                        self.record_pressure(pressure, now);
                        Vec::new()
                    }
                    Phase::Inflating | Phase::Deflating => {
                        self.record_pressure(pressure, now);
                        Vec::new()
                    }
                    _ => Vec::new(),
                }
            }
            DeviceEventKind::Progress {
                phase,
                pressure,
                wave,
            } => self.on_progress(*phase, *pressure, wave, now),
        }
    }

    fn on_progress(
        &mut self,
        reported: CuffPhase,
        pressure: Option<f32>,
        wave: &[i16],
        now: Instant,
    ) -> Vec<Effect> {
        let next = match (reported, self.phase) {
            (CuffPhase::Inflating, Phase::Idle) => {
                return match pressure.filter(|p| *p > 0.0) {
                    Some(p) => self.implicit_start(p, now),
                    None => Vec::new(),
                };
            }
            (CuffPhase::Inflating, Phase::Waiting | Phase::Inflating) => Phase::Inflating,
            (CuffPhase::Deflating, Phase::Inflating | Phase::Deflating) => Phase::Deflating,
            (CuffPhase::Analyzing, Phase::Deflating | Phase::Analyzing) => Phase::Analyzing,
            (reported, current) => {
                debug!("Out of order {reported:?} progress while {current:?}, ignoring");
                return Vec::new();
            }
        };
        self.transition(next);
        if let Some(pressure) = pressure {
            self.record_pressure(pressure, now);
        }
        if next == Phase::Deflating && !wave.is_empty() {
            self.live_wave.extend_from_slice(wave);
            let overflow = self
                .live_wave
                .len()
                .saturating_sub(self.config.live_wave_capacity);
            self.live_wave.drain(..overflow);
        }
        Vec::new()
    }

    fn tick(&mut self, now: Instant) -> Vec<Effect> {
        if !self.phase.is_active() {
            return Vec::new();
        }
        let trend = match self.phase {
            Phase::Inflating => Trend::Rising,
            Phase::Deflating | Phase::Analyzing => Trend::Falling,
            _ => Trend::Free,
        };
        self.smoother.tick(now, trend);
        match self.completion_deadline {
            Some(deadline) if now >= deadline => {
                warn!("No result arrived after completion, measurement is inconclusive");
                self.result = None;
                self.finish(Phase::Completed, MeasurementOutcome::Inconclusive)
            }
            _ => Vec::new(),
        }
    }
}
