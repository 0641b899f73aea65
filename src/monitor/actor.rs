use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{error::RecvError, Receiver as BReceiver};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session::{
    Effect, MeasurementOutcome, MeasurementSession, SessionConfig, SessionInput, SessionSnapshot,
};
use super::transport::{DeviceEvent, MonitorTransport};
use super::BpResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
    Reset,
}

impl From<SessionCommand> for SessionInput {
    fn from(command: SessionCommand) -> Self {
        match command {
            SessionCommand::Start => SessionInput::Start,
            SessionCommand::Stop => SessionInput::Stop,
            SessionCommand::Reset => SessionInput::Reset,
        }
    }
}

/// What the UI holds on to: commands in, snapshots out.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: UnboundedSender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn start(&self) {
        self.send(SessionCommand::Start);
    }
    /// Safe from any state, never fails.
    pub fn stop(&self) {
        self.send(SessionCommand::Stop);
    }
    pub fn reset(&self) {
        self.send(SessionCommand::Reset);
    }
    fn send(&self, command: SessionCommand) {
        if self.command_tx.send(command).is_err() {
            debug!("Session actor gone, dropping {command:?}");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Resolves once the current session has an outcome, or None if the actor stopped first.
    pub async fn wait_for_outcome(&self) -> Option<MeasurementOutcome> {
        let mut rx = self.subscribe();
        let snapshot = rx.wait_for(|s| s.outcome.is_some()).await.ok()?;
        snapshot.outcome.clone()
    }

    /// Stops a running measurement and waits up to `grace` for it to land.
    /// A session that isn't measuring has nothing to wait for, so this returns
    /// whatever outcome it already holds.
    pub async fn stop_and_wait(&self, grace: Duration) -> Option<MeasurementOutcome> {
        let snapshot = self.snapshot();
        if !snapshot.phase.is_active() {
            return snapshot.outcome;
        }
        self.stop();
        match tokio::time::timeout(grace, self.wait_for_outcome()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("No outcome {grace:?} after stop");
                None
            }
        }
    }
}

/// Commands for the device itself, sent in the order the session emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceCommand {
    Begin,
    Abort,
}

struct SessionActor {
    session: MeasurementSession,
    device_tx: UnboundedSender<DeviceCommand>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    result_tx: Option<UnboundedSender<BpResult>>,
    tick_interval: Duration,
}

impl SessionActor {
    async fn event_loop(
        &mut self,
        mut command_rx: UnboundedReceiver<SessionCommand>,
        mut feedback_rx: UnboundedReceiver<SessionInput>,
        mut events: BReceiver<DeviceEvent>,
        cancel_token: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let input = tokio::select! {
                Some(command) = command_rx.recv() => command.into(),
                Some(input) = feedback_rx.recv() => input,
                event = events.recv() => match event {
                    Ok(event) => SessionInput::Device(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Session fell behind, {missed} device event(s) dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        info!("Device event feed closed, session actor stopping");
                        break;
                    }
                },
                _ = ticker.tick(), if self.session.needs_tick() => SessionInput::Tick,
                _ = cancel_token.cancelled() => {
                    info!("Shutting down measurement session actor!");
                    break;
                }
            };
            self.handle(input);
        }
    }

    fn handle(&mut self, input: SessionInput) {
        let effects = self.session.apply(input, Instant::now());
        for effect in effects {
            self.run_effect(effect);
        }
        let snapshot = self.session.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Device commands are queued to the command task so the handler never
    /// awaits; failures come back through the feedback channel.
    fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::BeginMeasurement => self.send_device(DeviceCommand::Begin),
            Effect::AbortMeasurement => self.send_device(DeviceCommand::Abort),
            Effect::PublishResult(result) => {
                if let Some(result_tx) = &self.result_tx {
                    if result_tx.send(result).is_err() {
                        warn!("Result sink is gone, result not stored");
                    }
                }
            }
            Effect::Outcome(outcome) => {
                info!("Measurement {} outcome: {outcome:?}", self.session.id());
            }
        }
    }

    fn send_device(&self, command: DeviceCommand) {
        if self.device_tx.send(command).is_err() {
            warn!("Device command task is gone, dropping {command:?}");
        }
    }
}

/// Runs device commands one at a time, so an abort can never overtake a begin
/// that is still in flight.
async fn device_command_thread(
    transport: Arc<dyn MonitorTransport>,
    device_id: String,
    mut device_rx: UnboundedReceiver<DeviceCommand>,
    feedback_tx: UnboundedSender<SessionInput>,
) {
    while let Some(command) = device_rx.recv().await {
        match command {
            DeviceCommand::Begin => {
                if let Err(e) = transport.begin_measurement(&device_id).await {
                    error!("Couldn't begin measurement on {device_id}: {e}");
                    let _ = feedback_tx.send(SessionInput::StartFailed(e));
                }
            }
            DeviceCommand::Abort => {
                if let Err(e) = transport.abort_measurement(&device_id).await {
                    warn!("Abort command to {device_id} failed: {e}");
                }
            }
        }
    }
    debug!("Device command task for {device_id} finished");
}

/// Spawns the task owning one device's measurement session.
pub fn spawn_session(
    transport: Arc<dyn MonitorTransport>,
    device_id: impl Into<String>,
    config: SessionConfig,
    tick_interval: Duration,
    result_tx: Option<UnboundedSender<BpResult>>,
    cancel_token: CancellationToken,
) -> (SessionHandle, JoinHandle<()>) {
    let session = MeasurementSession::new(device_id, config);
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
    let (device_tx, device_rx) = mpsc::unbounded_channel();
    // Subscribed before spawning so nothing sent after we return is missed
    let events = transport.subscribe();
    tokio::spawn(device_command_thread(
        transport,
        session.device_id().to_owned(),
        device_rx,
        feedback_tx,
    ));
    let mut actor = SessionActor {
        session,
        device_tx,
        snapshot_tx,
        result_tx,
        tick_interval: tick_interval.max(Duration::from_millis(1)),
    };
    let task = tokio::spawn(async move {
        actor
            .event_loop(command_rx, feedback_rx, events, cancel_token)
            .await;
    });
    (
        SessionHandle {
            command_tx,
            snapshot_rx,
        },
        task,
    )
}
