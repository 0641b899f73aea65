use std::sync::Arc;
use std::time::Duration;

use iron_cuff::errors::{DecodeError, TransportError};
use iron_cuff::monitor::directory::WaveformLibrary;
use iron_cuff::monitor::dummy::DummyTransport;
use iron_cuff::monitor::session::{MeasurementOutcome, Phase, SessionConfig};
use iron_cuff::monitor::transport::{
    CuffPhase, DeviceEvent, DeviceEventKind, MeasurementStatus, MonitorTransport, RecordPayload,
};
use iron_cuff::monitor::waveform::{encode_ecg_file, encode_er2_ecg_file};
use iron_cuff::monitor::{DeviceVariant, RawMeasurement, Samples};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use ntest::timeout;

use common::{fast_settings, manual_session, wait_for_phase, DEVICE};
mod common;

const ECG_RECORD: &str = "20240301083000";
const BP_RECORD: &str = "20240301090000";

#[test_log::test(tokio::test)]
async fn browsing_hides_blood_pressure_records() {
    let transport = Arc::new(DummyTransport::empty());
    let samples: Vec<i16> = (0..250).map(|n| (n % 50) * 10).collect();
    transport.add_record(
        ECG_RECORD,
        RecordPayload::Object(json!({
            "ecgFile": { "$type": "EcgFile", "shorts": samples, "duration": 2 }
        })),
    );
    transport.add_record(BP_RECORD, RecordPayload::Bytes(encode_ecg_file(&[], 0)));
    let library = WaveformLibrary::new(transport.clone(), DeviceVariant::Primary);

    assert_eq!(library.list_waveform_records(DEVICE).await.unwrap().len(), 2);

    let waveform = library.decode_waveform(DEVICE, ECG_RECORD).await.unwrap();
    assert_eq!(waveform.samples, Samples::Raw(samples));
    assert_eq!(waveform.sample_rate, 125.0);
    assert_eq!(waveform.duration(), Duration::from_secs(2));

    assert!(matches!(
        library.decode_waveform(DEVICE, BP_RECORD).await,
        Err(DecodeError::NotAWaveformFile(_))
    ));
    let ids: Vec<String> = library
        .list_waveform_records(DEVICE)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![ECG_RECORD.to_string()]);
}

#[test_log::test(tokio::test)]
async fn misdetected_variant_still_decodes() {
    let transport = Arc::new(DummyTransport::empty());
    transport.add_record(
        ECG_RECORD,
        RecordPayload::Bytes(encode_er2_ecg_file(&[0.1, 0.25, -0.4, 0.0], 250)),
    );
    let library = WaveformLibrary::new(transport, DeviceVariant::Primary);
    let waveform = library.decode_waveform(DEVICE, ECG_RECORD).await.unwrap();
    assert_eq!(
        waveform.samples,
        Samples::Millivolts(vec![0.1, 0.25, -0.4, 0.0])
    );
    assert_eq!(waveform.sample_rate, 250.0);
}

#[tokio::test]
#[timeout(10000)] // 10s timeout
async fn simulated_measurement_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    let settings = fast_settings(dir.path());
    let outcome = iron_cuff::run_dummy(&settings, false, CancellationToken::new())
        .await
        .unwrap();
    let Some(MeasurementOutcome::Success(result)) = &outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(result.systolic > result.diastolic);

    let csv_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    assert_eq!(csv_files.len(), 1);
    let contents = std::fs::read_to_string(&csv_files[0]).unwrap();
    let rows: Vec<&str> = contents.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[1].contains(&format!(",{},{},", result.systolic, result.diastolic)));
}

#[tokio::test(start_paused = true)]
#[timeout(5000)] // 5s timeout
async fn completion_without_result_times_out() {
    let (transport, handle, _task) = manual_session(SessionConfig::default());
    let mut snapshots = handle.subscribe();
    handle.start();
    wait_for_phase(&mut snapshots, Phase::Waiting).await;

    transport.emit(DeviceEvent::progress(DEVICE, CuffPhase::Inflating, 120.0));
    transport.emit(DeviceEvent::progress(DEVICE, CuffPhase::Deflating, 80.0));
    transport.emit(DeviceEvent::new(
        DEVICE,
        DeviceEventKind::Status {
            status: MeasurementStatus::Complete,
            result: None,
        },
    ));
    let started = tokio::time::Instant::now();
    assert_eq!(
        handle.wait_for_outcome().await,
        Some(MeasurementOutcome::Inconclusive)
    );
    assert!(started.elapsed() >= Duration::from_secs(10));

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Completed);
    assert_eq!(snapshot.result, None);
    assert_eq!(snapshot.peak_pressure, 120.0);
}

#[tokio::test(start_paused = true)]
#[timeout(5000)] // 5s timeout
async fn stop_ignores_late_events_and_guards_restart() {
    let (transport, handle, _task) = manual_session(SessionConfig::default());
    let mut snapshots = handle.subscribe();
    handle.start();
    wait_for_phase(&mut snapshots, Phase::Waiting).await;
    transport.emit(DeviceEvent::progress(DEVICE, CuffPhase::Inflating, 150.0));
    transport.emit(DeviceEvent::progress(DEVICE, CuffPhase::Deflating, 110.0));
    let first = wait_for_phase(&mut snapshots, Phase::Deflating).await;

    handle.stop();
    assert_eq!(
        handle.wait_for_outcome().await,
        Some(MeasurementOutcome::Canceled)
    );

    // Device keeps talking for a moment after the stop
    tokio::time::sleep(Duration::from_millis(500)).await;
    transport.emit(DeviceEvent::progress(DEVICE, CuffPhase::Deflating, 70.0));
    transport.emit(DeviceEvent::new(
        DEVICE,
        DeviceEventKind::Final(RawMeasurement {
            systolic: 121,
            diastolic: 79,
            pulse_rate: 66,
            mean_arterial_pressure: None,
        }),
    ));
    // Inside the restart guard
    handle.start();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Canceled);
    assert_eq!(snapshot.result, None);
    assert_eq!(snapshot.id, first.id);
    assert_eq!(transport.begin_calls(), 1);
    assert_eq!(transport.abort_calls(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.start();
    let restarted = wait_for_phase(&mut snapshots, Phase::Waiting).await;
    assert_ne!(restarted.id, first.id);
    assert_eq!(restarted.outcome, None);
}

#[tokio::test(start_paused = true)]
#[timeout(5000)] // 5s timeout
async fn stop_during_slow_begin_aborts_after_it() {
    let (transport, handle, _task) = manual_session(SessionConfig::default());
    transport.set_begin_delay(Duration::from_millis(30));
    handle.start();
    tokio::time::sleep(Duration::from_millis(5)).await;
    handle.stop();
    assert_eq!(
        handle.wait_for_outcome().await,
        Some(MeasurementOutcome::Canceled)
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.command_log(), vec!["begin", "abort"]);
}

#[tokio::test(start_paused = true)]
#[timeout(5000)] // 5s timeout
async fn stop_before_start_is_harmless() {
    let (transport, handle, _task) = manual_session(SessionConfig::default());
    let mut snapshots = handle.subscribe();
    handle.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.snapshot().phase, Phase::Idle);
    assert_eq!(handle.snapshot().outcome, None);
    assert_eq!(transport.abort_calls(), 0);

    handle.start();
    wait_for_phase(&mut snapshots, Phase::Waiting).await;
}

#[tokio::test(start_paused = true)]
#[timeout(5000)] // 5s timeout
async fn failed_begin_ends_in_error() {
    let (transport, handle, _task) = manual_session(SessionConfig::default());
    transport.set_fail_start(true);
    handle.start();
    match handle.wait_for_outcome().await {
        Some(MeasurementOutcome::Failed(message)) => assert_eq!(message, "Cuff not ready"),
        other => panic!("unexpected outcome {other:?}"),
    }
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Error);
    assert_eq!(snapshot.error.as_deref(), Some("Cuff not ready"));
}

#[tokio::test(start_paused = true)]
#[timeout(5000)] // 5s timeout
async fn disconnect_returns_to_idle() {
    let (transport, handle, _task) = manual_session(SessionConfig::default());
    let mut snapshots = handle.subscribe();
    handle.start();
    wait_for_phase(&mut snapshots, Phase::Waiting).await;
    transport.emit(DeviceEvent::progress(DEVICE, CuffPhase::Inflating, 60.0));
    wait_for_phase(&mut snapshots, Phase::Inflating).await;

    transport.disconnect(DEVICE).await.unwrap();
    let snapshot = wait_for_phase(&mut snapshots, Phase::Idle).await;
    assert_eq!(snapshot.outcome, None);
    assert_eq!(snapshot.current_pressure, None);
    assert_eq!(snapshot.peak_pressure, 0.0);

    // Nothing left to stop, so this must not hang
    assert_eq!(handle.stop_and_wait(Duration::from_secs(2)).await, None);
    assert_eq!(transport.abort_calls(), 0);
}

#[tokio::test(start_paused = true)]
#[timeout(5000)] // 5s timeout
async fn error_while_idle_leaves_session_usable() {
    let (transport, handle, _task) = manual_session(SessionConfig::default());
    let mut snapshots = handle.subscribe();
    transport.emit(DeviceEvent::new(
        DEVICE,
        DeviceEventKind::Error(TransportError::Failed("read timed out".into())),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.snapshot().phase, Phase::Idle);
    assert_eq!(handle.snapshot().error, None);

    handle.start();
    wait_for_phase(&mut snapshots, Phase::Waiting).await;
}
