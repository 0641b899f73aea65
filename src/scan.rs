use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral, PeripheralProperties, ScanFilter,
};
use btleplug::platform::Manager;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::monitor::variant::CapabilityResolver;
use crate::monitor::{DeviceDescriptor, DeviceVariant};

#[derive(Debug, Clone, PartialEq)]
pub enum ScanUpdate {
    Discovered {
        descriptor: DeviceDescriptor,
        variant: DeviceVariant,
    },
    Disconnected(String),
}

/// Scans for advertising monitors for `duration`, forwarding each one along with
/// its resolved protocol variant. Unnamed peripherals are skipped.
pub async fn scan_for_monitors(
    resolver: &CapabilityResolver,
    duration: Duration,
    tx: mpsc::Sender<ScanUpdate>,
    cancel_token: CancellationToken,
) -> Result<(), AppError> {
    let manager = Manager::new().await?;
    let central = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NoAdapter)?;

    central.start_scan(ScanFilter::default()).await?;
    let mut events = central.events().await?;
    info!("Scanning for monitors for {}s", duration.as_secs());

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        let Ok(device) = central.peripheral(&id).await else {
                            continue;
                        };
                        let properties = match device.properties().await {
                            Ok(properties) => properties.unwrap_or_default(),
                            Err(e) => {
                                warn!("Couldn't read properties of {id}: {e}");
                                continue;
                            }
                        };
                        let Some(descriptor) = describe(device.id().to_string(), properties) else {
                            continue;
                        };
                        let variant = resolver.resolve(&descriptor);
                        debug!("Found {descriptor:?} ({variant:?})");
                        if tx.send(ScanUpdate::Discovered { descriptor, variant }).await.is_err() {
                            error!("Couldn't send device update!");
                            break;
                        }
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        warn!("Device disconnected: {id}");
                        if tx.send(ScanUpdate::Disconnected(id.to_string())).await.is_err() {
                            error!("Couldn't send disconnect update!");
                            break;
                        }
                    }
                    _ => {}
                }
            }
            _ = &mut deadline => {
                debug!("Scan time elapsed");
                break;
            }
            _ = cancel_token.cancelled() => {
                info!("Scan cancelled");
                break;
            }
        }
    }

    if let Err(e) = central.stop_scan().await {
        warn!("Failed to stop scan: {e}");
    }
    Ok(())
}

fn describe(id: String, properties: PeripheralProperties) -> Option<DeviceDescriptor> {
    let name = properties.local_name.filter(|n| !n.trim().is_empty())?;
    Some(DeviceDescriptor {
        id,
        name: Some(name),
        model: None,
        address: Some(properties.address.to_string()),
        rssi: properties.rssi,
    })
}
