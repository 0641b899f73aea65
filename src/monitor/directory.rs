use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use super::transport::MonitorTransport;
use super::waveform::WaveformDecoder;
use super::{DeviceVariant, NormalizedWaveform, RecordKind, RecordRef};
use crate::errors::{DecodeError, TransportError};

/// Lists stored record identifiers. No retries and no ordering guarantees;
/// listing is cheap and idempotent so callers repeat it as they see fit.
#[derive(Clone)]
pub struct RecordDirectoryClient {
    transport: Arc<dyn MonitorTransport>,
}

impl RecordDirectoryClient {
    pub fn new(transport: Arc<dyn MonitorTransport>) -> Self {
        Self { transport }
    }

    pub async fn list_records(
        &self,
        device_id: &str,
        variant: DeviceVariant,
    ) -> Result<Vec<RecordRef>, TransportError> {
        let ids = self
            .transport
            .list_records(device_id, variant.protocol_code())
            .await
            .inspect_err(|e| error!("Listing records on {device_id} failed: {e}"))?;
        debug!("{device_id} reports {} record(s)", ids.len());
        Ok(ids.into_iter().map(RecordRef::new).collect())
    }
}

/// What we've learned about records while connected. Never persisted.
#[derive(Debug, Default)]
pub struct RecordCatalog {
    kinds: HashMap<String, RecordKind>,
}

impl RecordCatalog {
    pub fn kind_of(&self, record_id: &str) -> RecordKind {
        self.kinds.get(record_id).copied().unwrap_or_default()
    }
    pub fn mark_waveform(&mut self, record_id: &str) {
        self.kinds.insert(record_id.to_owned(), RecordKind::Ecg);
    }
    pub fn mark_not_waveform(&mut self, record_id: &str) {
        self.kinds
            .insert(record_id.to_owned(), RecordKind::BloodPressure);
    }
    /// Annotates listed records with known kinds and hides known non-ECG ones.
    pub fn filter_listing(&self, records: Vec<RecordRef>) -> Vec<RecordRef> {
        records
            .into_iter()
            .map(|mut record| {
                if record.kind == RecordKind::Unknown {
                    record.kind = self.kind_of(&record.id);
                }
                record
            })
            .filter(|record| record.kind != RecordKind::BloodPressure)
            .collect()
    }
    pub fn clear(&mut self) {
        self.kinds.clear();
    }
}

/// UI-facing access to stored ECG records for one connected device.
pub struct WaveformLibrary {
    directory: RecordDirectoryClient,
    decoder: WaveformDecoder,
    variant: DeviceVariant,
    catalog: Mutex<RecordCatalog>,
}

impl WaveformLibrary {
    pub fn new(transport: Arc<dyn MonitorTransport>, variant: DeviceVariant) -> Self {
        Self {
            directory: RecordDirectoryClient::new(transport.clone()),
            decoder: WaveformDecoder::new(transport),
            variant,
            catalog: Mutex::new(RecordCatalog::default()),
        }
    }

    pub fn variant(&self) -> DeviceVariant {
        self.variant
    }

    pub async fn list_waveform_records(
        &self,
        device_id: &str,
    ) -> Result<Vec<RecordRef>, TransportError> {
        let records = self.directory.list_records(device_id, self.variant).await?;
        Ok(self.catalog().filter_listing(records))
    }

    /// Remembers records that turn out not to be ECG files so later listings
    /// hide them. Exhausted decodes are not remembered.
    pub async fn decode_waveform(
        &self,
        device_id: &str,
        record_id: &str,
    ) -> Result<NormalizedWaveform, DecodeError> {
        let record = RecordRef {
            id: record_id.to_owned(),
            kind: self.catalog().kind_of(record_id),
        };
        let result = self.decoder.decode(device_id, &record, self.variant).await;
        match &result {
            Ok(waveform) => {
                debug!(
                    "Decoded {record_id}: {} samples @ {} Hz",
                    waveform.sample_count(),
                    waveform.sample_rate
                );
                self.catalog().mark_waveform(record_id);
            }
            Err(DecodeError::NotAWaveformFile(_)) => {
                info!("Record {record_id} is not an ECG file, hiding it");
                self.catalog().mark_not_waveform(record_id);
            }
            Err(e) => error!("Couldn't decode {record_id}: {e}"),
        }
        result
    }

    pub fn forget(&self) {
        self.catalog().clear();
    }

    fn catalog(&self) -> std::sync::MutexGuard<'_, RecordCatalog> {
        // Catalog updates can't leave it half-written, so a poisoned lock is still usable
        self.catalog.lock().unwrap_or_else(|e| e.into_inner())
    }
}
