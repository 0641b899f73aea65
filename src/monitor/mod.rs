pub mod actor;
pub mod directory;
pub mod dummy;
pub mod session;
pub mod smoothing;
pub mod transport;
pub mod variant;
pub mod waveform;

use std::time::Duration;

use chrono::{DateTime, Local};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Hardware/firmware family of the connected monitor.
/// The discriminant is the code handed to the transport when listing records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DeviceVariant {
    #[default]
    Primary = 1,
    Alternate = 2,
}

impl DeviceVariant {
    pub fn protocol_code(self) -> u8 {
        self.into()
    }
    pub fn other(self) -> Self {
        match self {
            DeviceVariant::Primary => DeviceVariant::Alternate,
            DeviceVariant::Alternate => DeviceVariant::Primary,
        }
    }
}

/// What we know about a connected (or discovered) monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: Option<String>,
    /// Model string from the device information service, if it was read
    pub model: Option<String>,
    pub address: Option<String>,
    pub rssi: Option<i16>,
}

impl DeviceDescriptor {
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RecordKind {
    #[default]
    Unknown,
    BloodPressure,
    Ecg,
}

/// One stored record on the device, as listed by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub id: String,
    pub kind: RecordKind,
}

impl RecordRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: RecordKind::Unknown,
        }
    }
}

/// Decoded sample representation. Exactly one of the two is ever produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    /// Signed device units, multiply by `scale_factor` (µV/unit) to get µV
    Raw(Vec<i16>),
    /// Already in millivolts
    Millivolts(Vec<f32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Raw(s) => s.len(),
            Samples::Millivolts(s) => s.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWaveform {
    pub samples: Samples,
    pub sample_rate: f32,
    /// µV per unit for `Samples::Raw`, fixed at 1.0 for `Samples::Millivolts`
    pub scale_factor: f32,
    pub duration_seconds: Option<f32>,
}

impl NormalizedWaveform {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn millivolts(&self) -> Vec<f32> {
        match &self.samples {
            Samples::Raw(raw) => raw
                .iter()
                .map(|s| *s as f32 * self.scale_factor / 1000.0)
                .collect(),
            Samples::Millivolts(mv) => mv.clone(),
        }
    }

    /// Reported duration, or one derived from the sample count if the record had none.
    pub fn duration(&self) -> Duration {
        let secs = self
            .duration_seconds
            .unwrap_or_else(|| self.sample_count() as f32 / self.sample_rate.max(f32::EPSILON));
        Duration::from_secs_f32(secs.max(0.0))
    }
}

/// Result values as the device reports them, before any validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMeasurement {
    pub systolic: i32,
    pub diastolic: i32,
    pub pulse_rate: i32,
    pub mean_arterial_pressure: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BpResult {
    pub systolic: u16,
    pub diastolic: u16,
    pub pulse_rate: u16,
    pub mean_arterial_pressure: u16,
    pub timestamp: DateTime<Local>,
}

impl BpResult {
    /// Returns None for implausible readings so they surface as inconclusive
    /// rather than as a fault.
    pub fn from_raw(raw: &RawMeasurement, timestamp: DateTime<Local>) -> Option<Self> {
        if raw.diastolic <= 0 || raw.systolic <= raw.diastolic || raw.pulse_rate < 0 {
            return None;
        }
        let systolic = u16::try_from(raw.systolic).ok()?;
        let diastolic = u16::try_from(raw.diastolic).ok()?;
        let pulse_rate = u16::try_from(raw.pulse_rate).ok()?;
        let mean_arterial_pressure = match raw.mean_arterial_pressure {
            Some(map) if map > 0 => u16::try_from(map).ok()?,
            _ => diastolic + (systolic - diastolic) / 3,
        };
        Some(Self {
            systolic,
            diastolic,
            pulse_rate,
            mean_arterial_pressure,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(systolic: i32, diastolic: i32) -> RawMeasurement {
        RawMeasurement {
            systolic,
            diastolic,
            pulse_rate: 70,
            mean_arterial_pressure: None,
        }
    }

    #[test]
    fn implausible_results_are_dropped() {
        let now = Local::now();
        assert!(BpResult::from_raw(&raw(80, 80), now).is_none());
        assert!(BpResult::from_raw(&raw(70, 90), now).is_none());
        assert!(BpResult::from_raw(&raw(120, 0), now).is_none());
        assert!(BpResult::from_raw(&raw(120, -5), now).is_none());
    }

    #[test]
    fn mean_pressure_is_derived_when_missing() {
        let now = Local::now();
        let result = BpResult::from_raw(&raw(120, 81), now).unwrap();
        assert_eq!(result.mean_arterial_pressure, 94);

        let mut with_map = raw(120, 81);
        with_map.mean_arterial_pressure = Some(97);
        let result = BpResult::from_raw(&with_map, now).unwrap();
        assert_eq!(result.mean_arterial_pressure, 97);
    }

    #[test]
    fn raw_samples_convert_with_scale() {
        let waveform = NormalizedWaveform {
            samples: Samples::Raw(vec![1000, -500]),
            sample_rate: 125.0,
            scale_factor: 3.098,
            duration_seconds: None,
        };
        let mv = waveform.millivolts();
        assert!((mv[0] - 3.098).abs() < 1e-4);
        assert!((mv[1] + 1.549).abs() < 1e-4);
        assert_eq!(waveform.duration(), Duration::from_secs_f32(2.0 / 125.0));
    }

    #[test]
    fn variant_codes() {
        assert_eq!(DeviceVariant::Primary.protocol_code(), 1);
        assert_eq!(DeviceVariant::try_from(2u8).unwrap(), DeviceVariant::Alternate);
        assert!(DeviceVariant::try_from(7u8).is_err());
    }
}
