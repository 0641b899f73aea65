//! ECG record decoding.
//!
//! The vendor SDK has returned record contents in a handful of shapes over its
//! point releases: the waveform container itself, the container wrapped under a
//! renamed accessor, the container buried somewhere in a response object, or
//! just the file bytes. Decoding runs an ordered list of strategies and keeps
//! the first one that produces a container, then pulls samples out of it.
//!
//! A container that yields no samples at all is how a blood-pressure file looks
//! when read as an ECG file; that case is reported as
//! [`DecodeError::NotAWaveformFile`] rather than as a decoding failure.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::transport::{MonitorTransport, RecordPayload};
use super::{DeviceVariant, NormalizedWaveform, RecordRef, Samples};
use crate::errors::DecodeError;

/// µV per raw sample unit used by both monitor families.
pub const ECG_SCALE_UV: f32 = 3.098;

const TYPE_KEYS: &[&str] = &["$type", "className", "@type"];
/// Accessors different SDK versions used for the inner waveform object
const WRAPPER_KEYS: &[&str] = &["ecgFile", "ecg_file", "content", "file"];
/// Accessors that may carry the whole file as bytes
const PAYLOAD_BYTE_KEYS: &[&str] = &["bytes", "fileBytes", "rawBytes", "buf"];

const SHORT_KEYS: &[&str] = &["shorts", "ecgShorts", "waveShorts", "samples"];
const FLOAT_KEYS: &[&str] = &["mvs", "ecgFloats", "floats", "waveMv"];
const RAW_WAVE_KEYS: &[&str] = &["waveData", "wave", "rawData", "data"];
const DURATION_KEYS: &[&str] = &[
    "duration",
    "recordingTime",
    "recordTime",
    "durationSeconds",
    "timeLength",
];
const SAMPLE_RATE_KEYS: &[&str] = &["sampleRate", "frequency", "hz"];
const SCALE_KEYS: &[&str] = &["scale", "scaleFactor", "uvPerUnit"];

/// A named, fallible step. Strategies never share state; a failure just means
/// the next one gets a turn.
pub struct Strategy<I: ?Sized, T> {
    pub name: &'static str,
    pub run: fn(&I) -> Option<T>,
}

/// Runs `strategies` in order and returns the first success along with its name.
pub fn first_success<I: ?Sized, T>(
    strategies: &[Strategy<I, T>],
    input: &I,
) -> Option<(&'static str, T)> {
    strategies.iter().find_map(|strategy| {
        let output = (strategy.run)(input);
        if output.is_none() {
            debug!("Strategy \"{}\" found nothing", strategy.name);
        }
        output.map(|o| (strategy.name, o))
    })
}

/// ECG file containers, one per monitor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    /// i16 samples behind a 10 byte header, fixed 125 Hz
    EcgFile,
    /// f32 millivolt samples behind an 8 byte header carrying rate and count
    Er2EcgFile,
}

impl ContainerType {
    pub fn type_name(self) -> &'static str {
        match self {
            ContainerType::EcgFile => "EcgFile",
            ContainerType::Er2EcgFile => "Er2EcgFile",
        }
    }

    fn for_variant(variant: DeviceVariant) -> Self {
        match variant {
            DeviceVariant::Primary => ContainerType::EcgFile,
            DeviceVariant::Alternate => ContainerType::Er2EcgFile,
        }
    }

    /// Matching variant's container first; a misdetected variant must still decode.
    fn order_for(variant: DeviceVariant) -> [ContainerType; 2] {
        [
            Self::for_variant(variant),
            Self::for_variant(variant.other()),
        ]
    }

    fn default_sample_rate(self) -> f32 {
        match self {
            ContainerType::EcgFile => 125.0,
            ContainerType::Er2EcgFile => 250.0,
        }
    }

    fn matches_type_name(self, declared: &str) -> bool {
        let name = self.type_name();
        declared == name
            || declared
                .rsplit(['.', '$', ':'])
                .next()
                .is_some_and(|tail| tail == name)
    }

    fn parse_bytes(self, bytes: &[u8]) -> Option<Container> {
        match self {
            ContainerType::EcgFile => parse_ecg_file(bytes),
            ContainerType::Er2EcgFile => parse_er2_ecg_file(bytes),
        }
    }
}

/// A waveform container once located, whatever shape it came in.
#[derive(Debug, Clone, Default, PartialEq)]
struct Container {
    shorts: Option<Vec<i16>>,
    floats: Option<Vec<f32>>,
    raw: Option<Vec<u8>>,
    duration_seconds: Option<f32>,
    sample_rate: Option<f32>,
    scale: Option<f32>,
    default_rate: f32,
}

impl Container {
    fn from_object(kind: ContainerType, map: &Map<String, Value>) -> Self {
        Self {
            shorts: lookup(map, SHORT_KEYS, as_shorts),
            floats: lookup(map, FLOAT_KEYS, as_floats),
            raw: lookup(map, RAW_WAVE_KEYS, as_bytes),
            duration_seconds: lookup(map, DURATION_KEYS, as_positive_f32),
            sample_rate: lookup(map, SAMPLE_RATE_KEYS, as_positive_f32),
            scale: lookup(map, SCALE_KEYS, as_positive_f32),
            default_rate: kind.default_sample_rate(),
        }
    }

    /// Samples as 16-bit integers, then floating mV, then a little-endian
    /// reading of whatever raw buffer the container carries.
    fn into_waveform(self) -> Option<NormalizedWaveform> {
        let sample_rate = self.sample_rate.unwrap_or(self.default_rate);
        let scaled = |samples| NormalizedWaveform {
            samples,
            sample_rate,
            scale_factor: self.scale.unwrap_or(ECG_SCALE_UV),
            duration_seconds: self.duration_seconds,
        };
        if let Some(shorts) = self.shorts.as_ref().filter(|s| !s.is_empty()) {
            return Some(scaled(Samples::Raw(shorts.clone())));
        }
        if let Some(floats) = self.floats.as_ref().filter(|s| !s.is_empty()) {
            return Some(NormalizedWaveform {
                samples: Samples::Millivolts(floats.clone()),
                sample_rate,
                scale_factor: 1.0,
                duration_seconds: self.duration_seconds,
            });
        }
        let shorts = decode_i16_le(self.raw.as_deref().unwrap_or_default());
        (!shorts.is_empty()).then(|| scaled(Samples::Raw(shorts)))
    }
}

struct DecodeInput<'a> {
    payload: &'a RecordPayload,
    order: [ContainerType; 2],
}

impl DecodeInput<'_> {
    fn object(&self) -> Option<&Map<String, Value>> {
        match self.payload {
            RecordPayload::Object(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    fn raw_bytes(&self) -> Option<Vec<u8>> {
        match self.payload {
            RecordPayload::Bytes(bytes) => Some(bytes.clone()),
            RecordPayload::Object(Value::Object(map)) => lookup(map, PAYLOAD_BYTE_KEYS, as_bytes),
            RecordPayload::Object(_) => None,
        }
    }

    /// Container type an object declares, or the preferred one if it declares none
    fn kind_of(&self, map: &Map<String, Value>) -> ContainerType {
        declared_type(map)
            .and_then(|name| {
                self.order
                    .iter()
                    .copied()
                    .find(|kind| kind.matches_type_name(name))
            })
            .unwrap_or(self.order[0])
    }

    /// An object declaring a known container type, or an untyped one that
    /// actually carries samples. Empty arrays under generic keys like `data`
    /// don't count.
    fn is_container(&self, map: &Map<String, Value>) -> bool {
        let declared = declared_type(map)
            .is_some_and(|name| self.order.iter().any(|kind| kind.matches_type_name(name)));
        declared
            || lookup(map, SHORT_KEYS, as_shorts).is_some_and(|s| !s.is_empty())
            || lookup(map, FLOAT_KEYS, as_floats).is_some_and(|s| !s.is_empty())
            || lookup(map, RAW_WAVE_KEYS, as_bytes).is_some_and(|s| s.len() >= 2)
    }
}

fn container_strategies<'a>() -> [Strategy<DecodeInput<'a>, Container>; 4] {
    [
        Strategy {
            name: "direct object",
            run: direct_object,
        },
        Strategy {
            name: "wrapper accessors",
            run: wrapper_accessors,
        },
        Strategy {
            name: "structural scan",
            run: structural_scan,
        },
        Strategy {
            name: "raw bytes",
            run: raw_bytes,
        },
    ]
}

fn direct_object(input: &DecodeInput) -> Option<Container> {
    let map = input.object()?;
    input
        .is_container(map)
        .then(|| Container::from_object(input.kind_of(map), map))
}

fn wrapper_accessors(input: &DecodeInput) -> Option<Container> {
    let map = input.object()?;
    WRAPPER_KEYS.iter().find_map(|key| {
        let inner = map.get(*key)?.as_object()?;
        input
            .is_container(inner)
            .then(|| Container::from_object(input.kind_of(inner), inner))
    })
}

/// Looks for a nested object declaring a known container type, checking direct
/// children before grandchildren.
fn structural_scan(input: &DecodeInput) -> Option<Container> {
    let map = input.object()?;
    for kind in input.order {
        let declares = |value: &Value| {
            value
                .as_object()
                .filter(|obj| declared_type(obj).is_some_and(|name| kind.matches_type_name(name)))
                .map(|obj| Container::from_object(kind, obj))
        };
        if let Some(found) = map.values().find_map(declares) {
            return Some(found);
        }
        let grandchild = map
            .values()
            .filter_map(Value::as_object)
            .flat_map(|child| child.values())
            .find_map(declares);
        if grandchild.is_some() {
            return grandchild;
        }
    }
    None
}

/// Bytes reader signatures tried for each container type, in order.
const BYTE_READERS: &[(&str, fn(ContainerType, &[u8]) -> Option<Container>)] = &[
    ("bytes", read_whole),
    ("bytes, length", read_length_prefixed),
    ("bytes, offset, length", read_enveloped),
];

fn raw_bytes(input: &DecodeInput) -> Option<Container> {
    let bytes = input.raw_bytes()?;
    for kind in input.order {
        for (signature, reader) in BYTE_READERS {
            if let Some(container) = reader(kind, &bytes) {
                debug!("Built {} from ({signature})", kind.type_name());
                return Some(container);
            }
        }
    }
    None
}

fn read_whole(kind: ContainerType, bytes: &[u8]) -> Option<Container> {
    kind.parse_bytes(bytes)
}

/// u32 LE length, then exactly that many bytes of file
fn read_length_prefixed(kind: ContainerType, bytes: &[u8]) -> Option<Container> {
    let length = le_u32(bytes, 0)? as usize;
    let body = bytes.get(4..)?;
    if body.len() != length {
        return None;
    }
    kind.parse_bytes(body)
}

const ENVELOPE_MARKER: u8 = 0xA5;
const ENVELOPE_HEADER_LEN: usize = 4;

/// `A5 <cmd> <u16 LE length>` transfer frame around the file; trailing bytes
/// past the declared length (checksums, padding) are ignored.
fn read_enveloped(kind: ContainerType, bytes: &[u8]) -> Option<Container> {
    if *bytes.first()? != ENVELOPE_MARKER {
        return None;
    }
    let length = le_u16(bytes, 2)? as usize;
    let body = bytes.get(ENVELOPE_HEADER_LEN..ENVELOPE_HEADER_LEN + length)?;
    kind.parse_bytes(body)
}

const ECG_FILE_HEADER_LEN: usize = 10;

// [0] file version 1..=3, [1..5] start time, [5..7] recording seconds,
// [7..10] reserved, then i16 LE samples
fn parse_ecg_file(bytes: &[u8]) -> Option<Container> {
    let version = *bytes.first()?;
    if !(1..=3).contains(&version) {
        return None;
    }
    let body = bytes.get(ECG_FILE_HEADER_LEN..)?;
    if body.len() % 2 != 0 {
        return None;
    }
    let seconds = le_u16(bytes, 5)?;
    Some(Container {
        raw: Some(body.to_vec()),
        duration_seconds: (seconds > 0).then_some(seconds as f32),
        default_rate: ContainerType::EcgFile.default_sample_rate(),
        ..Default::default()
    })
}

const ER2_HEADER_LEN: usize = 8;

// [0..2] sample rate, [2..6] duration ms, [6..8] sample count, then f32 LE mV
fn parse_er2_ecg_file(bytes: &[u8]) -> Option<Container> {
    let rate = le_u16(bytes, 0)?;
    if !(100..=1000).contains(&rate) {
        return None;
    }
    let duration_ms = le_u32(bytes, 2)?;
    let count = le_u16(bytes, 6)? as usize;
    let body = bytes.get(ER2_HEADER_LEN..)?;
    if body.len() != count * 4 {
        return None;
    }
    let floats = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Some(Container {
        floats: Some(floats),
        duration_seconds: (duration_ms > 0).then_some(duration_ms as f32 / 1000.0),
        sample_rate: Some(rate as f32),
        default_rate: ContainerType::Er2EcgFile.default_sample_rate(),
        ..Default::default()
    })
}

/// Pure part of decoding: payload in, waveform (or the reason there isn't one) out.
pub fn decode_payload(
    record_id: &str,
    variant: DeviceVariant,
    payload: &RecordPayload,
) -> Result<NormalizedWaveform, DecodeError> {
    let input = DecodeInput {
        payload,
        order: ContainerType::order_for(variant),
    };
    let Some((strategy, container)) = first_success(&container_strategies(), &input) else {
        warn!("Every decoding strategy failed for record {record_id}");
        return Err(DecodeError::DecodeExhausted(record_id.to_owned()));
    };
    debug!("Record {record_id}: container found via {strategy}");
    container
        .into_waveform()
        .ok_or_else(|| DecodeError::NotAWaveformFile(record_id.to_owned()))
}

/// Reads records through the transport and normalizes them. Holds no state
/// between calls.
#[derive(Clone)]
pub struct WaveformDecoder {
    transport: Arc<dyn MonitorTransport>,
}

impl WaveformDecoder {
    pub fn new(transport: Arc<dyn MonitorTransport>) -> Self {
        Self { transport }
    }

    pub async fn decode(
        &self,
        device_id: &str,
        record: &RecordRef,
        variant: DeviceVariant,
    ) -> Result<NormalizedWaveform, DecodeError> {
        let payload = self.transport.read_record(device_id, &record.id).await?;
        decode_payload(&record.id, variant, &payload)
    }
}

fn lookup<T>(
    map: &Map<String, Value>,
    keys: &[&str],
    convert: fn(&Value) -> Option<T>,
) -> Option<T> {
    keys.iter().find_map(|key| map.get(*key).and_then(convert))
}

fn declared_type(map: &Map<String, Value>) -> Option<&str> {
    TYPE_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
}

fn as_shorts(value: &Value) -> Option<Vec<i16>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_i64().and_then(|n| i16::try_from(n).ok()))
        .collect()
}

fn as_floats(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|n| n as f32))
        .collect()
}

fn as_bytes(value: &Value) -> Option<Vec<u8>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

fn as_positive_f32(value: &Value) -> Option<f32> {
    value.as_f64().filter(|n| *n > 0.0).map(|n| n as f32)
}

/// Odd trailing byte is dropped.
pub fn decode_i16_le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Builds an `EcgFile` image. Shared with the simulated transport and tests.
pub fn encode_ecg_file(samples: &[i16], recording_seconds: u16) -> Vec<u8> {
    let mut bytes = vec![1u8, 0, 0, 0, 0];
    bytes.extend_from_slice(&recording_seconds.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0]);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Builds an `Er2EcgFile` image.
pub fn encode_er2_ecg_file(millivolts: &[f32], sample_rate: u16) -> Vec<u8> {
    let duration_ms = (millivolts.len() as f32 / sample_rate.max(1) as f32 * 1000.0) as u32;
    let mut bytes = sample_rate.to_le_bytes().to_vec();
    bytes.extend_from_slice(&duration_ms.to_le_bytes());
    bytes.extend_from_slice(&(millivolts.len() as u16).to_le_bytes());
    for mv in millivolts {
        bytes.extend_from_slice(&mv.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> RecordPayload {
        RecordPayload::Object(value)
    }

    #[test]
    fn direct_container_is_used_as_is() {
        let payload = object(json!({
            "$type": "EcgFile",
            "shorts": [120, -80, 15],
            "sampleRate": 125,
            "duration": 30,
        }));
        let waveform = decode_payload("rec1", DeviceVariant::Primary, &payload).unwrap();
        assert_eq!(waveform.samples, Samples::Raw(vec![120, -80, 15]));
        assert_eq!(waveform.sample_rate, 125.0);
        assert_eq!(waveform.scale_factor, ECG_SCALE_UV);
        assert_eq!(waveform.duration_seconds, Some(30.0));
    }

    #[test]
    fn untyped_object_with_samples_is_a_container() {
        let payload = object(json!({ "ecgShorts": [1, 2, 3] }));
        let waveform = decode_payload("rec1", DeviceVariant::Primary, &payload).unwrap();
        assert_eq!(waveform.sample_count(), 3);
    }

    #[test]
    fn wrapper_accessors_are_tried_in_order() {
        let payload = object(json!({
            "status": 0,
            "content": { "mvs": [0.5, -0.25] },
            "file": { "shorts": [9, 9, 9, 9] },
        }));
        let waveform = decode_payload("rec1", DeviceVariant::Primary, &payload).unwrap();
        assert_eq!(waveform.samples, Samples::Millivolts(vec![0.5, -0.25]));
        assert_eq!(waveform.scale_factor, 1.0);
    }

    #[test]
    fn empty_envelope_array_does_not_shadow_wrapper() {
        let payload = object(json!({
            "status": 0,
            "data": [],
            "ecgFile": { "$type": "EcgFile", "shorts": [1, 2, 3] },
        }));
        let waveform = decode_payload("r", DeviceVariant::Primary, &payload).unwrap();
        assert_eq!(waveform.samples, Samples::Raw(vec![1, 2, 3]));
    }

    #[test]
    fn renamed_accessor_found_by_declared_type() {
        let payload = object(json!({
            "status": 0,
            "response": {
                "mEcgFileV3": {
                    "className": "com.vendor.ble.EcgFile",
                    "waveData": [0x10, 0x00, 0xF0, 0xFF],
                }
            }
        }));
        let waveform = decode_payload("rec1", DeviceVariant::Primary, &payload).unwrap();
        assert_eq!(waveform.samples, Samples::Raw(vec![16, -16]));
    }

    #[test]
    fn raw_bytes_for_either_family_decode_regardless_of_variant() {
        let primary = RecordPayload::Bytes(encode_ecg_file(&[5, -5, 300], 30));
        let er2 = RecordPayload::Bytes(encode_er2_ecg_file(&[0.1, 0.2], 250));
        for variant in [DeviceVariant::Primary, DeviceVariant::Alternate] {
            let waveform = decode_payload("p", variant, &primary).unwrap();
            assert_eq!(waveform.samples, Samples::Raw(vec![5, -5, 300]));
            assert_eq!(waveform.duration_seconds, Some(30.0));
            let waveform = decode_payload("a", variant, &er2).unwrap();
            assert_eq!(waveform.samples, Samples::Millivolts(vec![0.1, 0.2]));
            assert_eq!(waveform.sample_rate, 250.0);
        }
    }

    #[test]
    fn framed_bytes_are_unwrapped() {
        let file = encode_ecg_file(&[7, 8], 0);

        let mut prefixed = (file.len() as u32).to_le_bytes().to_vec();
        prefixed.extend_from_slice(&file);
        let waveform =
            decode_payload("p", DeviceVariant::Primary, &RecordPayload::Bytes(prefixed)).unwrap();
        assert_eq!(waveform.samples, Samples::Raw(vec![7, 8]));
        assert_eq!(waveform.duration_seconds, None);

        let mut framed = vec![ENVELOPE_MARKER, 0x0C];
        framed.extend_from_slice(&(file.len() as u16).to_le_bytes());
        framed.extend_from_slice(&file);
        framed.push(0xEE); // crc
        let waveform =
            decode_payload("e", DeviceVariant::Primary, &RecordPayload::Bytes(framed)).unwrap();
        assert_eq!(waveform.samples, Samples::Raw(vec![7, 8]));
    }

    #[test]
    fn bytes_nested_in_an_object_are_used() {
        let file = encode_ecg_file(&[1, 2], 2);
        let payload = object(json!({ "status": 0, "fileBytes": file }));
        let waveform = decode_payload("p", DeviceVariant::Alternate, &payload).unwrap();
        assert_eq!(waveform.samples, Samples::Raw(vec![1, 2]));
    }

    #[test]
    fn empty_container_is_not_a_waveform_file() {
        let header_only = RecordPayload::Bytes(encode_ecg_file(&[], 0));
        assert_eq!(
            decode_payload("bp", DeviceVariant::Primary, &header_only),
            Err(DecodeError::NotAWaveformFile("bp".into()))
        );
        let empty_wrapper = object(json!({ "ecgFile": { "$type": "EcgFile", "waveData": [] } }));
        assert_eq!(
            decode_payload("bp", DeviceVariant::Primary, &empty_wrapper),
            Err(DecodeError::NotAWaveformFile("bp".into()))
        );
    }

    #[test]
    fn unrecognizable_payloads_exhaust_the_chain() {
        let payload = object(json!({ "status": 0, "sys": 120, "dia": 80 }));
        assert_eq!(
            decode_payload("x", DeviceVariant::Primary, &payload),
            Err(DecodeError::DecodeExhausted("x".into()))
        );
        let garbage = RecordPayload::Bytes(vec![0xFF; 7]);
        assert_eq!(
            decode_payload("y", DeviceVariant::Alternate, &garbage),
            Err(DecodeError::DecodeExhausted("y".into()))
        );
        assert_eq!(
            decode_payload("z", DeviceVariant::Primary, &object(json!([1, 2, 3]))),
            Err(DecodeError::DecodeExhausted("z".into()))
        );
    }

    #[test]
    fn byte_decoding_is_deterministic() {
        let file = encode_ecg_file(&[i16::MIN, -1, 0, 1, i16::MAX], 1);
        let payload = RecordPayload::Bytes(file);
        let first = decode_payload("d", DeviceVariant::Primary, &payload).unwrap();
        let second = decode_payload("d", DeviceVariant::Primary, &payload).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.samples,
            Samples::Raw(vec![i16::MIN, -1, 0, 1, i16::MAX])
        );
    }

    #[test]
    fn out_of_range_shorts_fall_through_to_raw_buffer() {
        let payload = object(json!({
            "shorts": [70000],
            "waveData": [0x01, 0x00],
        }));
        let waveform = decode_payload("r", DeviceVariant::Primary, &payload).unwrap();
        assert_eq!(waveform.samples, Samples::Raw(vec![1]));
    }

    #[test]
    fn combinator_keeps_first_success() {
        let strategies: &[Strategy<u8, u8>] = &[
            Strategy {
                name: "never",
                run: |_| None,
            },
            Strategy {
                name: "double",
                run: |n| n.checked_mul(2),
            },
            Strategy {
                name: "unreached",
                run: |_| Some(0),
            },
        ];
        assert_eq!(first_success(strategies, &4), Some(("double", 8)));
        assert_eq!(first_success(strategies, &200), Some(("unreached", 0)));
    }
}
