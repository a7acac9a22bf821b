/// Wire formats published to the broker.
///
/// Anchor observations are one CSV record per sighting:
/// `anchor_id,x,y,distance,rssi,tag_id` with `x`, `y` and `distance` to two
/// decimals. Tag scan events are a single JSON object
/// `{"uid":"<HEX>","tag_id":"<id>"}`.
///
/// Uses `heapless` types for no_std/no-alloc operation. The parsing half
/// mirrors what the positioning server accepts, so both ends share one
/// definition of the record.
use core::fmt::Write;

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::defaults::{ANCHOR_TOPIC_PREFIX, ANCHOR_TOPIC_SUFFIX, RACK_SCAN_TOPIC};

/// Node identity (anchor or tag)
pub type IdString = String<32>;

/// Advertised BLE local name; also the tag identity seen by anchors
pub type NameString = String<33>;

/// Card UID as hex. ISO 14443 UIDs are at most 10 bytes.
pub type UidString = String<20>;

/// MQTT topic
pub type TopicString = String<64>;

/// Maximum size of a serialized payload
pub const MAX_MSG_LEN: usize = 128;

/// Buffer type for serialized payloads
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Number of comma-separated fields in an anchor record
pub const RECORD_FIELDS: usize = 6;

/// A string did not fit its fixed-capacity buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatError;

/// Why an anchor record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// Record did not have exactly six fields
    FieldCount(usize),
    /// A numeric field failed to parse
    InvalidNumber(&'static str),
    /// A text field exceeds its buffer
    TooLong(&'static str),
}

/// One distance estimate from one anchor to one tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub anchor_id: IdString,
    pub x: f32,
    pub y: f32,
    /// Estimated distance in meters
    pub distance: f32,
    /// Raw RSSI (dBm)
    pub rssi: i8,
    pub tag_id: NameString,
}

impl Observation {
    /// Write the CSV record into `out`, replacing its contents.
    pub fn write_record(&self, out: &mut MsgBuffer) -> Result<(), FormatError> {
        out.clear();
        let mut w = ByteWriter(out);
        write!(
            w,
            "{},{:.2},{:.2},{:.2},{},{}",
            self.anchor_id, self.x, self.y, self.distance, self.rssi, self.tag_id
        )
        .map_err(|_| FormatError)
    }
}

/// Scan event published by a tag when a new card UID is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub uid: UidString,
    pub tag_id: IdString,
}

impl ScanEvent {
    /// Serialize to JSON into `out`, replacing its contents.
    pub fn write_json(&self, out: &mut MsgBuffer) -> Result<(), FormatError> {
        out.clear();
        out.resize_default(MAX_MSG_LEN).map_err(|_| FormatError)?;
        match serde_json_core::to_slice(self, out) {
            Ok(len) => {
                out.truncate(len);
                Ok(())
            }
            Err(_) => {
                out.clear();
                Err(FormatError)
            }
        }
    }
}

/// Build the per-anchor data topic `warehouse/anchors/<anchor_id>/data`.
pub fn anchor_topic(anchor_id: &str, out: &mut TopicString) -> Result<(), FormatError> {
    out.clear();
    out.push_str(ANCHOR_TOPIC_PREFIX).map_err(|_| FormatError)?;
    out.push_str(anchor_id).map_err(|_| FormatError)?;
    out.push_str(ANCHOR_TOPIC_SUFFIX).map_err(|_| FormatError)
}

/// Parse an anchor CSV record. Anything that is not exactly six fields
/// is rejected, as the positioning server does.
pub fn parse_observation(record: &str) -> Result<Observation, RecordError> {
    let record = record.trim_end_matches(['\r', '\n']);
    let count = record.split(',').count();
    if count != RECORD_FIELDS {
        return Err(RecordError::FieldCount(count));
    }

    let mut fields = record.split(',');
    // count checked above
    let mut next = || fields.next().unwrap_or("");

    let anchor_id = IdString::try_from(next()).map_err(|_| RecordError::TooLong("anchor_id"))?;
    let x = next().parse::<f32>().map_err(|_| RecordError::InvalidNumber("x"))?;
    let y = next().parse::<f32>().map_err(|_| RecordError::InvalidNumber("y"))?;
    let distance = next()
        .parse::<f32>()
        .map_err(|_| RecordError::InvalidNumber("distance"))?;
    let rssi = next()
        .parse::<i8>()
        .map_err(|_| RecordError::InvalidNumber("rssi"))?;
    let tag_id = NameString::try_from(next()).map_err(|_| RecordError::TooLong("tag_id"))?;

    Ok(Observation {
        anchor_id,
        x,
        y,
        distance,
        rssi,
        tag_id,
    })
}

/// Deserialize a scan event from a JSON payload.
pub fn parse_scan_event(data: &[u8]) -> Option<ScanEvent> {
    serde_json_core::from_slice::<ScanEvent>(data)
        .ok()
        .map(|(ev, _)| ev)
}

/// Which stream a received topic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind<'a> {
    /// `warehouse/anchors/<id>/data`
    AnchorData(&'a str),
    /// `warehouse/scanner/rack_scan`
    RackScan,
    Unknown,
}

/// Route a topic the same way the server's message handler does.
pub fn classify_topic(topic: &str) -> TopicKind<'_> {
    if topic == RACK_SCAN_TOPIC {
        return TopicKind::RackScan;
    }
    match topic
        .strip_prefix(ANCHOR_TOPIC_PREFIX)
        .and_then(|rest| rest.strip_suffix(ANCHOR_TOPIC_SUFFIX))
    {
        Some(id) if !id.is_empty() && !id.contains('/') => TopicKind::AnchorData(id),
        _ => TopicKind::Unknown,
    }
}

/// `fmt::Write` adapter over a fixed byte buffer.
struct ByteWriter<'a>(&'a mut MsgBuffer);

impl Write for ByteWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0
            .extend_from_slice(s.as_bytes())
            .map_err(|_| core::fmt::Error)
    }
}
