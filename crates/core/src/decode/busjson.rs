use busvis_protocol::SharedStr;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::model::MessageKind;

#[derive(Debug, Error)]
pub enum TraceDecodeError {
    #[error("no records decoded")]
    Empty,
}

/// Fixed-header layout of method-call records.
///
/// Two decoder generations are in circulation: the newer one emits a
/// six-entry header carrying a signature field, the older one five
/// entries without it. The distinguishing header length is a heuristic,
/// not a documented protocol fact, so the choice is injected rather than
/// hard-coded; `Detect` decides per record and ambiguous headers are
/// counted in the summary instead of being guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// Six-entry call header (path, member, interface, destination,
    /// signature, sender).
    Modern,
    /// Five-entry call header (path, member, interface, destination,
    /// sender).
    Legacy,
    /// Decide from the header length of each record.
    Detect,
}

/// One message decoded from the external decoder's paired outputs, before
/// correlation. Replies carry only the reply serial and timestamp; the
/// identity fields stay empty.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub kind: MessageKind,
    /// Message serial for calls and signals; reply serial for replies.
    pub serial: u32,
    /// Capture timestamp in seconds.
    pub timestamp: f64,
    pub sender: SharedStr,
    pub destination: SharedStr,
    pub path: SharedStr,
    pub interface: SharedStr,
    pub member: SharedStr,
    pub payload: Value,
}

#[derive(Debug, Default, Clone)]
pub struct TraceDecodeSummary {
    pub records: usize,
    pub skipped_timestamp_lines: usize,
    pub skipped_record_lines: usize,
    /// Record lines that only parsed after the NaN→null repair.
    pub repaired_lines: usize,
    /// Structural records with no timing line at the same index.
    pub missing_timestamps: usize,
    /// Records whose call-header length matched neither known layout, or
    /// contradicted a pinned schema variant.
    pub schema_flagged: usize,
}

/// Decode the external decoder's paired outputs.
///
/// The decoder is run twice over one capture: once for plain text with a
/// `<seconds>:…` line per record (the only place timestamps appear), once
/// for one JSON array per line describing the same records structurally.
/// The two streams are zipped by line order. Count mismatches are
/// tolerated by bounds checks; unparseable lines are skipped after one
/// NaN→null repair attempt.
pub fn parse_decoder_output(
    timing: &str,
    records: &str,
    schema: SchemaVariant,
) -> Result<(Vec<DecodedMessage>, TraceDecodeSummary), TraceDecodeError> {
    let mut summary = TraceDecodeSummary::default();

    let mut timestamps: Vec<f64> = Vec::new();
    for line in timing.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let prefix = line.split(':').next().unwrap_or("");
        match prefix.trim().parse::<f64>() {
            Ok(sec) if sec.is_finite() => timestamps.push(sec),
            _ => {
                summary.skipped_timestamp_lines += 1;
                debug!(line, "skipping timing line without a timestamp");
            }
        }
    }

    let mut out: Vec<DecodedMessage> = Vec::new();
    let mut index = 0usize;
    for line in records.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value = match serde_json::from_str::<Value>(line) {
            Ok(v) => Some(v),
            Err(_) => {
                // The decoder emits bare NaN for unrepresentable floats,
                // which is not valid JSON.
                let repaired = line.replace("NaN", "null");
                match serde_json::from_str::<Value>(&repaired) {
                    Ok(v) => {
                        summary.repaired_lines += 1;
                        Some(v)
                    }
                    Err(err) => {
                        summary.skipped_record_lines += 1;
                        debug!(%err, "skipping unparseable record line");
                        None
                    }
                }
            }
        };

        let record_index = index;
        index += 1;

        let Some(value) = value else { continue };
        let Some(&timestamp) = timestamps.get(record_index) else {
            summary.missing_timestamps += 1;
            continue;
        };

        match decode_packet(&value, timestamp, schema, &mut summary) {
            Some(msg) => out.push(msg),
            None => summary.skipped_record_lines += 1,
        }
    }

    if out.is_empty() {
        return Err(TraceDecodeError::Empty);
    }
    summary.records = out.len();
    debug!(
        records = summary.records,
        skipped = summary.skipped_record_lines,
        flagged = summary.schema_flagged,
        "decoded structured trace"
    );
    Ok((out, summary))
}

/// Decode one structural record: `[[header0, header1], payload]` where
/// `header1` is a list of `[field-code, value]` pairs in a fixed order
/// per message kind.
fn decode_packet(
    value: &Value,
    timestamp: f64,
    schema: SchemaVariant,
    summary: &mut TraceDecodeSummary,
) -> Option<DecodedMessage> {
    let packet = value.as_array()?;
    let fixed_header = packet.first()?.as_array()?;
    let payload = packet.get(1).cloned().unwrap_or(Value::Null);

    let header0 = fixed_header.first()?.as_array()?;
    let header1 = fixed_header.get(1)?.as_array()?;

    let kind = MessageKind::from_wire(header0.get(1)?.as_u64()?)?;

    match kind {
        MessageKind::MethodCall => {
            let serial = header0.get(5)?.as_u64()? as u32;
            let path = pair_str(header1, 0)?;
            let member = pair_str(header1, 1)?;
            let interface = pair_str(header1, 2)?;
            let destination = pair_str(header1, 3)?;

            let sender_slot = match schema {
                SchemaVariant::Modern => 5,
                SchemaVariant::Legacy => 4,
                SchemaVariant::Detect => {
                    if header1.len() > 5 {
                        5
                    } else {
                        4
                    }
                }
            };
            if header1.len() != 5 && header1.len() != 6 {
                summary.schema_flagged += 1;
                return None;
            }
            // A pinned variant that contradicts the observed length is
            // flagged, then decoded by what the length says.
            let effective = if header1.len() > 5 { 5 } else { 4 };
            if sender_slot != effective {
                summary.schema_flagged += 1;
            }
            let sender = pair_str(header1, effective)?;

            Some(DecodedMessage {
                kind,
                serial,
                timestamp,
                sender,
                destination,
                path,
                interface,
                member,
                payload,
            })
        }
        MessageKind::Signal => {
            let serial = header0.get(5)?.as_u64()? as u32;
            let mut path = pair_str(header1, 0)?;
            let mut interface = pair_str(header1, 1)?;
            let mut member = pair_str(header1, 2)?;
            let mut sender = pair_str(header1, header1.len().checked_sub(1)?)?;

            // Bus-daemon signals shift the field positions by one and the
            // final slot holds the body signature ("s", "sss") instead of
            // the sender; the true sender is the first payload element.
            if sender == "s" || sender == "sss" {
                if let Some(true_sender) = payload.get(0).and_then(Value::as_str) {
                    sender = SharedStr::from(true_sender);
                }
                if header1.len() == 6 {
                    path = pair_str(header1, 2)?;
                    interface = pair_str(header1, 3)?;
                    member = pair_str(header1, 4)?;
                } else if header1.len() == 5 {
                    path = pair_str(header1, 1)?;
                    interface = pair_str(header1, 2)?;
                    member = pair_str(header1, 3)?;
                }
            }

            Some(DecodedMessage {
                kind,
                serial,
                timestamp,
                sender,
                destination: SharedStr::from("<none>"),
                path,
                interface,
                member,
                payload,
            })
        }
        MessageKind::MethodReturn | MessageKind::Error => {
            let reply_serial = pair_u64(header1, 0)? as u32;
            Some(DecodedMessage {
                kind,
                serial: reply_serial,
                timestamp,
                sender: SharedStr::from(""),
                destination: SharedStr::from(""),
                path: SharedStr::from(""),
                interface: SharedStr::from(""),
                member: SharedStr::from(""),
                payload,
            })
        }
    }
}

/// String value of the `[code, value]` pair at `idx`.
fn pair_str(header1: &[Value], idx: usize) -> Option<SharedStr> {
    let v = header1.get(idx)?.as_array()?.get(1)?;
    Some(SharedStr::from(v.as_str()?))
}

/// Numeric value of the `[code, value]` pair at `idx`.
fn pair_u64(header1: &[Value], idx: usize) -> Option<u64> {
    header1.get(idx)?.as_array()?.get(1)?.as_u64()
}
