use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::decode::busjson::DecodedMessage;
use crate::model::{HostRequestRecord, MessageKind, MessageRecord, Outcome};

/// Method calls on this interface/member pair bridge host requests over
/// the bus; their payloads carry the sub-protocol bytes.
pub const BRIDGE_INTERFACE: &str = "xyz.openbmc_project.Ipmi.Server";
pub const BRIDGE_MEMBER: &str = "execute";
pub const BRIDGE_DESTINATION: &str = "xyz.openbmc_project.Ipmi.Host";
pub const BRIDGE_PATH: &str = "/xyz/openbmc_project/Ipmi";

#[derive(Debug, Default)]
pub struct CorrelationOutput {
    /// Retained timeline records: method calls and signals, with reply
    /// timestamps and outcomes filled in. Replies are consumed.
    pub messages: Vec<MessageRecord>,
    /// Host request/response pairs extracted from bridging calls.
    pub host_requests: Vec<HostRequestRecord>,
    /// Replies that matched no in-flight request; dropped.
    pub orphan_replies: usize,
    /// Requests displaced by a later request reusing their serial.
    pub serial_collisions: usize,
    /// Requests still open at end of stream; kept as pending.
    pub pending: usize,
}

/// Pair requests with replies over an ordered message stream.
///
/// A method call opens an in-flight entry keyed by its serial; the
/// matching reply closes it with an `Ok`/`Error` outcome and its own
/// timestamp. Serials can wrap, so a colliding request silently replaces
/// the open entry (last-write-wins — the displaced request stays pending).
/// Replies without a request cannot be drawn and are dropped. Signals are
/// point events. Whatever is still open at end of stream remains pending
/// rather than being discarded.
pub fn correlate(stream: &[DecodedMessage]) -> CorrelationOutput {
    let mut out = CorrelationOutput::default();
    let mut in_flight: HashMap<u32, usize> = HashMap::new();
    let mut host_in_flight: HashMap<u32, HostRequestRecord> = HashMap::new();

    for msg in stream {
        match msg.kind {
            MessageKind::Signal => {
                out.messages.push(MessageRecord {
                    kind: msg.kind,
                    serial: msg.serial,
                    timestamp: msg.timestamp,
                    sender: msg.sender.clone(),
                    destination: msg.destination.clone(),
                    path: msg.path.clone(),
                    interface: msg.interface.clone(),
                    member: msg.member.clone(),
                    payload: msg.payload.clone(),
                    end_timestamp: Some(msg.timestamp),
                    outcome: Outcome::Ok,
                });
            }
            MessageKind::MethodCall => {
                let idx = out.messages.len();
                out.messages.push(MessageRecord {
                    kind: msg.kind,
                    serial: msg.serial,
                    timestamp: msg.timestamp,
                    sender: msg.sender.clone(),
                    destination: msg.destination.clone(),
                    path: msg.path.clone(),
                    interface: msg.interface.clone(),
                    member: msg.member.clone(),
                    payload: msg.payload.clone(),
                    end_timestamp: None,
                    outcome: Outcome::Pending,
                });
                if in_flight.insert(msg.serial, idx).is_some() {
                    out.serial_collisions += 1;
                }

                if msg.interface == BRIDGE_INTERFACE && msg.member == BRIDGE_MEMBER {
                    if let Some(req) = host_request_from_call(msg) {
                        if host_in_flight.insert(msg.serial, req).is_some() {
                            out.serial_collisions += 1;
                        }
                    }
                }
            }
            MessageKind::MethodReturn => {
                match in_flight.remove(&msg.serial) {
                    Some(idx) => {
                        out.messages[idx].end_timestamp = Some(msg.timestamp);
                        out.messages[idx].outcome = Outcome::Ok;
                    }
                    None => out.orphan_replies += 1,
                }
                if let Some(mut req) = host_in_flight.remove(&msg.serial) {
                    req.end_us = to_us(msg.timestamp);
                    req.response = host_response_bytes(&msg.payload);
                    out.host_requests.push(req);
                }
            }
            MessageKind::Error => match in_flight.remove(&msg.serial) {
                Some(idx) => {
                    out.messages[idx].end_timestamp = Some(msg.timestamp);
                    out.messages[idx].outcome = Outcome::Error;
                }
                None => out.orphan_replies += 1,
            },
        }
    }

    out.pending = in_flight.len();
    if out.pending > 0 || out.orphan_replies > 0 || out.serial_collisions > 0 {
        debug!(
            pending = out.pending,
            orphans = out.orphan_replies,
            collisions = out.serial_collisions,
            "correlation finished with leftovers"
        );
    }
    out
}

fn to_us(sec: f64) -> u64 {
    (sec * 1_000_000.0).round().max(0.0) as u64
}

/// Extract the sub-protocol request from a bridging call payload:
/// `[netfn, lun, cmd, [request bytes], …]`.
fn host_request_from_call(msg: &DecodedMessage) -> Option<HostRequestRecord> {
    let payload = msg.payload.as_array()?;
    Some(HostRequestRecord {
        netfn: payload.first()?.as_u64()? as u8,
        cmd: payload.get(2)?.as_u64()? as u8,
        start_us: to_us(msg.timestamp),
        end_us: 0,
        request: byte_array(payload.get(3)?),
        response: Vec::new(),
        group_key: None,
        offset: None,
    })
}

/// Response bytes sit at `payload[0][4]` of the bridging reply.
fn host_response_bytes(payload: &Value) -> Vec<u8> {
    payload
        .get(0)
        .and_then(|tuple| tuple.get(4))
        .map(byte_array)
        .unwrap_or_default()
}

fn byte_array(v: &Value) -> Vec<u8> {
    v.as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_u64)
                .map(|b| b as u8)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use busvis_protocol::SharedStr;
    use serde_json::json;

    fn call(serial: u32, ts: f64) -> DecodedMessage {
        DecodedMessage {
            kind: MessageKind::MethodCall,
            serial,
            timestamp: ts,
            sender: SharedStr::from(":1.10"),
            destination: SharedStr::from("org.dest"),
            path: SharedStr::from("/obj"),
            interface: SharedStr::from("org.iface"),
            member: SharedStr::from("Do"),
            payload: json!([]),
        }
    }

    fn reply(kind: MessageKind, serial: u32, ts: f64) -> DecodedMessage {
        DecodedMessage {
            kind,
            serial,
            timestamp: ts,
            sender: SharedStr::from(""),
            destination: SharedStr::from(""),
            path: SharedStr::from(""),
            interface: SharedStr::from(""),
            member: SharedStr::from(""),
            payload: json!([]),
        }
    }

    #[test]
    fn request_reply_pair_closes_ok() {
        let out = correlate(&[call(5, 1.0), reply(MessageKind::MethodReturn, 5, 1.25)]);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].end_timestamp, Some(1.25));
        assert_eq!(out.messages[0].outcome, Outcome::Ok);
        assert_eq!(out.pending, 0);
    }

    #[test]
    fn error_reply_closes_with_error() {
        let out = correlate(&[call(5, 1.0), reply(MessageKind::Error, 5, 1.1)]);
        assert_eq!(out.messages[0].outcome, Outcome::Error);
        assert_eq!(out.messages[0].end_timestamp, Some(1.1));
    }

    #[test]
    fn request_without_reply_stays_pending() {
        let out = correlate(&[call(5, 1.0)]);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].end_timestamp, None);
        assert_eq!(out.messages[0].outcome, Outcome::Pending);
        assert_eq!(out.pending, 1);
    }

    #[test]
    fn orphan_reply_is_dropped() {
        let out = correlate(&[reply(MessageKind::MethodReturn, 7, 1.0)]);
        assert!(out.messages.is_empty());
        assert_eq!(out.orphan_replies, 1);
    }

    #[test]
    fn serial_collision_last_write_wins() {
        let out = correlate(&[
            call(5, 1.0),
            call(5, 2.0),
            reply(MessageKind::MethodReturn, 5, 3.0),
        ]);
        assert_eq!(out.serial_collisions, 1);
        // The later request owns the reply; the displaced one stays pending.
        assert_eq!(out.messages[0].outcome, Outcome::Pending);
        assert_eq!(out.messages[1].end_timestamp, Some(3.0));
        assert_eq!(out.messages[1].outcome, Outcome::Ok);
    }

    #[test]
    fn signal_is_a_point_event() {
        let sig = DecodedMessage {
            kind: MessageKind::Signal,
            serial: 9,
            timestamp: 4.5,
            sender: SharedStr::from(":1.2"),
            destination: SharedStr::from("<none>"),
            path: SharedStr::from("/obj"),
            interface: SharedStr::from("org.iface"),
            member: SharedStr::from("Changed"),
            payload: json!([]),
        };
        let out = correlate(&[sig]);
        assert_eq!(out.messages[0].end_timestamp, Some(4.5));
        assert_eq!(out.messages[0].outcome, Outcome::Ok);
    }

    #[test]
    fn bridging_call_extracts_host_request() {
        let mut c = call(12, 2.0);
        c.interface = SharedStr::from(BRIDGE_INTERFACE);
        c.member = SharedStr::from(BRIDGE_MEMBER);
        c.destination = SharedStr::from(BRIDGE_DESTINATION);
        c.payload = json!([6, 0, 1, [0x02, 0x04]]);

        let mut r = reply(MessageKind::MethodReturn, 12, 2.5);
        r.payload = json!([[6, 0, 1, 0, [0xAA, 0xBB]]]);

        let out = correlate(&[c, r]);
        assert_eq!(out.host_requests.len(), 1);
        let req = &out.host_requests[0];
        assert_eq!((req.netfn, req.cmd), (6, 1));
        assert_eq!(req.request, vec![0x02, 0x04]);
        assert_eq!(req.response, vec![0xAA, 0xBB]);
        assert_eq!(req.start_us, 2_000_000);
        assert_eq!(req.end_us, 2_500_000);
    }

    #[test]
    fn bridging_call_without_reply_is_not_emitted() {
        let mut c = call(12, 2.0);
        c.interface = SharedStr::from(BRIDGE_INTERFACE);
        c.member = SharedStr::from(BRIDGE_MEMBER);
        c.payload = json!([6, 0, 1, []]);
        let out = correlate(&[c]);
        assert!(out.host_requests.is_empty());
        assert_eq!(out.pending, 1);
    }
}
