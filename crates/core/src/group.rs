use std::collections::HashMap;

use busvis_protocol::SharedStr;

use crate::correlate::{BRIDGE_DESTINATION, BRIDGE_INTERFACE, BRIDGE_MEMBER, BRIDGE_PATH};
use crate::model::{AsyncHandlerRecord, HostRequestRecord, MessageRecord};

/// Composite keys join selected field values with this delimiter. The
/// numeric (netfn, cmd) sort splits on it, so it is fixed.
pub const KEY_DELIMITER: &str = ", ";

/// Senders with at most this many messages in the dataset collapse into
/// one low-traffic bucket.
pub const LOW_TRAFFIC_THRESHOLD: u32 = 10;

pub const CLASS_SENSOR_SIGNALS: &str = "Sensor PropertiesChanged Signals";
pub const CLASS_IPMI_DAEMON: &str = "IPMI Daemon";
pub const CLASS_LOW_TRAFFIC: &str = "Total 10 messages or less";
pub const CLASS_SENSOR_GET_SET: &str = "Sensor Get/Set";
pub const CLASS_UNCATEGORIZED: &str = "Uncategorized";

const SENSORS_PATH: &str = "/xyz/openbmc_project/sensors/";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Field selectors for the message pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageField {
    Kind,
    Serial,
    Sender,
    Destination,
    Path,
    Interface,
    Member,
}

impl MessageField {
    pub const ALL: [MessageField; 7] = [
        Self::Kind,
        Self::Serial,
        Self::Sender,
        Self::Destination,
        Self::Path,
        Self::Interface,
        Self::Member,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Kind => "Type",
            Self::Serial => "Serial",
            Self::Sender => "Sender",
            Self::Destination => "Destination",
            Self::Path => "Path",
            Self::Interface => "Interface",
            Self::Member => "Member",
        }
    }

    fn select(self, rec: &MessageRecord) -> String {
        match self {
            Self::Kind => rec.kind.label().to_string(),
            Self::Serial => rec.serial.to_string(),
            Self::Sender => rec.sender.to_string(),
            Self::Destination => rec.destination.to_string(),
            Self::Path => rec.path.to_string(),
            Self::Interface => rec.interface.to_string(),
            Self::Member => rec.member.to_string(),
        }
    }
}

/// Field selectors for the async-handler pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerField {
    Level,
    Description,
    ShortDescription,
}

impl HandlerField {
    pub const ALL: [HandlerField; 3] = [Self::Level, Self::Description, Self::ShortDescription];

    pub fn label(self) -> &'static str {
        match self {
            Self::Level => "Layout Level",
            Self::Description => "Description",
            Self::ShortDescription => "Description (simplified)",
        }
    }

    fn select(self, rec: &AsyncHandlerRecord) -> String {
        match self {
            Self::Level => rec.level.to_string(),
            Self::Description => rec.description.to_string(),
            Self::ShortDescription => rec.short_description.to_string(),
        }
    }
}

/// Field selectors for the host-request pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostField {
    NetFn,
    Cmd,
}

impl HostField {
    pub const ALL: [HostField; 2] = [Self::NetFn, Self::Cmd];

    pub fn label(self) -> &'static str {
        match self {
            Self::NetFn => "NetFN",
            Self::Cmd => "CMD",
        }
    }

    fn select(self, rec: &HostRequestRecord) -> String {
        match self {
            Self::NetFn => rec.netfn.to_string(),
            Self::Cmd => rec.cmd.to_string(),
        }
    }
}

/// Per-pane grouping selection, displayed as the column title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    Messages(Vec<MessageField>),
    Handlers(Vec<HandlerField>),
    Host(Vec<HostField>),
}

impl GroupBy {
    /// Human-readable selection summary for the column header.
    pub fn title(&self) -> String {
        let labels: Vec<&str> = match self {
            Self::Messages(f) => f.iter().map(|f| f.label()).collect(),
            Self::Handlers(f) => f.iter().map(|f| f.label()).collect(),
            Self::Host(f) => f.iter().map(|f| f.label()).collect(),
        };
        labels.join(KEY_DELIMITER)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Messages(f) => f.is_empty(),
            Self::Handlers(f) => f.is_empty(),
            Self::Host(f) => f.is_empty(),
        }
    }
}

/// Ordered grouping: buckets appear in first-seen order and records keep
/// their input order within a bucket. Running it twice over the same
/// input yields the identical structure.
pub fn group_indices<F>(count: usize, mut key_of: F) -> Vec<(SharedStr, Vec<usize>)>
where
    F: FnMut(usize) -> String,
{
    let mut order: Vec<(SharedStr, Vec<usize>)> = Vec::new();
    let mut index: HashMap<SharedStr, usize> = HashMap::new();
    for i in 0..count {
        let key = SharedStr::from(key_of(i));
        match index.get(&key) {
            Some(&slot) => order[slot].1.push(i),
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, vec![i]));
            }
        }
    }
    order
}

pub fn message_key(rec: &MessageRecord, fields: &[MessageField]) -> String {
    fields
        .iter()
        .map(|f| f.select(rec))
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER)
}

pub fn handler_key(rec: &AsyncHandlerRecord, fields: &[HandlerField]) -> String {
    fields
        .iter()
        .map(|f| f.select(rec))
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER)
}

/// Host requests keyed by a resolved blob name when present, else by the
/// selected code fields.
pub fn host_key(rec: &HostRequestRecord, fields: &[HostField]) -> String {
    if let Some(blob) = &rec.group_key {
        return blob.to_string();
    }
    fields
        .iter()
        .map(|f| f.select(rec))
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER)
}

/// How often each sender appears across the full dataset. Computed once
/// per regroup, before classification runs.
pub fn sender_census(records: &[MessageRecord]) -> HashMap<SharedStr, u32> {
    let mut census: HashMap<SharedStr, u32> = HashMap::new();
    for rec in records {
        *census.entry(rec.sender.clone()).or_insert(0) += 1;
    }
    census
}

/// Content classification for the message pane: a fixed ordered rule
/// list, first match wins. Independent of the grouping key selection.
pub fn classify_message(rec: &MessageRecord, census: &HashMap<SharedStr, u32>) -> &'static str {
    use crate::model::MessageKind;

    if rec.kind == MessageKind::Signal
        && rec.path.contains(SENSORS_PATH)
        && rec.interface == PROPERTIES_INTERFACE
        && rec.member == "PropertiesChanged"
    {
        return CLASS_SENSOR_SIGNALS;
    }

    if rec.kind == MessageKind::MethodCall
        && rec.destination == BRIDGE_DESTINATION
        && rec.path == BRIDGE_PATH
        && rec.interface == BRIDGE_INTERFACE
        && rec.member == BRIDGE_MEMBER
    {
        return CLASS_IPMI_DAEMON;
    }

    if census.get(&rec.sender).copied().unwrap_or(0) <= LOW_TRAFFIC_THRESHOLD {
        return CLASS_LOW_TRAFFIC;
    }

    if rec.kind == MessageKind::MethodCall
        && rec.path.starts_with(SENSORS_PATH)
        && rec.interface == PROPERTIES_INTERFACE
        && (rec.member.starts_with("Get") || rec.member.starts_with("Set"))
    {
        return CLASS_SENSOR_GET_SET;
    }

    CLASS_UNCATEGORIZED
}

/// Sort host-request group keys. When grouping by exactly the two code
/// fields every key is a "netfn, cmd" pair; those sort by the combined
/// integer `netfn * 256 + cmd`, ascending. Blob names and other keys sort
/// lexicographically after the numeric pairs.
pub fn sort_host_keys(keys: &mut [SharedStr], fields: &[HostField]) {
    if fields.len() != 2 {
        keys.sort();
        return;
    }
    keys.sort_by(|a, b| match (combined_code(a), combined_code(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
}

fn combined_code(key: &str) -> Option<u32> {
    let (netfn, cmd) = key.split_once(KEY_DELIMITER)?;
    Some(netfn.trim().parse::<u32>().ok()? * 256 + cmd.trim().parse::<u32>().ok()?)
}

// Blob sub-protocol constants: OEM extension requests whose body starts
// with this enterprise number carry blob subcommands.
const OEM_NETFN: u8 = 46;
const OEM_CMD: u8 = 128;
const BLOB_OEN: u32 = 0xc2cf;

const BLOB_OPEN: u8 = 2;
const BLOB_WRITE: u8 = 4;

/// Resolve blob-session traffic to blob names.
///
/// An `open` binds the session id returned in the response to the blob id
/// named in the request; session-addressed subcommands then resolve their
/// session id back to that name and adopt it as group key, so all traffic
/// touching one blob lands in one bucket. Writes also record their byte
/// offset for display.
pub fn annotate_blob_sessions(records: &mut [HostRequestRecord]) {
    let mut session_to_blob: HashMap<u16, SharedStr> = HashMap::new();

    for rec in records.iter_mut() {
        if rec.netfn != OEM_NETFN || rec.cmd != OEM_CMD {
            continue;
        }
        let req = &rec.request;
        if req.len() < 4 {
            continue;
        }
        let oen = u32::from(req[0]) | u32::from(req[1]) << 8 | u32::from(req[2]) << 16;
        if oen != BLOB_OEN {
            continue;
        }
        let subcommand = req[3];

        // Request layout: OEN (3) | subcommand | CRC (2) | body…
        // Response layout: OEN (3) | CRC (2) | body…
        match subcommand {
            BLOB_OPEN => {
                // Body: flags (2) | NUL-terminated blob id.
                let name: String = req
                    .iter()
                    .skip(8)
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                let blob = SharedStr::from(name);
                rec.group_key = Some(blob.clone());
                if rec.response.len() >= 7 {
                    let sid = u16::from(rec.response[5]) | u16::from(rec.response[6]) << 8;
                    session_to_blob.insert(sid, blob);
                }
            }
            // Session-addressed: read, write, commit, close, session stat,
            // write meta.
            3 | 4 | 5 | 6 | 9 | 10 => {
                if req.len() >= 8 {
                    let sid = u16::from(req[6]) | u16::from(req[7]) << 8;
                    if let Some(blob) = session_to_blob.get(&sid) {
                        rec.group_key = Some(blob.clone());
                    }
                }
                if subcommand == BLOB_WRITE && req.len() >= 12 {
                    let offset = u32::from_le_bytes([req[8], req[9], req[10], req[11]]);
                    rec.offset = Some(offset);
                }
            }
            // Name-addressed: delete, stat.
            7 | 8 => {
                let name: String = req
                    .iter()
                    .skip(6)
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                if !name.is_empty() {
                    rec.group_key = Some(SharedStr::from(name));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageKind, Outcome};
    use serde_json::json;

    fn msg(kind: MessageKind, sender: &str, path: &str, iface: &str, member: &str) -> MessageRecord {
        MessageRecord {
            kind,
            serial: 1,
            timestamp: 0.0,
            sender: SharedStr::from(sender),
            destination: SharedStr::from("org.dest"),
            path: SharedStr::from(path),
            interface: SharedStr::from(iface),
            member: SharedStr::from(member),
            payload: json!([]),
            end_timestamp: Some(0.0),
            outcome: Outcome::Ok,
        }
    }

    #[test]
    fn grouping_preserves_multiset_and_order() {
        let senders = [":1.1", ":1.2", ":1.1", ":1.3", ":1.2", ":1.1"];
        let records: Vec<MessageRecord> = senders
            .iter()
            .map(|s| msg(MessageKind::Signal, s, "/p", "org.i", "M"))
            .collect();

        let groups = group_indices(records.len(), |i| {
            message_key(&records[i], &[MessageField::Sender])
        });

        // Every input index appears exactly once.
        let mut flat: Vec<usize> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
        flat.sort_unstable();
        assert_eq!(flat, (0..records.len()).collect::<Vec<_>>());

        // First-seen bucket order, stable within buckets.
        assert_eq!(groups[0].0, ":1.1");
        assert_eq!(groups[0].1, vec![0, 2, 5]);
        assert_eq!(groups[1].1, vec![1, 4]);

        // Idempotent: the same input yields the identical structure.
        let again = group_indices(records.len(), |i| {
            message_key(&records[i], &[MessageField::Sender])
        });
        assert_eq!(groups, again);
    }

    #[test]
    fn empty_selection_yields_single_group() {
        let records: Vec<MessageRecord> = (0..3)
            .map(|_| msg(MessageKind::Signal, ":1.1", "/p", "org.i", "M"))
            .collect();
        let groups = group_indices(records.len(), |i| message_key(&records[i], &[]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1.len(), 3);
    }

    #[test]
    fn composite_key_joins_in_order() {
        let rec = msg(MessageKind::MethodCall, ":1.5", "/p", "org.i", "DoIt");
        let key = message_key(&rec, &[MessageField::Interface, MessageField::Member]);
        assert_eq!(key, "org.i, DoIt");
    }

    #[test]
    fn classification_rules_in_order() {
        let mut census = HashMap::new();
        census.insert(SharedStr::from(":busy"), 100u32);
        census.insert(SharedStr::from(":quiet"), 2u32);

        let sensor_sig = msg(
            MessageKind::Signal,
            ":busy",
            "/xyz/openbmc_project/sensors/temperature/cpu0",
            PROPERTIES_INTERFACE,
            "PropertiesChanged",
        );
        assert_eq!(classify_message(&sensor_sig, &census), CLASS_SENSOR_SIGNALS);

        let mut ipmi = msg(
            MessageKind::MethodCall,
            ":busy",
            BRIDGE_PATH,
            BRIDGE_INTERFACE,
            BRIDGE_MEMBER,
        );
        ipmi.destination = SharedStr::from(BRIDGE_DESTINATION);
        assert_eq!(classify_message(&ipmi, &census), CLASS_IPMI_DAEMON);

        // Low-traffic wins over the later sensor Get/Set rule.
        let quiet_get = msg(
            MessageKind::MethodCall,
            ":quiet",
            "/xyz/openbmc_project/sensors/power/p0",
            PROPERTIES_INTERFACE,
            "GetAll",
        );
        assert_eq!(classify_message(&quiet_get, &census), CLASS_LOW_TRAFFIC);

        let busy_get = msg(
            MessageKind::MethodCall,
            ":busy",
            "/xyz/openbmc_project/sensors/power/p0",
            PROPERTIES_INTERFACE,
            "GetAll",
        );
        assert_eq!(classify_message(&busy_get, &census), CLASS_SENSOR_GET_SET);

        let other = msg(MessageKind::MethodCall, ":busy", "/other", "org.x", "Y");
        assert_eq!(classify_message(&other, &census), CLASS_UNCATEGORIZED);
    }

    #[test]
    fn host_keys_sort_numerically_for_code_pairs() {
        let mut keys = vec![
            SharedStr::from("10, 67"),
            SharedStr::from("4, 45"),
            SharedStr::from("fw_image"),
            SharedStr::from("6, 1"),
        ];
        sort_host_keys(&mut keys, &[HostField::NetFn, HostField::Cmd]);
        assert_eq!(keys[0], "4, 45");
        assert_eq!(keys[1], "6, 1");
        assert_eq!(keys[2], "10, 67");
        assert_eq!(keys[3], "fw_image");
    }

    fn blob_request(subcommand: u8, body: &[u8]) -> Vec<u8> {
        // OEN 0xc2cf little-endian, subcommand, CRC placeholder.
        let mut req = vec![0xcf, 0xc2, 0x00, subcommand, 0, 0];
        req.extend_from_slice(body);
        req
    }

    fn host(netfn: u8, cmd: u8, request: Vec<u8>, response: Vec<u8>) -> HostRequestRecord {
        HostRequestRecord {
            netfn,
            cmd,
            start_us: 0,
            end_us: 1,
            request,
            response,
            group_key: None,
            offset: None,
        }
    }

    #[test]
    fn blob_open_binds_session_and_write_resolves_it() {
        let mut open_body = vec![0, 0]; // flags
        open_body.extend_from_slice(b"/blob/fw\0");
        let open = host(
            46,
            128,
            blob_request(BLOB_OPEN, &open_body),
            // OEN echo, CRC, session id 0x0102 little-endian.
            vec![0xcf, 0xc2, 0x00, 0, 0, 0x02, 0x01],
        );

        // Session 0x0102, offset 0x00000400 little-endian, then data.
        let write = host(
            46,
            128,
            blob_request(BLOB_WRITE, &[0x02, 0x01, 0x00, 0x04, 0x00, 0x00, 0xde]),
            vec![],
        );

        let unrelated = host(6, 1, vec![], vec![]);

        let mut records = vec![open, write, unrelated];
        annotate_blob_sessions(&mut records);

        assert_eq!(records[0].group_key.as_deref(), Some("/blob/fw"));
        assert_eq!(records[1].group_key.as_deref(), Some("/blob/fw"));
        assert_eq!(records[1].offset, Some(0x400));
        assert_eq!(records[2].group_key, None);
    }

    #[test]
    fn blob_session_without_open_stays_unresolved() {
        let mut records = vec![host(
            46,
            128,
            blob_request(3, &[0x09, 0x09, 0, 0]),
            vec![],
        )];
        annotate_blob_sessions(&mut records);
        assert_eq!(records[0].group_key, None);
    }
}
