use busvis_protocol::SharedStr;
use serde::{Deserialize, Serialize};

/// One host-interface request/response pair extracted from the bridging
/// method calls on the bus.
///
/// Timestamps are microseconds in `u64`: capture timestamps do not fit in
/// 32 bits and must not lose precision through `f32`-sized arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRequestRecord {
    pub netfn: u8,
    pub cmd: u8,
    pub start_us: u64,
    pub end_us: u64,
    pub request: Vec<u8>,
    pub response: Vec<u8>,
    /// Blob-session key overriding the (netfn, cmd) group key, when the
    /// request was resolved to a named blob.
    pub group_key: Option<SharedStr>,
    /// Byte offset of a blob write, parsed from the request body.
    pub offset: Option<u32>,
}

impl HostRequestRecord {
    pub fn duration_us(&self) -> u64 {
        self.end_us.saturating_sub(self.start_us)
    }
}

/// Human-readable names for well-known (netfn, cmd) pairs, shown next to
/// row labels and in tooltips.
pub fn describe_command(netfn: u8, cmd: u8) -> Option<&'static str> {
    let desc = match (netfn, cmd) {
        (6, 1) => "App-GetDeviceId",
        (6, 3) => "App-WarmReset",
        (6, 34) => "App-ResetWatchdogTimer",
        (6, 54) => "App-Get BT Interface Capabilities",
        (4, 2) => "Sensor-PlatformEvent",
        (4, 32) => "Sensor-GetDeviceSDRInfo",
        (4, 33) => "Sensor-GetDeviceSDR",
        (4, 34) => "Sensor-ReserveDeviceSDRRepo",
        (4, 39) => "Sensor-GetSensorThresholds",
        (4, 45) => "Sensor-GetSensorReading",
        (4, 47) => "Sensor-GetSensorType",
        (4, 48) => "Sensor-SetSensor",
        (10, 16) => "Storage-GetFruInventoryAreaInfo",
        (10, 17) => "Storage-ReadFruData",
        (10, 32) => "Storage-GetSdrRepositoryInfo",
        (10, 34) => "Storage-ReserveSdrRepository",
        (10, 35) => "Storage-GetSdr",
        (10, 64) => "Storage-GetSelInfo",
        (10, 67) => "Storage-GetSelEntry",
        (46, 50) => "OEM Extension",
        (58, 196) => "IBM_OEM",
        _ => return None,
    };
    Some(desc)
}

/// Look up a description from a "netfn, cmd" group key.
pub fn describe_key(key: &str) -> Option<&'static str> {
    let (netfn, cmd) = key.split_once(", ")?;
    describe_command(netfn.trim().parse().ok()?, cmd.trim().parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_described() {
        assert_eq!(describe_command(6, 1), Some("App-GetDeviceId"));
        assert_eq!(describe_command(10, 67), Some("Storage-GetSelEntry"));
        assert_eq!(describe_command(0, 0), None);
    }

    #[test]
    fn describe_from_group_key() {
        assert_eq!(describe_key("4, 45"), Some("Sensor-GetSensorReading"));
        assert_eq!(describe_key("not a key"), None);
        assert_eq!(describe_key("fw_image"), None);
    }

    #[test]
    fn duration_saturates_on_inverted_bounds() {
        let rec = HostRequestRecord {
            netfn: 6,
            cmd: 1,
            start_us: 100,
            end_us: 40,
            request: vec![],
            response: vec![],
            group_key: None,
            offset: None,
        };
        assert_eq!(rec.duration_us(), 0);
    }
}
