use crate::model::HostRequestRecord;

/// Replay-script syntax to generate from a set of host requests.
///
/// Each flavor is a plain-text command script a user can paste into a
/// shell against a live system: one `ipmitool raw` invocation per
/// request, an `ipmitool exec` batch list, or `busctl` lines against the
/// legacy signal interface or the current execute interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayFlavor {
    IpmitoolRaw,
    IpmitoolExecList,
    BusctlLegacy,
    BusctlNew,
}

impl ReplayFlavor {
    pub const ALL: [ReplayFlavor; 4] = [
        Self::IpmitoolRaw,
        Self::IpmitoolExecList,
        Self::BusctlLegacy,
        Self::BusctlNew,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::IpmitoolRaw => "ipmitool (1 command per request)",
            Self::IpmitoolExecList => "ipmitool exec list",
            Self::BusctlLegacy => "busctl (legacy interface)",
            Self::BusctlNew => "busctl (new interface)",
        }
    }
}

/// Format the selected requests as a replay script.
pub fn generate(flavor: ReplayFlavor, reqs: &[&HostRequestRecord]) -> String {
    let mut out = String::new();
    for (i, req) in reqs.iter().enumerate() {
        match flavor {
            // NetFN and CMD are decimal, the payload is hexadecimal.
            ReplayFlavor::IpmitoolRaw => {
                out.push_str(&format!(
                    "ipmitool raw {} {} {}\n",
                    req.netfn,
                    req.cmd,
                    to_hex_string(&req.request, "0x", " ")
                ));
            }
            ReplayFlavor::IpmitoolExecList => {
                let mut bytes = vec![req.netfn, req.cmd];
                bytes.extend_from_slice(&req.request);
                out.push_str(&format!("raw {}\n", to_hex_string(&bytes, "0x", " ")));
            }
            ReplayFlavor::BusctlLegacy => {
                let serial = i % 256;
                out.push_str(&format!(
                    "busctl --system emit /org/openbmc/HostIpmi/1 org.openbmc.HostIpmi \
                     ReceivedMessage yyyyay {serial} {} 0 {} {} {}\n",
                    req.netfn,
                    req.cmd,
                    req.request.len(),
                    to_hex_string(&req.request, "0x", " ")
                ));
            }
            ReplayFlavor::BusctlNew => {
                out.push_str(&format!(
                    "busctl --system call xyz.openbmc_project.Ipmi.Host /xyz/openbmc_project/Ipmi \
                     xyz.openbmc_project.Ipmi.Server execute yyyaya{{sv}} {} 0 {} {} {} 0\n",
                    req.netfn,
                    req.cmd,
                    req.request.len(),
                    to_hex_string(&req.request, "0x", " ")
                ));
            }
        }
    }
    out
}

pub fn to_hex_string(bytes: &[u8], prefix: &str, sep: &str) -> String {
    let mut ret = String::new();
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            ret.push_str(sep);
        }
        ret.push_str(prefix);
        ret.push_str(&format!("{b:x}"));
    }
    ret
}

/// Printable-ASCII rendering of a byte string; anything else shows as a
/// dot so tooltips stay one line high.
pub fn to_ascii_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if (0x20..0x7f).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(netfn: u8, cmd: u8, request: Vec<u8>) -> HostRequestRecord {
        HostRequestRecord {
            netfn,
            cmd,
            start_us: 0,
            end_us: 1,
            request,
            response: vec![],
            group_key: None,
            offset: None,
        }
    }

    #[test]
    fn hex_formatting_matches_tool_syntax() {
        assert_eq!(to_hex_string(&[0x02, 0xde, 0x04], "0x", " "), "0x2 0xde 0x4");
        assert_eq!(to_hex_string(&[], "0x", " "), "");
        assert_eq!(to_hex_string(&[0xab, 0xcd], "", " "), "ab cd");
    }

    #[test]
    fn ascii_replaces_unprintable_bytes() {
        assert_eq!(to_ascii_string(b"/blob/fw\0"), "/blob/fw.");
        assert_eq!(to_ascii_string(&[0x41, 0x07, 0x42]), "A.B");
    }

    #[test]
    fn ipmitool_raw_one_line_per_request() {
        let a = req(6, 1, vec![]);
        let b = req(4, 45, vec![0x02, 0x10]);
        let script = generate(ReplayFlavor::IpmitoolRaw, &[&a, &b]);
        assert_eq!(script, "ipmitool raw 6 1 \nipmitool raw 4 45 0x2 0x10\n");
    }

    #[test]
    fn exec_list_prepends_code_bytes() {
        let a = req(6, 1, vec![0xaa]);
        let script = generate(ReplayFlavor::IpmitoolExecList, &[&a]);
        assert_eq!(script, "raw 0x6 0x1 0xaa\n");
    }

    #[test]
    fn busctl_legacy_counts_serials_mod_256() {
        let a = req(6, 1, vec![]);
        let reqs: Vec<&HostRequestRecord> = std::iter::repeat_n(&a, 3).collect();
        let script = generate(ReplayFlavor::BusctlLegacy, &reqs);
        let serials: Vec<&str> = script
            .lines()
            .map(|l| l.split_whitespace().nth(7).unwrap_or(""))
            .collect();
        assert_eq!(serials, ["0", "1", "2"]);
    }

    #[test]
    fn busctl_new_targets_execute_interface() {
        let a = req(46, 128, vec![0xcf]);
        let script = generate(ReplayFlavor::BusctlNew, &[&a]);
        assert!(script.contains("xyz.openbmc_project.Ipmi.Server execute"));
        assert!(script.contains("46 0 128 1 0xcf 0"));
    }
}
