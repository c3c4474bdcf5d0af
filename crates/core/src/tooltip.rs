use crate::model::host::describe_command;
use crate::model::{Interval, PaneRecords};
use crate::replay::{to_ascii_string, to_hex_string};

/// Build the tooltip body for a hovered interval.
///
/// Dispatch is on the pane's record tag: each source kind exposes its own
/// fields, but all three produce the same plain-line shape the render
/// pass lays out into a box near the cursor. Returns `None` when the
/// interval's record index is stale against the current record store.
pub fn lines(records: &PaneRecords, iv: &Interval, precision: usize) -> Option<Vec<String>> {
    match records {
        PaneRecords::Messages(msgs) => {
            let rec = msgs.get(iv.record)?;
            Some(vec![
                format!("Message type: {}", rec.kind.label()),
                format!("Serial      : {}", rec.serial),
                format!("Sender      : {}", rec.sender),
                format!("Destination : {}", rec.destination),
                format!("Path        : {}", rec.path),
                format!("Interface   : {}", rec.interface),
                format!("Member      : {}", rec.member),
            ])
        }
        PaneRecords::AsyncHandlers(handlers) => {
            let rec = handlers.get(iv.record)?;
            let entered = rec.entered.unwrap_or(rec.created);
            let mut out = vec![
                format!("Creation time: {:.6}", rec.created),
                format!("Entry time   : {:.6}", entered),
            ];
            if let Some(exited) = rec.exited {
                out.push(format!("Exit time    : {exited:.6}"));
                out.push(format!("Creation->Entry : {:.6}", entered - rec.created));
                out.push(format!("Entry->Exit     : {:.6}", exited - entered));
            }
            out.push(format!("Description  : {}", rec.description));
            Some(out)
        }
        PaneRecords::HostRequests(reqs) => {
            let rec = reqs.get(iv.record)?;
            let mut out = Vec::new();
            out.push(format!("Netfn and CMD : ({}, {})", rec.netfn, rec.cmd));
            if let Some(desc) = describe_command(rec.netfn, rec.cmd) {
                out.push(format!("Description   : {desc}"));
            }
            if let Some(offset) = rec.offset {
                out.push(format!("Offset        : {offset}"));
            }
            out.push(format!("Request Data  : {} bytes", rec.request.len()));
            if !rec.request.is_empty() {
                out.push(format!("Hex   : {}", to_hex_string(&rec.request, "", " ")));
                out.push(format!("ASCII : {}", to_ascii_string(&rec.request)));
            }
            out.push(format!("Response Data : {} bytes", rec.response.len()));
            if !rec.response.is_empty() {
                out.push(format!("Hex   : {}", to_hex_string(&rec.response, "", " ")));
                out.push(format!("ASCII : {}", to_ascii_string(&rec.response)));
            }
            out.push(format!("Start         : {:.precision$}s", iv.start));
            if let Some(end) = iv.end {
                out.push(format!("End           : {end:.precision$}s"));
                out.push(format!("Duration      : {:.3}ms", (end - iv.start) * 1000.0));
            } else {
                out.push("End           : (no response)".to_string());
            }
            Some(out)
        }
    }
}
