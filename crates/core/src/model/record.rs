use busvis_protocol::SharedStr;
use serde::{Deserialize, Serialize};

use crate::model::host::HostRequestRecord;
use crate::model::interval::Outcome;

/// Message kind on the wire. The structured decoder emits kind codes
/// 1 = method call, 2 = method reply, 3 = error reply, 4 = signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
}

impl MessageKind {
    pub fn from_wire(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::MethodCall),
            2 => Some(Self::MethodReturn),
            3 => Some(Self::Error),
            4 => Some(Self::Signal),
            _ => None,
        }
    }

    /// Short label used in group keys and tooltips.
    pub fn label(self) -> &'static str {
        match self {
            Self::MethodCall => "mc",
            Self::MethodReturn => "mr",
            Self::Error => "err",
            Self::Signal => "sig",
        }
    }
}

/// One bus message retained on the timeline, with correlation results
/// filled in by the preprocessing pass. Only method calls and signals are
/// retained; replies are consumed to terminate their matching call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub kind: MessageKind,
    pub serial: u32,
    /// Capture timestamp in seconds.
    pub timestamp: f64,
    pub sender: SharedStr,
    pub destination: SharedStr,
    pub path: SharedStr,
    pub interface: SharedStr,
    pub member: SharedStr,
    /// Decoded message body, kept opaque.
    pub payload: serde_json::Value,
    /// Timestamp of the matching reply, if one was seen.
    pub end_timestamp: Option<f64>,
    pub outcome: Outcome,
}

/// One async I/O handler lifecycle from the handler tracking log.
///
/// The nesting level is a slot index assigned at creation time: the first
/// free slot among the handlers currently in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncHandlerRecord {
    pub handler_id: u64,
    pub level: u32,
    /// Creation timestamp in seconds.
    pub created: f64,
    /// Entry timestamp, if the handler body was entered.
    pub entered: Option<f64>,
    /// Exit timestamp. Completed handlers always carry one.
    pub exited: Option<f64>,
    pub description: SharedStr,
    /// Description with the hex pointer value stripped, so handlers of the
    /// same kind share one group key.
    pub short_description: SharedStr,
}

/// The records backing one timeline pane. The tag drives tooltip and
/// detail-panel dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaneRecords {
    Messages(Vec<MessageRecord>),
    AsyncHandlers(Vec<AsyncHandlerRecord>),
    HostRequests(Vec<HostRequestRecord>),
}

impl PaneRecords {
    pub fn len(&self) -> usize {
        match self {
            Self::Messages(v) => v.len(),
            Self::AsyncHandlers(v) => v.len(),
            Self::HostRequests(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
