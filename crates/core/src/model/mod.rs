pub mod host;
pub mod interval;
pub mod record;

pub use host::{HostRequestRecord, describe_command};
pub use interval::{Interval, MergedSpan, Outcome};
pub use record::{AsyncHandlerRecord, MessageKind, MessageRecord, PaneRecords};
