use busvis_protocol::SharedStr;
use thiserror::Error;
use tracing::debug;

use crate::model::AsyncHandlerRecord;

/// Lines carrying handler events start with this tag.
pub const SENTINEL: &str = "@asio|";

#[derive(Debug, Error)]
pub enum HandlerLogError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("no handler events found")]
    Empty,
}

#[derive(Debug)]
pub struct HandlerLogOutput {
    pub records: Vec<AsyncHandlerRecord>,
    /// Lines without the sentinel tag or with malformed fields.
    pub skipped_lines: usize,
    /// Handlers created but never exited; these stay off the timeline.
    pub unfinished: usize,
}

/// Parse an async-handler tracking log.
///
/// Line format is pipe-delimited: `@asio|<timestamp>|<action>|<description>`
/// where the action encodes the lifecycle step:
///
/// ```text
/// @asio|1.000|*21|connection 0x55b2a0 accept
/// @asio|1.010|>21|connection 0x55b2a0 accept
/// @asio|1.250|<21|
/// @asio|1.251|.write|(ignored syscall marker)
/// ```
///
/// `*<id>` creates handler `<id>`; its nesting level is the first free
/// slot among handlers currently in flight, so concurrent handlers land
/// on distinct levels. `><id>` marks entry, `<<id>` marks exit and emits
/// the completed record. Anything else on an `@asio` line is skipped, as
/// is every non-`@asio` line.
pub fn parse_handler_log(data: &[u8]) -> Result<HandlerLogOutput, HandlerLogError> {
    let text = std::str::from_utf8(data)?;

    let mut records: Vec<AsyncHandlerRecord> = Vec::new();
    // Slot table: index = nesting level, entry = in-flight handler.
    let mut slots: Vec<Option<AsyncHandlerRecord>> = Vec::new();
    let mut id_to_level: std::collections::HashMap<u64, usize> = std::collections::HashMap::new();
    let mut skipped = 0usize;

    for line in text.lines() {
        if !line.starts_with(SENTINEL) {
            skipped += 1;
            continue;
        }
        let mut fields = line.splitn(4, '|');
        let _tag = fields.next();
        let (Some(ts), Some(action)) = (fields.next(), fields.next()) else {
            skipped += 1;
            continue;
        };
        let desc = fields.next().unwrap_or("");
        let Ok(ts_sec) = ts.trim().parse::<f64>() else {
            skipped += 1;
            continue;
        };

        match action.as_bytes().first() {
            Some(b'*') => {
                let Ok(handler_id) = action[1..].trim().parse::<u64>() else {
                    skipped += 1;
                    continue;
                };
                let level = first_free_slot(&mut slots);
                let record = AsyncHandlerRecord {
                    handler_id,
                    level: level as u32,
                    created: ts_sec,
                    entered: None,
                    exited: None,
                    description: SharedStr::from(desc),
                    short_description: SharedStr::from(simplify_description(desc)),
                };
                slots[level] = Some(record);
                id_to_level.insert(handler_id, level);
            }
            Some(b'>') => {
                if let Some(level) = parse_id(action).and_then(|id| id_to_level.get(&id).copied())
                    && let Some(entry) = slots[level].as_mut()
                {
                    entry.entered = Some(ts_sec);
                }
            }
            Some(b'<') => {
                if let Some(id) = parse_id(action)
                    && let Some(level) = id_to_level.remove(&id)
                    && let Some(mut entry) = slots[level].take()
                {
                    entry.exited = Some(ts_sec);
                    records.push(entry);
                }
            }
            // Syscall markers carry no lifecycle information.
            Some(b'.') => {}
            _ => skipped += 1,
        }
    }

    if records.is_empty() && id_to_level.is_empty() {
        return Err(HandlerLogError::Empty);
    }

    let unfinished = id_to_level.len();
    debug!(
        records = records.len(),
        levels = slots.len(),
        unfinished,
        "parsed handler log"
    );

    Ok(HandlerLogOutput {
        records,
        skipped_lines: skipped,
        unfinished,
    })
}

fn parse_id(action: &str) -> Option<u64> {
    action[1..].trim().parse().ok()
}

/// Lowest unoccupied slot index, growing the table if all are taken.
fn first_free_slot(slots: &mut Vec<Option<AsyncHandlerRecord>>) -> usize {
    match slots.iter().position(Option::is_none) {
        Some(i) => i,
        None => {
            slots.push(None);
            slots.len() - 1
        }
    }
}

/// Strip the hex pointer from a handler description so that repeated
/// handlers of the same kind compare equal: `"timer 0x55d1a2 fired"`
/// becomes `"timer  fired"`.
fn simplify_description(desc: &str) -> String {
    let Some(idx) = desc.find("0x") else {
        return desc.to_string();
    };
    let after = &desc[idx + 2..];
    let hex_len = after
        .bytes()
        .take_while(|b| b.is_ascii_hexdigit())
        .count();
    format!("{}{}", &desc[..idx], &after[hex_len..])
}
