pub mod asio;
pub mod busjson;
pub mod linebuf;
pub mod progress;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("handler log: {0}")]
    HandlerLog(#[from] asio::HandlerLogError),
    #[error("trace: {0}")]
    Trace(#[from] busjson::TraceDecodeError),
}

/// Whether the bytes look like an async-handler tracking log.
///
/// Mirrors the open-file sniffing: any line starting with the sentinel tag
/// marks the whole file as a handler log; everything else goes down the
/// structured-trace path.
pub fn is_handler_log(data: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(data) else {
        return false;
    };
    text.lines().any(|l| l.starts_with(asio::SENTINEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_handler_log() {
        assert!(is_handler_log(b"junk\n@asio|1.5|*3|desc\n"));
        assert!(!is_handler_log(b"1.5: method call\n"));
        assert!(!is_handler_log(b"\xff\xfe"));
    }
}
