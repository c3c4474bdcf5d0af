/// Decode progress estimated by counting newline transitions against a
/// precomputed expected line total.
///
/// The external decoder gives no progress callbacks; the only signal is
/// how many output lines have streamed past, compared with a line count
/// taken from the capture up front. Consecutive newlines count once, so
/// blank-line padding does not inflate the estimate.
#[derive(Debug, Clone)]
pub struct DecodeProgress {
    expected: usize,
    seen: usize,
    last_was_newline: bool,
}

impl DecodeProgress {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            seen: 0,
            last_was_newline: false,
        }
    }

    /// Count line endings in a raw chunk as it streams past.
    pub fn feed(&mut self, chunk: &[u8]) {
        for &b in chunk {
            let is_newline = b == b'\n' || b == b'\r';
            if is_newline && !self.last_was_newline {
                self.seen += 1;
            }
            self.last_was_newline = is_newline;
        }
    }

    pub fn lines_seen(&self) -> usize {
        self.seen
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Completion percentage, clamped to 100. The expected total is a
    /// heuristic; the stream may run past it.
    pub fn percent(&self) -> u32 {
        if self.expected == 0 {
            return 0;
        }
        ((self.seen * 100 / self.expected) as u32).min(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_across_chunks() {
        let mut p = DecodeProgress::new(4);
        p.feed(b"one\ntwo");
        assert_eq!(p.lines_seen(), 1);
        p.feed(b"\nthree\n");
        assert_eq!(p.lines_seen(), 3);
        assert_eq!(p.percent(), 75);
    }

    #[test]
    fn crlf_counts_once() {
        let mut p = DecodeProgress::new(2);
        p.feed(b"a\r\nb\r\n");
        assert_eq!(p.lines_seen(), 2);
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn percent_clamps_past_expected() {
        let mut p = DecodeProgress::new(1);
        p.feed(b"a\nb\nc\n");
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn zero_expected_reports_zero() {
        let mut p = DecodeProgress::new(0);
        p.feed(b"a\n");
        assert_eq!(p.percent(), 0);
    }
}
