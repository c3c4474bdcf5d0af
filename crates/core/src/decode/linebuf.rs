use std::io::Read;

use crate::decode::progress::DecodeProgress;

/// Incremental line reassembly over arbitrarily sized byte chunks.
///
/// External decode processes write to a pipe, so a read can end anywhere —
/// including mid-line. Chunks are pushed in as they arrive and complete
/// lines are pulled out; a partial tail stays buffered until its newline
/// shows up. `\r\n` and bare `\r` both terminate a line.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
    pos: usize,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. No parsing happens here.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pull the next complete line, without its terminator. Returns `None`
    /// when only a partial line (or nothing) remains buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let rest = &self.buf[self.pos..];
        let nl = rest.iter().position(|&b| b == b'\n' || b == b'\r')?;

        // A \r at the very end of the buffer may be half of a split \r\n;
        // hold the line back until the next chunk settles it.
        if rest[nl] == b'\r' && nl + 1 == rest.len() {
            return None;
        }

        let line = String::from_utf8_lossy(&rest[..nl]).into_owned();

        // Swallow the \n that follows \r so CRLF counts as one terminator.
        let mut consumed = self.pos + nl + 1;
        if rest[nl] == b'\r' && rest.get(nl + 1) == Some(&b'\n') {
            consumed += 1;
        }
        self.pos = consumed;

        // Compact once the consumed prefix dominates the buffer.
        if self.pos > 4096 && self.pos * 2 > self.buf.len() {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }

        Some(line)
    }

    /// Flush the trailing unterminated line, if any. Call at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let mut tail = &self.buf[self.pos..];
        if tail.last() == Some(&b'\r') {
            tail = &tail[..tail.len() - 1];
        }
        let line = String::from_utf8_lossy(tail).into_owned();
        self.buf.clear();
        self.pos = 0;
        if line.is_empty() { None } else { Some(line) }
    }
}

/// Pull-based line iterator over any byte source, built on the assembler.
///
/// Chunks are read only as lines are demanded, so a pipe from a slow
/// producer is consumed incrementally instead of buffered whole. Raw line
/// endings feed the progress estimate as they stream past.
pub struct LineReader<R> {
    reader: R,
    assembler: LineAssembler,
    progress: DecodeProgress,
    eof: bool,
}

const READ_CHUNK: usize = 8192;

impl<R: Read> LineReader<R> {
    /// `expected_lines` seeds the progress heuristic; pass 0 when no
    /// estimate is available.
    pub fn new(reader: R, expected_lines: usize) -> Self {
        Self {
            reader,
            assembler: LineAssembler::new(),
            progress: DecodeProgress::new(expected_lines),
            eof: false,
        }
    }

    pub fn progress(&self) -> &DecodeProgress {
        &self.progress
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.assembler.next_line() {
                return Some(Ok(line));
            }
            if self.eof {
                return self.assembler.finish().map(Ok);
            }
            let mut chunk = [0u8; READ_CHUNK];
            match self.reader.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => {
                    self.progress.feed(&chunk[..n]);
                    self.assembler.push_chunk(&chunk[..n]);
                }
                Err(err) => {
                    self.eof = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
