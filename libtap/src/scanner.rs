//! Phase 1: Line Scanner
//!
//! The scanner turns an append-only stream of text (or bytes) into complete
//! lines. It performs:
//! - Buffering of the incomplete trailing fragment between chunks
//! - Line terminator handling (`\n`, `\r\n`, and a lone `\r`)
//! - UTF-8 decoding of byte chunks, including sequences split across chunks
//!
//! Each line is returned without its terminator; leading whitespace is kept
//! because the parser measures indentation from it.

/// Incremental line splitter.
///
/// Scanning resumes from where the previous search for a terminator stopped,
/// so a very long line arriving in many chunks is only scanned once.
#[derive(Debug, Default)]
pub struct LineScanner {
    /// Text received but not yet returned as lines.
    buffer: String,
    /// Offset of the first unconsumed byte in `buffer`.
    start: usize,
    /// Offset below which `buffer` holds no terminator.
    scanned: usize,
    /// Incomplete UTF-8 sequence left over from `push_bytes`.
    pending: Vec<u8>,
    closed: bool,
}

/// Where the next terminator sits, if it is known yet.
enum Terminator {
    /// Line ends at `at`; the terminator is `width` bytes long.
    Found { at: usize, width: usize },
    /// No complete terminator in the buffer; resume scanning at `resume`.
    NeedMore { resume: usize },
}

impl LineScanner {
    /// Create an empty scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of text.
    pub fn push(&mut self, chunk: &str) {
        self.compact();
        self.buffer.push_str(chunk);
    }

    /// Append a chunk of bytes, decoding UTF-8 across chunk boundaries.
    ///
    /// Invalid sequences are replaced with U+FFFD.
    pub fn push_bytes(&mut self, chunk: &[u8]) {
        self.compact();
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid = consumed + err.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[consumed..valid]));
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid + len;
                        }
                        // Truncated sequence: wait for the next chunk
                        None => {
                            consumed = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }

    /// Mark the end of the stream. Any unterminated remainder becomes the
    /// final line.
    pub fn close(&mut self) {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.buffer.push_str(&tail);
        }
        self.closed = true;
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Return the next complete line, or `None` if more input is needed (or
    /// the stream is closed and drained).
    pub fn next_line(&mut self) -> Option<String> {
        match self.find_terminator() {
            Terminator::Found { at, width } => Some(self.take_line(at, width)),
            Terminator::NeedMore { resume } => {
                self.scanned = resume;
                if self.closed && self.start < self.buffer.len() {
                    let end = self.buffer.len();
                    return Some(self.take_line(end, 0));
                }
                None
            }
        }
    }

    fn find_terminator(&self) -> Terminator {
        let bytes = self.buffer.as_bytes();
        let from = self.scanned.max(self.start);
        let Some(offset) = bytes[from..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        else {
            return Terminator::NeedMore {
                resume: bytes.len(),
            };
        };

        let at = from + offset;
        if bytes[at] == b'\n' {
            return Terminator::Found { at, width: 1 };
        }
        match bytes.get(at + 1) {
            Some(b'\n') => Terminator::Found { at, width: 2 },
            Some(_) => Terminator::Found { at, width: 1 },
            // A trailing `\r` may be the first half of `\r\n`
            None if self.closed => Terminator::Found { at, width: 1 },
            None => Terminator::NeedMore { resume: at },
        }
    }

    fn take_line(&mut self, end: usize, width: usize) -> String {
        let line = self.buffer[self.start..end].to_string();
        self.start = end + width;
        self.scanned = self.start;
        line
    }

    /// Drop consumed text once it makes up at least half the buffer.
    fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        if self.start >= self.buffer.len() {
            self.buffer.clear();
            self.start = 0;
            self.scanned = 0;
        } else if self.start * 2 >= self.buffer.len() {
            self.buffer.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
    }
}

impl Iterator for LineScanner {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_line()
    }
}

/// Count the leading spaces and tabs of a line.
///
/// Tabs count as a single column; TAP producers indent with spaces.
pub fn count_indent(line: &str) -> usize {
    line.bytes().take_while(|&b| b == b' ' || b == b'\t').count()
}
