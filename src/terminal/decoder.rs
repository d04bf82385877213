//! Incremental UTF-8 decoder
//!
//! Turns the child's byte stream into Unicode code points one byte at a
//! time, so a multi-byte character split across two reads decodes the
//! same as one delivered whole. Each minimal invalid prefix is replaced
//! with a single U+FFFD and decoding resynchronizes at the next lead
//! byte; the decoder never fails and never swallows more than the
//! offending prefix.

/// Replacement character emitted for invalid sequences
pub const REPLACEMENT: char = '\u{FFFD}';

/// Streaming UTF-8 decoder state
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Accumulator for a partially received multi-byte character
    buf: [u8; 4],
    /// Bytes accumulated so far
    len: u8,
    /// Continuation bytes still expected
    remaining: u8,
}

impl Utf8Decoder {
    /// Create a decoder with no pending state
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a partial sequence is pending completion
    pub fn is_pending(&self) -> bool {
        self.remaining > 0
    }

    /// Feed one byte, pushing completed code points into `sink`
    ///
    /// At most two code points are produced per byte (a replacement for an
    /// aborted sequence, then whatever the byte itself decodes to).
    pub fn advance(&mut self, byte: u8, sink: &mut impl FnMut(char)) {
        if self.remaining > 0 {
            if (0x80..=0xBF).contains(&byte) {
                self.buf[self.len as usize] = byte;
                self.len += 1;
                self.remaining -= 1;
                if self.remaining == 0 {
                    let ch = match std::str::from_utf8(&self.buf[..self.len as usize]) {
                        Ok(s) => s.chars().next().unwrap_or(REPLACEMENT),
                        // Overlong forms and surrogate halves land here
                        Err(_) => REPLACEMENT,
                    };
                    self.len = 0;
                    sink(ch);
                }
                return;
            }
            // Invalid continuation: replace the partial prefix, then let
            // the byte start over as a fresh lead
            self.len = 0;
            self.remaining = 0;
            sink(REPLACEMENT);
        }

        match byte {
            0x00..=0x7F => sink(byte as char),
            0xC2..=0xDF => self.start(byte, 1),
            0xE0..=0xEF => self.start(byte, 2),
            0xF0..=0xF4 => self.start(byte, 3),
            // Stray continuation bytes, overlong leads (C0/C1), and leads
            // beyond U+10FFFF (F5..FF)
            _ => sink(REPLACEMENT),
        }
    }

    fn start(&mut self, byte: u8, remaining: u8) {
        self.buf[0] = byte;
        self.len = 1;
        self.remaining = remaining;
    }
}
