//! Inbound line handling: newline normalization and cross-read reassembly.
//!
//! BBS nodes terminate lines with CRLF, bare CR, or bare LF depending on the
//! software at the far end, and a line frequently straddles two TCP reads.
//! The normalizer canonicalizes terminators to a single `\n`; the accumulator
//! buffers normalized bytes until complete lines exist, so a packet boundary
//! can never split a displayed line.

/// Canonicalize line terminators: `\r\n` and lone `\r` become `\n`, lone
/// `\n` is unchanged, everything else passes through.
///
/// Applied only to the Telnet filter's data output, never to raw bytes.
pub fn normalize_newlines(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == b'\r' {
            out.push(b'\n');
            if input.get(i + 1) == Some(&b'\n') {
                i += 1;
            }
        } else {
            out.push(b);
        }
        i += 1;
    }
    out
}

/// Buffers normalized bytes across reads and emits only complete lines.
///
/// At most one partial (unterminated) line is retained between calls.
#[derive(Debug, Default)]
pub struct RxAccumulator {
    buf: Vec<u8>,
}

impl RxAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and drain every `\n`-terminated line, in order.
    ///
    /// Emitted lines exclude the terminator. The unterminated remainder
    /// stays buffered for the next read.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.buf[consumed..].iter().position(|&b| b == b'\n') {
            lines.push(self.buf[consumed..consumed + pos].to_vec());
            consumed += pos + 1;
        }
        if consumed > 0 {
            self.buf.drain(..consumed);
        }
        lines
    }

    /// The buffered unterminated tail.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }
}
