//! Turns raw byte ranges into decoded lines.

use crate::config::PartialLines;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};

/// A complete line that is not valid in the configured encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MalformedLine {
    /// File offset of the first byte of the line.
    pub(crate) offset: u64,
}

/// Splits successive reads into lines, holding back bytes that do not yet end
/// in a terminator according to the [`PartialLines`] policy.
#[derive(Debug)]
pub(crate) struct LineDecoder {
    encoding: &'static Encoding,
    partial_lines: PartialLines,
    carry: Vec<u8>,
}

impl LineDecoder {
    pub(crate) fn new(encoding: &'static Encoding, partial_lines: PartialLines) -> Self {
        Self {
            encoding,
            partial_lines,
            carry: Vec::new(),
        }
    }

    pub(crate) fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Forget any held fragment; the next read starts a fresh line.
    pub(crate) fn reset(&mut self) {
        self.carry.clear();
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> &[u8] {
        &self.carry
    }

    /// Decodes `chunk`, read from file offset `chunk_offset`, and returns one
    /// entry per complete line it finishes, in file order.
    ///
    /// Each line is decoded on its own, so a malformed line does not hold back
    /// its neighbours. The chunk is always consumed: the fragment after the
    /// last terminator is held or dropped per the policy. A byte-order mark for
    /// the configured encoding is dropped when the chunk starts at byte 0.
    pub(crate) fn decode(
        &mut self,
        chunk: &[u8],
        chunk_offset: u64,
    ) -> Vec<Result<String, MalformedLine>> {
        let (chunk, base) = if chunk_offset == 0 && self.carry.is_empty() {
            let bom_len = self.bom_len(chunk);
            (&chunk[bom_len..], bom_len as u64)
        } else {
            (chunk, chunk_offset.saturating_sub(self.carry.len() as u64))
        };

        let mut buffer = std::mem::take(&mut self.carry);
        buffer.extend_from_slice(chunk);

        let terminator = line_feed(self.encoding);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some((end, next)) = next_line_end(terminator, &buffer, start) {
            let line = self
                .encoding
                .decode_without_bom_handling_and_without_replacement(&buffer[start..end])
                .map(|text| text.strip_suffix('\r').unwrap_or(&*text).to_owned())
                .ok_or(MalformedLine {
                    offset: base + start as u64,
                });
            lines.push(line);
            start = next;
        }

        if self.partial_lines == PartialLines::Carry {
            buffer.drain(..start);
            self.carry = buffer;
        }

        lines
    }

    fn bom_len(&self, chunk: &[u8]) -> usize {
        match Encoding::for_bom(chunk) {
            Some((encoding, bom_len)) if encoding == self.encoding => bom_len,
            _ => 0,
        }
    }
}

/// The line feed as encoded bytes: one byte, or one 2-byte UTF-16 code unit.
fn line_feed(encoding: &'static Encoding) -> &'static [u8] {
    if encoding == UTF_16LE {
        &[b'\n', 0]
    } else if encoding == UTF_16BE {
        &[0, b'\n']
    } else {
        b"\n"
    }
}

/// Finds the first terminator at or after `from`, matched on its own
/// alignment. Returns the end of the line content and the start of the next.
fn next_line_end(terminator: &[u8], bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    let width = terminator.len();
    bytes[from..]
        .chunks_exact(width)
        .position(|unit| unit == terminator)
        .map(|index| {
            let end = from + index * width;
            (end, end + width)
        })
}
