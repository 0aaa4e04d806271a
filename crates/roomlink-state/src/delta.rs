//! Fossil delta encoding
//!
//! The server ships state patches in the Fossil delta format:
//!
//! ```text
//! <target size>\n
//! <count>@<offset>,     copy `count` bytes from the source at `offset`
//! <count>:<bytes>       insert `count` literal bytes
//! <checksum>;           end of delta, checksum of the output
//! ```
//!
//! Integers are written most significant digit first in a base-64 alphabet.

use crate::StateError;

const DIGITS: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz~";

fn digit_value(c: u8) -> Option<u64> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u64),
        b'A'..=b'Z' => Some((c - b'A') as u64 + 10),
        b'_' => Some(36),
        b'a'..=b'z' => Some((c - b'a') as u64 + 37),
        b'~' => Some(63),
        _ => None,
    }
}

fn malformed(msg: &str) -> StateError {
    StateError::DeltaError(msg.to_string())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn have_bytes(&self) -> bool {
        self.pos < self.bytes.len()
    }

    fn next_byte(&mut self) -> Result<u8, StateError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| malformed("unexpected end of delta"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn next_int(&mut self) -> Result<usize, StateError> {
        let mut value: u64 = 0;
        while let Some(digit) = self.bytes.get(self.pos).copied().and_then(digit_value) {
            value = value
                .checked_mul(64)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| malformed("integer overflow"))?;
            self.pos += 1;
        }
        usize::try_from(value).map_err(|_| malformed("integer overflow"))
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], StateError> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| malformed("insert count exceeds size of delta"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

fn put_int(out: &mut Vec<u8>, mut value: usize) {
    if value == 0 {
        out.push(b'0');
        return;
    }

    let start = out.len();
    while value > 0 {
        out.push(DIGITS[value & 0x3f]);
        value >>= 6;
    }
    out[start..].reverse();
}

/// Fossil checksum: a 32-bit sum over big-endian words, tail bytes
/// folded in from the high byte down
pub fn checksum(data: &[u8]) -> u32 {
    let mut sums = [0u32; 4];
    let mut words = data.chunks_exact(4);
    for word in &mut words {
        for (sum, &byte) in sums.iter_mut().zip(word) {
            *sum = sum.wrapping_add(byte as u32);
        }
    }

    let mut result = sums[3]
        .wrapping_add(sums[2] << 8)
        .wrapping_add(sums[1] << 16)
        .wrapping_add(sums[0] << 24);

    for (i, &byte) in words.remainder().iter().enumerate() {
        result = result.wrapping_add((byte as u32) << (24 - 8 * i));
    }

    result
}

/// Size of the output a delta will produce
pub fn output_size(delta: &[u8]) -> Result<usize, StateError> {
    let mut reader = Reader::new(delta);
    let size = reader.next_int()?;
    if reader.next_byte()? != b'\n' {
        return Err(malformed("size integer not terminated by '\\n'"));
    }
    Ok(size)
}

/// Apply a delta to `src`, producing the target it was computed for.
///
/// Copies that reach outside `src`, and outputs whose size or checksum
/// disagree with the delta, are reported as [`StateError::StateDivergence`]:
/// the delta was computed against a different baseline.
pub fn apply(src: &[u8], delta: &[u8]) -> Result<Vec<u8>, StateError> {
    let mut reader = Reader::new(delta);
    let limit = reader.next_int()?;
    if reader.next_byte()? != b'\n' {
        return Err(malformed("size integer not terminated by '\\n'"));
    }

    let mut out = Vec::with_capacity(limit.min(src.len() + delta.len()));
    let mut total: usize = 0;

    while reader.have_bytes() {
        let count = reader.next_int()?;

        match reader.next_byte()? {
            b'@' => {
                let offset = reader.next_int()?;
                if reader.have_bytes() && reader.next_byte()? != b',' {
                    return Err(malformed("copy command not terminated by ','"));
                }
                total = total.saturating_add(count);
                if total > limit {
                    return Err(malformed("copy exceeds output file size"));
                }
                let end = offset
                    .checked_add(count)
                    .filter(|&end| end <= src.len())
                    .ok_or_else(|| {
                        StateError::StateDivergence("copy extends past end of input".to_string())
                    })?;
                out.extend_from_slice(&src[offset..end]);
            }
            b':' => {
                total = total.saturating_add(count);
                if total > limit {
                    return Err(malformed(
                        "insert command gives an output larger than predicted",
                    ));
                }
                out.extend_from_slice(reader.take(count)?);
            }
            b';' => {
                if count != checksum(&out) as usize {
                    return Err(StateError::StateDivergence("bad checksum".to_string()));
                }
                if total != limit {
                    return Err(StateError::StateDivergence(
                        "generated size does not match predicted size".to_string(),
                    ));
                }
                return Ok(out);
            }
            _ => return Err(malformed("unknown delta operator")),
        }
    }

    Err(malformed("unterminated delta"))
}

/// Create a delta turning `src` into `target`.
///
/// Copies the longest common prefix and suffix from `src` and inserts the
/// differing middle literally. Any conforming decoder accepts the output.
pub fn create(src: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(target.len() / 2 + 16);
    put_int(&mut out, target.len());
    out.push(b'\n');

    let prefix = src
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = src.len().min(target.len()) - prefix;
    let suffix = src
        .iter()
        .rev()
        .zip(target.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    if prefix > 0 {
        put_int(&mut out, prefix);
        out.push(b'@');
        put_int(&mut out, 0);
        out.push(b',');
    }

    let middle = &target[prefix..target.len() - suffix];
    if !middle.is_empty() {
        put_int(&mut out, middle.len());
        out.push(b':');
        out.extend_from_slice(middle);
    }

    if suffix > 0 {
        put_int(&mut out, suffix);
        out.push(b'@');
        put_int(&mut out, src.len() - suffix);
        out.push(b',');
    }

    put_int(&mut out, checksum(target) as usize);
    out.push(b';');
    out
}
