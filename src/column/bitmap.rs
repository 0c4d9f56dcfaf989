use std::ops::Range;

/// Packed bit vector, LSB-first within each byte.
///
/// Used both for validity (1 = value present) and for boolean values.
/// Bits past `len` in the last byte are always zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    bytes: Vec<u8>,
    len: usize,
}

impl Bitmap {
    pub fn new() -> Self {
        Bitmap::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Bitmap {
            bytes: Vec::with_capacity(bits.div_ceil(8)),
            len: 0,
        }
    }

    /// Rebuild from packed bytes. Extra bytes are ignored, stray high bits cleared.
    pub fn from_packed(bytes: &[u8], len: usize) -> Option<Self> {
        let byte_len = len.div_ceil(8);
        if bytes.len() < byte_len {
            return None;
        }
        let mut packed = bytes[..byte_len].to_vec();
        let tail = len % 8;
        if tail != 0 {
            if let Some(last) = packed.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
        Some(Bitmap { bytes: packed, len })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn push(&mut self, value: bool) {
        let byte_idx = self.len / 8;
        let bit_idx = self.len % 8;
        if byte_idx >= self.bytes.len() {
            self.bytes.push(0);
        }
        if value {
            self.bytes[byte_idx] |= 1 << bit_idx;
        }
        self.len += 1;
    }

    /// Bit `i`; out-of-range bits read as unset.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.bytes[i / 8] & (1 << (i % 8)) != 0
    }

    pub fn count_set(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn count_unset(&self) -> usize {
        self.len - self.count_set()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn slice(&self, range: Range<usize>) -> Bitmap {
        let mut out = Bitmap::with_capacity(range.len());
        for i in range {
            out.push(self.get(i));
        }
        out
    }

    pub fn extend_from(&mut self, other: &Bitmap) {
        if self.len % 8 == 0 {
            self.bytes.extend_from_slice(&other.bytes);
            self.len += other.len;
            return;
        }
        for i in 0..other.len {
            self.push(other.get(i));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}
