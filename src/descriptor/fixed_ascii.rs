/// Fixed-capacity ASCII field
///
/// Mirrors the zero-padded byte buffers of the persisted descriptor record.
/// The capacity excludes the reserved trailing null byte, which is written
/// by the record codec and never stored here, so a `FixedAscii<N>` always
/// fits its slot and is always terminated.
use serde::{Serialize, Serializer};
use std::fmt;

/// Longest prefix of `value` that fits in `capacity` bytes.
///
/// Returns `None` when `value` is not pure ASCII; such values cannot be
/// represented in a descriptor field.
pub fn truncate_ascii(value: &str, capacity: usize) -> Option<&str> {
    if !value.is_ascii() {
        return None;
    }
    Some(&value[..value.len().min(capacity)])
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedAscii<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> FixedAscii<N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self { bytes: [0u8; N] }
    }

    /// Copy `value`, truncated to the capacity. `None` for non-ASCII input.
    pub fn from_str_truncated(value: &str) -> Option<Self> {
        let text = truncate_ascii(value, N)?;
        let mut field = Self::new();
        field.bytes[..text.len()].copy_from_slice(text.as_bytes());
        Some(field)
    }

    /// Copy raw bytes up to the first null or the capacity, whichever comes
    /// first. Bytes outside the ASCII range are replaced with `?`.
    pub fn from_bytes_truncated(raw: &[u8]) -> Self {
        let mut field = Self::new();
        for (slot, &byte) in field
            .bytes
            .iter_mut()
            .zip(raw.iter().take_while(|&&b| b != 0))
        {
            *slot = if byte.is_ascii() { byte } else { b'?' };
        }
        field
    }

    pub fn len(&self) -> usize {
        self.bytes.iter().position(|&b| b == 0).unwrap_or(N)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// Full zero-padded buffer.
    pub fn raw(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }
}

impl<const N: usize> Default for FixedAscii<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Display for FixedAscii<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> fmt::Debug for FixedAscii<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> Serialize for FixedAscii<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
