//! Byte storage for argument slots.
//!
//! [`ValueBuffer`] is the single place where destination memory grows. A buffer
//! is either *growable* (the caller opted into reallocation) or *fixed* (the
//! caller supplied a capacity that must not be exceeded).

use crate::error::{Result, TypeError};

/// Growable byte buffer with an explicit capacity.
#[derive(Debug, Clone, Default)]
pub struct ValueBuffer {
    data: Vec<u8>,
    capacity: usize,
    growable: bool,
}

impl ValueBuffer {
    /// Empty buffer that grows on demand.
    pub fn growable() -> Self {
        Self {
            data: Vec::new(),
            capacity: 0,
            growable: true,
        }
    }

    /// Empty buffer that can hold at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            growable: false,
        }
    }

    /// Growable buffer holding `data`.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let capacity = data.len();
        Self {
            data,
            capacity,
            growable: true,
        }
    }

    /// Growable buffer holding the little-endian bytes of `values`.
    pub fn from_elements<T: Element>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::SIZE);
        for value in values {
            value.write_le(&mut data);
        }
        Self::from_vec(data)
    }

    /// Reinterpret the contents as little-endian elements.
    ///
    /// Returns `None` when the length is not a multiple of the element size.
    pub fn to_elements<T: Element>(&self) -> Option<Vec<T>> {
        if self.data.len() % T::SIZE != 0 {
            return None;
        }
        Some(self.data.chunks_exact(T::SIZE).map(T::read_le).collect())
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True if the buffer may be reallocated to fit incoming data.
    pub fn is_growable(&self) -> bool {
        self.growable
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Make room for `needed` bytes, growing if allowed.
    pub fn ensure_capacity(&mut self, needed: usize) -> Result<()> {
        if needed <= self.capacity {
            return Ok(());
        }
        if !self.growable {
            return Err(TypeError::BufferTooSmall {
                need: needed,
                capacity: self.capacity,
            });
        }
        self.data.reserve(needed.saturating_sub(self.data.len()));
        self.capacity = needed;
        Ok(())
    }

    /// Replace the contents with `src`, growing if allowed.
    pub fn copy_in(&mut self, src: &[u8]) -> Result<usize> {
        self.ensure_capacity(src.len())?;
        self.data.clear();
        self.data.extend_from_slice(src);
        Ok(src.len())
    }

    /// Append `src`, growing if allowed.
    pub fn append(&mut self, src: &[u8]) -> Result<()> {
        self.ensure_capacity(self.data.len() + src.len())?;
        self.data.extend_from_slice(src);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl PartialEq for ValueBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for ValueBuffer {}

impl From<Vec<u8>> for ValueBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for ValueBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }
}

impl From<&str> for ValueBuffer {
    fn from(text: &str) -> Self {
        Self::from_vec(text.as_bytes().to_vec())
    }
}

/// Fixed-width numeric element stored little-endian in a [`ValueBuffer`].
pub trait Element: Copy {
    const SIZE: usize;

    fn write_le(self, out: &mut Vec<u8>);

    /// Read one element from the first `SIZE` bytes of `bytes`.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Element for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// Forward-only reader over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Take exactly `n` bytes, or nothing if fewer remain.
    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(out)
    }

    /// Take the longest prefix whose bytes satisfy `pred`, up to `limit` bytes.
    pub fn take_while(&mut self, limit: usize, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.pos < self.data.len() && self.pos - start < limit && pred(self.data[self.pos]) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Skip bytes satisfying `pred`; returns how many were skipped.
    pub fn skip_while(&mut self, pred: impl Fn(u8) -> bool) -> usize {
        self.take_while(usize::MAX, pred).len()
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
