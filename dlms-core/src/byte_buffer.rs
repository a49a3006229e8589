//! Random-access growable byte buffer used by every codec layer
//!
//! A [`ByteBuffer`] tracks three quantities: the allocated `capacity`, the
//! logical `size` (number of valid bytes) and the read `position`. The
//! relation `0 <= position <= size <= capacity` always holds.
//!
//! All multi-byte integers are big-endian, as required by A-XDR and BER.

use crate::error::{DlmsError, DlmsResult};
use crate::helpers;
use bytes::Bytes;
use std::fmt;

/// Smallest capacity allocated when the buffer first grows.
const MIN_CAPACITY: usize = 10;

/// Growable byte buffer with a read cursor
#[derive(Clone, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    size: usize,
    position: usize,
}

macro_rules! push_be {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Append a big-endian `", stringify!($ty), "`.")]
        pub fn $name(&mut self, value: $ty) {
            self.push_slice(&value.to_be_bytes());
        }
    };
}

macro_rules! pop_be {
    ($name:ident, $ty:ty, $n:expr) => {
        #[doc = concat!("Read a big-endian `", stringify!($ty), "` and advance the cursor.")]
        pub fn $name(&mut self) -> DlmsResult<$ty> {
            let mut raw = [0u8; $n];
            raw.copy_from_slice(self.pop_slice($n)?);
            Ok(<$ty>::from_be_bytes(raw))
        }
    };
}

macro_rules! get_be {
    ($name:ident, $ty:ty, $n:expr) => {
        #[doc = concat!("Read a big-endian `", stringify!($ty), "` at `index` without moving the cursor.")]
        pub fn $name(&self, index: usize) -> DlmsResult<$ty> {
            self.check_read(index, $n)?;
            let mut raw = [0u8; $n];
            raw.copy_from_slice(&self.data[index..index + $n]);
            Ok(<$ty>::from_be_bytes(raw))
        }
    };
}

macro_rules! set_be {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Write a big-endian `", stringify!($ty), "` at `index`, growing if needed.")]
        pub fn $name(&mut self, index: usize, value: $ty) {
            self.set_slice_at(index, &value.to_be_bytes());
        }
    };
}

impl ByteBuffer {
    /// Create an empty buffer. Nothing is allocated until the first write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with `capacity` bytes preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            size: 0,
            position: 0,
        }
    }

    /// Create a buffer holding a copy of `bytes`, cursor at zero.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            size: bytes.len(),
            position: 0,
        }
    }

    /// Create a buffer by parsing a hex string. See [`helpers::hex_to_bytes`].
    pub fn from_hex(hex: &str) -> DlmsResult<Self> {
        Ok(Self::from(helpers::hex_to_bytes(hex)?))
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Resize the backing storage. Shrinking below `size` truncates the
    /// logical content and clamps the cursor.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.data.resize(capacity, 0);
        if self.size > capacity {
            self.size = capacity;
        }
        if self.position > self.size {
            self.position = self.size;
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Set the logical size, growing capacity when needed.
    pub fn set_size(&mut self, size: usize) {
        if size > self.capacity() {
            self.ensure_capacity(size);
        }
        self.size = size;
        if self.position > size {
            self.position = size;
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the read cursor. Fails if `position > size`.
    pub fn set_position(&mut self, position: usize) -> DlmsResult<()> {
        if position > self.size {
            return Err(DlmsError::IndexOutOfRange {
                position,
                requested: 0,
                size: self.size,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Number of unread bytes.
    pub fn available(&self) -> usize {
        self.size - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Drop all content. Capacity is retained.
    pub fn clear(&mut self) {
        self.size = 0;
        self.position = 0;
    }

    /// All valid bytes, independent of the cursor.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Unread bytes, from the cursor to the end.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.position..self.size]
    }

    /// Copy out the valid bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data().to_vec()
    }

    fn ensure_capacity(&mut self, required: usize) {
        let current = self.capacity();
        if required <= current {
            return;
        }
        let mut next = current.max(MIN_CAPACITY);
        while next < required {
            next *= 2;
        }
        self.data.resize(next, 0);
    }

    fn check_read(&self, index: usize, count: usize) -> DlmsResult<()> {
        if index + count > self.size {
            return Err(DlmsError::IndexOutOfRange {
                position: index,
                requested: count,
                size: self.size,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Sequential writes
    // ---------------------------------------------------------------

    pub fn push_u8(&mut self, value: u8) {
        self.ensure_capacity(self.size + 1);
        self.data[self.size] = value;
        self.size += 1;
    }

    pub fn push_i8(&mut self, value: i8) {
        self.push_u8(value as u8);
    }

    push_be!(push_u16, u16);
    push_be!(push_i16, i16);
    push_be!(push_u32, u32);
    push_be!(push_i32, i32);
    push_be!(push_u64, u64);
    push_be!(push_i64, i64);
    push_be!(push_f32, f32);
    push_be!(push_f64, f64);

    /// Append raw bytes.
    pub fn push_slice(&mut self, bytes: &[u8]) {
        let end = self.size + bytes.len();
        self.ensure_capacity(end);
        self.data[self.size..end].copy_from_slice(bytes);
        self.size = end;
    }

    /// Append the unread region of `other` without touching its cursor.
    pub fn push_buffer(&mut self, other: &ByteBuffer) {
        self.push_slice(other.remaining());
    }

    /// Append the unread region of `other` and mark it consumed.
    pub fn take_from(&mut self, other: &mut ByteBuffer) {
        self.push_slice(other.remaining());
        other.position = other.size;
    }

    // ---------------------------------------------------------------
    // Sequential reads
    // ---------------------------------------------------------------

    pub fn pop_u8(&mut self) -> DlmsResult<u8> {
        self.check_read(self.position, 1)?;
        let value = self.data[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn pop_i8(&mut self) -> DlmsResult<i8> {
        Ok(self.pop_u8()? as i8)
    }

    pop_be!(pop_u16, u16, 2);
    pop_be!(pop_i16, i16, 2);
    pop_be!(pop_u32, u32, 4);
    pop_be!(pop_i32, i32, 4);
    pop_be!(pop_u64, u64, 8);
    pop_be!(pop_i64, i64, 8);
    pop_be!(pop_f32, f32, 4);
    pop_be!(pop_f64, f64, 8);

    /// Borrow the next `count` bytes and advance the cursor past them.
    pub fn pop_slice(&mut self, count: usize) -> DlmsResult<&[u8]> {
        self.check_read(self.position, count)?;
        let start = self.position;
        self.position += count;
        Ok(&self.data[start..start + count])
    }

    /// Like [`pop_slice`](Self::pop_slice) but returns an owned copy.
    pub fn pop_vec(&mut self, count: usize) -> DlmsResult<Vec<u8>> {
        self.pop_slice(count).map(<[u8]>::to_vec)
    }

    // ---------------------------------------------------------------
    // Random access
    // ---------------------------------------------------------------

    pub fn get_u8_at(&self, index: usize) -> DlmsResult<u8> {
        self.check_read(index, 1)?;
        Ok(self.data[index])
    }

    get_be!(get_u16_at, u16, 2);
    get_be!(get_u32_at, u32, 4);
    get_be!(get_u64_at, u64, 8);

    pub fn set_u8_at(&mut self, index: usize, value: u8) {
        self.set_slice_at(index, &[value]);
    }

    set_be!(set_u16_at, u16);
    set_be!(set_u32_at, u32);
    set_be!(set_u64_at, u64);

    /// Overwrite bytes starting at `index`. Size grows to cover the write.
    pub fn set_slice_at(&mut self, index: usize, bytes: &[u8]) {
        let end = index + bytes.len();
        self.ensure_capacity(end);
        self.data[index..end].copy_from_slice(bytes);
        if end > self.size {
            self.size = end;
        }
    }

    /// Insert `bytes` at `index`, shifting the tail right.
    pub fn insert_at(&mut self, index: usize, bytes: &[u8]) -> DlmsResult<()> {
        if index > self.size {
            return Err(DlmsError::IndexOutOfRange {
                position: index,
                requested: bytes.len(),
                size: self.size,
            });
        }
        let count = bytes.len();
        self.ensure_capacity(self.size + count);
        self.data.copy_within(index..self.size, index + count);
        self.data[index..index + count].copy_from_slice(bytes);
        self.size += count;
        Ok(())
    }

    /// Borrow `count` bytes starting at `index`.
    pub fn sub_array(&self, index: usize, count: usize) -> DlmsResult<&[u8]> {
        self.check_read(index, count)?;
        Ok(&self.data[index..index + count])
    }

    /// Compare `expected` against the bytes at the cursor. The cursor moves
    /// past them only on a match.
    pub fn compare(&mut self, expected: &[u8]) -> bool {
        if self.available() < expected.len() {
            return false;
        }
        let matches = &self.data[self.position..self.position + expected.len()] == expected;
        if matches {
            self.position += expected.len();
        }
        matches
    }

    /// Discard the already-read prefix.
    pub fn trim(&mut self) {
        if self.position == 0 {
            return;
        }
        self.data.copy_within(self.position..self.size, 0);
        self.size -= self.position;
        self.position = 0;
    }

    // ---------------------------------------------------------------
    // BER object count
    // ---------------------------------------------------------------

    /// Append a BER object count (length).
    pub fn set_object_count(&mut self, count: usize) {
        let mut tmp = Vec::with_capacity(5);
        helpers::set_object_count(count, &mut tmp);
        self.push_slice(&tmp);
    }

    /// Read a BER object count.
    pub fn get_object_count(&mut self) -> DlmsResult<usize> {
        let start = self.position;
        let first = self.pop_u8()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let result = match first {
            0x81 => self.pop_u8().map(usize::from),
            0x82 => self.pop_u16().map(usize::from),
            0x83 => {
                let hi = self.pop_u8()? as usize;
                self.pop_u16().map(|lo| (hi << 16) | lo as usize)
            }
            0x84 => self.pop_u32().map(|v| v as usize),
            other => {
                self.position = start;
                return Err(DlmsError::malformed(
                    start,
                    format!("invalid object count prefix 0x{:02X}", other),
                ));
            }
        };
        if result.is_err() {
            self.position = start;
        }
        result
    }

    /// Insert a BER object count at `index`, returning the number of bytes written.
    pub fn insert_object_count(&mut self, index: usize, count: usize) -> DlmsResult<usize> {
        let mut tmp = Vec::with_capacity(5);
        helpers::set_object_count(count, &mut tmp);
        self.insert_at(index, &tmp)?;
        Ok(tmp.len())
    }

    // ---------------------------------------------------------------
    // Formatting
    // ---------------------------------------------------------------

    /// Hex dump of `count` bytes starting at `index`.
    pub fn to_hex(&self, add_space: bool, index: usize, count: usize) -> DlmsResult<String> {
        Ok(helpers::to_hex(self.sub_array(index, count)?, add_space))
    }

    /// Freeze the valid bytes into a shared [`Bytes`] handle.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.data())
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            data,
            size,
            position: 0,
        }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl From<Bytes> for ByteBuffer {
    fn from(data: Bytes) -> Self {
        Self::from_slice(&data)
    }
}

impl From<ByteBuffer> for Bytes {
    fn from(buffer: ByteBuffer) -> Self {
        let mut data = buffer.data;
        data.truncate(buffer.size);
        Bytes::from(data)
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data() && self.position == other.position
    }
}

impl Eq for ByteBuffer {}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl fmt::Display for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&helpers::to_hex(self.data(), true))
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("size", &self.size)
            .field("position", &self.position)
            .field("capacity", &self.capacity())
            .field("data", &helpers::to_hex(self.data(), true))
            .finish()
    }
}
