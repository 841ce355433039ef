//! Growable byte region shared by both stream adapters.
//!
//! This module provides [`GrowableBuffer`], a contiguous byte buffer that grows
//! in fixed increments and releases bytes only from its front.

use std::fmt;

/// A contiguous byte buffer that grows by a fixed increment.
///
/// The backing storage is always exactly `capacity` bytes long. Appends that do not
/// fit grow the storage by the smallest multiple of the increment that covers the
/// deficit; capacity never shrinks. Bytes are removed from the front with
/// [`extract`](Self::extract).
///
/// # Example
///
/// ```rust
/// use stream_buffers::GrowableBuffer;
///
/// let mut buffer = GrowableBuffer::new(4, 4);
/// buffer.append(b"hello");
/// assert_eq!(buffer.capacity(), 8);
///
/// assert_eq!(buffer.extract(Some(2)), b"he");
/// assert_eq!(buffer.as_slice(), b"llo");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct GrowableBuffer {
    /// Backing storage, `storage.len()` is the capacity.
    storage: Vec<u8>,

    /// Number of occupied bytes at the front of `storage`.
    size: usize,

    /// Bytes added to the capacity per growth step.
    increment: usize,
}

impl GrowableBuffer {
    /// Creates an empty buffer with `initial_size` bytes of capacity.
    ///
    /// Both sizes are expected to be non-zero; callers going through the option
    /// types get that checked at construction. A zero increment is treated as one.
    #[must_use]
    pub fn new(initial_size: usize, increment: usize) -> Self {
        Self {
            storage: vec![0; initial_size],
            size: 0,
            increment: increment.max(1),
        }
    }

    /// Returns the number of occupied bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if no bytes are buffered.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the size of the backing storage.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the growth increment.
    #[inline]
    #[must_use]
    pub const fn increment(&self) -> usize {
        self.increment
    }

    /// Returns the occupied bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.size]
    }

    /// Appends `bytes` after the occupied region, growing the storage if needed.
    pub fn append(&mut self, bytes: &[u8]) {
        let end = self.size + bytes.len();
        self.reserve_to(end);
        self.storage[self.size..end].copy_from_slice(bytes);
        self.size = end;
    }

    /// Removes and returns up to `max_len` bytes from the front.
    ///
    /// With `None`, or a length at least as large as the occupied size, all bytes are
    /// returned and the buffer becomes empty. The remaining bytes move to offset 0.
    pub fn extract(&mut self, max_len: Option<usize>) -> Vec<u8> {
        let n = max_len.map_or(self.size, |max| max.min(self.size));
        let out = self.storage[..n].to_vec();
        self.storage.copy_within(n..self.size, 0);
        self.size -= n;
        out
    }

    /// Grows the storage so that it holds at least `required` bytes.
    fn reserve_to(&mut self, required: usize) {
        let capacity = self.capacity();
        if required <= capacity {
            return;
        }
        let steps = (required - capacity).div_ceil(self.increment);
        // an increment too large to add in whole steps grows to exactly `required`
        let grown = steps
            .checked_mul(self.increment)
            .and_then(|extra| capacity.checked_add(extra))
            .unwrap_or(required);
        self.storage.resize(grown, 0);
        tracing::trace!(
            from = capacity,
            to = self.storage.len(),
            "grew buffer storage"
        );
    }
}

impl AsRef<[u8]> for GrowableBuffer {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for GrowableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowableBuffer")
            .field("size", &self.size)
            .field("capacity", &self.capacity())
            .field("increment", &self.increment)
            .finish_non_exhaustive()
    }
}
