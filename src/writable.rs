//! Writable adapter: an append-only sink with an optional lifetime byte limit.
//!
//! Bytes reach a [`WriteSink`] either directly through [`WriteSink::write`] or from
//! the async runtime through its [`AsyncWrite`] implementation. Both paths apply the
//! same limit check: a payload that does not fit is truncated to the bytes that do,
//! and the write fails with [`Error::BufferOverflow`]. Buffered bytes are taken out
//! from the front with [`get_contents`](WriteSink::get_contents).

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::AsyncWrite;

use crate::buffer::GrowableBuffer;
use crate::error::{Error, Result};
use crate::options::WritableOptions;

/// Text encoding used by [`WriteSink::get_contents_as_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8; invalid sequences become U+FFFD.
    #[default]
    Utf8,
    /// ISO-8859-1, one char per byte.
    Latin1,
    /// Lowercase hexadecimal, two chars per byte.
    Hex,
}

impl Encoding {
    /// Decodes `bytes` as text.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().copied().map(char::from).collect(),
            Self::Hex => hex::encode(bytes),
        }
    }
}

/// Builder for creating a [`WriteSink`] with custom options.
///
/// # Example
///
/// ```rust
/// use stream_buffers::WriteSink;
///
/// # fn main() -> stream_buffers::Result<()> {
/// let sink = WriteSink::builder()
///     .initial_size(62)
///     .increment_amount(321)
///     .limit(1024)
///     .build()?;
/// assert_eq!(sink.max_size(), 62);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct WriteSinkBuilder {
    options: WritableOptions,
}

impl WriteSinkBuilder {
    /// Creates a builder with the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial capacity of the backing buffer.
    #[must_use]
    pub const fn initial_size(mut self, initial_size: usize) -> Self {
        self.options.initial_size = initial_size;
        self
    }

    /// Sets the growth increment of the backing buffer.
    #[must_use]
    pub const fn increment_amount(mut self, increment_amount: usize) -> Self {
        self.options.increment_amount = increment_amount;
        self
    }

    /// Limits the total number of bytes the sink accepts over its lifetime.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Builds the sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if any option is zero.
    pub fn build(self) -> Result<WriteSink> {
        WriteSink::with_options(self.options)
    }
}

/// A writable sink over a growable in-memory buffer.
///
/// # Example
///
/// ```rust
/// use stream_buffers::{Encoding, WriteSink};
///
/// # fn main() -> stream_buffers::Result<()> {
/// let mut sink = WriteSink::new();
/// sink.write("This is ")?;
/// sink.write("a String!")?;
///
/// assert_eq!(sink.get_contents(Some(4)), "This");
/// assert_eq!(sink.get_contents_as_string(Encoding::Utf8, None), " is a String!");
/// assert!(sink.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct WriteSink {
    buffer: GrowableBuffer,
    limit: Option<usize>,
    /// Bytes accepted over the sink's lifetime, including ones already extracted.
    written: usize,
}

impl WriteSink {
    /// Creates an unbounded sink with the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::from_validated(WritableOptions::default())
    }

    /// Returns a builder for a sink with custom options.
    #[must_use]
    pub fn builder() -> WriteSinkBuilder {
        WriteSinkBuilder::new()
    }

    /// Creates a sink from explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if any option is zero.
    pub fn with_options(options: WritableOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_validated(options))
    }

    /// Creates a sink from a dynamic configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if any option is not a positive integer.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        WritableOptions::from_value(value).map(Self::from_validated)
    }

    fn from_validated(options: WritableOptions) -> Self {
        Self {
            buffer: GrowableBuffer::new(options.initial_size, options.increment_amount),
            limit: options.limit,
            written: 0,
        }
    }

    /// Appends `data`, truncated to what the limit still allows.
    ///
    /// Returns the number of bytes appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferOverflow`] if `data` did not fit entirely. The fitting
    /// prefix has been appended at that point and the rest is discarded.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> Result<usize> {
        let data = data.as_ref();
        let accepted = data.len().min(self.remaining());
        self.buffer.append(&data[..accepted]);
        self.written += accepted;

        if let Some(limit) = self.limit.filter(|_| accepted < data.len()) {
            let discarded = data.len() - accepted;
            tracing::warn!(limit, accepted, discarded, "write overflows the limit");
            return Err(Error::BufferOverflow {
                limit,
                accepted,
                discarded,
            });
        }
        tracing::trace!(len = accepted, size = self.buffer.len(), "buffered write");
        Ok(accepted)
    }

    /// Removes and returns up to `length` bytes (all if `None`) from the front.
    pub fn get_contents(&mut self, length: Option<usize>) -> Bytes {
        Bytes::from(self.buffer.extract(length))
    }

    /// Like [`get_contents`](Self::get_contents), decoded with `encoding`.
    pub fn get_contents_as_string(&mut self, encoding: Encoding, length: Option<usize>) -> String {
        encoding.decode(&self.buffer.extract(length))
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the capacity of the backing buffer.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.buffer.capacity()
    }

    /// Returns `true` if no bytes are buffered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the configured lifetime limit.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the number of bytes accepted so far.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }

    fn remaining(&self) -> usize {
        self.limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(self.written))
    }
}

impl Default for WriteSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncWrite for WriteSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(self.get_mut().write(buf).map_err(io::Error::from))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl fmt::Debug for WriteSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSink")
            .field("buffer", &self.buffer)
            .field("limit", &self.limit)
            .field("written", &self.written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DEFAULT_INCREMENT_AMOUNT, DEFAULT_INITIAL_SIZE};

    const SIMPLE: &str = "This is a String!";

    #[test]
    fn test_empty_sink() {
        let mut sink = WriteSink::new();
        assert!(sink.get_contents(None).is_empty());
        assert_eq!(sink.get_contents_as_string(Encoding::Utf8, None), "");
        assert_eq!(sink.max_size(), DEFAULT_INITIAL_SIZE);
        assert_eq!(sink.limit(), None);
    }

    #[test]
    fn test_write_simple_string() {
        let mut sink = WriteSink::new();
        assert_eq!(sink.write(SIMPLE).unwrap(), SIMPLE.len());
        assert_eq!(sink.size(), SIMPLE.len());
        assert_eq!(sink.max_size(), DEFAULT_INITIAL_SIZE);
        assert_eq!(sink.get_contents_as_string(Encoding::default(), None), SIMPLE);
    }

    #[test]
    fn test_partial_contents() {
        let mut sink = WriteSink::new();
        sink.write(SIMPLE).unwrap();
        let half = SIMPLE.len() / 2;

        let first = sink.get_contents_as_string(Encoding::Utf8, Some(half));
        assert_eq!(first, &SIMPLE[..half]);
        assert_eq!(sink.size(), SIMPLE.len() - half);

        let second = sink.get_contents_as_string(Encoding::Utf8, Some(SIMPLE.len() - half));
        assert_eq!(second, &SIMPLE[half..]);
        assert_eq!(sink.size(), 0);
    }

    #[test]
    fn test_large_blob_grows_once() {
        let mut sink = WriteSink::new();
        let blob: Vec<u8> = (0..=DEFAULT_INITIAL_SIZE).map(|i| (i % 256) as u8).collect();
        sink.write(&blob).unwrap();
        assert_eq!(sink.size(), blob.len());
        assert_eq!(
            sink.max_size(),
            DEFAULT_INITIAL_SIZE + DEFAULT_INCREMENT_AMOUNT
        );
        assert_eq!(sink.get_contents(None), blob);
    }

    #[test]
    fn test_custom_sizes() {
        let mut sink = WriteSink::builder()
            .initial_size(62)
            .increment_amount(321)
            .build()
            .unwrap();
        assert_eq!(sink.max_size(), 62);
        sink.write([0u8; 64]).unwrap();
        assert_eq!(sink.max_size(), 62 + 321);
    }

    #[test]
    fn test_overflow_single_write() {
        let limit = SIMPLE.len() - 1;
        let mut sink = WriteSink::builder().limit(limit).build().unwrap();
        let err = sink.write(SIMPLE).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferOverflow {
                accepted,
                discarded: 1,
                ..
            } if accepted == limit
        ));
        assert_eq!(sink.size(), limit);
        assert_eq!(sink.get_contents_as_string(Encoding::Utf8, None), &SIMPLE[..limit]);
    }

    #[test]
    fn test_overflow_two_writes() {
        let limit = SIMPLE.len() - 1;
        let mut sink = WriteSink::builder().limit(limit).build().unwrap();
        sink.write("This is ").unwrap();
        assert!(sink.write("a String!").unwrap_err().is_overflow());
        assert_eq!(sink.size(), limit);

        // the limit counts lifetime bytes, not buffered ones
        sink.get_contents(None);
        assert!(sink.write("x").unwrap_err().is_overflow());
        assert_eq!(sink.size(), 0);
        assert_eq!(sink.written(), limit);
    }

    #[test]
    fn test_write_up_to_limit_exactly() {
        let mut sink = WriteSink::builder().limit(4).build().unwrap();
        assert_eq!(sink.write("abcd").unwrap(), 4);
        assert_eq!(sink.write("").unwrap(), 0);
    }

    #[test]
    fn test_two_writes_concatenate() {
        let mut sink = WriteSink::new();
        sink.write(SIMPLE).unwrap();
        sink.write(SIMPLE).unwrap();
        assert_eq!(
            sink.get_contents_as_string(Encoding::Utf8, None),
            format!("{SIMPLE}{SIMPLE}")
        );
    }

    #[test]
    fn test_encodings() {
        let bytes = "½ + ¼".as_bytes();
        assert_eq!(Encoding::Utf8.decode(bytes), "½ + ¼");
        assert_eq!(Encoding::Latin1.decode(&[0xBD, b'!']), "½!");
        assert_eq!(Encoding::Hex.decode(&[0x00, 0xAB, 0xFF]), "00abff");
        // split inside a multi-byte sequence
        assert_eq!(Encoding::Utf8.decode(&bytes[..1]), "\u{FFFD}");
    }

    #[test]
    fn test_invalid_options() {
        assert!(WriteSink::builder().limit(0).build().is_err());
        assert!(WriteSink::builder().initial_size(0).build().is_err());
        assert!(WriteSink::from_value(serde_json::json!({ "limit": 1.5 })).is_err());
    }

    #[test]
    fn test_sink_debug() {
        let sink = WriteSink::new();
        let debug_str = format!("{sink:?}");
        assert!(debug_str.contains("WriteSink"));
        assert!(debug_str.contains("written"));
    }
}
