//! Error type shared by the buffers and both stream adapters.
//!
//! Synchronous calls return [`Error`] directly. Errors that cross the
//! [`AsyncWrite`](tokio::io::AsyncWrite) boundary are wrapped in a
//! [`std::io::Error`] and can be recovered with [`Error::from_io`].

use std::io::{self, ErrorKind};

use crate::readable::ReadState;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by [`ReadSource`](crate::ReadSource) and
/// [`WriteSink`](crate::WriteSink).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A construction option had the wrong type or an out-of-range value.
    ///
    /// Raised before any buffer is allocated.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// An operation was attempted on a source that is already stopped or errored.
    #[error("cannot {operation} a read source that is {state}")]
    InvalidState {
        /// The rejected operation (`put`, `stop` or `error`).
        operation: &'static str,
        /// The state the source was in.
        state: ReadState,
    },

    /// A write would have exceeded the configured byte limit.
    ///
    /// The bytes that fit were written; the remaining `discarded` bytes were dropped.
    #[error("stream overflows the limit of {limit} bytes ({discarded} bytes discarded)")]
    BufferOverflow {
        /// The configured limit.
        limit: usize,
        /// Bytes of the offending payload that were accepted.
        accepted: usize,
        /// Bytes of the offending payload that were dropped.
        discarded: usize,
    },

    /// The producer signalled an error through [`ReadHandle::error`](crate::ReadHandle::error).
    #[error("upstream producer signalled an error")]
    Upstream,
}

impl Error {
    /// Returns `true` for [`Error::BufferOverflow`].
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        matches!(self, Self::BufferOverflow { .. })
    }

    /// Recovers the crate error carried inside an [`io::Error`], if any.
    #[must_use]
    pub fn from_io(err: &io::Error) -> Option<&Self> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidOption(_) => Self::new(ErrorKind::InvalidInput, err),
            _ => Self::other(err),
        }
    }
}
