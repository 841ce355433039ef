//! # stream-buffers
//!
//! In-memory, dynamically growing byte buffers exposed as async stream endpoints.
//! Useful for buffering, for tests, and for bridging push-based producers with
//! pull-based consumers.
//!
//! ## Features
//!
//! - **Increment-based growth**: [`GrowableBuffer`] grows by a fixed, caller-tunable
//!   increment instead of doubling, and never shrinks
//! - **Readable source**: [`ReadSource`] is a [`futures::Stream`] of [`bytes::Bytes`]
//!   chunks emitted on a tokio timer, with pause/resume and backpressure
//! - **Writable sink**: [`WriteSink`] implements [`tokio::io::AsyncWrite`] and
//!   enforces an optional lifetime byte limit
//! - **Strict options**: numeric options must be positive integers; floats, strings
//!   and objects in a configuration value are rejected, never coerced
//!
//! ## Example
//!
//! ```rust
//! use futures::StreamExt;
//! use stream_buffers::{ReadSource, WriteSink};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> stream_buffers::Result<()> {
//! let mut source = ReadSource::builder().chunk_size(2).build()?;
//! source.put("½ + ¼ = ¾")?;
//! source.stop()?;
//!
//! let mut sink = WriteSink::new();
//! while let Some(chunk) = source.next().await {
//!     sink.write(chunk?)?;
//! }
//! assert_eq!(sink.get_contents(None), "½ + ¼ = ¾");
//! # Ok(())
//! # }
//! ```
//!
//! ## Limits
//!
//! ```rust
//! use stream_buffers::{Error, WriteSink};
//!
//! let mut sink = WriteSink::builder().limit(8).build().unwrap();
//! let err = sink.write("0123456789").unwrap_err();
//! assert!(matches!(err, Error::BufferOverflow { accepted: 8, discarded: 2, .. }));
//! assert_eq!(sink.size(), 8);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod buffer;
mod error;
mod options;
mod readable;
mod writable;

pub use buffer::GrowableBuffer;
pub use error::{Error, Result};
pub use options::{
    DEFAULT_CHUNK_SIZE, DEFAULT_FREQUENCY, DEFAULT_FREQUENCY_MS, DEFAULT_INCREMENT_AMOUNT,
    DEFAULT_INITIAL_SIZE, ReadableOptions, WritableOptions,
};
pub use readable::{Downstream, ReadHandle, ReadSource, ReadSourceBuilder, ReadState};
pub use writable::{Encoding, WriteSink, WriteSinkBuilder};
