//! Readable adapter: a growable buffer drained in timed chunks.
//!
//! A [`ReadSource`] is filled by a producer through [`put`](ReadHandle::put) and
//! drained by a consumer, either by polling it as a [`Stream`] or by driving a
//! [`Downstream`] with [`pipe_to`](ReadSource::pipe_to). Every `frequency` the source
//! slices at most `chunk_size` bytes off the front of its buffer and emits them.
//!
//! Producers that live apart from the consumer get a [`ReadHandle`] through
//! [`ReadSource::handle`]; all handles share the same buffer and state.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker, ready};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{FusedStream, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::buffer::GrowableBuffer;
use crate::error::{Error, Result};
use crate::options::ReadableOptions;

/// Observable state of a [`ReadSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Accepting data and emitting chunks.
    Active,
    /// Accepting data, emission suspended until resumed.
    Paused,
    /// No more data accepted; buffered bytes still drain, then end-of-data is emitted.
    Stopped,
    /// No more data accepted or emitted; the consumer receives an error.
    Errored,
}

impl ReadState {
    /// Returns `true` for [`Stopped`](Self::Stopped) and [`Errored`](Self::Errored).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }
}

impl fmt::Display for ReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        })
    }
}

/// Consumer side of the push contract.
///
/// [`ReadSource::pipe_to`] hands every chunk to [`push`](Self::push). Returning
/// `false` signals backpressure: the source pauses and emits nothing more until
/// [`ReadHandle::resume`] is called.
pub trait Downstream {
    /// Receives the next chunk. Returns whether more chunks are wanted.
    fn push(&mut self, chunk: Bytes) -> bool;

    /// Called once after the last chunk of a stopped source.
    fn end(&mut self) {}

    /// Called once when the producer signalled an error, before
    /// [`ReadSource::pipe_to`] returns it.
    fn error(&mut self, _err: &Error) {}
}

impl Downstream for Vec<Bytes> {
    fn push(&mut self, chunk: Bytes) -> bool {
        Vec::push(self, chunk);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    Stopped,
    Errored,
}

/// What the consumer side should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Emit,
    Wait,
    End,
    Fail,
}

/// State shared between a [`ReadSource`] and its handles.
struct Inner {
    buffer: GrowableBuffer,
    lifecycle: Lifecycle,
    paused: bool,
    /// Task parked on an empty or paused source.
    waker: Option<Waker>,
}

impl Inner {
    fn state(&self) -> ReadState {
        match self.lifecycle {
            Lifecycle::Errored => ReadState::Errored,
            Lifecycle::Stopped => ReadState::Stopped,
            Lifecycle::Open if self.paused => ReadState::Paused,
            Lifecycle::Open => ReadState::Active,
        }
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.lifecycle == Lifecycle::Open {
            return Ok(());
        }
        Err(Error::InvalidState {
            operation,
            state: self.state(),
        })
    }

    fn next_step(&self) -> Step {
        match self.lifecycle {
            Lifecycle::Errored => Step::Fail,
            _ if self.paused => Step::Wait,
            Lifecycle::Stopped if self.buffer.is_empty() => Step::End,
            Lifecycle::Open if self.buffer.is_empty() => Step::Wait,
            _ => Step::Emit,
        }
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// Producer-side handle to a [`ReadSource`].
///
/// Cloning is cheap; all clones operate on the same buffer.
#[derive(Clone)]
pub struct ReadHandle {
    inner: Arc<Mutex<Inner>>,
}

impl ReadHandle {
    /// Appends `data` to the buffer. String data is appended as its UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the source is stopped or errored.
    pub fn put(&self, data: impl AsRef<[u8]>) -> Result<()> {
        let data = data.as_ref();
        let mut inner = self.inner.lock();
        inner.ensure_open("put")?;
        inner.buffer.append(data);
        tracing::trace!(
            len = data.len(),
            size = inner.buffer.len(),
            capacity = inner.buffer.capacity(),
            "buffered data"
        );
        inner.wake();
        Ok(())
    }

    /// Stops accepting data. Buffered bytes still drain before end-of-data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the source is already stopped or errored.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open("stop")?;
        inner.lifecycle = Lifecycle::Stopped;
        tracing::debug!(remaining = inner.buffer.len(), "read source stopped");
        inner.wake();
        Ok(())
    }

    /// Puts the source into the errored state.
    ///
    /// The consumer's next read yields [`Error::Upstream`], after which nothing
    /// more is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the source is already stopped or errored.
    pub fn error(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open("error")?;
        inner.lifecycle = Lifecycle::Errored;
        tracing::debug!(discarded = inner.buffer.len(), "read source errored");
        inner.wake();
        Ok(())
    }

    /// Suspends emission. Data can still be put while paused.
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            inner.paused = true;
            tracing::debug!(size = inner.buffer.len(), "read source paused");
        }
    }

    /// Resumes emission after [`pause`](Self::pause) or downstream backpressure.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if inner.paused {
            inner.paused = false;
            tracing::debug!(size = inner.buffer.len(), "read source resumed");
            inner.wake();
        }
    }

    /// Returns the number of buffered bytes not yet emitted.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    /// Returns the capacity of the backing buffer.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.inner.lock().buffer.capacity()
    }

    /// Returns `true` if no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().buffer.is_empty()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ReadState {
        self.inner.lock().state()
    }
}

impl fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ReadHandle")
            .field("state", &inner.state())
            .field("buffer", &inner.buffer)
            .finish()
    }
}

/// Builder for creating a [`ReadSource`] with custom options.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use stream_buffers::ReadSource;
///
/// # fn main() -> stream_buffers::Result<()> {
/// let source = ReadSource::builder()
///     .chunk_size(2)
///     .frequency(Duration::from_millis(300))
///     .build()?;
/// assert_eq!(source.chunk_size(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReadSourceBuilder {
    options: ReadableOptions,
}

impl ReadSourceBuilder {
    /// Creates a builder with the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of bytes emitted per tick.
    #[must_use]
    pub const fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.options.chunk_size = chunk_size;
        self
    }

    /// Sets the interval between emission ticks, truncated to whole milliseconds.
    #[must_use]
    pub fn frequency(mut self, frequency: Duration) -> Self {
        self.options.frequency = u64::try_from(frequency.as_millis()).unwrap_or(u64::MAX);
        self
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

    /// Builds the source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if any option is zero.
    pub fn build(self) -> Result<ReadSource> {
        ReadSource::with_options(self.options)
    }
}

/// A readable stream over a growable in-memory buffer.
///
/// Polling the source as a [`Stream`] yields `Ok` chunks of at most
/// [`chunk_size`](Self::chunk_size) bytes, one per tick, in the order they were put.
/// While the buffer is empty the stream stays pending; it ends only after
/// [`stop`](Self::stop) once everything has drained. After [`error`](Self::error)
/// it yields a single [`Error::Upstream`] and then ends.
///
/// The tick timer is created on first poll, so the stream must be polled inside a
/// tokio runtime with the time driver enabled.
///
/// # Example
///
/// ```rust
/// use futures::StreamExt;
/// use stream_buffers::ReadSource;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> stream_buffers::Result<()> {
/// let mut source = ReadSource::builder().chunk_size(4).build()?;
/// source.put("hello world")?;
/// source.stop()?;
///
/// let mut chunks = Vec::new();
/// while let Some(chunk) = source.next().await {
///     chunks.push(chunk?);
/// }
/// assert_eq!(chunks, ["hell", "o wo", "rld"]);
/// # Ok(())
/// # }
/// ```
pub struct ReadSource {
    handle: ReadHandle,
    chunk_size: usize,
    frequency: Duration,
    ticker: Option<Interval>,
    /// Set while parked on an empty or paused buffer; the ticker restarts on wake.
    idle: bool,
    finished: bool,
}

impl ReadSource {
    /// Creates a source with the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::from_validated(ReadableOptions::default())
    }

    /// Returns a builder for a source with custom options.
    #[must_use]
    pub fn builder() -> ReadSourceBuilder {
        ReadSourceBuilder::new()
    }

    /// Creates a source from explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if any option is zero.
    pub fn with_options(options: ReadableOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_validated(options))
    }

    /// Creates a source from a dynamic configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if any option is not a positive integer.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        ReadableOptions::from_value(value).map(Self::from_validated)
    }

    fn from_validated(options: ReadableOptions) -> Self {
        let inner = Inner {
            buffer: GrowableBuffer::new(options.initial_size, options.increment_amount),
            lifecycle: Lifecycle::Open,
            paused: false,
            waker: None,
        };
        Self {
            handle: ReadHandle {
                inner: Arc::new(Mutex::new(inner)),
            },
            chunk_size: options.chunk_size,
            frequency: options.frequency(),
            ticker: None,
            idle: false,
            finished: false,
        }
    }

    /// Returns a producer handle sharing this source's buffer.
    #[must_use]
    pub fn handle(&self) -> ReadHandle {
        self.handle.clone()
    }

    /// Returns the maximum number of bytes emitted per tick.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the interval between emission ticks.
    #[must_use]
    pub const fn frequency(&self) -> Duration {
        self.frequency
    }

    /// See [`ReadHandle::put`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the source is stopped or errored.
    pub fn put(&self, data: impl AsRef<[u8]>) -> Result<()> {
        self.handle.put(data)
    }

    /// See [`ReadHandle::stop`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the source is already stopped or errored.
    pub fn stop(&self) -> Result<()> {
        self.handle.stop()
    }

    /// See [`ReadHandle::error`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the source is already stopped or errored.
    pub fn error(&self) -> Result<()> {
        self.handle.error()
    }

    /// See [`ReadHandle::pause`].
    pub fn pause(&self) {
        self.handle.pause();
    }

    /// See [`ReadHandle::resume`].
    pub fn resume(&self) {
        self.handle.resume();
    }

    /// Returns the number of buffered bytes not yet emitted.
    #[must_use]
    pub fn size(&self) -> usize {
        self.handle.size()
    }

    /// Returns the capacity of the backing buffer.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.handle.max_size()
    }

    /// Returns `true` if no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ReadState {
        self.handle.state()
    }

    /// Emits every chunk into `downstream` until end-of-data or an error.
    ///
    /// When `downstream` returns `false` from [`Downstream::push`] the source pauses
    /// and this future waits until [`ReadHandle::resume`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] when the producer signalled an error, after handing
    /// it to [`Downstream::error`]. [`Downstream::end`] is not called in that case.
    pub async fn pipe_to<D>(&mut self, downstream: &mut D) -> Result<()>
    where
        D: Downstream + ?Sized,
    {
        while let Some(item) = self.next().await {
            match item {
                Ok(chunk) => {
                    if !downstream.push(chunk) {
                        tracing::debug!("downstream signalled backpressure");
                        self.handle.pause();
                    }
                }
                Err(err) => {
                    downstream.error(&err);
                    return Err(err);
                }
            }
        }
        downstream.end();
        Ok(())
    }

    fn ticker(&mut self) -> &mut Interval {
        let frequency = self.frequency;
        self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval_at(Instant::now() + frequency, frequency);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        })
    }
}

impl Default for ReadSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for ReadSource {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            {
                let mut inner = this.handle.inner.lock();
                match inner.next_step() {
                    Step::Emit => {}
                    Step::Wait => {
                        inner.waker = Some(cx.waker().clone());
                        this.idle = true;
                        return Poll::Pending;
                    }
                    Step::End => {
                        this.finished = true;
                        tracing::debug!("read source reached end of data");
                        return Poll::Ready(None);
                    }
                    Step::Fail => {
                        this.finished = true;
                        return Poll::Ready(Some(Err(Error::Upstream)));
                    }
                }
            }

            let resumed = std::mem::take(&mut this.idle);
            let ticker = this.ticker();
            if resumed {
                ticker.reset();
            }
            ready!(ticker.poll_tick(cx));

            let mut inner = this.handle.inner.lock();
            if inner.next_step() == Step::Emit {
                let chunk = Bytes::from(inner.buffer.extract(Some(this.chunk_size)));
                tracing::trace!(
                    len = chunk.len(),
                    remaining = inner.buffer.len(),
                    "emitting chunk"
                );
                return Poll::Ready(Some(Ok(chunk)));
            }
        }
    }
}

impl FusedStream for ReadSource {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl fmt::Debug for ReadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSource")
            .field("handle", &self.handle)
            .field("chunk_size", &self.chunk_size)
            .field("frequency", &self.frequency)
            .finish_non_exhaustive()
    }
}
