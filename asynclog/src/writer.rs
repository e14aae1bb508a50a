// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::VecDeque,
    fmt, io,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError, Weak,
        atomic::{AtomicU8, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use asynclog_core::config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_DROP_SUMMARY_TEMPLATE, DEFAULT_FLUSH_TIMEOUT_MS,
    DEFAULT_THREAD_NAME,
};
use smallvec::SmallVec;

use crate::{
    AsyncLogConfig, Decorations, Level, SharedOutput,
    buffer::AsyncLogBuffer,
    message::{AsyncLogMessage, record_footprint},
    rate_limit::rate_limited,
    stats::{Counters, DropCounters, DropSnapshot, DropSummary, WriterStats},
};

/// Builder for [`AsyncLogWriter`]
pub struct AsyncLogBuilder {
    buffer_size: usize,
    capacity: Option<usize>,
    flush_timeout: Duration,
    thread_name: String,
    drop_summary_template: String,
}

impl Default for AsyncLogBuilder {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            capacity: None,
            flush_timeout: Duration::from_millis(DEFAULT_FLUSH_TIMEOUT_MS),
            thread_name: DEFAULT_THREAD_NAME.into(),
            drop_summary_template: DEFAULT_DROP_SUMMARY_TEMPLATE.into(),
        }
    }
}

impl AsyncLogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from a loaded [`AsyncLogConfig`], validating it.
    pub fn from_config(config: &AsyncLogConfig) -> Result<Self, BuildError> {
        if config.buffer_size == 0 {
            return Err(BuildError::InvalidConfig("buffer_size must not be zero"));
        }
        if config.max_records == Some(0) {
            return Err(BuildError::InvalidConfig("max_records must not be zero"));
        }
        if config.flush_timeout_ms == 0 || config.flush_timeout_ms >= 60_000 {
            return Err(BuildError::InvalidConfig(
                "flush_timeout_ms must be in the range (0, 60000)",
            ));
        }
        if config.thread_name.is_empty() {
            return Err(BuildError::InvalidConfig("thread_name must not be empty"));
        }
        Ok(Self {
            buffer_size: config.buffer_size,
            capacity: config.max_records,
            flush_timeout: Duration::from_millis(config.flush_timeout_ms),
            thread_name: config.thread_name.clone(),
            drop_summary_template: config.drop_summary_template.clone(),
        })
    }

    /// Sets the memory budget, in bytes, for buffered records.
    ///
    /// Defaults to 2 MiB. The record capacity is the budget divided by [`record_footprint`], which assumes messages
    /// of about 512 bytes. Messages that don't fit once the buffer is at capacity are dropped and reported later.
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        assert!(bytes > 0, "buffer_size must not be zero");
        self.buffer_size = bytes;
        self
    }

    /// Sets the number of records that can be buffered, overriding the capacity derived from
    /// [`AsyncLogBuilder::buffer_size`].
    pub fn capacity(mut self, records: usize) -> Self {
        assert!(records > 0, "capacity must not be zero");
        self.capacity = Some(records);
        self
    }

    /// Sets how long the background thread sleeps before draining a buffer that is less than 3/4 full.
    ///
    /// Defaults to 500 ms. This bounds how long a record can sit in the buffer when little is being logged.
    pub fn flush_timeout(mut self, flush_timeout: Duration) -> Self {
        assert!(
            Duration::ZERO < flush_timeout && flush_timeout < Duration::from_secs(60),
            "flush_timeout must be in the range (0, 1 minute), not {flush_timeout:?}"
        );
        self.flush_timeout = flush_timeout;
        self
    }

    /// Thread name assigned to the background thread.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty());
        self.thread_name = name;
        self
    }

    /// Text of the record written to an output after messages to it were dropped. `{count}` is replaced by the
    /// number of dropped messages.
    ///
    /// Defaults to `{count} messages dropped due to async logging`.
    pub fn drop_summary_template(mut self, template: impl Into<String>) -> Self {
        self.drop_summary_template = template.into();
        self
    }

    /// The number of records the writer will buffer.
    pub fn record_capacity(&self) -> usize {
        self.capacity
            .unwrap_or(self.buffer_size / record_footprint())
    }

    /// Start the background thread.
    ///
    /// Returns the [`AsyncLogWriter`] producers log through, and an [`AsyncLogJoinHandle`] that shuts the background
    /// thread down, after writing every accepted record, when dropped.
    pub fn build(self) -> Result<(AsyncLogWriter, AsyncLogJoinHandle), BuildError> {
        let capacity = self.record_capacity();
        if capacity == 0 {
            return Err(BuildError::ZeroCapacity {
                buffer_size: self.buffer_size,
            });
        }

        let inner = Arc::new(Inner {
            monitor: Mutex::new(Monitor {
                buffer: AsyncLogBuffer::new(capacity),
                drops: DropCounters::default(),
                wake_requested: false,
            }),
            wakeup: Condvar::new(),
            state: AtomicState::new(),
            counters: Counters::default(),
            summary: DropSummary::new(self.drop_summary_template),
            flush_timeout: self.flush_timeout,
            capacity,
            name: self.thread_name.clone(),
        });

        let flusher = Flusher {
            inner: Arc::clone(&inner),
            drained: VecDeque::new(),
        };
        let handle = thread::Builder::new()
            .name(self.thread_name)
            .spawn(move || flusher.run())
            .map_err(BuildError::Spawn)?;

        Ok((
            AsyncLogWriter(Arc::clone(&inner)),
            AsyncLogJoinHandle {
                handle: Some(handle),
                inner: Arc::downgrade(&inner),
            },
        ))
    }
}

/// The error returned by [`AsyncLogBuilder::build`] and [`AsyncLogBuilder::from_config`].
#[derive(Debug)]
pub enum BuildError {
    /// A configuration value is out of range.
    InvalidConfig(&'static str),
    /// The memory budget is too small to hold a single record.
    ZeroCapacity {
        /// The configured memory budget.
        buffer_size: usize,
    },
    /// The background thread couldn't be started.
    Spawn(io::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(reason) => write!(f, "invalid async log configuration: {reason}"),
            Self::ZeroCapacity { buffer_size } => write!(
                f,
                "async log buffer of {buffer_size} bytes can't hold a single record of {} bytes",
                record_footprint()
            ),
            Self::Spawn(err) => write!(f, "couldn't start async log writer thread: {err}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

/// Returned when logging through a writer whose background thread has terminated.
///
/// Nothing was buffered. Callers typically fall back to writing synchronously.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterClosed;

impl fmt::Display for WriterClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("async log writer has terminated")
    }
}

impl std::error::Error for WriterClosed {}

/// Lifecycle of the background thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WriterState {
    /// Draining the buffer whenever woken up.
    Running = 0,
    /// Asked to stop; will do one last pass over the buffer.
    Terminating = 1,
    /// Stopped. Nothing is accepted anymore.
    Terminated = 2,
}

struct AtomicState(AtomicU8);

impl AtomicState {
    fn new() -> Self {
        Self(AtomicU8::new(WriterState::Running as u8))
    }

    fn load(&self) -> WriterState {
        match self.0.load(Ordering::Acquire) {
            0 => WriterState::Running,
            1 => WriterState::Terminating,
            _ => WriterState::Terminated,
        }
    }

    fn store(&self, state: WriterState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Running -> Terminating. Returns false if the state was anything else.
    fn begin_terminating(&self) -> bool {
        self.0
            .compare_exchange(
                WriterState::Running as u8,
                WriterState::Terminating as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

// Everything the monitor lock guards.
struct Monitor {
    buffer: AsyncLogBuffer<AsyncLogMessage>,
    drops: DropCounters,
    // set by flush requests and lifecycle transitions, cleared by the drain that follows
    wake_requested: bool,
}

struct Inner {
    monitor: Mutex<Monitor>,
    // signalled when the buffer reaches its wake threshold or someone requests a wake-up
    wakeup: Condvar,
    // only moves to Terminated while holding the monitor lock, except on abort
    state: AtomicState,
    counters: Counters,
    summary: DropSummary,
    flush_timeout: Duration,
    capacity: usize,
    name: String,
}

/// Handle producers use to log through the background writer.
///
/// Cloning is cheap and still appends to the same shared buffer. Appending never waits for IO: it holds the writer
/// lock only long enough to push one record, or to count a drop when the buffer is full.
///
/// Once every `AsyncLogWriter` is dropped, the background thread writes whatever is left and stops.
#[derive(Clone)]
pub struct AsyncLogWriter(Arc<Inner>);

impl fmt::Debug for AsyncLogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLogWriter")
            .field("name", &self.0.name)
            .field("capacity", &self.0.capacity)
            .field("state", &self.0.state.load())
            .finish()
    }
}

impl AsyncLogWriter {
    /// Buffer `message` for `output`.
    ///
    /// The message and decorations are copied; the caller's buffers may be reused as soon as this returns. If the
    /// buffer is full the message is dropped and counted instead, which is not an error: the background thread later
    /// writes a summary of the drops to `output`.
    ///
    /// Returns [`WriterClosed`] if the background thread has terminated.
    pub fn enqueue(
        &self,
        output: &SharedOutput,
        decorations: &Decorations,
        message: &str,
    ) -> Result<(), WriterClosed> {
        self.0.enqueue_with(|inner, monitor| {
            inner.admit(monitor, output, || {
                AsyncLogMessage::new(output, decorations.clone(), message)
            })
        })
    }

    /// Buffer several messages for `output` at once, such as the lines of a
    /// [`LogMessageBuffer`](crate::LogMessageBuffer).
    ///
    /// The whole batch is admitted under a single lock acquisition, so its messages are written back contiguously,
    /// without messages of other threads in between. Each message is still admitted or dropped on its own. The
    /// iterator runs while the writer lock is held and should be cheap.
    pub fn enqueue_all<I, S>(&self, output: &SharedOutput, fragments: I) -> Result<(), WriterClosed>
    where
        I: IntoIterator<Item = (Decorations, S)>,
        S: AsRef<str>,
    {
        self.0.enqueue_with(|inner, monitor| {
            let mut pushed = false;
            for (decorations, message) in fragments {
                pushed |= inner.admit(monitor, output, || {
                    AsyncLogMessage::new(output, decorations, message.as_ref())
                });
            }
            pushed
        })
    }

    /// Write every buffered record from the calling thread, then return.
    ///
    /// The buffer is taken under the writer lock and written after releasing it, so producers are not blocked while
    /// this thread does IO. Drops counted so far are reported as well.
    pub fn flush(&self) {
        let mut drained = VecDeque::new();
        let drops = self.0.drain(&mut drained);
        self.0.write_back(&mut drained, drops);
    }

    /// Ask the background thread to drain the buffer now, without waiting for it.
    pub fn wake(&self) {
        self.0.request_wake();
    }

    /// Cumulative counters of this writer.
    pub fn stats(&self) -> WriterStats {
        self.0.counters.snapshot()
    }

    /// Current state of the background thread.
    pub fn state(&self) -> WriterState {
        self.0.state.load()
    }

    /// Maximum number of buffered records.
    pub fn capacity(&self) -> usize {
        self.0.capacity
    }

    /// Number of records currently buffered.
    pub fn buffered(&self) -> usize {
        self.0.lock().buffer.size()
    }

    // see AsyncLogJoinHandle::abort
    pub(crate) fn abort(&self) {
        self.0.abort();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Monitor> {
        // a panic while holding the lock leaves the buffer structurally intact, keep logging
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue_with(
        &self,
        admit: impl FnOnce(&Inner, &mut Monitor) -> bool,
    ) -> Result<(), WriterClosed> {
        let mut monitor = self.lock();
        if self.state.load() == WriterState::Terminated {
            return Err(WriterClosed);
        }
        let pushed = admit(self, &mut monitor);
        let wake = pushed && monitor.buffer.reached_wake_threshold();
        drop(monitor);
        if wake {
            self.wakeup.notify_one();
        }
        Ok(())
    }

    // Push the record built by `record`, or count a drop without building it. Returns true if pushed.
    fn admit(
        &self,
        monitor: &mut Monitor,
        output: &SharedOutput,
        record: impl FnOnce() -> AsyncLogMessage,
    ) -> bool {
        if monitor.buffer.is_full() {
            monitor.drops.increment(output);
            self.counters.dropped();
            false
        } else {
            monitor.buffer.push_back(record());
            self.counters.accepted();
            true
        }
    }

    fn drain(&self, drained: &mut VecDeque<AsyncLogMessage>) -> DropSnapshot {
        let mut monitor = self.lock();
        monitor.buffer.pop_all(drained);
        monitor.drops.take()
    }

    // Sleep until the buffer reaches its wake threshold, a wake-up is requested, the state changes, or the flush
    // timeout passes. Then take the buffer and the drop counts.
    fn wait_and_drain(&self, drained: &mut VecDeque<AsyncLogMessage>) -> DropSnapshot {
        let deadline = Instant::now() + self.flush_timeout;
        let mut monitor = self.lock();
        while !monitor.wake_requested
            && !monitor.buffer.reached_wake_threshold()
            && self.state.load() == WriterState::Running
        {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            monitor = self
                .wakeup
                .wait_timeout(monitor, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        // aborted: leave the buffer alone, nothing more gets written
        if self.state.load() == WriterState::Terminated {
            return DropSnapshot::default();
        }
        monitor.wake_requested = false;
        monitor.buffer.pop_all(drained);
        monitor.drops.take()
    }

    // Last drain. Moving to Terminated under the lock guarantees nothing is accepted after it.
    fn drain_final(&self, drained: &mut VecDeque<AsyncLogMessage>) -> DropSnapshot {
        let mut monitor = self.lock();
        monitor.buffer.pop_all(drained);
        self.state.store(WriterState::Terminated);
        monitor.drops.take()
    }

    fn request_wake(&self) {
        self.lock().wake_requested = true;
        self.wakeup.notify_all();
    }

    fn begin_terminating(&self) {
        let mut monitor = self.lock();
        if self.state.begin_terminating() {
            monitor.wake_requested = true;
        }
        drop(monitor);
        self.wakeup.notify_all();
    }

    fn abort(&self) {
        self.state.store(WriterState::Terminated);
        // never block here: abort runs from fatal-error handlers that may have been raised while holding the lock
        match self.monitor.try_lock() {
            Ok(mut monitor) => monitor.wake_requested = true,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().wake_requested = true,
            Err(TryLockError::WouldBlock) => {}
        }
        self.wakeup.notify_all();
    }

    // Write every drained record in order, then one summary per output that had drops, then flush the outputs that
    // were written to. Runs without the monitor lock.
    fn write_back(&self, drained: &mut VecDeque<AsyncLogMessage>, drops: DropSnapshot) {
        let mut touched = TouchedOutputs::default();
        for message in drained.drain(..) {
            touched.insert(message.output());
            match message.writeback() {
                Ok(()) => self.counters.written(),
                Err(err) => self.write_failed(message.output(), &err),
            }
        }

        if !drops.is_empty() {
            rate_limited!(
                Duration::from_secs(1),
                tracing::warn!(
                    dropped = drops.total(),
                    "async log buffer was full, messages were dropped"
                )
            );
        }
        for (output, count) in drops.iter() {
            touched.insert(output);
            let decorations = Decorations::now(Level::Warning, &[]);
            match output.write(&decorations, &self.summary.render(count)) {
                Ok(()) => self.counters.drop_reported(),
                Err(err) => self.write_failed(output, &err),
            }
        }

        for output in touched.0 {
            if let Err(err) = output.flush() {
                self.counters.io_error();
                rate_limited!(
                    Duration::from_secs(1),
                    tracing::warn!(?err, output = output.name(), "couldn't flush log output")
                );
            }
        }
    }

    fn write_failed(&self, output: &SharedOutput, err: &io::Error) {
        self.counters.io_error();
        rate_limited!(
            Duration::from_secs(1),
            tracing::error!(?err, output = output.name(), "couldn't write to log output")
        );
    }
}

// Outputs written during one pass. There are rarely more than a handful.
#[derive(Default)]
struct TouchedOutputs(SmallVec<[SharedOutput; 4]>);

impl TouchedOutputs {
    fn insert(&mut self, output: &SharedOutput) {
        if !self.0.iter().any(|known| Arc::ptr_eq(known, output)) {
            self.0.push(SharedOutput::clone(output));
        }
    }
}

// The background thread.
struct Flusher {
    inner: Arc<Inner>,
    // reused between passes, see AsyncLogBuffer::pop_all
    drained: VecDeque<AsyncLogMessage>,
}

impl Flusher {
    fn run(mut self) {
        let span = tracing::span!(tracing::Level::TRACE, "async log writer", writer = ?self.inner.name);
        let _enter = span.enter();
        tracing::debug!(
            capacity = self.inner.capacity,
            thread = ?thread::current().id(),
            "starting async log writer thread"
        );

        while self.inner.state.load() == WriterState::Running {
            let drops = self.inner.wait_and_drain(&mut self.drained);
            self.inner.write_back(&mut self.drained, drops);

            if Arc::strong_count(&self.inner) == 1 {
                tracing::info!("no writers left, shutting down async log writer");
                self.inner.begin_terminating();
            }
        }

        match self.inner.state.load() {
            WriterState::Terminating => self.shut_down(),
            // a fatal-error handler may be holding the lock, don't wait for it
            _ => match self.inner.monitor.try_lock() {
                Ok(monitor) => tracing::warn!(
                    discarded = monitor.buffer.size(),
                    "async log writer aborted, buffered messages were discarded"
                ),
                Err(_) => tracing::warn!("async log writer aborted"),
            },
        }
    }

    fn shut_down(self) {
        let Flusher { inner, mut drained } = self;
        match Arc::try_unwrap(inner) {
            // sole owner: nobody else can reach the buffer, no need to lock it
            Ok(mut inner) => {
                let monitor = inner
                    .monitor
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner);
                monitor.buffer.pop_all(&mut drained);
                let drops = monitor.drops.take();
                inner.state.store(WriterState::Terminated);
                inner.write_back(&mut drained, drops);
            }
            Err(inner) => {
                let drops = inner.drain_final(&mut drained);
                inner.write_back(&mut drained, drops);
            }
        }
        tracing::info!("async log writer has shut down");
    }
}

/// Guard handle that, when dropped, blocks until every record accepted so far has been written and the background
/// thread has stopped.
///
/// Anything logged after the handle starts shutting down is rejected with [`WriterClosed`].
#[must_use = "if unused the background writer is immediately shut down"]
pub struct AsyncLogJoinHandle {
    handle: Option<thread::JoinHandle<()>>,
    // weak so that the background thread notices when all writers are gone
    inner: Weak<Inner>,
}

impl fmt::Debug for AsyncLogJoinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLogJoinHandle")
            .field("attached", &self.handle.is_some())
            .finish()
    }
}

impl AsyncLogJoinHandle {
    /// Drop the handle but let the background thread keep running until no [`AsyncLogWriter`]s exist.
    pub fn forget(mut self) {
        self.handle = None;
    }

    /// Alias for `drop(handle)`. Stops accepting records, writes every record accepted so far, and waits for the
    /// background thread to stop.
    pub fn shut_down(self) {}

    /// Emergency stop, for fatal-error handlers.
    ///
    /// Stops accepting records and tells the background thread to stop without writing what is still buffered. Does
    /// not wait for the thread, never blocks, and never panics.
    pub fn abort(mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.abort();
        }
        self.handle = None;
    }

    /// Returns true once the background thread has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }
}

impl Drop for AsyncLogJoinHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Some(inner) = self.inner.upgrade() {
                inner.begin_terminating();
            }
            tracing::info!("awaiting async log writer shutdown");
            if handle.join().is_err() {
                tracing::error!("async log writer thread panicked");
            }
            tracing::info!("async log writer shut down");
        }
    }
}
