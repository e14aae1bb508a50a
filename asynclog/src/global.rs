// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A process-wide [`AsyncLogWriter`], installed by [`initialize`] and removed by [`terminate`] or [`abort`].
//!
//! Prefer passing an [`AsyncLogWriter`] around where possible. The process-wide instance exists for logging
//! subsystems that are reached from everywhere, and for fatal-error handlers that need to stop logging without
//! access to any handle.
//!
//! ```
//! use std::sync::Arc;
//! use asynclog::{AsyncLogBuilder, Decorations, Level, SharedOutput, StreamOutput, global};
//!
//! let output: SharedOutput = Arc::new(StreamOutput::new("stdout", std::io::stdout()));
//! global::initialize(AsyncLogBuilder::new()).unwrap();
//!
//! global::enqueue(&output, &Decorations::now(Level::Info, &["gc"]), "collected").unwrap();
//!
//! // writes everything accepted so far, then stops the background thread
//! assert!(global::terminate());
//! assert!(global::enqueue(&output, &Decorations::now(Level::Info, &[]), "too late").is_err());
//! ```

use std::{
    fmt,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError},
};

use crate::{
    AsyncLogBuilder, AsyncLogJoinHandle, AsyncLogWriter, BuildError, Decorations, SharedOutput,
    WriterClosed,
};

struct Installed {
    writer: AsyncLogWriter,
    handle: AsyncLogJoinHandle,
}

static INSTANCE: RwLock<Option<Installed>> = RwLock::new(None);

// the guarded value is a plain Option, it stays valid across a panic
fn read() -> RwLockReadGuard<'static, Option<Installed>> {
    INSTANCE.read().unwrap_or_else(PoisonError::into_inner)
}

fn write() -> RwLockWriteGuard<'static, Option<Installed>> {
    INSTANCE.write().unwrap_or_else(PoisonError::into_inner)
}

/// Errors returned by [`initialize`].
#[derive(Debug)]
pub enum LifecycleError {
    /// A process-wide writer is already installed. Call [`terminate`] first to replace it.
    AlreadyInitialized,
    /// The writer couldn't be built.
    Build(BuildError),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => f.write_str("async logging is already initialized"),
            Self::Build(err) => write!(f, "couldn't initialize async logging: {err}"),
        }
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AlreadyInitialized => None,
            Self::Build(err) => Some(err),
        }
    }
}

impl From<BuildError> for LifecycleError {
    fn from(err: BuildError) -> Self {
        Self::Build(err)
    }
}

/// Build a writer from `builder`, start its background thread, and install it as the process-wide instance.
///
/// Returns a handle to the installed writer.
pub fn initialize(builder: AsyncLogBuilder) -> Result<AsyncLogWriter, LifecycleError> {
    let mut instance = write();
    if instance.is_some() {
        return Err(LifecycleError::AlreadyInitialized);
    }
    let (writer, handle) = builder.build()?;
    *instance = Some(Installed {
        writer: writer.clone(),
        handle,
    });
    tracing::debug!("installed process-wide async log writer");
    Ok(writer)
}

/// A handle to the process-wide writer, if one is installed.
pub fn instance() -> Option<AsyncLogWriter> {
    read().as_ref().map(|installed| installed.writer.clone())
}

/// Returns true if a process-wide writer is installed.
pub fn is_initialized() -> bool {
    read().is_some()
}

/// [`AsyncLogWriter::enqueue`] on the process-wide writer.
///
/// Returns [`WriterClosed`] if no writer is installed, so callers can fall back to writing synchronously.
pub fn enqueue(
    output: &SharedOutput,
    decorations: &Decorations,
    message: &str,
) -> Result<(), WriterClosed> {
    match read().as_ref() {
        Some(installed) => installed.writer.enqueue(output, decorations, message),
        None => Err(WriterClosed),
    }
}

/// [`AsyncLogWriter::enqueue_all`] on the process-wide writer.
pub fn enqueue_all<I, S>(output: &SharedOutput, fragments: I) -> Result<(), WriterClosed>
where
    I: IntoIterator<Item = (Decorations, S)>,
    S: AsRef<str>,
{
    match read().as_ref() {
        Some(installed) => installed.writer.enqueue_all(output, fragments),
        None => Err(WriterClosed),
    }
}

/// [`AsyncLogWriter::flush`] on the process-wide writer. Does nothing if no writer is installed.
pub fn flush() {
    if let Some(writer) = instance() {
        writer.flush();
    }
}

/// Uninstall the process-wide writer and shut it down gracefully.
///
/// Blocks until every record accepted so far has been written and the background thread has stopped. Handles
/// obtained from [`initialize`] or [`instance`] reject records from then on. Returns false if no writer was
/// installed.
pub fn terminate() -> bool {
    // release the lock before joining, producers may still be logging
    let installed = write().take();
    match installed {
        Some(Installed { writer, handle }) => {
            drop(writer);
            handle.shut_down();
            true
        }
        None => false,
    }
}

/// Emergency stop of the process-wide writer, for fatal-error handlers.
///
/// Never blocks and never panics: if the process-wide slot is locked (possibly by the thread that failed), the
/// writer is still told to stop when it can be reached, otherwise nothing happens. Buffered records are not written,
/// and the background thread is not waited for.
pub fn abort() {
    match INSTANCE.try_write() {
        Ok(mut instance) => abort_installed(instance.take()),
        Err(TryLockError::Poisoned(poisoned)) => abort_installed(poisoned.into_inner().take()),
        // someone is reading, we can still reach the writer but can't uninstall it
        Err(TryLockError::WouldBlock) => {
            if let Ok(instance) = INSTANCE.try_read() {
                if let Some(installed) = instance.as_ref() {
                    installed.writer.abort();
                }
            }
        }
    }
}

fn abort_installed(installed: Option<Installed>) {
    if let Some(Installed { writer, handle }) = installed {
        drop(writer);
        handle.abort();
    }
}
