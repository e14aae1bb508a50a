// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains the [`LogOutput`] trait, the destination of buffered log records.

use std::{
    fmt, io,
    sync::{Arc, Mutex, PoisonError},
};

use crate::Decorations;

/// A destination that accepts decorated log messages, such as a file.
///
/// Outputs are shared between the threads that log to them and the background thread that writes to them, so they
/// take `&self` and must synchronize internally. The background writer never retries a failed write; if an output
/// wants retry or buffering on IO errors, it has to do that itself.
pub trait LogOutput: Send + Sync {
    /// Name of the output, used in diagnostics.
    fn name(&self) -> &str;

    /// Write one decorated message.
    fn write(&self, decorations: &Decorations, message: &str) -> io::Result<()>;

    /// Flush anything the output has buffered.
    ///
    /// Called by the background writer once per write-back pass for every output it wrote to.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// A reference-counted [`LogOutput`].
///
/// Identity matters: two records target the same output when they hold clones of the same `Arc`.
pub type SharedOutput = Arc<dyn LogOutput>;

impl fmt::Debug for dyn LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogOutput").field(&self.name()).finish()
    }
}

/// Writes `decorations` and `message` as a single line.
pub fn write_line(
    out: &mut impl io::Write,
    decorations: &Decorations,
    message: &str,
) -> io::Result<()> {
    writeln!(out, "{decorations} {message}")
}

/// A [`LogOutput`] that writes each record as a line to an [`io::Write`].
///
/// Wrap the writer in a [`io::BufWriter`] if it is expensive to write to: [`LogOutput::flush`] is called after each
/// write-back pass.
pub struct StreamOutput<W> {
    name: String,
    writer: Mutex<W>,
}

impl<W: io::Write + Send> StreamOutput<W> {
    /// Create a new output named `name` writing to `writer`.
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Return the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: io::Write + Send> LogOutput for StreamOutput<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, decorations: &Decorations, message: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        write_line(&mut *writer, decorations, message)
    }

    fn flush(&self) -> io::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

/// A [`LogOutput`] that asks a [`MakeWriter`] for a fresh writer for every record.
///
/// This allows using writers from the `tracing` ecosystem, like `tracing_appender`'s file appenders, as outputs.
///
/// [`MakeWriter`]: tracing_subscriber::fmt::MakeWriter
#[cfg(feature = "tracing-subscriber-03")]
pub struct MakeWriterOutput<M> {
    name: String,
    make_writer: M,
}

#[cfg(feature = "tracing-subscriber-03")]
impl<M> MakeWriterOutput<M>
where
    M: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync,
{
    /// Create a new output named `name` writing through `make_writer`.
    pub fn new(name: impl Into<String>, make_writer: M) -> Self {
        Self {
            name: name.into(),
            make_writer,
        }
    }
}

#[cfg(feature = "tracing-subscriber-03")]
impl<M> LogOutput for MakeWriterOutput<M>
where
    M: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, decorations: &Decorations, message: &str) -> io::Result<()> {
        // format into one buffer so the line reaches the writer in a single call and can't tear
        let mut line = Vec::with_capacity(message.len() + 64);
        write_line(&mut line, decorations, message)?;
        io::Write::write_all(&mut self.make_writer.make_writer(), &line)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::{Level, Tags};

    fn decorations() -> Decorations {
        Decorations::new(
            SystemTime::UNIX_EPOCH + Duration::from_secs(10),
            Duration::from_millis(1500),
            Level::Info,
            Tags::from_slice(&["os"]),
        )
    }

    #[test]
    fn stream_output_writes_lines() {
        let output = StreamOutput::new("stdout", Vec::new());
        output.write(&decorations(), "hello").unwrap();
        output.write(&decorations(), "world").unwrap();
        output.flush().unwrap();
        assert_eq!(output.name(), "stdout");
        assert_eq!(
            String::from_utf8(output.into_inner()).unwrap(),
            "[10.000][1.500s][info][os] hello\n[10.000][1.500s][info][os] world\n"
        );
    }

    #[test]
    fn stream_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let output = StreamOutput::new(
            "file",
            io::BufWriter::new(std::fs::File::create(&path).unwrap()),
        );
        output.write(&decorations(), "buffered").unwrap();
        output.flush().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[10.000][1.500s][info][os] buffered\n"
        );
    }

    #[test]
    fn debug_uses_name() {
        let output: SharedOutput = Arc::new(StreamOutput::new("gc-log", io::sink()));
        assert_eq!(format!("{output:?}"), "LogOutput(\"gc-log\")");
    }

    #[cfg(feature = "tracing-subscriber-03")]
    #[test]
    fn make_writer_output_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = MakeWriterOutput::new(
            "appender",
            tracing_appender::rolling::never(dir.path(), "app.log"),
        );
        output.write(&decorations(), "first").unwrap();
        output.write(&decorations(), "second").unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app.log")).unwrap(),
            "[10.000][1.500s][info][os] first\n[10.000][1.500s][info][os] second\n"
        );
    }
}
