// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    io, mem,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{Decorations, LogOutput};

/// A line recorded by [`RecordingOutput`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedLine {
    /// Decorations the line was written with.
    pub decorations: Decorations,
    /// The message.
    pub message: String,
}

#[derive(Default)]
struct Recording {
    lines: Vec<RecordedLine>,
    failing: bool,
    failed_writes: u64,
    flushes: u64,
}

/// An in-memory [`LogOutput`] designed for testing.
///
/// Besides recording every line, it can be told to fail writes ([`RecordingOutput::fail_writes`]) and can be
/// paused ([`RecordingOutput::pause`]) so that a background writer blocks on it, which lets tests fill up a buffer
/// deterministically.
#[derive(Default)]
pub struct RecordingOutput {
    name: String,
    recording: Mutex<Recording>,
    gate: Mutex<()>,
}

impl RecordingOutput {
    /// Create an empty output named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn recording(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All lines written so far.
    pub fn lines(&self) -> Vec<RecordedLine> {
        self.recording().lines.clone()
    }

    /// The messages of all lines written so far.
    pub fn messages(&self) -> Vec<String> {
        self.recording()
            .lines
            .iter()
            .map(|line| line.message.clone())
            .collect()
    }

    /// Take the lines written so far, leaving the output empty.
    pub fn take_lines(&self) -> Vec<RecordedLine> {
        mem::take(&mut self.recording().lines)
    }

    /// Number of lines written so far.
    pub fn len(&self) -> usize {
        self.recording().lines.len()
    }

    /// Returns true if nothing was written so far.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// While `failing` is true, every write returns an error and records nothing.
    pub fn fail_writes(&self, failing: bool) {
        self.recording().failing = failing;
    }

    /// Number of writes that failed because of [`RecordingOutput::fail_writes`].
    pub fn failed_writes(&self) -> u64 {
        self.recording().failed_writes
    }

    /// Number of times [`LogOutput::flush`] was called.
    pub fn flushes(&self) -> u64 {
        self.recording().flushes
    }

    /// Block every write until the returned guard is dropped.
    pub fn pause(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogOutput for RecordingOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, decorations: &Decorations, message: &str) -> io::Result<()> {
        let _gate = self.pause();
        let mut recording = self.recording();
        if recording.failing {
            recording.failed_writes += 1;
            return Err(io::Error::other("injected write failure"));
        }
        recording.lines.push(RecordedLine {
            decorations: decorations.clone(),
            message: message.to_owned(),
        });
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        self.recording().flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Level;

    #[test]
    fn records_and_fails_on_demand() {
        let output = RecordingOutput::new("test");
        let decorations = Decorations::now(Level::Info, &[]);
        output.write(&decorations, "kept").unwrap();
        output.fail_writes(true);
        output.write(&decorations, "lost").unwrap_err();
        output.fail_writes(false);
        output.flush().unwrap();
        assert_eq!(output.messages(), ["kept"]);
        assert_eq!(output.failed_writes(), 1);
        assert_eq!(output.flushes(), 1);
        assert_eq!(output.take_lines().len(), 1);
        assert!(output.is_empty());
    }
}
