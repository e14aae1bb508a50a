// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, io, mem};

use crate::{Decorations, SharedOutput};

/// A buffered log record: the output it goes to, the decorations captured at the call site, and an owned copy of the
/// message.
///
/// The record owns its message from the moment it is accepted into the buffer, so callers may log from transient
/// buffers. The message is freed once the record has been written back.
pub struct AsyncLogMessage {
    output: SharedOutput,
    decorations: Decorations,
    message: String,
}

/// Nominal length of a log message, used to turn a memory budget into a record capacity.
pub const NOMINAL_MESSAGE_LEN: usize = 512;

/// Approximate memory used by one buffered record: the record itself, its decorations, and a message of
/// [`NOMINAL_MESSAGE_LEN`] bytes.
pub const fn record_footprint() -> usize {
    mem::size_of::<AsyncLogMessage>() + mem::size_of::<Decorations>() + NOMINAL_MESSAGE_LEN
}

impl AsyncLogMessage {
    pub(crate) fn new(output: &SharedOutput, decorations: Decorations, message: &str) -> Self {
        Self {
            output: SharedOutput::clone(output),
            decorations,
            message: message.to_owned(),
        }
    }

    /// The output this record is written to.
    pub fn output(&self) -> &SharedOutput {
        &self.output
    }

    /// The decorations captured when the record was logged.
    pub fn decorations(&self) -> &Decorations {
        &self.decorations
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Write the record to its output.
    pub fn writeback(&self) -> io::Result<()> {
        self.output.write(&self.decorations, &self.message)
    }
}

impl fmt::Debug for AsyncLogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLogMessage")
            .field("output", &self.output.name())
            .field("decorations", &self.decorations)
            .field("message", &self.message)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use asynclog_core::test_output::RecordingOutput;

    use super::*;
    use crate::Level;

    #[test]
    fn copies_message_and_writes_back() {
        let recording = Arc::new(RecordingOutput::new("test"));
        let output: SharedOutput = recording.clone();
        let decorations = Decorations::now(Level::Info, &["os"]);
        let message = {
            let transient = String::from("from a transient buffer");
            AsyncLogMessage::new(&output, decorations.clone(), &transient)
        };
        assert_eq!(message.message(), "from a transient buffer");
        assert!(Arc::ptr_eq(message.output(), &output));

        message.writeback().unwrap();
        let lines = recording.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].decorations, decorations);
        assert_eq!(lines[0].message, "from a transient buffer");
    }

    #[test]
    fn footprint_covers_nominal_message() {
        assert!(record_footprint() > NOMINAL_MESSAGE_LEN);
        assert_eq!(
            record_footprint(),
            mem::size_of::<AsyncLogMessage>() + mem::size_of::<Decorations>() + 512
        );
    }
}
