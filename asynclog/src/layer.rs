// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains [`AsyncLogLayer`], which sends `tracing` events through an [`AsyncLogWriter`].

use std::fmt::{self, Write};

use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

use crate::{AsyncLogWriter, Decorations, Level, SharedOutput};

/// A [`tracing_subscriber::Layer`] that turns every event it sees into a record for one output.
///
/// The record is decorated with the event's level and its target as the only tag. The message is the event's
/// `message` field followed by its other fields as ` name=value` pairs. Once the writer has terminated, events are
/// written to the output synchronously instead.
///
/// ```
/// use std::sync::Arc;
/// use asynclog::{AsyncLogBuilder, SharedOutput, StreamOutput, layer::AsyncLogLayer};
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let output: SharedOutput = Arc::new(StreamOutput::new("stderr", std::io::stderr()));
/// let (writer, handle) = AsyncLogBuilder::new().build().unwrap();
/// let subscriber = tracing_subscriber::registry().with(AsyncLogLayer::new(writer, output));
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!(pid = 42, "started");
/// });
/// handle.shut_down();
/// ```
#[derive(Debug, Clone)]
pub struct AsyncLogLayer {
    writer: AsyncLogWriter,
    output: SharedOutput,
}

impl AsyncLogLayer {
    pub fn new(writer: AsyncLogWriter, output: SharedOutput) -> Self {
        Self { writer, output }
    }
}

impl<S: Subscriber> Layer<S> for AsyncLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let decorations = Decorations::now(level(metadata.level()), &[metadata.target()]);

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = visitor.finish();

        if self
            .writer
            .enqueue(&self.output, &decorations, &message)
            .is_err()
        {
            // nowhere left to report a failure to
            let _ = self.output.write(&decorations, &message);
        }
    }
}

fn level(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::TRACE => Level::Trace,
        tracing::Level::DEBUG => Level::Debug,
        tracing::Level::INFO => Level::Info,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::ERROR => Level::Error,
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(mut self) -> String {
        if self.message.is_empty() {
            // no message, drop the separator in front of the first field
            return self.fields.split_off(self.fields.len().min(1));
        }
        self.message.push_str(&self.fields);
        self.message
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // writing to a String can't fail
        let _ = if field.name() == "message" {
            write!(self.message, "{value:?}")
        } else {
            write!(self.fields, " {}={value:?}", field.name())
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use asynclog_core::test_output::RecordingOutput;
    use rstest::rstest;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;
    use crate::AsyncLogBuilder;

    fn capture(emit: impl FnOnce()) -> Vec<asynclog_core::test_output::RecordedLine> {
        let recording = Arc::new(RecordingOutput::new("tracing"));
        let (writer, handle) = AsyncLogBuilder::new().capacity(100).build().unwrap();
        let subscriber =
            tracing_subscriber::registry().with(AsyncLogLayer::new(writer, recording.clone()));
        tracing::subscriber::with_default(subscriber, emit);
        handle.shut_down();
        recording.lines()
    }

    #[test]
    fn message_then_fields() {
        let lines = capture(|| {
            tracing::info!(answer = 42, name = "deep thought", "computed");
        });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].message, r#"computed answer=42 name="deep thought""#);
        assert_eq!(lines[0].decorations.level(), Level::Info);
        assert_eq!(lines[0].decorations.tags(), [module_path!()]);
    }

    #[test]
    fn fields_without_message() {
        let lines = capture(|| {
            tracing::warn!(code = 7, retry = false);
        });
        assert_eq!(lines[0].message, "code=7 retry=false");
    }

    #[test]
    fn custom_target_becomes_tag() {
        let lines = capture(|| {
            tracing::error!(target: "gc", "out of memory");
        });
        assert_eq!(lines[0].message, "out of memory");
        assert_eq!(lines[0].decorations.tags(), ["gc"]);
    }

    #[rstest]
    #[case(tracing::Level::TRACE, Level::Trace)]
    #[case(tracing::Level::DEBUG, Level::Debug)]
    #[case(tracing::Level::INFO, Level::Info)]
    #[case(tracing::Level::WARN, Level::Warning)]
    #[case(tracing::Level::ERROR, Level::Error)]
    fn maps_levels(#[case] from: tracing::Level, #[case] to: Level) {
        assert_eq!(level(&from), to);
    }

    #[test]
    fn writes_synchronously_once_terminated() {
        let recording = Arc::new(RecordingOutput::new("tracing"));
        let (writer, handle) = AsyncLogBuilder::new().build().unwrap();
        handle.shut_down();
        let subscriber =
            tracing_subscriber::registry().with(AsyncLogLayer::new(writer, recording.clone()));
        tracing::subscriber::with_default(subscriber, || tracing::info!("after shutdown"));
        assert_eq!(recording.messages(), ["after shutdown"]);
    }
}
