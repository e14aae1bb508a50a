// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    hash::{Hash, Hasher},
    mem,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use ahash::AHashMap;

use crate::SharedOutput;

// Outputs are identified by their allocation, not by name: two outputs can share a name.
#[derive(Clone)]
struct OutputKey(SharedOutput);

impl OutputKey {
    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast()
    }
}

impl PartialEq for OutputKey {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for OutputKey {}

impl Hash for OutputKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

/// Number of messages dropped per output since the last report.
///
/// Guarded by the writer lock together with the buffer. Counts only grow until [`DropCounters::take`] hands them to
/// the background writer and starts over from empty.
#[derive(Default)]
pub struct DropCounters {
    counts: AHashMap<OutputKey, u32>,
}

impl DropCounters {
    /// Count one dropped message for `output`.
    pub fn increment(&mut self, output: &SharedOutput) {
        let count = self
            .counts
            .entry(OutputKey(SharedOutput::clone(output)))
            .or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Messages dropped for `output` since the last report.
    pub fn get(&self, output: &SharedOutput) -> u32 {
        self.counts
            .get(&OutputKey(SharedOutput::clone(output)))
            .copied()
            .unwrap_or(0)
    }

    /// Returns true if nothing was dropped since the last report.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Take the current counts and reset to empty. Doesn't allocate.
    pub fn take(&mut self) -> DropSnapshot {
        DropSnapshot(mem::take(&mut self.counts))
    }
}

/// Drop counts taken out of [`DropCounters`] for reporting.
#[derive(Default)]
pub struct DropSnapshot(AHashMap<OutputKey, u32>);

impl DropSnapshot {
    /// Returns true if nothing was dropped.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Outputs with their drop counts, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&SharedOutput, u32)> {
        self.0.iter().map(|(key, count)| (&key.0, *count))
    }

    /// Total number of dropped messages.
    pub fn total(&self) -> u64 {
        self.0.values().map(|count| u64::from(*count)).sum()
    }
}

/// Renders the message of the record reporting dropped messages from a template, replacing `{count}`.
#[derive(Clone, Debug)]
pub(crate) struct DropSummary {
    template: String,
}

impl DropSummary {
    pub(crate) fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub(crate) fn render(&self, count: u32) -> String {
        self.template.replace("{count}", &count.to_string())
    }
}

/// Cumulative counters of an [`AsyncLogWriter`](crate::AsyncLogWriter), see
/// [`AsyncLogWriter::stats`](crate::AsyncLogWriter::stats).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Messages accepted into the buffer.
    pub accepted: u64,
    /// Messages dropped because the buffer was full.
    pub dropped: u64,
    /// Accepted messages written to their output.
    pub written: u64,
    /// Writes (of messages or drop summaries) that failed.
    pub io_errors: u64,
    /// Drop summary records written.
    pub drop_reports: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
    io_errors: AtomicU64,
    drop_reports: AtomicU64,
}

impl Counters {
    pub(crate) fn accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn drop_reported(&self) {
        self.drop_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> WriterStats {
        WriterStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
            drop_reports: self.drop_reports.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use asynclog_core::test_output::RecordingOutput;

    use super::*;

    #[test]
    fn counts_per_output_identity() {
        let a: SharedOutput = Arc::new(RecordingOutput::new("same-name"));
        let b: SharedOutput = Arc::new(RecordingOutput::new("same-name"));
        let mut counters = DropCounters::default();
        assert!(counters.is_empty());

        counters.increment(&a);
        counters.increment(&a);
        counters.increment(&SharedOutput::clone(&b));
        assert_eq!(counters.get(&a), 2);
        assert_eq!(counters.get(&b), 1);

        let snapshot = counters.take();
        assert_eq!(snapshot.total(), 3);
        let mut counts: Vec<u32> = snapshot.iter().map(|(_, count)| count).collect();
        counts.sort();
        assert_eq!(counts, [1, 2]);
    }

    #[test]
    fn take_resets_exactly_once() {
        let output: SharedOutput = Arc::new(RecordingOutput::new("out"));
        let mut counters = DropCounters::default();
        counters.increment(&output);

        let first = counters.take();
        assert_eq!(first.total(), 1);
        assert_eq!(counters.get(&output), 0);

        let second = counters.take();
        assert!(second.is_empty());
        assert_eq!(second.total(), 0);
    }

    #[test]
    fn summary_template() {
        assert_eq!(
            DropSummary::new("{count} messages dropped due to async logging").render(3),
            "3 messages dropped due to async logging"
        );
        assert_eq!(DropSummary::new("dropped").render(3), "dropped");
    }

    #[test]
    fn counters_snapshot() {
        let counters = Counters::default();
        counters.accepted();
        counters.accepted();
        counters.dropped();
        counters.written();
        counters.io_error();
        counters.drop_reported();
        assert_eq!(
            counters.snapshot(),
            WriterStats {
                accepted: 2,
                dropped: 1,
                written: 1,
                io_errors: 1,
                drop_reports: 1,
            }
        );
    }
}
