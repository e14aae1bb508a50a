// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains [`LogMessageBuffer`], which groups the lines of one multi-line log call.

use std::fmt::{self, Write as _};

use crate::{Decorations, Level, Tags};

/// Collects the lines of a single multi-line log call (for example, a table printed line by line) so they can be
/// enqueued in one go and won't interleave with lines logged concurrently by other threads.
///
/// Every line has its own level. All lines share the tags of the buffer and a single time snapshot, taken when
/// [`LogMessageBuffer::iter`] is called.
///
/// ```
/// # use asynclog_core::{Level, LogMessageBuffer};
/// let mut buffer = LogMessageBuffer::new(&["gc", "heap"]);
/// buffer.push(Level::Info, "Heap regions:");
/// buffer.write(Level::Info, format_args!("  eden: {} regions", 12));
/// buffer.write(Level::Debug, format_args!("  humongous: {} regions", 0));
///
/// let lines: Vec<_> = buffer.iter().map(|(decorations, line)| (decorations.level(), line)).collect();
/// assert_eq!(lines, [
///     (Level::Info, "Heap regions:"),
///     (Level::Info, "  eden: 12 regions"),
///     (Level::Debug, "  humongous: 0 regions"),
/// ]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct LogMessageBuffer {
    tags: Tags,
    lines: Vec<(Level, String)>,
}

impl LogMessageBuffer {
    /// Create an empty buffer whose lines will be tagged with `tags`.
    pub fn new(tags: &[&'static str]) -> Self {
        Self {
            tags: Tags::from_slice(tags),
            lines: Vec::new(),
        }
    }

    /// Append a line.
    pub fn push(&mut self, level: Level, line: impl Into<String>) {
        self.lines.push((level, line.into()));
    }

    /// Append a line built from format arguments.
    pub fn write(&mut self, level: Level, args: fmt::Arguments<'_>) {
        let mut line = String::new();
        // writing to a String can't fail
        let _ = line.write_fmt(args);
        self.lines.push((level, line));
    }

    /// Number of lines in the buffer.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if no line has been pushed.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Remove all lines, keeping the tags.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Iterate over the lines together with their decorations.
    pub fn iter(&self) -> Fragments<'_> {
        Fragments {
            base: Decorations::now(Level::Info, &self.tags),
            lines: self.lines.iter(),
        }
    }
}

impl<'a> IntoIterator for &'a LogMessageBuffer {
    type Item = (Decorations, &'a str);
    type IntoIter = Fragments<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the decorated lines of a [`LogMessageBuffer`], see [`LogMessageBuffer::iter`].
#[derive(Debug)]
pub struct Fragments<'a> {
    base: Decorations,
    lines: std::slice::Iter<'a, (Level, String)>,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = (Decorations, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let (level, line) = self.lines.next()?;
        Some((self.base.with_level(*level), line.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.lines.size_hint()
    }
}

impl ExactSizeIterator for Fragments<'_> {}
