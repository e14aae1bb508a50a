// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains [`Decorations`], the metadata snapshot attached to every log record.

use std::{
    fmt,
    sync::OnceLock,
    time::{Duration, Instant, SystemTime},
};

use smallvec::SmallVec;

/// Severity of a log record.
///
/// The buffer never filters on level; it is carried along so the output can print it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Very verbose tracing output.
    Trace,
    /// Debugging output.
    Debug,
    /// Normal informational output.
    Info,
    /// Something unexpected that doesn't prevent progress.
    Warning,
    /// Something failed.
    Error,
}

impl Level {
    /// The lowercase name used when formatting decorations.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags attached to a record. Up to four are stored inline, so cloning
/// [`Decorations`] normally doesn't allocate.
pub type Tags = SmallVec<[&'static str; 4]>;

/// An immutable snapshot of the contextual metadata of a log record, captured at the call site.
///
/// The snapshot is taken when the record is produced, not when it is written, so a record written
/// by the background thread seconds later still carries the time it was logged at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decorations {
    time: SystemTime,
    uptime: Duration,
    level: Level,
    tags: Tags,
}

impl Decorations {
    /// Capture decorations for a record logged right now.
    pub fn now(level: Level, tags: &[&'static str]) -> Self {
        Self {
            time: SystemTime::now(),
            uptime: uptime(),
            level,
            tags: Tags::from_slice(tags),
        }
    }

    /// Build decorations from explicit values. Mostly useful for deterministic output in tests.
    pub fn new(time: SystemTime, uptime: Duration, level: Level, tags: Tags) -> Self {
        Self {
            time,
            uptime,
            level,
            tags,
        }
    }

    /// Return a copy of these decorations using a different level.
    pub fn with_level(&self, level: Level) -> Self {
        Self {
            level,
            ..self.clone()
        }
    }

    /// Wall-clock time the record was captured at.
    pub fn time(&self) -> SystemTime {
        self.time
    }

    /// Time since the first decorations of this process were captured.
    pub fn uptime(&self) -> Duration {
        self.uptime
    }

    /// Level of the record.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Tags of the record, in the order they were given.
    pub fn tags(&self) -> &[&'static str] {
        &self.tags
    }
}

/// Formats as `[<unix seconds>.<millis>][<uptime>s][<level>][<tags>]`. The tag group is omitted
/// when there are no tags.
impl fmt::Display for Decorations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let since_epoch = self
            .time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        write!(
            f,
            "[{}.{:03}][{:.3}s][{}]",
            since_epoch.as_secs(),
            since_epoch.subsec_millis(),
            self.uptime.as_secs_f64(),
            self.level
        )?;
        if let Some((first, rest)) = self.tags.split_first() {
            write!(f, "[{first}")?;
            for tag in rest {
                write!(f, ",{tag}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

fn uptime() -> Duration {
    static START: OnceLock<Instant> = OnceLock::new();
    Instant::now().duration_since(*START.get_or_init(Instant::now))
}
